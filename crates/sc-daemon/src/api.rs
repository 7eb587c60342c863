// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP control-plane API types: request/response envelopes and resource
//! representations used by the daemon REST API.

use chrono::{DateTime, Utc};
use sc_core::{ManifestId, SupplyOrderId, UserId};
use sc_error::SupplyErrorDto;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Order lifecycle
// ---------------------------------------------------------------------------

/// API-facing order status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Waiting for a worker to pick it up.
    Queued,
    /// Currently walking its SupplyChain.
    Running,
    /// Every link ran to completion.
    Completed,
    /// A link failed and aborted the remaining chain.
    Failed,
}

impl OrderStatus {
    /// Returns `true` if this status represents a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns the set of statuses that are valid successors of `self`.
    pub fn valid_transitions(&self) -> &'static [OrderStatus] {
        match self {
            Self::Queued => &[Self::Running],
            Self::Running => &[Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => &[],
        }
    }

    /// Returns `true` if transitioning from `self` to `next` is valid.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

/// Summary information about a tracked order, returned by `GET /orders/{id}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderInfo {
    /// Unique order identifier.
    pub id: SupplyOrderId,
    /// Current status.
    pub status: OrderStatus,
    /// When the order was submitted.
    pub created_at: DateTime<Utc>,
    /// Manifests persisted so far, in link-position order.
    pub manifests: Vec<ManifestId>,
    /// The final link's output, once `status` is `Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// The downstream processor's document id for `output`, once stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_doc_id: Option<String>,
    /// The error that aborted the chain, once `status` is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SupplyErrorDto>,
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body for `POST /orders`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    /// The Procurement to submit against.
    pub procurement_id: sc_core::ProcurementId,
    /// The submitting user, if any.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Input data keyed by the chain's first link's field names.
    #[serde(default)]
    pub input_data: Map<String, Value>,
}

/// Body for `POST /orders/alert`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitAlertRequest {
    /// The Procurement to submit against.
    pub procurement_id: sc_core::ProcurementId,
    /// The submitting user, if any.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Identifier of the alert that triggered this submission.
    pub alert_id: String,
    /// The alert's data; only fields the chain's first link expects are copied.
    #[serde(default)]
    pub alert_data: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

/// Discriminated union of all successful API response bodies.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiResponse {
    /// Response to `POST /orders` and `POST /orders/alert`.
    OrderCreated {
        /// Newly assigned order identifier.
        order_id: SupplyOrderId,
    },
    /// Response to `GET /orders/{id}`.
    OrderDetails {
        /// Order information.
        order: OrderInfo,
    },
    /// Response to `GET /health`.
    Health(HealthResponse),
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Server status (e.g. `"ok"`).
    pub status: String,
    /// Contract version reported by the server.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_seconds: u64,
    /// Number of registered procurements.
    pub procurement_count: usize,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structured API error returned on failure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable error code (e.g. `"not_found"`, `"invalid_request"`).
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiError {
    /// Create an error with no additional details.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Attach additional details to this error.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// 404 — resource not found.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    /// 400 — the request was malformed or failed validation.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new("invalid_request", message)
    }

    /// 500 — unexpected internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Convert a pipeline error into its API representation.
///
/// [`sc_error::SupplyError::is_synchronous`] errors (config/validation) are
/// `invalid_request`; everything else that somehow escapes the executor is
/// reported as `internal_error` since it should have been materialized as a
/// Manifest instead.
impl From<&sc_error::SupplyError> for ApiError {
    fn from(err: &sc_error::SupplyError) -> Self {
        if err.is_synchronous() {
            ApiError::invalid_request(err.message.clone())
                .with_details(serde_json::json!({"code": err.code.as_str()}))
        } else {
            ApiError::internal(err.message.clone())
        }
    }
}
