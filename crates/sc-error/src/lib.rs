// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy with stable error codes for the procurement pipeline.
//!
//! Every error raised within the pipeline carries a [`SupplyErrorCode`] (a
//! machine-readable, stable string tag), a human-readable message, an
//! optional cause chain, and arbitrary key-value context. Use the builder
//! returned by [`SupplyError::new`] to construct errors fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that a [`SupplyErrorCode`] belongs to.
///
/// Only [`ErrorCategory::Config`] and [`ErrorCategory::Validation`] are ever
/// allowed to escape `Procurement::submit`; every other category is recorded
/// on a [`crate`]-level Manifest instead of being raised across the executor
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration is malformed or missing a required value.
    Config,
    /// Submitted input failed schema or type validation.
    Validation,
    /// A supplier rejected credentials.
    Auth,
    /// A supplier's rate limit was exceeded.
    RateLimit,
    /// Network or HTTP transport failure talking to a supplier.
    Transport,
    /// Polling for an async result was exhausted without a final answer.
    PollingExhausted,
    /// The operation was cancelled before it completed.
    Cancelled,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Validation => "validation",
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::Transport => "transport",
            Self::PollingExhausted => "polling_exhausted",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// SupplyErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplyErrorCode {
    // -- Config --
    /// A Requisition, SupplyLink, or SupplyChain is misconfigured.
    ConfigInvalid,
    /// Two SupplyLinks in a chain share the same position.
    ConfigDuplicatePosition,

    // -- Validation --
    /// A required parameter is missing from the submitted input.
    ValidationMissingField,
    /// A submitted value could not be coerced to its parameter type.
    ValidationTypeMismatch,
    /// A FieldCoupling is missing for a parameter the Requisition requires.
    ValidationMissingCoupling,

    // -- Auth --
    /// No Passport/Visa could be resolved for the requisition.
    AuthNoQuartermaster,
    /// The supplier rejected the submitted credentials.
    AuthRejected,

    // -- RateLimit --
    /// Every candidate Visa's rate-limit bucket is exhausted.
    RateLimitExhausted,

    // -- Transport --
    /// The HTTP request to the supplier failed outright.
    TransportRequestFailed,
    /// The supplier returned a response we could not decode.
    TransportBadResponse,

    // -- PollingExhausted --
    /// A bounded poll loop (e.g. URL report) ran out of retries.
    PollingRetriesExhausted,

    // -- Cancelled --
    /// The SupplyOrder was cancelled while awaiting a suspension point.
    Cancelled,

    // -- Internal --
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl SupplyErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigInvalid | Self::ConfigDuplicatePosition => ErrorCategory::Config,

            Self::ValidationMissingField
            | Self::ValidationTypeMismatch
            | Self::ValidationMissingCoupling => ErrorCategory::Validation,

            Self::AuthNoQuartermaster | Self::AuthRejected => ErrorCategory::Auth,

            Self::RateLimitExhausted => ErrorCategory::RateLimit,

            Self::TransportRequestFailed | Self::TransportBadResponse => ErrorCategory::Transport,

            Self::PollingRetriesExhausted => ErrorCategory::PollingExhausted,

            Self::Cancelled => ErrorCategory::Cancelled,

            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"VALIDATION_MISSING_FIELD"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::ConfigDuplicatePosition => "CONFIG_DUPLICATE_POSITION",
            Self::ValidationMissingField => "VALIDATION_MISSING_FIELD",
            Self::ValidationTypeMismatch => "VALIDATION_TYPE_MISMATCH",
            Self::ValidationMissingCoupling => "VALIDATION_MISSING_COUPLING",
            Self::AuthNoQuartermaster => "AUTH_NO_QUARTERMASTER",
            Self::AuthRejected => "AUTH_REJECTED",
            Self::RateLimitExhausted => "RATE_LIMIT_EXHAUSTED",
            Self::TransportRequestFailed => "TRANSPORT_REQUEST_FAILED",
            Self::TransportBadResponse => "TRANSPORT_BAD_RESPONSE",
            Self::PollingRetriesExhausted => "POLLING_RETRIES_EXHAUSTED",
            Self::Cancelled => "CANCELLED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for SupplyErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SupplyError
// ---------------------------------------------------------------------------

/// Unified pipeline error.
///
/// Carries a stable [`SupplyErrorCode`], a human-readable message, an
/// optional source error for cause-chaining, and arbitrary structured
/// context.
///
/// # Builder usage
///
/// ```
/// use sc_error::{SupplyError, SupplyErrorCode};
///
/// let err = SupplyError::new(SupplyErrorCode::RateLimitExhausted, "no visa available")
///     .with_context("supplier", "virustotal")
///     .with_context("retry_after_s", 60);
/// ```
pub struct SupplyError {
    /// Machine-readable error code.
    pub code: SupplyErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl SupplyError {
    /// Create a new error with the given code and message.
    pub fn new(code: SupplyErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Whether this error is allowed to propagate synchronously from
    /// `Procurement::submit`, per the pipeline's error-handling design.
    ///
    /// Only config and validation failures are raised to the submitter;
    /// everything else is recorded as a Manifest by the executor.
    pub fn is_synchronous(&self) -> bool {
        matches!(self.category(), ErrorCategory::Config | ErrorCategory::Validation)
    }
}

impl fmt::Debug for SupplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("SupplyError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for SupplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for SupplyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`SupplyError`] (without the opaque source).
///
/// Used as the `notes`/error payload when a call fails and must still be
/// recorded on a Manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupplyErrorDto {
    /// Error code.
    pub code: SupplyErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&SupplyError> for SupplyErrorDto {
    fn from(err: &SupplyError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<SupplyErrorDto> for SupplyError {
    fn from(dto: SupplyErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
