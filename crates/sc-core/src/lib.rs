// SPDX-License-Identifier: MIT OR Apache-2.0
//! sc-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The stable contract types shared by every crate in the procurement
//! pipeline: opaque identifiers, the [`Cargo`] result envelope returned by
//! request handlers, and the [`Manifest`], [`Stamp`], [`SupplyOrder`], and
//! [`Procurement`] records that make up a completed (or in-flight) order.
//!
//! If you only take one dependency in this workspace, take this one.

/// Manifest and stamp validation utilities.
pub mod validate;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Current contract version string embedded in persisted manifests.
pub const CONTRACT_VERSION: &str = "supplychain/v1";

macro_rules! opaque_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

opaque_id!(SupplierId, "Identifies a [`Supplier`](https://en.wikipedia.org/wiki/Supplier) integration (e.g. VirusTotal).");
opaque_id!(RequisitionId, "Identifies a Requisition — the parameter contract for one call shape.");
opaque_id!(SupplyChainId, "Identifies a SupplyChain — an ordered sequence of SupplyLinks.");
opaque_id!(SupplyLinkId, "Identifies a single SupplyLink within a SupplyChain.");
opaque_id!(PassportId, "Identifies a Passport — a credential bound to a Quartermaster.");
opaque_id!(VisaId, "Identifies a Visa — a rate-limit bucket bound to a Quartermaster.");
opaque_id!(QuartermasterId, "Identifies a Quartermaster — the binding of a Passport and optional Visa to a set of Requisitions.");
opaque_id!(StampId, "Identifies a Stamp — a single attempted call against a supplier.");
opaque_id!(ManifestId, "Identifies a Manifest — the persisted result of a Stamp.");
opaque_id!(SupplyOrderId, "Identifies a SupplyOrder — one customer-facing procurement request.");
opaque_id!(ProcurementId, "Identifies a Procurement — the named binding of a SupplyChain to a result sink.");
opaque_id!(UserId, "Identifies the user who submitted a SupplyOrder.");

/// The transient result of a single request-handler call.
///
/// Mirrors the shape every supplier response is normalized into before it is
/// persisted as a [`Manifest`]: a status code, a free-form notes string, and
/// the raw response payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Cargo {
    /// Supplier-reported status code. `1` conventionally means success;
    /// handlers and links decide for themselves what other values mean.
    pub status_code: i32,

    /// Human-readable status message reported by the supplier, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// The remainder of the supplier's response payload.
    #[serde(default)]
    pub data: Value,
}

impl Cargo {
    /// Construct a successful [`Cargo`] (`status_code == 1`) with the given data.
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self {
            status_code: 1,
            notes: None,
            data,
        }
    }

    /// Construct a [`Cargo`] representing a supplier-reported failure.
    #[must_use]
    pub fn failed(status_code: i32, notes: impl Into<String>) -> Self {
        Self {
            status_code,
            notes: Some(notes.into()),
            data: Value::Null,
        }
    }

    /// Returns `true` when [`Self::status_code`] indicates success (`1`).
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code == 1
    }
}

/// A single attempted call against a supplier, minted before the call is made
/// and finalized once a [`Cargo`] (or error) comes back.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Stamp {
    /// Unique identifier for this stamp.
    pub id: StampId,
    /// The SupplyLink this stamp was minted for.
    pub supply_link_id: SupplyLinkId,
    /// The Passport used to authenticate the call, if one was required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport_id: Option<PassportId>,
    /// When the call was initiated.
    pub created_at: DateTime<Utc>,
    /// When the call (including any polling) concluded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Stamp {
    /// Mint a fresh stamp for a SupplyLink, timestamped now.
    #[must_use]
    pub fn mint(supply_link_id: SupplyLinkId, passport_id: Option<PassportId>) -> Self {
        Self {
            id: StampId::new(),
            supply_link_id,
            passport_id,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Mark this stamp as finished at the given time.
    pub fn finish_at(&mut self, when: DateTime<Utc>) {
        self.finished_at = Some(when);
    }
}

/// The durable record of a Stamp's outcome: the persisted counterpart of a
/// [`Cargo`], optionally attached to the [`SupplyOrder`] that triggered it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Manifest {
    /// Unique identifier for this manifest.
    pub id: ManifestId,
    /// The stamp this manifest records the outcome of.
    pub stamp_id: StampId,
    /// The SupplyOrder this manifest belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply_order_id: Option<SupplyOrderId>,
    /// The data recorded for this call (a serialized [`Cargo`] or error payload).
    pub data: Value,
    /// When this manifest was created.
    pub created_at: DateTime<Utc>,
    /// Hash of the canonical manifest, filled in once persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_sha256: Option<String>,
}

impl Manifest {
    /// Create a manifest recording `data` for the given stamp.
    #[must_use]
    pub fn create(stamp_id: StampId, supply_order_id: Option<SupplyOrderId>, data: Value) -> Self {
        Self {
            id: ManifestId::new(),
            stamp_id,
            supply_order_id,
            data,
            created_at: Utc::now(),
            manifest_sha256: None,
        }
    }

    /// Compute and attach the canonical SHA-256 hash, returning the updated manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Json`] if the manifest cannot be serialized.
    pub fn with_hash(mut self) -> Result<Self, ContractError> {
        let h = manifest_hash(&self)?;
        self.manifest_sha256 = Some(h);
        Ok(self)
    }
}

/// Errors from contract-level operations (serialization, hashing).
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// JSON serialization or deserialization failed.
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Produce a deterministic JSON string for hashing.
///
/// Not a full JCS implementation, but stable for our types: keys are sorted
/// (`serde_json::Map` is a `BTreeMap` by default) and numbers serialize
/// consistently through `serde_json`.
///
/// # Errors
///
/// Returns [`ContractError::Json`] if the value cannot be serialized.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, ContractError> {
    let v = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&v)?)
}

/// Compute the hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Compute the canonical hash of a manifest.
///
/// Sets `manifest_sha256` to `null` before hashing so the stored hash is not
/// self-referential. Prefer [`Manifest::with_hash`] over calling this directly.
///
/// # Errors
///
/// Returns [`ContractError::Json`] if the manifest cannot be serialized.
pub fn manifest_hash(manifest: &Manifest) -> Result<String, ContractError> {
    let mut v = serde_json::to_value(manifest)?;
    if let Value::Object(map) = &mut v {
        map.insert("manifest_sha256".to_string(), Value::Null);
    }
    let json = serde_json::to_string(&v)?;
    Ok(sha256_hex(json.as_bytes()))
}

/// A customer-facing procurement request: one submission of input data against
/// a [`Procurement`], producing zero or more [`Manifest`]s as its SupplyChain runs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SupplyOrder {
    /// Unique identifier for this order.
    pub id: SupplyOrderId,
    /// The Procurement this order was submitted against.
    pub procurement_id: ProcurementId,
    /// The user who submitted this order, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// The alert that triggered this order, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<String>,
    /// Input data supplied for the order, keyed by Requisition parameter name.
    #[serde(default)]
    pub input_data: Map<String, Value>,
    /// Name of the distillery (result sink) this order's result is saved to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distillery: Option<String>,
    /// Identifier of the document containing the order's result, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    /// When this order was created.
    pub created_date: DateTime<Utc>,
}

impl SupplyOrder {
    /// Start a new order against `procurement_id` with the given input data.
    #[must_use]
    pub fn new(procurement_id: ProcurementId, input_data: Map<String, Value>) -> Self {
        Self {
            id: SupplyOrderId::new(),
            procurement_id,
            user_id: None,
            alert_id: None,
            input_data,
            distillery: None,
            doc_id: None,
            created_date: Utc::now(),
        }
    }

    /// Associate this order with an alert, returning `self` for chaining.
    #[must_use]
    pub fn associate_alert(mut self, alert_id: impl Into<String>) -> Self {
        self.alert_id = Some(alert_id.into());
        self
    }

    /// Record where this order's result was saved, returning `self` for chaining.
    #[must_use]
    pub fn update_result(mut self, distillery: impl Into<String>, doc_id: impl Into<String>) -> Self {
        self.distillery = Some(distillery.into());
        self.doc_id = Some(doc_id.into());
        self
    }

    /// Build `input_data` from alert data, given the set of fields the order's
    /// Requisition chain expects. Every expected field is assigned, falling
    /// back to JSON `null` when the alert doesn't carry it.
    ///
    /// Mirrors the Python original's `use_alert_data`, which assigns
    /// `input_data[key] = alert.data.get(key)` for each expected field.
    pub fn use_alert_data(&mut self, input_fields: &[String], alert_data: &Map<String, Value>) {
        let mut data = Map::new();
        for field in input_fields {
            data.insert(field.clone(), alert_data.get(field).cloned().unwrap_or(Value::Null));
        }
        self.input_data = data;
    }

    /// Returns `true` once this order's result has been recorded.
    #[must_use]
    pub fn has_result(&self) -> bool {
        self.distillery.is_some() && self.doc_id.is_some()
    }
}

/// The named binding of a SupplyChain to a result sink (a "distillery" and,
/// in the original system, a data munger). Submitting against a Procurement
/// is what creates a [`SupplyOrder`] and starts its SupplyChain running.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Procurement {
    /// Unique identifier for this procurement.
    pub id: ProcurementId,
    /// Unique, human-chosen name.
    pub name: String,
    /// The SupplyChain this procurement runs.
    pub supply_chain_id: SupplyChainId,
    /// Identifier of the data munger used to post-process results, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub munger_id: Option<String>,
}

impl Procurement {
    /// Construct a new procurement.
    #[must_use]
    pub fn new(name: impl Into<String>, supply_chain_id: SupplyChainId) -> Self {
        Self {
            id: ProcurementId::new(),
            name: name.into(),
            supply_chain_id,
            munger_id: None,
        }
    }
}
