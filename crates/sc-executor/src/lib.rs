// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The async driver that walks a [`SupplyChain`] for a [`SupplyOrder`]: one
//! [`tokio::task`] per order, strictly sequential within the chain, with no
//! ordering guarantee across orders.
//!
//! Per link: validate the threaded data, rename it through the link's
//! coupling map, sleep the countdown, resolve a Quartermaster, dispatch the
//! matching handler under a per-link timeout, and persist exactly one
//! Manifest regardless of outcome. Only the orchestration itself
//! (unregistered handler, store I/O failure) raises an `Err` from
//! [`Executor::run_chain`] — every per-link failure is recorded as a
//! Manifest and aborts the remaining chain, per the propagation policy.
//!
//! Once every Manifest for an order is durable, a non-null final output is
//! wrapped with the last link's supplier name and handed to the Procurement's
//! resolved [`DownstreamProcessor`](sc_handler_core::DownstreamProcessor),
//! producing the `final_doc_id` surfaced on [`ChainRunOutcome`].

use sc_chain::SupplyChain;
use sc_core::{Manifest, ManifestId, Procurement, Stamp, SupplyOrder};
use sc_error::{SupplyError, SupplyErrorCode, SupplyErrorDto};
use sc_handler_core::{DownstreamRegistry, HandlerRegistry};
use sc_manifest_store::ManifestStore;
use sc_quartermaster::Quartermaster;
use sc_requisition::Supplier;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

/// Minimum per-link handler timeout applied on top of the countdown, per the
/// `countdownSeconds + max(handler_timeout, 120s)` rule.
pub const MIN_HANDLER_TIMEOUT_SECS: u64 = 120;

/// The result of running a chain to completion or to its first abort point.
#[derive(Debug, Clone)]
pub struct ChainRunOutcome {
    /// Manifests persisted in link-position order.
    pub manifests: Vec<ManifestId>,
    /// The final link's output, or `None` if the chain aborted early.
    pub output: Option<Value>,
    /// The downstream processor's document id for `output`, set only once
    /// every Manifest above is durable. `None` if the chain aborted early or
    /// the downstream processor failed to store the document.
    pub final_doc_id: Option<String>,
}

/// Drives SupplyChain execution for SupplyOrders.
pub struct Executor {
    registry: HandlerRegistry,
    suppliers: HashMap<sc_core::SupplierId, Supplier>,
    quartermasters: Vec<Quartermaster>,
    store: ManifestStore,
    downstream: DownstreamRegistry,
    handler_timeout_secs: u64,
}

impl Executor {
    /// Construct a new executor.
    #[must_use]
    pub fn new(
        registry: HandlerRegistry,
        suppliers: Vec<Supplier>,
        quartermasters: Vec<Quartermaster>,
        store: ManifestStore,
        downstream: DownstreamRegistry,
    ) -> Self {
        Self {
            registry,
            suppliers: suppliers.into_iter().map(|s| (s.id, s)).collect(),
            quartermasters,
            store,
            downstream,
            handler_timeout_secs: MIN_HANDLER_TIMEOUT_SECS,
        }
    }

    /// Override the baseline per-handler timeout (default
    /// [`MIN_HANDLER_TIMEOUT_SECS`]). The actual per-link timeout is always
    /// at least this value, plus the link's countdown.
    #[must_use]
    pub fn with_handler_timeout_secs(mut self, secs: u64) -> Self {
        self.handler_timeout_secs = secs.max(MIN_HANDLER_TIMEOUT_SECS);
        self
    }

    /// Run `chain` for `order` against `procurement`, threading each link's
    /// output into the next and, on a non-null final output, storing it
    /// through `procurement.munger_id`'s resolved downstream processor.
    ///
    /// # Errors
    ///
    /// Returns an `Err` only for orchestration failures that are not
    /// per-link outcomes: persisting a Manifest failed, or the chain has no
    /// links at all.
    #[instrument(skip(self, chain, order), fields(order_id = %order.id))]
    pub async fn run_chain(
        &self,
        chain: &SupplyChain,
        order: &SupplyOrder,
        procurement: &Procurement,
    ) -> Result<ChainRunOutcome, SupplyError> {
        let links = chain.ordered_links();
        if links.is_empty() {
            return Err(SupplyError::new(SupplyErrorCode::ConfigInvalid, "SupplyChain has no SupplyLinks."));
        }

        let mut manifests = Vec::new();
        let mut data: Option<Map<String, Value>> = Some(order.input_data.clone());
        let mut last_supplier_name: Option<String> = None;

        for link in links {
            let Some(current) = data else {
                break;
            };

            if let Err(validation_err) = link.validate_input(&current) {
                let manifest_id = self
                    .persist_error(link.id, None, order, &validation_err)
                    .await?;
                manifests.push(manifest_id);
                data = None;
                break;
            }

            let params = link.rename(&current);

            let now = Instant::now();
            let resolved = sc_quartermaster::resolve_or_error(
                &self.quartermasters,
                order.user_id,
                link.requisition.id,
                link.requisition.visa_required,
                now,
            )
            .await;

            let quartermaster = match resolved {
                Ok(qm) => qm,
                Err(auth_err) => {
                    let manifest_id = self.persist_error(link.id, None, order, &auth_err).await?;
                    manifests.push(manifest_id);
                    data = None;
                    break;
                }
            };

            tokio::time::sleep(Duration::from_secs(link.countdown_seconds())).await;

            let supplier_name = self
                .suppliers
                .get(&link.platform())
                .map(|s| s.name.as_str())
                .unwrap_or("unknown");
            last_supplier_name = Some(supplier_name.to_string());
            let handler = self.registry.get(supplier_name, &link.requisition.api_class);

            let Some(handler) = handler else {
                let err = SupplyError::new(
                    SupplyErrorCode::ConfigInvalid,
                    format!("no handler registered for {supplier_name}:{}", link.requisition.api_class),
                );
                let manifest_id = self.persist_error(link.id, Some(quartermaster.passport.id), order, &err).await?;
                manifests.push(manifest_id);
                data = None;
                break;
            };

            let total_timeout = Duration::from_secs(link.countdown_seconds() + self.handler_timeout_secs);
            let stamp = Stamp::mint(link.id, Some(quartermaster.passport.id));
            let api_key = quartermaster.passport.credential_payload.clone();

            let outcome = tokio::time::timeout(total_timeout, handler.process(Some(&api_key), &params)).await;

            let (manifest_data, next_output) = match outcome {
                Err(_elapsed) => {
                    warn!(link_id = %link.id, "link timed out");
                    (serde_json::json!({"error": "timeout", "code": "TIMEOUT"}), None)
                }
                Ok(Err(handler_err)) => {
                    let dto: SupplyErrorDto = (&handler_err).into();
                    (serde_json::to_value(&dto).unwrap_or(Value::Null), None)
                }
                Ok(Ok(cargo)) => {
                    let next = if cargo.data.is_null() { None } else { Some(cargo.data.clone()) };
                    (serde_json::to_value(&cargo).unwrap_or(Value::Null), next)
                }
            };

            let mut stamp = stamp;
            stamp.finish_at(chrono::Utc::now());

            let manifest = Manifest::create(stamp.id, Some(order.id), manifest_data);
            self.store.save(&manifest).await.map_err(store_error)?;
            manifests.push(manifest.id);

            data = next_output.map(|v| match v {
                Value::Object(m) => m,
                other => {
                    let mut m = Map::new();
                    m.insert("value".to_string(), other);
                    m
                }
            });
        }

        let output = data.map(Value::Object);

        let final_doc_id = match &output {
            Some(final_data) => {
                let platform_name = last_supplier_name.as_deref().unwrap_or("unknown");
                let processor = self.downstream.resolve(procurement.munger_id.as_deref());
                match processor.store(platform_name, final_data).await {
                    Ok(doc_id) => Some(doc_id),
                    Err(err) => {
                        warn!(%err, "downstream processor failed to store final document");
                        None
                    }
                }
            }
            None => None,
        };

        info!(manifest_count = manifests.len(), "chain run complete");
        Ok(ChainRunOutcome {
            manifests,
            output,
            final_doc_id,
        })
    }

    async fn persist_error(
        &self,
        link_id: sc_core::SupplyLinkId,
        passport_id: Option<sc_core::PassportId>,
        order: &SupplyOrder,
        err: &SupplyError,
    ) -> Result<ManifestId, SupplyError> {
        let stamp = Stamp::mint(link_id, passport_id);
        let dto: SupplyErrorDto = err.into();
        let manifest = Manifest::create(stamp.id, Some(order.id), serde_json::to_value(&dto).unwrap_or(Value::Null));
        self.store.save(&manifest).await.map_err(store_error)?;
        Ok(manifest.id)
    }
}

fn store_error(e: sc_manifest_store::ManifestStoreError) -> SupplyError {
    SupplyError::new(SupplyErrorCode::Internal, e.to_string()).with_source(e)
}
