// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Shared request-handler trait and registry, plus the downstream-processor
//! seam a completed SupplyOrder's final data is handed to.
//!
//! A `RequestHandler` is the thing a SupplyLink actually calls: it knows how
//! to turn a Requisition's input fields into one HTTP call (or a bounded
//! sequence of them) against a single supplier API class, and to normalize
//! the response into a [`sc_core::Cargo`].
//!
//! A `DownstreamProcessor` is the external "DataMunger"/distillery that
//! persists a SupplyOrder's final normalized document once its chain
//! completes; the procurement pipeline only needs `store`/`find` against it.

use async_trait::async_trait;
use sc_core::Cargo;
use sc_error::SupplyError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Identifies a request handler: the supplier it talks to and the API class
/// (endpoint family) it implements, e.g. `("virustotal", "domain_report")`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerIdentity {
    /// Supplier name, e.g. `"virustotal"`.
    pub supplier: String,
    /// API class / endpoint family, e.g. `"domain_report"`.
    pub api_class: String,
}

impl HandlerIdentity {
    /// Construct a new handler identity.
    #[must_use]
    pub fn new(supplier: impl Into<String>, api_class: impl Into<String>) -> Self {
        Self {
            supplier: supplier.into(),
            api_class: api_class.into(),
        }
    }
}

impl std::fmt::Display for HandlerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.supplier, self.api_class)
    }
}

/// A handler that can execute one call (or bounded sequence of calls)
/// against a supplier API, given a Passport's API key and Requisition input.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Returns the identity of this handler.
    fn identity(&self) -> HandlerIdentity;

    /// Execute the call. `api_key` is the credential extracted from the
    /// resolved Passport, if the supplier requires one.
    ///
    /// # Errors
    ///
    /// Returns a [`SupplyError`] for transport failures, bad responses, or
    /// exhausted polling retries. A successful HTTP round trip that the
    /// supplier itself reports as failed is still `Ok` — it comes back as a
    /// non-1 [`Cargo::status_code`], not an `Err`.
    async fn process(&self, api_key: Option<&str>, input: &Map<String, Value>) -> Result<Cargo, SupplyError>;
}

/// A `RequestHandler` wrapped for storage in a [`HandlerRegistry`].
type SharedHandler = Arc<dyn RequestHandler>;

/// A registry of request handlers keyed by [`HandlerIdentity`].
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<HandlerIdentity, SharedHandler>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, replacing any previous handler with the same identity.
    pub fn register(&mut self, handler: SharedHandler) {
        self.handlers.insert(handler.identity(), handler);
    }

    /// Look up a handler by supplier and API class.
    #[must_use]
    pub fn get(&self, supplier: &str, api_class: &str) -> Option<SharedHandler> {
        self.handlers
            .get(&HandlerIdentity::new(supplier, api_class))
            .cloned()
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Errors raised by a [`DownstreamProcessor`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum DownstreamError {
    /// The sink rejected the document or the lookup failed.
    #[error("downstream processor failed: {0}")]
    Failed(String),
}

/// The external sink a SupplyOrder's final data is handed to once its chain
/// completes, per the core's `store`/`find` contract. Out of scope to
/// implement for real — this crate only defines the seam the executor calls
/// against, plus an in-memory default for daemons that run without one wired up.
#[async_trait]
pub trait DownstreamProcessor: Send + Sync {
    /// Persist `data`, wrapped with the supplier's platform name, returning
    /// an opaque document id.
    async fn store(&self, platform_name: &str, data: &Value) -> Result<String, DownstreamError>;

    /// Look up a previously stored document by id.
    async fn find(&self, doc_id: &str) -> Result<Option<Value>, DownstreamError>;
}

type SharedDownstreamProcessor = Arc<dyn DownstreamProcessor>;

/// A registry of downstream processors keyed by `Procurement.munger_id`.
/// Procurements with no `munger_id` resolve to [`DownstreamRegistry::default_processor`].
pub struct DownstreamRegistry {
    processors: HashMap<String, SharedDownstreamProcessor>,
    default: SharedDownstreamProcessor,
}

impl DownstreamRegistry {
    /// Create a registry with the given fallback processor for Procurements
    /// that have no `munger_id`.
    #[must_use]
    pub fn new(default_processor: SharedDownstreamProcessor) -> Self {
        Self {
            processors: HashMap::new(),
            default: default_processor,
        }
    }

    /// Register a processor under `munger_id`.
    pub fn register(&mut self, munger_id: impl Into<String>, processor: SharedDownstreamProcessor) {
        self.processors.insert(munger_id.into(), processor);
    }

    /// Resolve the processor for a Procurement's `munger_id`, falling back to
    /// the default processor when `munger_id` is `None` or unregistered.
    #[must_use]
    pub fn resolve(&self, munger_id: Option<&str>) -> SharedDownstreamProcessor {
        munger_id
            .and_then(|id| self.processors.get(id).cloned())
            .unwrap_or_else(|| self.default.clone())
    }
}

/// An in-process [`DownstreamProcessor`] backed by a `HashMap`. Suitable as
/// the default sink for daemons run without a real DataMunger wired up.
#[derive(Default)]
pub struct InMemoryDownstreamProcessor {
    documents: std::sync::Mutex<HashMap<String, Value>>,
}

impl InMemoryDownstreamProcessor {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DownstreamProcessor for InMemoryDownstreamProcessor {
    async fn store(&self, platform_name: &str, data: &Value) -> Result<String, DownstreamError> {
        let doc_id = uuid::Uuid::new_v4().to_string();
        let wrapped = serde_json::json!({"platform": platform_name, "data": data});
        self.documents
            .lock()
            .map_err(|_| DownstreamError::Failed("document store lock poisoned".into()))?
            .insert(doc_id.clone(), wrapped);
        Ok(doc_id)
    }

    async fn find(&self, doc_id: &str) -> Result<Option<Value>, DownstreamError> {
        let documents = self
            .documents
            .lock()
            .map_err(|_| DownstreamError::Failed("document store lock poisoned".into()))?;
        Ok(documents.get(doc_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_error::SupplyErrorCode;

    struct EchoHandler;

    #[async_trait]
    impl RequestHandler for EchoHandler {
        fn identity(&self) -> HandlerIdentity {
            HandlerIdentity::new("mock", "echo")
        }

        async fn process(&self, _api_key: Option<&str>, input: &Map<String, Value>) -> Result<Cargo, SupplyError> {
            Ok(Cargo::ok(Value::Object(input.clone())))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl RequestHandler for FailingHandler {
        fn identity(&self) -> HandlerIdentity {
            HandlerIdentity::new("mock", "fail")
        }

        async fn process(&self, _api_key: Option<&str>, _input: &Map<String, Value>) -> Result<Cargo, SupplyError> {
            Err(SupplyError::new(
                SupplyErrorCode::TransportRequestFailed,
                "connection refused",
            ))
        }
    }

    #[test]
    fn identity_display_format() {
        let id = HandlerIdentity::new("virustotal", "domain_report");
        assert_eq!(id.to_string(), "virustotal:domain_report");
    }

    #[tokio::test]
    async fn registry_dispatches_by_identity() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(EchoHandler));
        assert_eq!(registry.len(), 1);

        let handler = registry.get("mock", "echo").expect("handler registered");
        let mut input = Map::new();
        input.insert("k".into(), Value::String("v".into()));
        let cargo = handler.process(None, &input).await.unwrap();
        assert!(cargo.is_success());
    }

    #[test]
    fn registry_missing_handler_returns_none() {
        let registry = HandlerRegistry::new();
        assert!(registry.get("mock", "missing").is_none());
    }

    #[tokio::test]
    async fn handler_can_report_transport_error() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(FailingHandler));
        let handler = registry.get("mock", "fail").unwrap();
        let err = handler.process(None, &Map::new()).await.unwrap_err();
        assert_eq!(err.code, SupplyErrorCode::TransportRequestFailed);
    }

    #[test]
    fn empty_registry_reports_empty() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());
    }

    #[test]
    fn register_replaces_existing_identity() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(EchoHandler));
        registry.register(Arc::new(EchoHandler));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn in_memory_downstream_round_trips() {
        let processor = InMemoryDownstreamProcessor::new();
        let data = serde_json::json!({"domain": "example.com"});
        let doc_id = processor.store("virustotal", &data).await.unwrap();

        let found = processor.find(&doc_id).await.unwrap().expect("document present");
        assert_eq!(found["platform"], "virustotal");
        assert_eq!(found["data"], data);
    }

    #[tokio::test]
    async fn in_memory_downstream_find_missing_is_none() {
        let processor = InMemoryDownstreamProcessor::new();
        assert!(processor.find("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn downstream_registry_resolves_by_munger_id() {
        let mut registry = DownstreamRegistry::new(Arc::new(InMemoryDownstreamProcessor::new()));
        registry.register("munger-a", Arc::new(InMemoryDownstreamProcessor::new()));

        let data = serde_json::json!({"k": "v"});
        let resolved = registry.resolve(Some("munger-a"));
        let doc_id = resolved.store("virustotal", &data).await.unwrap();

        assert!(registry.resolve(Some("munger-a")).find(&doc_id).await.unwrap().is_some());
        assert!(registry.resolve(None).find(&doc_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn downstream_registry_falls_back_to_default_for_unknown_id() {
        let registry = DownstreamRegistry::new(Arc::new(InMemoryDownstreamProcessor::new()));
        let data = serde_json::json!({"k": "v"});
        let doc_id = registry.resolve(Some("unregistered")).store("x", &data).await.unwrap();
        assert!(registry.resolve(None).find(&doc_id).await.unwrap().is_some());
    }
}
