// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! Thin HTTP control plane over the procurement pipeline: `POST /orders`,
//! `POST /orders/alert`, `GET /orders/{id}`, `GET /health`. No auth, no
//! admin UI — those are out-of-scope collaborators; this exists only to
//! make `Procurement::submit`/`SupplyOrder::get` reachable over the wire.

pub mod api;

use api::{ApiError, ApiResponse, HealthResponse, OrderInfo, OrderStatus, SubmitAlertRequest, SubmitOrderRequest};
use axum::{
    Json, Router,
    extract::{Path as AxPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use sc_chain::SupplyChain;
use sc_core::{ManifestId, Procurement, ProcurementId, SupplyOrder, SupplyOrderId, CONTRACT_VERSION};
use sc_error::SupplyErrorDto;
use sc_executor::Executor;
use sc_run_queue::{QueuePriority, QueuedRun, RunQueue};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, instrument};

/// The tracked state of one submitted order.
#[derive(Debug, Clone)]
struct OrderRecord {
    order: SupplyOrder,
    procurement_id: ProcurementId,
    status: OrderStatus,
    manifests: Vec<ManifestId>,
    output: Option<Value>,
    final_doc_id: Option<String>,
    error: Option<SupplyErrorDto>,
}

impl OrderRecord {
    fn queued(order: SupplyOrder, procurement_id: ProcurementId) -> Self {
        Self {
            order,
            procurement_id,
            status: OrderStatus::Queued,
            manifests: Vec::new(),
            output: None,
            final_doc_id: None,
            error: None,
        }
    }

    fn to_info(&self) -> OrderInfo {
        OrderInfo {
            id: self.order.id,
            status: self.status,
            created_at: self.order.created_date,
            manifests: self.manifests.clone(),
            output: self.output.clone(),
            final_doc_id: self.final_doc_id.clone(),
            error: self.error.clone(),
        }
    }
}

/// Shared daemon state.
#[derive(Clone)]
pub struct AppState {
    procurements: Arc<HashMap<ProcurementId, (Procurement, SupplyChain)>>,
    executor: Arc<Executor>,
    orders: Arc<RwLock<HashMap<SupplyOrderId, OrderRecord>>>,
    queue: Arc<Mutex<RunQueue>>,
    started_at: Instant,
}

impl AppState {
    /// Construct daemon state over a fixed catalog of Procurements and the
    /// executor that runs their chains.
    #[must_use]
    pub fn new(procurements: Vec<(Procurement, SupplyChain)>, executor: Executor, queue_capacity: usize) -> Self {
        let procurements = procurements.into_iter().map(|(p, c)| (p.id, (p, c))).collect();
        Self {
            procurements: Arc::new(procurements),
            executor: Arc::new(executor),
            orders: Arc::new(RwLock::new(HashMap::new())),
            queue: Arc::new(Mutex::new(RunQueue::new(queue_capacity))),
            started_at: Instant::now(),
        }
    }
}

/// Build the Axum router with all daemon routes.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/orders", post(submit_order))
        .route("/orders/alert", post(submit_alert))
        .route("/orders/{id}", get(get_order))
        .with_state(state)
}

/// Run the background worker loop that drains `state.queue` and executes
/// each popped order's chain on its own task. Returns once the queue handle
/// is dropped; intended to be spawned once at daemon startup.
pub async fn run_worker_loop(state: AppState) {
    loop {
        let next = state.queue.lock().await.dequeue();
        match next {
            Some(run) => {
                let state = state.clone();
                tokio::spawn(async move { execute_queued_run(state, run).await });
            }
            None => tokio::time::sleep(Duration::from_millis(25)).await,
        }
    }
}

#[instrument(skip(state, run), fields(supply_order_id = %run.supply_order_id))]
async fn execute_queued_run(state: AppState, run: QueuedRun) {
    let Ok(order_id) = run.supply_order_id.parse::<uuid::Uuid>() else {
        error!("queued run carried an unparseable order id");
        return;
    };
    let order_id = SupplyOrderId::from(order_id);

    let (chain, procurement, order) = {
        let mut orders = state.orders.write().await;
        let Some(record) = orders.get_mut(&order_id) else {
            error!("queued run has no matching order record");
            return;
        };
        record.status = OrderStatus::Running;
        let Some((procurement, chain)) = state.procurements.get(&record.procurement_id) else {
            record.status = OrderStatus::Failed;
            return;
        };
        (chain.clone(), procurement.clone(), record.order.clone())
    };

    let outcome = state.executor.run_chain(&chain, &order, &procurement).await;

    let mut orders = state.orders.write().await;
    if let Some(record) = orders.get_mut(&order_id) {
        match outcome {
            Ok(outcome) => {
                record.manifests = outcome.manifests;
                record.output = outcome.output.clone();
                if let Some(doc_id) = outcome.final_doc_id.clone() {
                    record.order = record.order.clone().update_result(chain.name.clone(), doc_id);
                }
                record.final_doc_id = outcome.final_doc_id;
                record.status = if outcome.output.is_some() {
                    OrderStatus::Completed
                } else {
                    OrderStatus::Failed
                };
            }
            Err(err) => {
                record.error = Some((&err).into());
                record.status = OrderStatus::Failed;
            }
        }
    }
    info!("order run finished");
}

async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::Health(HealthResponse {
        status: "ok".into(),
        version: CONTRACT_VERSION.into(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        procurement_count: state.procurements.len(),
    }))
}

struct ApiFailure(StatusCode, ApiError);

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

async fn submit_order(
    State(state): State<AppState>,
    Json(req): Json<SubmitOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse>), ApiFailure> {
    let Some((_, chain)) = state.procurements.get(&req.procurement_id) else {
        return Err(ApiFailure(StatusCode::NOT_FOUND, ApiError::not_found("unknown procurement")));
    };

    chain
        .validate_input(&req.input_data)
        .map_err(|e| ApiFailure(StatusCode::BAD_REQUEST, (&e).into()))?;

    let mut order = SupplyOrder::new(req.procurement_id, req.input_data);
    order.user_id = req.user_id;
    let order_id = order.id;

    enqueue_order(&state, order, chain, req.procurement_id).await;

    Ok((StatusCode::ACCEPTED, Json(ApiResponse::OrderCreated { order_id })))
}

async fn submit_alert(
    State(state): State<AppState>,
    Json(req): Json<SubmitAlertRequest>,
) -> Result<(StatusCode, Json<ApiResponse>), ApiFailure> {
    let Some((_, chain)) = state.procurements.get(&req.procurement_id) else {
        return Err(ApiFailure(StatusCode::NOT_FOUND, ApiError::not_found("unknown procurement")));
    };

    let input_fields: Vec<String> = chain.input_fields().keys().cloned().collect();
    let mut order = SupplyOrder::new(req.procurement_id, serde_json::Map::new()).associate_alert(req.alert_id);
    order.use_alert_data(&input_fields, &req.alert_data);
    order.user_id = req.user_id;

    chain
        .validate_input(&order.input_data)
        .map_err(|e| ApiFailure(StatusCode::BAD_REQUEST, (&e).into()))?;

    let order_id = order.id;
    enqueue_order(&state, order, chain, req.procurement_id).await;

    Ok((StatusCode::ACCEPTED, Json(ApiResponse::OrderCreated { order_id })))
}

async fn enqueue_order(state: &AppState, order: SupplyOrder, chain: &SupplyChain, procurement_id: ProcurementId) {
    let order_id = order.id;
    let supplier_name = chain.platform().map(|_| chain.name.clone());

    state.orders.write().await.insert(order_id, OrderRecord::queued(order, procurement_id));

    let run = QueuedRun {
        id: order_id.to_string(),
        supply_order_id: order_id.to_string(),
        priority: QueuePriority::Normal,
        queued_at: Utc::now().to_rfc3339(),
        supplier: supplier_name,
        metadata: Default::default(),
    };
    if let Err(err) = state.queue.lock().await.enqueue(run) {
        error!(%err, "failed to enqueue order run");
    }
}

async fn get_order(
    State(state): State<AppState>,
    AxPath(id): AxPath<uuid::Uuid>,
) -> Result<Json<ApiResponse>, ApiFailure> {
    let order_id = SupplyOrderId::from(id);
    let orders = state.orders.read().await;
    let record = orders
        .get(&order_id)
        .ok_or_else(|| ApiFailure(StatusCode::NOT_FOUND, ApiError::not_found("order not found")))?;
    Ok(Json(ApiResponse::OrderDetails { order: record.to_info() }))
}
