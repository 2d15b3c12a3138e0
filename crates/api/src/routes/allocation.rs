//! Stock allocation endpoints.
//!
//! Each write endpoint translates its JSON body into one command and
//! dispatches it on the message bus.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use common::{BatchRef, Sku};
use domain::{Allocate, ChangeBatchQuantity, CreateBatch};
use serde::{Deserialize, Serialize};
use service_layer::{CommandOutcome, MessageBus, ProductView, product_view};
use stock_store::StockStore;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: StockStore> {
    pub bus: MessageBus<S>,
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct AddBatchRequest {
    #[serde(rename = "ref")]
    pub reference: String,
    pub sku: String,
    pub qty: u32,
    #[serde(default)]
    pub eta: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct AllocateRequest {
    pub orderid: String,
    pub sku: String,
    pub qty: u32,
}

#[derive(Debug, Deserialize)]
pub struct ChangeBatchQuantityRequest {
    #[serde(rename = "ref")]
    pub reference: String,
    pub qty: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct BatchAddedResponse {
    pub batchref: BatchRef,
    pub created: bool,
}

#[derive(Serialize)]
pub struct AllocatedResponse {
    pub batchref: BatchRef,
}

#[derive(Serialize)]
pub struct BatchQuantityChangedResponse {
    pub batchref: BatchRef,
    pub reallocations: usize,
}

// -- Handlers --

/// POST /add_batch: register a batch, creating the product if needed.
#[tracing::instrument(skip(state))]
pub async fn add_batch<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<AddBatchRequest>,
) -> Result<(StatusCode, Json<BatchAddedResponse>), ApiError> {
    let command = CreateBatch::new(req.reference, req.sku, req.qty, req.eta);

    match first_outcome(state.bus.dispatch(command).await?)? {
        CommandOutcome::BatchCreated { batch_ref, created } => Ok((
            StatusCode::CREATED,
            Json(BatchAddedResponse {
                batchref: batch_ref,
                created,
            }),
        )),
        other => Err(unexpected(other)),
    }
}

/// POST /allocate: allocate an order line and return the chosen batch.
#[tracing::instrument(skip(state))]
pub async fn allocate<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<AllocateRequest>,
) -> Result<(StatusCode, Json<AllocatedResponse>), ApiError> {
    let command = Allocate::new(req.orderid, req.sku, req.qty);

    match first_outcome(state.bus.dispatch(command).await?)? {
        CommandOutcome::Allocated { batch_ref } => Ok((
            StatusCode::CREATED,
            Json(AllocatedResponse {
                batchref: batch_ref,
            }),
        )),
        other => Err(unexpected(other)),
    }
}

/// POST /change_batch_quantity: change the purchased quantity of a batch.
#[tracing::instrument(skip(state))]
pub async fn change_batch_quantity<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<ChangeBatchQuantityRequest>,
) -> Result<Json<BatchQuantityChangedResponse>, ApiError> {
    let command = ChangeBatchQuantity::new(req.reference, req.qty);

    match first_outcome(state.bus.dispatch(command).await?)? {
        CommandOutcome::BatchQuantityChanged {
            batch_ref,
            reallocations,
        } => Ok(Json(BatchQuantityChangedResponse {
            batchref: batch_ref,
            reallocations,
        })),
        other => Err(unexpected(other)),
    }
}

/// GET /products/{sku}: current batches and availability of a product.
#[tracing::instrument(skip(state))]
pub async fn get_product<S: StockStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(sku): Path<String>,
) -> Result<Json<ProductView>, ApiError> {
    let sku = Sku::new(sku);
    let mut uow = state.bus.unit_of_work();

    product_view(&mut uow, &sku)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown sku {sku}")))
}

fn first_outcome(outcomes: Vec<CommandOutcome>) -> Result<CommandOutcome, ApiError> {
    outcomes
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal("command produced no outcome".to_string()))
}

fn unexpected(outcome: CommandOutcome) -> ApiError {
    ApiError::Internal(format!("unexpected command outcome: {outcome:?}"))
}
