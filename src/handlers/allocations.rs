use super::common::{created_response, success_response, validate_input};
use crate::{
    entities::task,
    errors::ServiceError,
    handlers::AppState,
    services::allocation::{AllocationResult, WithdrawalRequest},
};
use axum::{
    extract::{Json, State},
    response::Response,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct BatchAllocationRequest {
    #[validate(length(min = 1, max = 200))]
    pub requests: Vec<WithdrawalRequest>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/allocations", post(allocate))
        .route("/allocations/batch", post(allocate_batch))
}

/// Reserve stock for one material, all or nothing
#[utoipa::path(
    post,
    path = "/api/v1/allocations",
    request_body = WithdrawalRequest,
    responses(
        (status = 201, description = "Withdrawal tasks created, one per consumed lot", body = Vec<task::Model>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough free stock", body = crate::errors::ErrorResponse)
    ),
    tag = "allocations"
)]
pub async fn allocate(
    State(state): State<AppState>,
    Json(payload): Json<WithdrawalRequest>,
) -> Result<Response, ServiceError> {
    let tasks = state.services.allocation.allocate(payload).await?;
    Ok(created_response(tasks))
}

/// Reserve stock for several materials; each material succeeds or fails on its own
#[utoipa::path(
    post,
    path = "/api/v1/allocations/batch",
    request_body = BatchAllocationRequest,
    responses(
        (status = 200, description = "Per-material allocation results", body = Vec<AllocationResult>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "allocations"
)]
pub async fn allocate_batch(
    State(state): State<AppState>,
    Json(payload): Json<BatchAllocationRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let results = state
        .services
        .allocation
        .allocate_batch(payload.requests)
        .await;
    Ok(success_response(results))
}
