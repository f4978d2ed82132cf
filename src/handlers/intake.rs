use super::common::{created_response, success_response, validate_input, IdsRequest};
use crate::{
    entities::{
        complaint::{self, ComplaintStatus},
        inbound_delivery::{self, DeliveryStatus},
    },
    errors::ServiceError,
    handlers::AppState,
    services::{
        intake::{DeliveryReceipt, IntakeResult},
        BatchOutcome,
    },
};
use axum::{
    extract::{Json, Query, State},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeliveryFilter {
    pub status: Option<DeliveryStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ComplaintFilter {
    pub status: Option<ComplaintStatus>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/deliveries", post(receive_delivery).get(list_deliveries))
        .route("/deliveries/lock", post(lock_deliveries))
        .route("/deliveries/release", post(release_deliveries))
        .route("/deliveries/put-away", post(put_away_deliveries))
        .route("/complaints", get(list_complaints))
}

/// Book a delivery line, split into accepted, quarantined and disputed parts
#[utoipa::path(
    post,
    path = "/api/v1/deliveries",
    request_body = DeliveryReceipt,
    responses(
        (status = 201, description = "Delivery recorded", body = IntakeResult),
        (status = 400, description = "Invalid delivery", body = crate::errors::ErrorResponse),
        (status = 404, description = "Material or order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "intake"
)]
pub async fn receive_delivery(
    State(state): State<AppState>,
    Json(payload): Json<DeliveryReceipt>,
) -> Result<Response, ServiceError> {
    let result = state.services.intake.receive_delivery(payload).await?;
    Ok(created_response(result))
}

#[utoipa::path(
    post,
    path = "/api/v1/deliveries/lock",
    request_body = IdsRequest,
    responses((status = 200, description = "Quarantined and skipped delivery ids", body = BatchOutcome)),
    tag = "intake"
)]
pub async fn lock_deliveries(
    State(state): State<AppState>,
    Json(payload): Json<IdsRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    Ok(success_response(
        state.services.intake.lock_deliveries(payload.ids).await,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/deliveries/release",
    request_body = IdsRequest,
    responses((status = 200, description = "Released and skipped delivery ids", body = BatchOutcome)),
    tag = "intake"
)]
pub async fn release_deliveries(
    State(state): State<AppState>,
    Json(payload): Json<IdsRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    Ok(success_response(
        state.services.intake.release_deliveries(payload.ids).await,
    ))
}

/// Store arrived deliveries, one lot each
#[utoipa::path(
    post,
    path = "/api/v1/deliveries/put-away",
    request_body = IdsRequest,
    responses((status = 200, description = "Stored and skipped delivery ids", body = BatchOutcome)),
    tag = "intake"
)]
pub async fn put_away_deliveries(
    State(state): State<AppState>,
    Json(payload): Json<IdsRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    Ok(success_response(
        state.services.intake.put_away_deliveries(payload.ids).await,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries",
    params(DeliveryFilter),
    responses((status = 200, description = "Inbound deliveries", body = Vec<inbound_delivery::Model>)),
    tag = "intake"
)]
pub async fn list_deliveries(
    State(state): State<AppState>,
    Query(filter): Query<DeliveryFilter>,
) -> Result<Json<Vec<inbound_delivery::Model>>, ServiceError> {
    Ok(Json(
        state.services.intake.list_deliveries(filter.status).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/complaints",
    params(ComplaintFilter),
    responses((status = 200, description = "Complaints", body = Vec<complaint::Model>)),
    tag = "intake"
)]
pub async fn list_complaints(
    State(state): State<AppState>,
    Query(filter): Query<ComplaintFilter>,
) -> Result<Json<Vec<complaint::Model>>, ServiceError> {
    Ok(Json(
        state.services.intake.list_complaints(filter.status).await?,
    ))
}
