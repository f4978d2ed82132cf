use super::common::{clamp_limit, default_limit};
use crate::{
    entities::notification_outbox::{self, OutboxStatus},
    errors::ServiceError,
    handlers::AppState,
    notifications::outbox,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OutboxFilter {
    pub status: Option<OutboxStatus>,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_outbox))
        .route("/:id/retry", post(retry_outbox))
}

#[utoipa::path(
    get,
    path = "/api/v1/outbox",
    params(OutboxFilter),
    responses(
        (status = 200, description = "Stored outbound notifications, newest first", body = Vec<notification_outbox::Model>)
    ),
    tag = "Admin"
)]
pub async fn list_outbox(
    State(state): State<AppState>,
    Query(filter): Query<OutboxFilter>,
) -> Result<Json<Vec<notification_outbox::Model>>, ServiceError> {
    let rows = outbox::list(&state.db, filter.status, clamp_limit(filter.limit)).await?;
    Ok(Json(rows))
}

#[utoipa::path(
    post,
    path = "/api/v1/outbox/{id}/retry",
    params(
        ("id" = Uuid, Path, description = "Outbox message id")
    ),
    responses(
        (status = 200, description = "Message scheduled for retry", body = notification_outbox::Model),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Message has not failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn retry_outbox(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<notification_outbox::Model>, ServiceError> {
    Ok(Json(outbox::requeue(&state.db, id).await?))
}
