use super::common::{
    clamp_limit, created_response, default_limit, success_response, validate_input,
};
use crate::{
    entities::{task, Requester, TaskDirection},
    errors::ServiceError,
    handlers::AppState,
    services::{put_away::PutAwayRequest, task_lifecycle::TaskBatchResult},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LotWithdrawalRequest {
    pub lot_id: i64,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub requester: Requester,
    #[validate(length(min = 1, max = 128))]
    pub order_line_ref: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CompleteTasksRequest {
    #[validate(length(min = 1, max = 500))]
    pub task_ids: Vec<i64>,
    pub direction: TaskDirection,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReadyForPickupRequest {
    #[validate(length(min = 1, max = 500))]
    pub task_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TaskFilter {
    pub requester: Option<Requester>,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks/withdrawal", post(create_withdrawal_task))
        .route("/tasks/put-away", post(create_put_away_task))
        .route("/tasks/complete", post(complete_tasks))
        .route("/tasks/ready-for-pickup", post(mark_ready_for_pickup))
        .route("/tasks/open", get(open_tasks))
        .route("/tasks/history", get(task_history))
        .route("/tasks/:id", get(get_task))
}

/// Reserve stock from one specific lot
#[utoipa::path(
    post,
    path = "/api/v1/tasks/withdrawal",
    request_body = LotWithdrawalRequest,
    responses(
        (status = 201, description = "Withdrawal task created", body = task::Model),
        (status = 404, description = "Lot not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Lot has too little free stock", body = crate::errors::ErrorResponse)
    ),
    tag = "tasks"
)]
pub async fn create_withdrawal_task(
    State(state): State<AppState>,
    Json(payload): Json<LotWithdrawalRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let created = state
        .services
        .allocation
        .allocate_from_lot(
            payload.lot_id,
            payload.quantity,
            payload.requester,
            payload.order_line_ref,
        )
        .await?;
    Ok(created_response(created))
}

/// Announce stock that is about to be stored
#[utoipa::path(
    post,
    path = "/api/v1/tasks/put-away",
    request_body = PutAwayRequest,
    responses(
        (status = 201, description = "Put-away task created", body = task::Model),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "tasks"
)]
pub async fn create_put_away_task(
    State(state): State<AppState>,
    Json(payload): Json<PutAwayRequest>,
) -> Result<Response, ServiceError> {
    let created = state.services.put_away.request_put_away(payload).await?;
    Ok(created_response(created))
}

/// Complete a batch of requested tasks, skipping the ones that cannot move
#[utoipa::path(
    post,
    path = "/api/v1/tasks/complete",
    request_body = CompleteTasksRequest,
    responses(
        (status = 200, description = "Completed and skipped task ids", body = TaskBatchResult),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "tasks"
)]
pub async fn complete_tasks(
    State(state): State<AppState>,
    Json(payload): Json<CompleteTasksRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let result = state
        .services
        .lifecycle
        .process_batch(payload.task_ids, payload.direction)
        .await;
    Ok(success_response(result))
}

/// Mark picked sales withdrawals as awaiting collection
#[utoipa::path(
    post,
    path = "/api/v1/tasks/ready-for-pickup",
    request_body = ReadyForPickupRequest,
    responses(
        (status = 200, description = "Marked and skipped task ids", body = TaskBatchResult)
    ),
    tag = "tasks"
)]
pub async fn mark_ready_for_pickup(
    State(state): State<AppState>,
    Json(payload): Json<ReadyForPickupRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let result = state
        .services
        .lifecycle
        .mark_ready_for_pickup(payload.task_ids)
        .await;
    Ok(success_response(result))
}

/// Tasks still waiting to be carried out
#[utoipa::path(
    get,
    path = "/api/v1/tasks/open",
    params(TaskFilter),
    responses((status = 200, description = "Requested tasks", body = Vec<task::Model>)),
    tag = "tasks"
)]
pub async fn open_tasks(
    State(state): State<AppState>,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<Vec<task::Model>>, ServiceError> {
    let tasks = state.services.lifecycle.open_tasks(filter.requester).await?;
    Ok(Json(tasks))
}

/// Completed and picked tasks, newest first
#[utoipa::path(
    get,
    path = "/api/v1/tasks/history",
    params(TaskFilter),
    responses((status = 200, description = "Finished tasks", body = Vec<task::Model>)),
    tag = "tasks"
)]
pub async fn task_history(
    State(state): State<AppState>,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<Vec<task::Model>>, ServiceError> {
    let tasks = state
        .services
        .lifecycle
        .task_history(filter.requester, clamp_limit(filter.limit))
        .await?;
    Ok(Json(tasks))
}

#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task", body = task::Model),
        (status = 404, description = "Task not found", body = crate::errors::ErrorResponse)
    ),
    tag = "tasks"
)]
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<task::Model>, ServiceError> {
    Ok(Json(state.services.lifecycle.get_task(id).await?))
}
