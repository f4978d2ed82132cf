use super::common::{created_response, success_response, validate_input, IdsRequest};
use crate::{
    entities::{
        material_order::{self, MaterialOrderStatus},
        minimum_stock,
    },
    errors::ServiceError,
    handlers::AppState,
    services::{
        material_orders::NewMaterialOrder, minimum_stock::StockShortage, BatchOutcome,
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    response::Response,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderFilter {
    pub status: Option<MaterialOrderStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WarehouseFilter {
    pub warehouse_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SetMinimumStockRequest {
    #[validate(range(min = 0))]
    pub minimum_quantity: i32,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/material-orders",
            post(create_material_order).get(list_material_orders),
        )
        .route("/material-orders/submit", post(submit_material_orders))
        .route("/minimum-stocks/below", get(below_minimum))
        .route("/minimum-stocks/:material_id", put(set_minimum_stock))
}

#[utoipa::path(
    post,
    path = "/api/v1/material-orders",
    request_body = NewMaterialOrder,
    responses(
        (status = 201, description = "Order created in status open", body = material_order::Model),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "procurement"
)]
pub async fn create_material_order(
    State(state): State<AppState>,
    Json(payload): Json<NewMaterialOrder>,
) -> Result<Response, ServiceError> {
    let created = state.services.material_orders.create(payload).await?;
    Ok(created_response(created))
}

/// Send open orders to their suppliers
#[utoipa::path(
    post,
    path = "/api/v1/material-orders/submit",
    request_body = IdsRequest,
    responses((status = 200, description = "Submitted and skipped order ids", body = BatchOutcome)),
    tag = "procurement"
)]
pub async fn submit_material_orders(
    State(state): State<AppState>,
    Json(payload): Json<IdsRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    Ok(success_response(
        state.services.material_orders.submit(payload.ids).await,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/material-orders",
    params(OrderFilter),
    responses((status = 200, description = "Material orders", body = Vec<material_order::Model>)),
    tag = "procurement"
)]
pub async fn list_material_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<material_order::Model>>, ServiceError> {
    Ok(Json(
        state.services.material_orders.list(filter.status).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/minimum-stocks/{material_id}",
    params(("material_id" = i64, Path, description = "Material id")),
    request_body = SetMinimumStockRequest,
    responses(
        (status = 200, description = "Minimum stored", body = minimum_stock::Model),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "procurement"
)]
pub async fn set_minimum_stock(
    State(state): State<AppState>,
    Path(material_id): Path<i64>,
    Json(payload): Json<SetMinimumStockRequest>,
) -> Result<Json<minimum_stock::Model>, ServiceError> {
    validate_input(&payload)?;
    let stored = state
        .services
        .minimum_stock
        .set_minimum(material_id, payload.minimum_quantity)
        .await?;
    Ok(Json(stored))
}

/// Materials whose stock is under their configured minimum
#[utoipa::path(
    get,
    path = "/api/v1/minimum-stocks/below",
    params(WarehouseFilter),
    responses((status = 200, description = "Shortages", body = Vec<StockShortage>)),
    tag = "procurement"
)]
pub async fn below_minimum(
    State(state): State<AppState>,
    Query(filter): Query<WarehouseFilter>,
) -> Result<Json<Vec<StockShortage>>, ServiceError> {
    Ok(Json(
        state
            .services
            .minimum_stock
            .below_minimum(filter.warehouse_id)
            .await?,
    ))
}
