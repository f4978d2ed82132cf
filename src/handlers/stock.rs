use super::common::{created_response, validate_input};
use crate::{
    entities::task,
    errors::ServiceError,
    handlers::AppState,
    services::{
        put_away::{FinishedGoodsDelivery, RawMaterialReturn},
        reservation::LotAvailability,
        stock_queries::{
            FinishedGoodsAvailability, MaterialStock, RawMaterialAvailability, RawMaterialQuery,
        },
    },
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

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LotFilter {
    pub warehouse_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct FinishedGoodsQuery {
    #[validate(length(min = 1, max = 500))]
    pub material_ids: Vec<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/materials/:id/lots", get(material_lots))
        .route("/materials/:id/stock", get(material_stock))
        .route("/raw-materials/availability", post(raw_material_availability))
        .route("/finished-goods/availability", post(finished_goods_availability))
        .route("/returns", post(return_raw_material))
        .route("/finished-goods/deliveries", post(deliver_finished_goods))
}

/// Lots of a material in FIFO order with their free quantity
#[utoipa::path(
    get,
    path = "/api/v1/materials/{id}/lots",
    params(("id" = i64, Path, description = "Material id"), LotFilter),
    responses(
        (status = 200, description = "Lots with reserved and free quantity", body = Vec<LotAvailability>),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn material_lots(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(filter): Query<LotFilter>,
) -> Result<Json<Vec<LotAvailability>>, ServiceError> {
    let lots = state
        .services
        .stock
        .lots_with_availability(id, filter.warehouse_id)
        .await?;
    Ok(Json(lots))
}

#[utoipa::path(
    get,
    path = "/api/v1/materials/{id}/stock",
    params(("id" = i64, Path, description = "Material id")),
    responses(
        (status = 200, description = "On-hand and free totals", body = MaterialStock),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn material_stock(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MaterialStock>, ServiceError> {
    Ok(Json(state.services.stock.total_stock(id).await?))
}

/// Raw supplies by category, color, type and size
#[utoipa::path(
    post,
    path = "/api/v1/raw-materials/availability",
    request_body = Vec<RawMaterialQuery>,
    responses(
        (status = 200, description = "One entry per query, in request order", body = Vec<RawMaterialAvailability>),
        (status = 400, description = "Invalid query", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn raw_material_availability(
    State(state): State<AppState>,
    Json(queries): Json<Vec<RawMaterialQuery>>,
) -> Result<Json<Vec<RawMaterialAvailability>>, ServiceError> {
    let results = state
        .services
        .stock
        .raw_material_availability(queries)
        .await?;
    Ok(Json(results))
}

/// Finished goods per material, grouped by color and size
#[utoipa::path(
    post,
    path = "/api/v1/finished-goods/availability",
    request_body = FinishedGoodsQuery,
    responses(
        (status = 200, description = "Stock per requested material", body = Vec<FinishedGoodsAvailability>)
    ),
    tag = "stock"
)]
pub async fn finished_goods_availability(
    State(state): State<AppState>,
    Json(payload): Json<FinishedGoodsQuery>,
) -> Result<Json<Vec<FinishedGoodsAvailability>>, ServiceError> {
    validate_input(&payload)?;
    let results = state
        .services
        .stock
        .finished_goods_availability(payload.material_ids)
        .await?;
    Ok(Json(results))
}

/// Production returns unused raw supplies
#[utoipa::path(
    post,
    path = "/api/v1/returns",
    request_body = RawMaterialReturn,
    responses(
        (status = 201, description = "Put-away task created", body = task::Model),
        (status = 400, description = "Not a raw material", body = crate::errors::ErrorResponse),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn return_raw_material(
    State(state): State<AppState>,
    Json(payload): Json<RawMaterialReturn>,
) -> Result<Response, ServiceError> {
    let created = state.services.put_away.return_raw_material(payload).await?;
    Ok(created_response(created))
}

/// Production delivers printed goods
#[utoipa::path(
    post,
    path = "/api/v1/finished-goods/deliveries",
    request_body = FinishedGoodsDelivery,
    responses(
        (status = 201, description = "Put-away task created", body = task::Model),
        (status = 400, description = "Invalid delivery", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn deliver_finished_goods(
    State(state): State<AppState>,
    Json(payload): Json<FinishedGoodsDelivery>,
) -> Result<Response, ServiceError> {
    let created = state.services.put_away.deliver_finished_goods(payload).await?;
    Ok(created_response(created))
}
