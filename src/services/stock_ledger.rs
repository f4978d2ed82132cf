//! Storage primitives over `stock_lots`. No policy lives here: callers decide
//! when a lot may change and hold the material lock while doing so.

use crate::entities::{material, minimum_stock, stock_lot};
use crate::errors::ServiceError;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    Set,
};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Oldest intake first. Lots without an intake reference (returns, production
/// deliveries) come after all received lots, by creation order.
pub fn fifo_cmp(a: &stock_lot::Model, b: &stock_lot::Model) -> Ordering {
    fifo_key(a.intake_id, a.id).cmp(&fifo_key(b.intake_id, b.id))
}

pub fn fifo_key(intake_id: Option<i64>, lot_id: i64) -> (bool, i64, i64) {
    (intake_id.is_none(), intake_id.unwrap_or(0), lot_id)
}

/// Lots of a material, FIFO ordered, optionally restricted to one warehouse.
pub async fn lots_for_material<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
    warehouse_id: Option<i64>,
) -> Result<Vec<stock_lot::Model>, ServiceError> {
    let mut query = stock_lot::Entity::find().filter(stock_lot::Column::MaterialId.eq(material_id));
    if let Some(warehouse_id) = warehouse_id {
        query = query.filter(stock_lot::Column::WarehouseId.eq(warehouse_id));
    }
    let mut lots = query.all(db).await?;
    lots.sort_by(fifo_cmp);
    Ok(lots)
}

pub async fn get_lot<C: ConnectionTrait>(
    db: &C,
    lot_id: i64,
) -> Result<stock_lot::Model, ServiceError> {
    stock_lot::Entity::find_by_id(lot_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Stock lot", lot_id))
}

#[derive(Debug, Clone)]
pub struct NewLot {
    pub warehouse_id: i64,
    pub material_id: i64,
    pub quality_id: Option<i64>,
    pub intake_id: Option<i64>,
    pub quantity: i32,
}

pub async fn create_lot<C: ConnectionTrait>(
    db: &C,
    lot: NewLot,
) -> Result<stock_lot::Model, ServiceError> {
    if lot.quantity < 0 {
        return Err(ServiceError::ValidationError(
            "lot quantity must not be negative".to_string(),
        ));
    }
    let now = Utc::now();
    let created = stock_lot::ActiveModel {
        warehouse_id: Set(lot.warehouse_id),
        material_id: Set(lot.material_id),
        quality_id: Set(lot.quality_id),
        intake_id: Set(lot.intake_id),
        quantity: Set(lot.quantity),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    debug!(lot_id = created.id, material_id = created.material_id, "stock lot created");
    Ok(created)
}

/// Lot holding this material and quality in a warehouse, preferring the oldest.
pub async fn find_lot_by_quality<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
    warehouse_id: i64,
    quality_id: Option<i64>,
) -> Result<Option<stock_lot::Model>, ServiceError> {
    let quality_filter = match quality_id {
        Some(id) => stock_lot::Column::QualityId.eq(id),
        None => stock_lot::Column::QualityId.is_null(),
    };
    let mut lots = stock_lot::Entity::find()
        .filter(stock_lot::Column::MaterialId.eq(material_id))
        .filter(stock_lot::Column::WarehouseId.eq(warehouse_id))
        .filter(quality_filter)
        .all(db)
        .await?;
    lots.sort_by(fifo_cmp);
    Ok(lots.into_iter().next())
}

/// Removes `quantity` from a lot only if it still holds at least that much.
/// A lost race shows up as `ConcurrencyConflict` instead of a negative lot.
pub async fn decrement_checked<C: ConnectionTrait>(
    db: &C,
    lot_id: i64,
    quantity: i32,
) -> Result<(), ServiceError> {
    let res = stock_lot::Entity::update_many()
        .col_expr(
            stock_lot::Column::Quantity,
            Expr::col(stock_lot::Column::Quantity).sub(quantity),
        )
        .col_expr(stock_lot::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(stock_lot::Column::Id.eq(lot_id))
        .filter(stock_lot::Column::Quantity.gte(quantity))
        .exec(db)
        .await?;

    if res.rows_affected != 1 {
        return Err(ServiceError::ConcurrencyConflict(format!(
            "stock lot {} changed while withdrawing {}",
            lot_id, quantity
        )));
    }
    Ok(())
}

pub async fn increment<C: ConnectionTrait>(
    db: &C,
    lot_id: i64,
    quantity: i32,
) -> Result<(), ServiceError> {
    let res = stock_lot::Entity::update_many()
        .col_expr(
            stock_lot::Column::Quantity,
            Expr::col(stock_lot::Column::Quantity).add(quantity),
        )
        .col_expr(stock_lot::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(stock_lot::Column::Id.eq(lot_id))
        .exec(db)
        .await?;

    if res.rows_affected != 1 {
        return Err(ServiceError::not_found("Stock lot", lot_id));
    }
    Ok(())
}

/// Physical quantity of a material across all lots.
pub async fn total_quantity<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
) -> Result<i64, ServiceError> {
    let lots = lots_for_material(db, material_id, None).await?;
    Ok(lots.iter().map(|l| i64::from(l.quantity)).sum())
}

/// Deletes a material together with its lots and minimum-stock setting.
pub async fn purge_material<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
) -> Result<u64, ServiceError> {
    let lots = stock_lot::Entity::delete_many()
        .filter(stock_lot::Column::MaterialId.eq(material_id))
        .exec(db)
        .await?;
    minimum_stock::Entity::delete_by_id(material_id)
        .exec(db)
        .await?;
    let materials = material::Entity::delete_by_id(material_id).exec(db).await?;
    if materials.rows_affected == 0 {
        return Err(ServiceError::not_found("Material", material_id));
    }
    info!(
        material_id,
        lots_removed = lots.rows_affected,
        "material purged"
    );
    Ok(lots.rows_affected)
}
