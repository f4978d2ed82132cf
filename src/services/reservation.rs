//! Reservation accounting: how much of each lot is still free once the
//! outstanding withdrawal tasks against it are taken into account.

use crate::entities::{stock_lot, task, TaskDirection, TaskStatus};
use crate::errors::ServiceError;
use crate::services::stock_ledger;
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LotAvailability {
    pub lot_id: i64,
    pub warehouse_id: i64,
    pub material_id: i64,
    pub quality_id: Option<i64>,
    pub intake_id: Option<i64>,
    /// Physically on hand.
    pub quantity: i32,
    /// Promised to requested withdrawal tasks.
    pub reserved: i32,
    /// `quantity - reserved`, never below zero.
    pub free: i32,
}

impl LotAvailability {
    pub fn new(lot: &stock_lot::Model, reserved: i32) -> Self {
        Self {
            lot_id: lot.id,
            warehouse_id: lot.warehouse_id,
            material_id: lot.material_id,
            quality_id: lot.quality_id,
            intake_id: lot.intake_id,
            quantity: lot.quantity,
            reserved,
            free: (lot.quantity - reserved).max(0),
        }
    }
}

/// Sum of requested withdrawal quantities per lot.
pub async fn reserved_by_lot<C: ConnectionTrait>(
    db: &C,
    lot_ids: &[i64],
) -> Result<HashMap<i64, i32>, ServiceError> {
    if lot_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let pending = task::Entity::find()
        .filter(task::Column::StockLotId.is_in(lot_ids.iter().copied()))
        .filter(task::Column::Status.eq(TaskStatus::Requested))
        .filter(task::Column::Direction.eq(TaskDirection::Withdrawal))
        .all(db)
        .await?;

    let mut reserved: HashMap<i64, i32> = HashMap::new();
    for t in pending {
        if let Some(lot_id) = t.stock_lot_id {
            *reserved.entry(lot_id).or_insert(0) += t.quantity;
        }
    }
    Ok(reserved)
}

/// Free quantity of every lot of a material, FIFO ordered. A material without
/// lots yields an empty list.
pub async fn free_lots<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
    warehouse_id: Option<i64>,
) -> Result<Vec<LotAvailability>, ServiceError> {
    let lots = stock_ledger::lots_for_material(db, material_id, warehouse_id).await?;
    let ids: Vec<i64> = lots.iter().map(|l| l.id).collect();
    let reserved = reserved_by_lot(db, &ids).await?;

    Ok(lots
        .iter()
        .map(|lot| LotAvailability::new(lot, reserved.get(&lot.id).copied().unwrap_or(0)))
        .collect())
}

pub async fn free_for_lot<C: ConnectionTrait>(
    db: &C,
    lot: &stock_lot::Model,
) -> Result<LotAvailability, ServiceError> {
    let reserved = reserved_by_lot(db, &[lot.id]).await?;
    Ok(LotAvailability::new(
        lot,
        reserved.get(&lot.id).copied().unwrap_or(0),
    ))
}

/// Read-only view over lot availability.
#[derive(Clone)]
pub struct ReservationAccountant {
    db: Arc<DatabaseConnection>,
}

impl ReservationAccountant {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn free_quantities(
        &self,
        material_id: i64,
        warehouse_id: Option<i64>,
    ) -> Result<Vec<LotAvailability>, ServiceError> {
        free_lots(&*self.db, material_id, warehouse_id).await
    }

    pub async fn total_free(
        &self,
        material_id: i64,
        warehouse_id: Option<i64>,
    ) -> Result<i64, ServiceError> {
        let lots = self.free_quantities(material_id, warehouse_id).await?;
        Ok(lots.iter().map(|l| i64::from(l.free)).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn free_quantity_is_clamped_at_zero() {
        let now = Utc::now();
        let lot = stock_lot::Model {
            id: 1,
            warehouse_id: 1,
            material_id: 1,
            quality_id: None,
            intake_id: Some(1),
            quantity: 3,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(LotAvailability::new(&lot, 1).free, 2);
        // drained externally below what was promised
        assert_eq!(LotAvailability::new(&lot, 5).free, 0);
    }
}
