use crate::entities::{material, minimum_stock};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::{catalog, stock_ledger};
use chrono::Utc;
use sea_orm::{
    sea_query::OnConflict, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

/// A material whose physical stock dropped under its configured minimum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockShortage {
    pub material_id: i64,
    pub on_hand: i64,
    pub minimum_quantity: i32,
}

/// Compares on-hand stock against a material's minimum.
pub async fn shortage_for<C: ConnectionTrait>(
    db: &C,
    material_id: i64,
) -> Result<Option<StockShortage>, ServiceError> {
    let Some(setting) = minimum_stock::Entity::find_by_id(material_id).one(db).await? else {
        return Ok(None);
    };
    let on_hand = stock_ledger::total_quantity(db, material_id).await?;
    if on_hand < i64::from(setting.minimum_quantity) {
        Ok(Some(StockShortage {
            material_id,
            on_hand,
            minimum_quantity: setting.minimum_quantity,
        }))
    } else {
        Ok(None)
    }
}

#[derive(Clone)]
pub struct MinimumStockService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl MinimumStockService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn set_minimum(
        &self,
        material_id: i64,
        minimum_quantity: i32,
    ) -> Result<minimum_stock::Model, ServiceError> {
        if minimum_quantity < 0 {
            return Err(ServiceError::ValidationError(
                "minimum quantity must not be negative".to_string(),
            ));
        }
        let db = &*self.db;
        catalog::get_material(db, material_id).await?;

        let row = minimum_stock::ActiveModel {
            material_id: Set(material_id),
            minimum_quantity: Set(minimum_quantity),
            updated_at: Set(Utc::now()),
        };
        minimum_stock::Entity::insert(row)
            .on_conflict(
                OnConflict::column(minimum_stock::Column::MaterialId)
                    .update_columns([
                        minimum_stock::Column::MinimumQuantity,
                        minimum_stock::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(db)
            .await?;

        info!(material_id, minimum_quantity, "minimum stock set");
        minimum_stock::Entity::find_by_id(material_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Minimum stock", material_id))
    }

    pub async fn get_minimum(&self, material_id: i64) -> Result<minimum_stock::Model, ServiceError> {
        minimum_stock::Entity::find_by_id(material_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Minimum stock", material_id))
    }

    /// Every material currently under its minimum, optionally within one warehouse.
    #[instrument(skip(self))]
    pub async fn below_minimum(
        &self,
        warehouse_id: Option<i64>,
    ) -> Result<Vec<StockShortage>, ServiceError> {
        let db = &*self.db;
        let settings = minimum_stock::Entity::find().all(db).await?;
        let material_ids: Vec<i64> = settings.iter().map(|s| s.material_id).collect();

        let mut materials = material::Entity::find().filter(material::Column::Id.is_in(material_ids));
        if let Some(warehouse_id) = warehouse_id {
            materials = materials.filter(material::Column::WarehouseId.eq(warehouse_id));
        }
        let in_scope: HashMap<i64, material::Model> = materials
            .all(db)
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let mut shortages = Vec::new();
        for setting in settings {
            if !in_scope.contains_key(&setting.material_id) {
                continue;
            }
            let on_hand = stock_ledger::total_quantity(db, setting.material_id).await?;
            if on_hand < i64::from(setting.minimum_quantity) {
                shortages.push(StockShortage {
                    material_id: setting.material_id,
                    on_hand,
                    minimum_quantity: setting.minimum_quantity,
                });
            }
        }
        Ok(shortages)
    }

    /// Emits `LowStock` when the material fell under its minimum.
    pub async fn check_material(&self, material_id: i64) -> Result<Option<StockShortage>, ServiceError> {
        let shortage = shortage_for(&*self.db, material_id).await?;
        if let Some(s) = &shortage {
            warn!(
                material_id,
                on_hand = s.on_hand,
                minimum = s.minimum_quantity,
                "material below minimum stock"
            );
            self.event_sender
                .send_or_log(Event::LowStock {
                    material_id,
                    on_hand: s.on_hand,
                    minimum: s.minimum_quantity,
                })
                .await;
        }
        Ok(shortage)
    }
}
