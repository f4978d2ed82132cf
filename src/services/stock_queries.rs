//! Read-only stock views for Production and Sales-and-Shipping.

use crate::entities::{material, MaterialCategory, WarehouseKind};
use crate::errors::ServiceError;
use crate::services::reservation::{LotAvailability, ReservationAccountant};
use crate::services::{catalog, stock_ledger};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaterialStock {
    pub material_id: i64,
    pub on_hand: i64,
    pub free: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RawMaterialQuery {
    pub category: MaterialCategory,
    #[validate(length(min = 1, max = 64))]
    pub color: String,
    #[validate(length(min = 1, max = 64))]
    pub material_type: String,
    #[validate(length(min = 1, max = 16))]
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RawMaterialAvailability {
    /// `None` when no such material is stocked.
    pub material_id: Option<i64>,
    pub on_hand: i64,
    pub free: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VariantStock {
    pub color: String,
    pub size: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FinishedGoodsAvailability {
    pub material_id: i64,
    pub available: Vec<VariantStock>,
}

const UNKNOWN: &str = "unknown";

#[derive(Clone)]
pub struct StockQueryService {
    db: Arc<DatabaseConnection>,
    reservations: ReservationAccountant,
}

impl StockQueryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            reservations: ReservationAccountant::new(db.clone()),
            db,
        }
    }

    pub async fn lots_with_availability(
        &self,
        material_id: i64,
        warehouse_id: Option<i64>,
    ) -> Result<Vec<LotAvailability>, ServiceError> {
        catalog::get_material(&*self.db, material_id).await?;
        self.reservations
            .free_quantities(material_id, warehouse_id)
            .await
    }

    pub async fn total_stock(&self, material_id: i64) -> Result<MaterialStock, ServiceError> {
        let lots = self.lots_with_availability(material_id, None).await?;
        Ok(MaterialStock {
            material_id,
            on_hand: lots.iter().map(|l| i64::from(l.quantity)).sum(),
            free: lots.iter().map(|l| i64::from(l.free)).sum(),
        })
    }

    /// Stock of raw materials described by category, color, type and size.
    /// Unknown combinations report zero instead of failing the request.
    #[instrument(skip(self, queries), fields(queries = queries.len()))]
    pub async fn raw_material_availability(
        &self,
        queries: Vec<RawMaterialQuery>,
    ) -> Result<Vec<RawMaterialAvailability>, ServiceError> {
        for q in &queries {
            q.validate()?;
        }
        let db = &*self.db;
        let raw = catalog::warehouse_by_kind(db, WarehouseKind::RawMaterial).await?;

        let mut results = Vec::with_capacity(queries.len());
        for q in queries {
            let found = material::Entity::find()
                .filter(material::Column::WarehouseId.eq(raw.id))
                .filter(material::Column::Category.eq(q.category))
                .filter(material::Column::Color.eq(q.color))
                .filter(material::Column::MaterialType.eq(q.material_type))
                .filter(material::Column::Size.eq(q.size))
                .order_by_asc(material::Column::Id)
                .one(db)
                .await?;

            let Some(found) = found else {
                results.push(RawMaterialAvailability {
                    material_id: None,
                    on_hand: 0,
                    free: 0,
                });
                continue;
            };
            let lots = self.reservations.free_quantities(found.id, Some(raw.id)).await?;
            results.push(RawMaterialAvailability {
                material_id: Some(found.id),
                on_hand: lots.iter().map(|l| i64::from(l.quantity)).sum(),
                free: lots.iter().map(|l| i64::from(l.free)).sum(),
            });
        }
        Ok(results)
    }

    /// Finished-goods stock per requested material, grouped by color and size.
    /// Results follow the order of `material_ids`; missing ids get an empty list.
    #[instrument(skip(self, material_ids), fields(materials = material_ids.len()))]
    pub async fn finished_goods_availability(
        &self,
        material_ids: Vec<i64>,
    ) -> Result<Vec<FinishedGoodsAvailability>, ServiceError> {
        let db = &*self.db;
        let finished = catalog::warehouse_by_kind(db, WarehouseKind::FinishedGoods).await?;

        let materials: BTreeMap<i64, material::Model> = material::Entity::find()
            .filter(material::Column::Id.is_in(material_ids.iter().copied()))
            .all(db)
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let mut results = Vec::with_capacity(material_ids.len());
        for material_id in material_ids {
            let mut variants: BTreeMap<(String, String), i64> = BTreeMap::new();
            if let Some(m) = materials.get(&material_id) {
                let lots =
                    stock_ledger::lots_for_material(db, material_id, Some(finished.id)).await?;
                let key = (
                    m.color.clone().unwrap_or_else(|| UNKNOWN.to_string()),
                    m.size.clone().unwrap_or_else(|| UNKNOWN.to_string()),
                );
                for lot in lots {
                    *variants.entry(key.clone()).or_insert(0) += i64::from(lot.quantity);
                }
            }
            results.push(FinishedGoodsAvailability {
                material_id,
                available: variants
                    .into_iter()
                    .map(|((color, size), quantity)| VariantStock {
                        color,
                        size,
                        quantity,
                    })
                    .collect(),
            });
        }
        Ok(results)
    }
}
