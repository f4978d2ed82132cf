//! Put-away requests: stock coming back into a warehouse from outside the
//! intake pipeline, either returned raw supplies or finished goods delivered
//! by Production. Each request becomes one requested put-away task; the stock
//! only moves when the lifecycle manager completes it.

use crate::entities::material::MaterialIdentity;
use crate::entities::quality::QualityAttributes;
use crate::entities::{
    task, MaterialCategory, Requester, TaskDirection, TaskStatus, WarehouseKind,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::locks::MaterialLocks;
use crate::services::catalog;
use crate::services::stock_ledger::{self, NewLot};
use sea_orm::{ActiveModelTrait, DatabaseConnection, DatabaseTransaction, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PutAwayRequest {
    pub material_id: i64,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub requester: Requester,
    #[validate(length(min = 1, max = 128))]
    pub order_line_ref: Option<String>,
    #[serde(default)]
    pub quality: Option<QualityAttributes>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RawMaterialReturn {
    pub material_id: i64,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[serde(default)]
    pub quality: Option<QualityAttributes>,
}

/// Finished goods handed back by Production. The material is either named by
/// id or described by its attributes; an unseen description becomes a custom
/// (non-standard) material.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct FinishedGoodsDelivery {
    pub material_id: Option<i64>,
    #[serde(default = "default_finished_category")]
    pub category: MaterialCategory,
    pub material_type: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    #[validate(url)]
    pub artwork_url: Option<String>,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 128))]
    pub order_line_ref: Option<String>,
}

fn default_finished_category() -> MaterialCategory {
    MaterialCategory::TShirt
}

#[derive(Clone)]
pub struct PutAwayService {
    db: Arc<DatabaseConnection>,
    locks: MaterialLocks,
    event_sender: EventSender,
}

impl PutAwayService {
    pub fn new(db: Arc<DatabaseConnection>, locks: MaterialLocks, event_sender: EventSender) -> Self {
        Self {
            db,
            locks,
            event_sender,
        }
    }

    #[instrument(skip(self, request), fields(material_id = request.material_id, quantity = request.quantity))]
    pub async fn request_put_away(&self, request: PutAwayRequest) -> Result<task::Model, ServiceError> {
        request.validate()?;

        catalog::get_material(&*self.db, request.material_id).await?;
        let _guard = self.locks.acquire(request.material_id).await;
        let req = request.clone();
        let created = self
            .db
            .transaction::<_, task::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let material = catalog::get_material(txn, req.material_id).await?;
                    insert_put_away(
                        txn,
                        material.id,
                        material.warehouse_id,
                        req.quality.as_ref(),
                        req.quantity,
                        req.requester,
                        req.order_line_ref,
                    )
                    .await
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.announce(&created).await;
        Ok(created)
    }

    /// Production sends unused raw supplies back to the raw-material warehouse.
    #[instrument(skip(self, request), fields(material_id = request.material_id))]
    pub async fn return_raw_material(&self, request: RawMaterialReturn) -> Result<task::Model, ServiceError> {
        request.validate()?;

        let material = catalog::get_material(&*self.db, request.material_id).await?;
        let raw = catalog::warehouse_by_kind(&*self.db, WarehouseKind::RawMaterial).await?;
        if material.warehouse_id != raw.id {
            return Err(ServiceError::ValidationError(format!(
                "material {} is not stored in the raw-material warehouse",
                material.id
            )));
        }

        self.request_put_away(PutAwayRequest {
            material_id: material.id,
            quantity: request.quantity,
            requester: Requester::Production,
            order_line_ref: None,
            quality: request.quality,
        })
        .await
    }

    /// Production delivers printed goods into the finished-goods warehouse.
    #[instrument(skip(self, delivery), fields(order_line_ref = ?delivery.order_line_ref))]
    pub async fn deliver_finished_goods(
        &self,
        delivery: FinishedGoodsDelivery,
    ) -> Result<task::Model, ServiceError> {
        delivery.validate()?;

        let db = &*self.db;
        let finished = catalog::warehouse_by_kind(db, WarehouseKind::FinishedGoods).await?;
        let material = match delivery.material_id {
            Some(id) => catalog::get_material(db, id).await?,
            None => {
                let identity = MaterialIdentity {
                    warehouse_id: finished.id,
                    category: delivery.category,
                    material_type: delivery.material_type.clone(),
                    size: delivery.size.clone(),
                    color: delivery.color.clone(),
                    artwork_url: delivery.artwork_url.clone(),
                };
                catalog::find_or_create_material(db, &identity, false).await?
            }
        };
        if material.warehouse_id != finished.id {
            return Err(ServiceError::ValidationError(format!(
                "material {} is not stored in the finished-goods warehouse",
                material.id
            )));
        }

        self.request_put_away(PutAwayRequest {
            material_id: material.id,
            quantity: delivery.quantity,
            requester: Requester::Production,
            order_line_ref: delivery.order_line_ref,
            quality: None,
        })
        .await
    }

    async fn announce(&self, created: &task::Model) {
        info!(
            task_id = created.id,
            material_id = created.material_id,
            lot_id = ?created.stock_lot_id,
            "put-away requested"
        );
        self.event_sender
            .send_or_log(Event::PutAwayRequested {
                task_id: created.id,
                material_id: created.material_id,
                quantity: created.quantity,
            })
            .await;
    }
}

/// Creates a requested put-away task against the lot holding this material and
/// quality, opening an empty lot when none exists yet.
async fn insert_put_away(
    txn: &DatabaseTransaction,
    material_id: i64,
    warehouse_id: i64,
    quality: Option<&QualityAttributes>,
    quantity: i32,
    requester: Requester,
    order_line_ref: Option<String>,
) -> Result<task::Model, ServiceError> {
    let quality_id = match quality {
        Some(attrs) => catalog::find_or_create_quality(txn, attrs).await?.map(|q| q.id),
        None => None,
    };

    let lot = match stock_ledger::find_lot_by_quality(txn, material_id, warehouse_id, quality_id)
        .await?
    {
        Some(lot) => lot,
        None => {
            stock_ledger::create_lot(
                txn,
                NewLot {
                    warehouse_id,
                    material_id,
                    quality_id,
                    intake_id: None,
                    quantity: 0,
                },
            )
            .await?
        }
    };

    let created = task::ActiveModel {
        material_id: Set(material_id),
        warehouse_id: Set(warehouse_id),
        stock_lot_id: Set(Some(lot.id)),
        quantity: Set(quantity),
        direction: Set(TaskDirection::PutAway),
        requester: Set(requester),
        order_line_ref: Set(order_line_ref),
        status: Set(TaskStatus::Requested),
        completed_at: Set(None),
        ..Default::default()
    }
    .insert(txn)
    .await?;
    Ok(created)
}
