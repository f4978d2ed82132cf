//! Intake pipeline.
//!
//! A delivery line is split into accepted, quarantined and disputed inbound
//! records. Accepted stock waits in `arrived` until it is put away, which opens
//! a lot whose intake id is the delivery id and so fixes its FIFO position.
//! Quarantined stock has to be released back to `arrived` first. The disputed
//! part is tracked as a complaint and never enters the ledger.

use crate::entities::complaint::{self, ComplaintStatus};
use crate::entities::inbound_delivery::{self, DeliveryStatus};
use crate::entities::material::MaterialIdentity;
use crate::entities::material_order::{self, MaterialOrderStatus};
use crate::entities::quality::QualityAttributes;
use crate::entities::{material, quality, MaterialCategory, WarehouseKind};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::locks::MaterialLocks;
use crate::services::stock_ledger::{self, NewLot};
use crate::services::{catalog, BatchOutcome};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct DeliveryReceipt {
    /// Known material; when absent the material is resolved by its attributes.
    pub material_id: Option<i64>,
    #[serde(default = "default_intake_warehouse")]
    pub warehouse: WarehouseKind,
    pub category: Option<MaterialCategory>,
    #[validate(length(max = 64))]
    pub material_type: Option<String>,
    #[validate(length(max = 16))]
    pub size: Option<String>,
    #[validate(length(max = 64))]
    pub color: Option<String>,
    #[validate(url)]
    pub artwork_url: Option<String>,
    pub material_order_id: Option<i64>,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub accepted: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub quarantined: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub disputed: i32,
    #[validate(length(max = 512))]
    pub complaint_reason: Option<String>,
    #[serde(default)]
    pub quality: Option<QualityAttributes>,
    pub delivery_date: Option<NaiveDate>,
}

fn default_intake_warehouse() -> WarehouseKind {
    WarehouseKind::RawMaterial
}

impl DeliveryReceipt {
    pub fn total(&self) -> i64 {
        i64::from(self.accepted) + i64::from(self.quarantined) + i64::from(self.disputed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IntakeResult {
    pub material: material::Model,
    pub quality: Option<quality::Model>,
    pub deliveries: Vec<inbound_delivery::Model>,
    pub complaint: Option<complaint::Model>,
}

#[derive(Clone)]
pub struct IntakeService {
    db: Arc<DatabaseConnection>,
    locks: MaterialLocks,
    event_sender: EventSender,
}

impl IntakeService {
    pub fn new(db: Arc<DatabaseConnection>, locks: MaterialLocks, event_sender: EventSender) -> Self {
        Self {
            db,
            locks,
            event_sender,
        }
    }

    #[instrument(skip(self, receipt), fields(material_id = ?receipt.material_id, order = ?receipt.material_order_id))]
    pub async fn receive_delivery(&self, receipt: DeliveryReceipt) -> Result<IntakeResult, ServiceError> {
        receipt.validate()?;
        if receipt.total() == 0 {
            return Err(ServiceError::ValidationError(
                "delivery must contain at least one unit".to_string(),
            ));
        }
        if receipt.material_id.is_none() && receipt.category.is_none() {
            return Err(ServiceError::ValidationError(
                "either material_id or category is required".to_string(),
            ));
        }

        let r = receipt.clone();
        let result = self
            .db
            .transaction::<_, IntakeResult, ServiceError>(move |txn| {
                Box::pin(async move { record_receipt(txn, r).await })
            })
            .await
            .map_err(ServiceError::from)?;

        info!(
            material_id = result.material.id,
            deliveries = result.deliveries.len(),
            complaint = ?result.complaint.as_ref().map(|c| c.id),
            "delivery received"
        );
        self.event_sender
            .send_or_log(Event::DeliveryReceived {
                material_id: result.material.id,
                accepted: receipt.accepted,
                quarantined: receipt.quarantined,
                disputed: receipt.disputed,
            })
            .await;
        Ok(result)
    }

    /// Holds arrived deliveries back from put-away.
    pub async fn lock_deliveries(&self, delivery_ids: Vec<i64>) -> BatchOutcome {
        self.transition_batch(delivery_ids, DeliveryStatus::Arrived, DeliveryStatus::Quarantined)
            .await
    }

    /// Makes quarantined deliveries eligible for put-away again.
    pub async fn release_deliveries(&self, delivery_ids: Vec<i64>) -> BatchOutcome {
        self.transition_batch(delivery_ids, DeliveryStatus::Quarantined, DeliveryStatus::Arrived)
            .await
    }

    async fn transition_batch(
        &self,
        delivery_ids: Vec<i64>,
        from: DeliveryStatus,
        to: DeliveryStatus,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for id in delivery_ids {
            match transition(&*self.db, id, from, to).await {
                Ok(()) => {
                    info!(delivery_id = id, %from, %to, "delivery status changed");
                    outcome.complete(id);
                }
                Err(e) => outcome.skip(id, &e),
            }
        }
        outcome
    }

    /// Moves arrived deliveries into the ledger, one lot per delivery.
    #[instrument(skip(self, delivery_ids), fields(deliveries = delivery_ids.len()))]
    pub async fn put_away_deliveries(&self, delivery_ids: Vec<i64>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for id in delivery_ids {
            match self.put_away_one(id).await {
                Ok(_lot_id) => outcome.complete(id),
                Err(e) => outcome.skip(id, &e),
            }
        }
        outcome
    }

    async fn put_away_one(&self, delivery_id: i64) -> Result<i64, ServiceError> {
        let delivery = find_delivery(&*self.db, delivery_id).await?;
        let _guard = self.locks.acquire(delivery.material_id).await;

        let (lot_id, quantity) = self
            .db
            .transaction::<_, (i64, i32), ServiceError>(move |txn| {
                Box::pin(async move {
                    let delivery = find_delivery(txn, delivery_id).await?;
                    match delivery.status {
                        DeliveryStatus::Arrived => {}
                        DeliveryStatus::Quarantined => {
                            return Err(ServiceError::InvalidTransition(format!(
                                "delivery {} is quarantined and must be released first",
                                delivery_id
                            )))
                        }
                        other => {
                            return Err(ServiceError::InvalidTransition(format!(
                                "delivery {} is {}, expected arrived",
                                delivery_id, other
                            )))
                        }
                    }

                    let material = catalog::get_material(txn, delivery.material_id).await?;
                    let lot = stock_ledger::create_lot(
                        txn,
                        NewLot {
                            warehouse_id: material.warehouse_id,
                            material_id: material.id,
                            quality_id: delivery.quality_id,
                            intake_id: Some(delivery.id),
                            quantity: delivery.quantity,
                        },
                    )
                    .await?;
                    transition(txn, delivery_id, DeliveryStatus::Arrived, DeliveryStatus::PutAway)
                        .await?;
                    Ok((lot.id, delivery.quantity))
                })
            })
            .await
            .map_err(ServiceError::from)?;

        info!(delivery_id, lot_id, quantity, "delivery put away");
        self.event_sender
            .send_or_log(Event::DeliveryPutAway {
                delivery_id,
                lot_id,
                quantity,
            })
            .await;
        Ok(lot_id)
    }

    pub async fn list_deliveries(
        &self,
        status: Option<DeliveryStatus>,
    ) -> Result<Vec<inbound_delivery::Model>, ServiceError> {
        let mut query = inbound_delivery::Entity::find();
        if let Some(status) = status {
            query = query.filter(inbound_delivery::Column::Status.eq(status));
        }
        Ok(query
            .order_by_asc(inbound_delivery::Column::Id)
            .all(&*self.db)
            .await?)
    }

    pub async fn list_complaints(
        &self,
        status: Option<ComplaintStatus>,
    ) -> Result<Vec<complaint::Model>, ServiceError> {
        let mut query = complaint::Entity::find();
        if let Some(status) = status {
            query = query.filter(complaint::Column::Status.eq(status));
        }
        Ok(query
            .order_by_asc(complaint::Column::Id)
            .all(&*self.db)
            .await?)
    }
}

async fn record_receipt(
    txn: &DatabaseTransaction,
    receipt: DeliveryReceipt,
) -> Result<IntakeResult, ServiceError> {
    let material = match receipt.material_id {
        Some(id) => catalog::get_material(txn, id).await?,
        None => {
            let warehouse = catalog::warehouse_by_kind(txn, receipt.warehouse).await?;
            let identity = MaterialIdentity {
                warehouse_id: warehouse.id,
                category: receipt.category.unwrap_or(MaterialCategory::TShirt),
                material_type: receipt.material_type.clone(),
                size: receipt.size.clone(),
                color: receipt.color.clone(),
                artwork_url: receipt.artwork_url.clone(),
            };
            catalog::find_or_create_material(txn, &identity, true).await?
        }
    };

    if let Some(order_id) = receipt.material_order_id {
        settle_order(txn, order_id, material.id).await?;
    }

    let quality = match &receipt.quality {
        Some(attrs) => catalog::find_or_create_quality(txn, attrs).await?,
        None => None,
    };
    let quality_id = quality.as_ref().map(|q| q.id);
    let delivery_date = receipt
        .delivery_date
        .unwrap_or_else(|| Utc::now().date_naive());

    let portions = [
        (receipt.accepted, DeliveryStatus::Arrived),
        (receipt.quarantined, DeliveryStatus::Quarantined),
        (receipt.disputed, DeliveryStatus::Disputed),
    ];

    let mut deliveries = Vec::new();
    let mut complaint = None;
    for (quantity, status) in portions {
        if quantity == 0 {
            continue;
        }
        let now = Utc::now();
        let delivery = inbound_delivery::ActiveModel {
            material_id: Set(material.id),
            material_order_id: Set(receipt.material_order_id),
            quantity: Set(quantity),
            status: Set(status),
            quality_id: Set(quality_id),
            delivery_date: Set(delivery_date),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        if status == DeliveryStatus::Disputed {
            complaint = Some(
                complaint::ActiveModel {
                    inbound_delivery_id: Set(delivery.id),
                    quantity: Set(quantity),
                    status: Set(ComplaintStatus::Open),
                    reason: Set(receipt.complaint_reason.clone()),
                    created_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?,
            );
        }
        deliveries.push(delivery);
    }

    Ok(IntakeResult {
        material,
        quality,
        deliveries,
        complaint,
    })
}

/// Closes the purchase order a delivery answers.
async fn settle_order(
    txn: &DatabaseTransaction,
    order_id: i64,
    material_id: i64,
) -> Result<(), ServiceError> {
    let order = material_order::Entity::find_by_id(order_id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Material order", order_id))?;
    if order.material_id != material_id {
        return Err(ServiceError::ValidationError(format!(
            "material order {} is for material {}, not {}",
            order_id, order.material_id, material_id
        )));
    }

    match order.status {
        MaterialOrderStatus::Ordered => {
            let mut active: material_order::ActiveModel = order.into();
            active.status = Set(MaterialOrderStatus::Completed);
            active.updated_at = Set(Utc::now());
            active.update(txn).await?;
            info!(order_id, "material order completed by delivery");
        }
        MaterialOrderStatus::Completed => {}
        MaterialOrderStatus::Open => {
            warn!(order_id, "delivery received for an order that was never submitted");
        }
    }
    Ok(())
}

async fn find_delivery<C: ConnectionTrait>(
    db: &C,
    delivery_id: i64,
) -> Result<inbound_delivery::Model, ServiceError> {
    inbound_delivery::Entity::find_by_id(delivery_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Inbound delivery", delivery_id))
}

async fn transition<C: ConnectionTrait>(
    db: &C,
    delivery_id: i64,
    from: DeliveryStatus,
    to: DeliveryStatus,
) -> Result<(), ServiceError> {
    let res = inbound_delivery::Entity::update_many()
        .col_expr(inbound_delivery::Column::Status, Expr::value(to))
        .col_expr(inbound_delivery::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(inbound_delivery::Column::Id.eq(delivery_id))
        .filter(inbound_delivery::Column::Status.eq(from))
        .exec(db)
        .await?;
    if res.rows_affected == 1 {
        return Ok(());
    }

    let current = find_delivery(db, delivery_id).await?;
    Err(ServiceError::InvalidTransition(format!(
        "delivery {} is {}, expected {}",
        delivery_id, current.status, from
    )))
}
