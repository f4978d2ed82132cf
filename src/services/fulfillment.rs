//! Groups completed withdrawals per requester and category, hands them to the
//! notification dispatcher, and retires custom materials that ran out.

use crate::entities::{material, quality, task, Requester, TaskStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::locks::MaterialLocks;
use crate::notifications::{
    DispatchOutcome, NotificationDispatcher, OutboundMessage, ProductionItem, RawMaterialItem,
    ShipmentStatus,
};
use crate::services::stock_ledger;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, TransactionTrait,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A withdrawal task that just reached `completed`, with what the external
/// systems need to know about its material.
#[derive(Debug, Clone)]
pub struct CompletedWithdrawal {
    pub task: task::Model,
    pub material: material::Model,
    pub quality: Option<quality::Model>,
}

/// Outbound messages for one processed batch, at most one per group.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotificationPlan {
    pub production: Vec<ProductionItem>,
    pub raw_material: Vec<RawMaterialItem>,
    /// Order line reference and the materials picked for it.
    pub shipments: BTreeMap<String, Vec<i64>>,
    /// Sales tasks without an order line reference.
    pub unroutable: Vec<i64>,
    /// Custom materials that had stock withdrawn, each listed once.
    pub custom_materials: Vec<i64>,
}

impl NotificationPlan {
    pub fn messages(&self) -> Vec<OutboundMessage> {
        let mut messages = Vec::new();
        if !self.production.is_empty() {
            messages.push(OutboundMessage::Production {
                items: self.production.clone(),
            });
        }
        if !self.raw_material.is_empty() {
            messages.push(OutboundMessage::ProductionRawMaterial {
                items: self.raw_material.clone(),
            });
        }
        for order_line_ref in self.shipments.keys() {
            messages.push(OutboundMessage::Shipment {
                order_line_ref: order_line_ref.clone(),
                status: ShipmentStatus::ReadyForShipment,
            });
        }
        messages
    }

}

pub fn plan_notifications(completed: &[CompletedWithdrawal]) -> NotificationPlan {
    let mut plan = NotificationPlan::default();
    // (material, quality) -> index into plan.production
    let mut production_index: BTreeMap<(i64, Option<i64>), usize> = BTreeMap::new();

    for entry in completed {
        let task = &entry.task;
        let material = &entry.material;
        if !material.is_standard && !plan.custom_materials.contains(&material.id) {
            plan.custom_materials.push(material.id);
        }
        match task.requester {
            Requester::Production if material.category.is_raw_supply() => {
                let dye = material.category == crate::entities::MaterialCategory::Dye;
                let q = entry.quality.as_ref().filter(|_| dye);
                plan.raw_material.push(RawMaterialItem {
                    task_id: task.id,
                    material_id: material.id,
                    category: material.category,
                    quantity: task.quantity,
                    ink_density: q.and_then(|q| q.ink_density),
                    viscosity: q.and_then(|q| q.viscosity),
                    color_delta: q.and_then(|q| q.color_delta),
                });
            }
            Requester::Production => {
                let key = (material.id, entry.quality.as_ref().map(|q| q.id));
                match production_index.get(&key) {
                    Some(&i) => {
                        let item = &mut plan.production[i];
                        item.quantity += task.quantity;
                        item.task_ids.push(task.id);
                    }
                    None => {
                        production_index.insert(key, plan.production.len());
                        plan.production.push(ProductionItem {
                            material_id: material.id,
                            task_ids: vec![task.id],
                            quantity: task.quantity,
                            category: material.category,
                            material_type: material.material_type.clone(),
                            size: material.size.clone(),
                            color: material.color.clone(),
                            absorbency: entry.quality.as_ref().and_then(|q| q.absorbency),
                            whiteness: entry.quality.as_ref().and_then(|q| q.whiteness),
                        });
                    }
                }
            }
            Requester::SalesAndShipping => match &task.order_line_ref {
                Some(order_line_ref) => {
                    let materials = plan.shipments.entry(order_line_ref.clone()).or_default();
                    if !materials.contains(&material.id) {
                        materials.push(material.id);
                    }
                }
                None => plan.unroutable.push(task.id),
            },
        }
    }
    plan
}

#[derive(Clone)]
pub struct FulfillmentNotifier {
    db: Arc<DatabaseConnection>,
    locks: MaterialLocks,
    dispatcher: NotificationDispatcher,
    event_sender: EventSender,
}

impl FulfillmentNotifier {
    pub fn new(
        db: Arc<DatabaseConnection>,
        locks: MaterialLocks,
        dispatcher: NotificationDispatcher,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            locks,
            dispatcher,
            event_sender,
        }
    }

    /// Notifies the requesters of a batch of committed withdrawals. Failures
    /// are logged and reported, never propagated.
    #[instrument(skip(self, completed), fields(tasks = completed.len()))]
    pub async fn notify_completed(&self, completed: &[CompletedWithdrawal]) -> Vec<DispatchOutcome> {
        let plan = plan_notifications(completed);
        for task_id in &plan.unroutable {
            warn!(task_id, "sales withdrawal without order line reference; not notified");
        }

        let mut outcomes = Vec::new();
        for message in plan.messages() {
            outcomes.push(self.dispatcher.dispatch(message).await);
        }

        // any requester may drain a custom material, routed or not
        for material_id in plan.custom_materials {
            if let Err(e) = self.retire_if_exhausted(material_id).await {
                warn!(material_id, error = %e, "custom material cleanup failed");
            }
        }
        outcomes
    }

    /// Tells Sales-and-Shipping that picked order lines await collection.
    #[instrument(skip(self, tasks), fields(tasks = tasks.len()))]
    pub async fn notify_ready_for_pickup(&self, tasks: &[task::Model]) -> Vec<DispatchOutcome> {
        let mut refs: Vec<&String> = tasks
            .iter()
            .filter_map(|t| t.order_line_ref.as_ref())
            .collect();
        refs.sort();
        refs.dedup();

        let mut outcomes = Vec::with_capacity(refs.len());
        for order_line_ref in refs {
            outcomes.push(
                self.dispatcher
                    .dispatch(OutboundMessage::Shipment {
                        order_line_ref: order_line_ref.clone(),
                        status: ShipmentStatus::ReadyForPickup,
                    })
                    .await,
            );
        }
        outcomes
    }

    /// Deletes a custom material and its lots once no stock is left. Catalog
    /// items and materials with pending tasks are kept.
    #[instrument(skip(self))]
    pub async fn retire_if_exhausted(&self, material_id: i64) -> Result<bool, ServiceError> {
        let guard = self.locks.acquire(material_id).await;

        let purged = self
            .db
            .transaction::<_, bool, ServiceError>(move |txn| {
                Box::pin(async move {
                    let Some(material) = material::Entity::find_by_id(material_id).one(txn).await?
                    else {
                        return Ok(false);
                    };
                    if material.is_standard {
                        return Ok(false);
                    }

                    let total = stock_ledger::total_quantity(txn, material_id).await?;
                    if total != 0 {
                        debug!(material_id, total, "custom material still stocked");
                        return Ok(false);
                    }

                    let pending = task::Entity::find()
                        .filter(task::Column::MaterialId.eq(material_id))
                        .filter(task::Column::Status.eq(TaskStatus::Requested))
                        .count(txn)
                        .await?;
                    if pending > 0 {
                        debug!(material_id, pending, "custom material has pending tasks");
                        return Ok(false);
                    }

                    stock_ledger::purge_material(txn, material_id).await?;
                    Ok(true)
                })
            })
            .await
            .map_err(ServiceError::from)?;
        drop(guard);

        if purged {
            // the material is gone, so its mutex is too
            self.locks.prune();
            info!(material_id, "exhausted custom material removed");
            self.event_sender
                .send_or_log(Event::MaterialPurged { material_id })
                .await;
        }
        Ok(purged)
    }
}
