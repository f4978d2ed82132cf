//! Allocation engine.
//!
//! Splits a withdrawal demand across the free capacity of a material's lots,
//! oldest intake first, producing one requested task per consumed lot. A
//! demand is either covered in full or rejected without side effects.

use crate::entities::{task, Requester, TaskDirection, TaskStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::locks::MaterialLocks;
use crate::services::reservation::{self, LotAvailability};
use crate::services::{catalog, stock_ledger};
use sea_orm::{ActiveModelTrait, DatabaseConnection, DatabaseTransaction, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct WithdrawalRequest {
    pub material_id: i64,
    /// Restricts allocation to one warehouse; defaults to the material's own.
    pub warehouse_id: Option<i64>,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub requester: Requester,
    #[validate(length(min = 1, max = 128))]
    pub order_line_ref: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedSlice {
    pub lot_id: i64,
    pub warehouse_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub requested: i32,
    pub available: i32,
}

/// FIFO split of `quantity` over `lots`, which must already be FIFO ordered.
/// Lots without free capacity are passed over, never planned as empty slices.
pub fn plan_allocation(
    lots: &[LotAvailability],
    quantity: i32,
) -> Result<Vec<PlannedSlice>, Shortfall> {
    let total_free: i64 = lots.iter().map(|l| i64::from(l.free.max(0))).sum();
    if total_free < i64::from(quantity) {
        return Err(Shortfall {
            requested: quantity,
            available: i32::try_from(total_free).unwrap_or(i32::MAX),
        });
    }

    let mut remaining = quantity;
    let mut plan = Vec::new();
    for lot in lots {
        if remaining == 0 {
            break;
        }
        if lot.free <= 0 {
            continue;
        }
        let take = lot.free.min(remaining);
        plan.push(PlannedSlice {
            lot_id: lot.lot_id,
            warehouse_id: lot.warehouse_id,
            quantity: take,
        });
        remaining -= take;
    }
    Ok(plan)
}

/// Per-request outcome of a multi-material allocation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AllocationResult {
    pub material_id: i64,
    pub requested: i32,
    pub tasks: Vec<task::Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AllocationFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AllocationFailure {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<i32>,
}

impl From<&ServiceError> for AllocationFailure {
    fn from(err: &ServiceError) -> Self {
        let available = match err {
            ServiceError::InsufficientStock { available, .. } => Some(*available),
            _ => None,
        };
        Self {
            code: err.error_code().to_string(),
            message: err.response_message(),
            available,
        }
    }
}

#[derive(Clone)]
pub struct AllocationEngine {
    db: Arc<DatabaseConnection>,
    locks: MaterialLocks,
    event_sender: EventSender,
}

impl AllocationEngine {
    pub fn new(db: Arc<DatabaseConnection>, locks: MaterialLocks, event_sender: EventSender) -> Self {
        Self {
            db,
            locks,
            event_sender,
        }
    }

    /// Reserves `request.quantity` of a material, all or nothing.
    #[instrument(
        skip(self, request),
        fields(
            material_id = request.material_id,
            quantity = request.quantity,
            requester = %request.requester
        )
    )]
    pub async fn allocate(&self, request: WithdrawalRequest) -> Result<Vec<task::Model>, ServiceError> {
        request.validate()?;

        // only existing materials get a registry entry
        catalog::get_material(&*self.db, request.material_id).await?;
        let _guard = self.locks.acquire(request.material_id).await;
        let req = request.clone();
        let result = self
            .db
            .transaction::<_, Vec<task::Model>, ServiceError>(move |txn| {
                Box::pin(async move {
                    let material = catalog::get_material(txn, req.material_id).await?;
                    let warehouse_id = req.warehouse_id.unwrap_or(material.warehouse_id);
                    let lots = reservation::free_lots(txn, material.id, Some(warehouse_id)).await?;

                    let plan = plan_allocation(&lots, req.quantity).map_err(|shortfall| {
                        ServiceError::InsufficientStock {
                            material_id: material.id,
                            requested: shortfall.requested,
                            available: shortfall.available,
                        }
                    })?;

                    let mut created = Vec::with_capacity(plan.len());
                    for slice in plan {
                        created.push(
                            insert_withdrawal(
                                txn,
                                material.id,
                                slice,
                                req.requester,
                                req.order_line_ref.clone(),
                            )
                            .await?,
                        );
                    }
                    Ok(created)
                })
            })
            .await
            .map_err(ServiceError::from);

        let tasks = match result {
            Ok(tasks) => tasks,
            Err(e) => {
                if matches!(e, ServiceError::InsufficientStock { .. }) {
                    metrics::counter!("warehouse.allocations.rejected", 1);
                }
                warn!(error = %e, "allocation rejected");
                return Err(e);
            }
        };

        metrics::counter!("warehouse.allocations", 1);
        let task_ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
        info!(?task_ids, "withdrawal allocated");

        self.event_sender
            .send_or_log(Event::WithdrawalAllocated {
                material_id: request.material_id,
                requester: request.requester,
                quantity: request.quantity,
                task_ids,
            })
            .await;

        Ok(tasks)
    }

    /// Allocates each request independently; one material's shortage does not
    /// affect the others.
    #[instrument(skip(self, requests), fields(requests = requests.len()))]
    pub async fn allocate_batch(&self, requests: Vec<WithdrawalRequest>) -> Vec<AllocationResult> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let material_id = request.material_id;
            let requested = request.quantity;
            let result = match self.allocate(request).await {
                Ok(tasks) => AllocationResult {
                    material_id,
                    requested,
                    tasks,
                    error: None,
                },
                Err(e) => AllocationResult {
                    material_id,
                    requested,
                    tasks: Vec::new(),
                    error: Some(AllocationFailure::from(&e)),
                },
            };
            results.push(result);
        }
        results
    }

    /// Reserves stock from one named lot instead of walking the FIFO order.
    #[instrument(skip(self, order_line_ref))]
    pub async fn allocate_from_lot(
        &self,
        lot_id: i64,
        quantity: i32,
        requester: Requester,
        order_line_ref: Option<String>,
    ) -> Result<task::Model, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be positive".to_string(),
            ));
        }

        let material_id = stock_ledger::get_lot(&*self.db, lot_id).await?.material_id;
        let _guard = self.locks.acquire(material_id).await;

        let created = self
            .db
            .transaction::<_, task::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let lot = stock_ledger::get_lot(txn, lot_id).await?;
                    let availability = reservation::free_for_lot(txn, &lot).await?;
                    if availability.free < quantity {
                        return Err(ServiceError::InsufficientStock {
                            material_id: lot.material_id,
                            requested: quantity,
                            available: availability.free,
                        });
                    }
                    let slice = PlannedSlice {
                        lot_id: lot.id,
                        warehouse_id: lot.warehouse_id,
                        quantity,
                    };
                    insert_withdrawal(txn, lot.material_id, slice, requester, order_line_ref).await
                })
            })
            .await
            .map_err(ServiceError::from)?;

        metrics::counter!("warehouse.allocations", 1);
        info!(task_id = created.id, lot_id, "withdrawal allocated from lot");
        self.event_sender
            .send_or_log(Event::WithdrawalAllocated {
                material_id: created.material_id,
                requester,
                quantity,
                task_ids: vec![created.id],
            })
            .await;
        Ok(created)
    }
}

async fn insert_withdrawal(
    txn: &DatabaseTransaction,
    material_id: i64,
    slice: PlannedSlice,
    requester: Requester,
    order_line_ref: Option<String>,
) -> Result<task::Model, ServiceError> {
    let created = task::ActiveModel {
        material_id: Set(material_id),
        warehouse_id: Set(slice.warehouse_id),
        stock_lot_id: Set(Some(slice.lot_id)),
        quantity: Set(slice.quantity),
        direction: Set(TaskDirection::Withdrawal),
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
