//! Task lifecycle manager.
//!
//! Moves tasks `requested -> completed` in skip-and-continue batches, applying
//! the stock movement each task stands for, and `completed -> ready-for-pickup`
//! for picked Sales-and-Shipping withdrawals. Every item is its own unit of
//! work: a failing item is reported and the rest of the batch carries on.

use crate::entities::{stock_lot, task, Requester, TaskDirection, TaskStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::locks::MaterialLocks;
use crate::notifications::DispatchOutcome;
use crate::services::fulfillment::{CompletedWithdrawal, FulfillmentNotifier};
use crate::services::minimum_stock::MinimumStockService;
use crate::services::stock_ledger::{self, NewLot};
use crate::services::{catalog, BatchOutcome};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

/// Result of a lifecycle batch: which ids moved, which were skipped and why,
/// and what became of the notifications the moved tasks triggered.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TaskBatchResult {
    #[serde(flatten)]
    pub outcome: BatchOutcome,
    pub notifications: Vec<DispatchOutcome>,
}

#[derive(Clone)]
pub struct TaskLifecycleManager {
    db: Arc<DatabaseConnection>,
    locks: MaterialLocks,
    notifier: FulfillmentNotifier,
    minimum_stock: MinimumStockService,
    event_sender: EventSender,
}

impl TaskLifecycleManager {
    pub fn new(
        db: Arc<DatabaseConnection>,
        locks: MaterialLocks,
        notifier: FulfillmentNotifier,
        minimum_stock: MinimumStockService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            locks,
            notifier,
            minimum_stock,
            event_sender,
        }
    }

    pub async fn get_task(&self, task_id: i64) -> Result<task::Model, ServiceError> {
        find_task(&*self.db, task_id).await
    }

    /// Completes every listed task of the given direction. Never fails as a
    /// whole; the notifications for withdrawn stock go out after all items
    /// have been committed.
    #[instrument(skip(self, task_ids), fields(tasks = task_ids.len(), direction = %direction))]
    pub async fn process_batch(&self, task_ids: Vec<i64>, direction: TaskDirection) -> TaskBatchResult {
        let mut result = TaskBatchResult::default();
        let mut withdrawn: Vec<CompletedWithdrawal> = Vec::new();

        for task_id in task_ids {
            match self.complete_one(task_id, direction).await {
                Ok(completed) => {
                    metrics::counter!("warehouse.tasks.completed", 1);
                    info!(
                        task_id,
                        material_id = completed.task.material_id,
                        lot_id = ?completed.task.stock_lot_id,
                        quantity = completed.task.quantity,
                        "task completed"
                    );
                    self.event_sender
                        .send_or_log(Event::TaskCompleted {
                            task_id,
                            material_id: completed.task.material_id,
                            direction,
                            quantity: completed.task.quantity,
                        })
                        .await;
                    result.outcome.complete(task_id);
                    if let Some(withdrawal) = completed.withdrawal {
                        withdrawn.push(withdrawal);
                    }
                }
                Err(e) => {
                    metrics::counter!("warehouse.tasks.skipped", 1);
                    result.outcome.skip(task_id, &e);
                }
            }
        }

        if withdrawn.is_empty() {
            return result;
        }

        let touched: BTreeSet<i64> = withdrawn.iter().map(|w| w.task.material_id).collect();
        for material_id in touched {
            if let Err(e) = self.minimum_stock.check_material(material_id).await {
                warn!(material_id, error = %e, "minimum stock check failed");
            }
        }

        result.notifications = self.notifier.notify_completed(&withdrawn).await;
        result
    }

    async fn complete_one(
        &self,
        task_id: i64,
        direction: TaskDirection,
    ) -> Result<ItemCompletion, ServiceError> {
        let material_id = find_task(&*self.db, task_id).await?.material_id;
        let _guard = self.locks.acquire(material_id).await;

        self.db
            .transaction::<_, ItemCompletion, ServiceError>(move |txn| {
                Box::pin(async move {
                    let current = find_task(txn, task_id).await?;
                    if current.direction != direction {
                        return Err(ServiceError::InvalidTransition(format!(
                            "task {} is a {} task, not {}",
                            task_id, current.direction, direction
                        )));
                    }
                    if current.status != TaskStatus::Requested {
                        return Err(ServiceError::InvalidTransition(format!(
                            "task {} is {}, expected requested",
                            task_id, current.status
                        )));
                    }

                    match direction {
                        TaskDirection::Withdrawal => {
                            let lot = withdraw(txn, &current).await?;
                            let completed = flip_status(
                                txn,
                                task_id,
                                TaskStatus::Requested,
                                TaskStatus::Completed,
                                None,
                            )
                            .await?;
                            let material = catalog::get_material(txn, completed.material_id).await?;
                            let quality = catalog::get_quality(txn, lot.quality_id).await?;
                            Ok(ItemCompletion {
                                task: completed.clone(),
                                withdrawal: Some(CompletedWithdrawal {
                                    task: completed,
                                    material,
                                    quality,
                                }),
                            })
                        }
                        TaskDirection::PutAway => {
                            let lot_id = store(txn, &current).await?;
                            let completed = flip_status(
                                txn,
                                task_id,
                                TaskStatus::Requested,
                                TaskStatus::Completed,
                                Some(lot_id),
                            )
                            .await?;
                            Ok(ItemCompletion {
                                task: completed,
                                withdrawal: None,
                            })
                        }
                    }
                })
            })
            .await
            .map_err(ServiceError::from)
    }

    /// Marks picked Sales-and-Shipping withdrawals as awaiting collection.
    #[instrument(skip(self, task_ids), fields(tasks = task_ids.len()))]
    pub async fn mark_ready_for_pickup(&self, task_ids: Vec<i64>) -> TaskBatchResult {
        let mut result = TaskBatchResult::default();
        let mut picked = Vec::new();

        for task_id in task_ids {
            match self.ready_one(task_id).await {
                Ok(task) => {
                    info!(task_id, "task ready for pickup");
                    if let Some(order_line_ref) = task.order_line_ref.clone() {
                        self.event_sender
                            .send_or_log(Event::TaskReadyForPickup {
                                task_id,
                                order_line_ref,
                            })
                            .await;
                    }
                    result.outcome.complete(task_id);
                    picked.push(task);
                }
                Err(e) => result.outcome.skip(task_id, &e),
            }
        }

        if !picked.is_empty() {
            result.notifications = self.notifier.notify_ready_for_pickup(&picked).await;
        }
        result
    }

    async fn ready_one(&self, task_id: i64) -> Result<task::Model, ServiceError> {
        let db = &*self.db;
        let current = find_task(db, task_id).await?;
        if current.direction != TaskDirection::Withdrawal
            || current.requester != Requester::SalesAndShipping
        {
            return Err(ServiceError::InvalidTransition(format!(
                "task {} is not a sales withdrawal",
                task_id
            )));
        }
        if current.status != TaskStatus::Completed {
            return Err(ServiceError::InvalidTransition(format!(
                "task {} is {}, expected completed",
                task_id, current.status
            )));
        }
        flip_status(
            db,
            task_id,
            TaskStatus::Completed,
            TaskStatus::ReadyForPickup,
            None,
        )
        .await
    }

    /// Requested tasks, newest first.
    pub async fn open_tasks(&self, requester: Option<Requester>) -> Result<Vec<task::Model>, ServiceError> {
        let mut query = task::Entity::find().filter(task::Column::Status.eq(TaskStatus::Requested));
        if let Some(requester) = requester {
            query = query.filter(task::Column::Requester.eq(requester));
        }
        Ok(query
            .order_by_desc(task::Column::CreatedAt)
            .order_by_desc(task::Column::Id)
            .all(&*self.db)
            .await?)
    }

    /// Finished tasks, most recently updated first.
    pub async fn task_history(
        &self,
        requester: Option<Requester>,
        limit: u64,
    ) -> Result<Vec<task::Model>, ServiceError> {
        let mut query = task::Entity::find().filter(
            task::Column::Status.is_in([TaskStatus::Completed, TaskStatus::ReadyForPickup]),
        );
        if let Some(requester) = requester {
            query = query.filter(task::Column::Requester.eq(requester));
        }
        Ok(query
            .order_by_desc(task::Column::UpdatedAt)
            .order_by_desc(task::Column::Id)
            .limit(limit)
            .all(&*self.db)
            .await?)
    }
}

struct ItemCompletion {
    task: task::Model,
    withdrawal: Option<CompletedWithdrawal>,
}

async fn find_task<C: ConnectionTrait>(db: &C, task_id: i64) -> Result<task::Model, ServiceError> {
    task::Entity::find_by_id(task_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Task", task_id))
}

/// Takes the task's quantity out of its lot. A lot that vanished or shrank
/// below the task quantity since allocation is reported as insufficient stock.
async fn withdraw(
    txn: &DatabaseTransaction,
    task: &task::Model,
) -> Result<stock_lot::Model, ServiceError> {
    let drift = |available: i32| ServiceError::InsufficientStock {
        material_id: task.material_id,
        requested: task.quantity,
        available,
    };

    let lot_id = task.stock_lot_id.ok_or_else(|| drift(0))?;
    let lot = match stock_lot::Entity::find_by_id(lot_id).one(txn).await? {
        Some(lot) => lot,
        None => return Err(drift(0)),
    };
    if lot.quantity < task.quantity {
        return Err(drift(lot.quantity));
    }
    stock_ledger::decrement_checked(txn, lot.id, task.quantity).await?;
    Ok(lot)
}

/// Adds the task's quantity to its lot, recreating the lot when it was
/// removed in the meantime. Returns the lot id that now holds the stock.
async fn store(txn: &DatabaseTransaction, task: &task::Model) -> Result<i64, ServiceError> {
    if let Some(lot_id) = task.stock_lot_id {
        if stock_lot::Entity::find_by_id(lot_id).one(txn).await?.is_some() {
            stock_ledger::increment(txn, lot_id, task.quantity).await?;
            return Ok(lot_id);
        }
    }

    let lot = stock_ledger::create_lot(
        txn,
        NewLot {
            warehouse_id: task.warehouse_id,
            material_id: task.material_id,
            quality_id: None,
            intake_id: None,
            quantity: task.quantity,
        },
    )
    .await?;
    Ok(lot.id)
}

/// Conditional status change; zero affected rows means another request got
/// there first.
async fn flip_status<C: ConnectionTrait>(
    db: &C,
    task_id: i64,
    from: TaskStatus,
    to: TaskStatus,
    lot_id: Option<i64>,
) -> Result<task::Model, ServiceError> {
    let now = Utc::now();
    let mut update = task::Entity::update_many()
        .col_expr(task::Column::Status, Expr::value(to))
        .col_expr(task::Column::UpdatedAt, Expr::value(now));
    if to == TaskStatus::Completed {
        update = update.col_expr(task::Column::CompletedAt, Expr::value(Some(now)));
    }
    if let Some(lot_id) = lot_id {
        update = update.col_expr(task::Column::StockLotId, Expr::value(Some(lot_id)));
    }

    let res = update
        .filter(task::Column::Id.eq(task_id))
        .filter(task::Column::Status.eq(from))
        .exec(db)
        .await?;
    if res.rows_affected != 1 {
        return Err(ServiceError::ConcurrencyConflict(format!(
            "task {} left {} concurrently",
            task_id, from
        )));
    }
    find_task(db, task_id).await
}
