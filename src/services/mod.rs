pub mod allocation;
pub mod catalog;
pub mod fulfillment;
pub mod intake;
pub mod material_orders;
pub mod minimum_stock;
pub mod put_away;
pub mod reservation;
pub mod stock_ledger;
pub mod stock_queries;
pub mod task_lifecycle;

use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

/// Why an item of a batch call was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotFound,
    InvalidTransition,
    /// The referenced lot no longer holds enough stock.
    StockDrift,
    StorageError,
}

impl SkipReason {
    pub fn from_error(err: &ServiceError) -> Self {
        match err {
            ServiceError::NotFound(_) => SkipReason::NotFound,
            ServiceError::InvalidTransition(_) | ServiceError::ConcurrencyConflict(_) => {
                SkipReason::InvalidTransition
            }
            ServiceError::InsufficientStock { .. } => SkipReason::StockDrift,
            _ => SkipReason::StorageError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SkippedItem {
    pub id: i64,
    pub reason: SkipReason,
    pub message: String,
}

/// Aggregate result of a skip-and-continue batch. Skipped items need to be
/// resubmitted by the caller; nothing retries them automatically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BatchOutcome {
    pub completed: Vec<i64>,
    pub skipped: Vec<SkippedItem>,
}

impl BatchOutcome {
    pub fn complete(&mut self, id: i64) {
        self.completed.push(id);
    }

    pub fn skip(&mut self, id: i64, err: &ServiceError) {
        let reason = SkipReason::from_error(err);
        warn!(id, ?reason, error = %err, "batch item skipped");
        self.skipped.push(SkippedItem {
            id,
            reason,
            message: err.to_string(),
        });
    }

    pub fn skipped_ids(&self) -> Vec<i64> {
        self.skipped.iter().map(|s| s.id).collect()
    }
}
