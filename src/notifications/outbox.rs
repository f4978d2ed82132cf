use super::{deliver, FulfillmentChannel, OutboundMessage};
use crate::entities::notification_outbox::{self, OutboxStatus};
use crate::errors::ServiceError;
use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const MAX_ATTEMPTS: i32 = 8;
const BASE_BACKOFF_SECS: i64 = 2;
const MAX_BACKOFF_SECS: i64 = 3600;
/// Shortest time a claimed row stays invisible to other deliverers.
const MIN_CLAIM_LEASE_SECS: i64 = 60;
const CLAIM_LEASE_MARGIN_SECS: i64 = 30;

/// Lease for a claimed row: the channel's worst-case call time plus a margin,
/// so a slow delivery is never picked up a second time while in flight.
pub fn claim_lease(channel: &dyn FulfillmentChannel) -> ChronoDuration {
    let budget = ChronoDuration::from_std(channel.delivery_budget())
        .unwrap_or(ChronoDuration::seconds(MAX_BACKOFF_SECS));
    (budget + ChronoDuration::seconds(CLAIM_LEASE_MARGIN_SECS))
        .max(ChronoDuration::seconds(MIN_CLAIM_LEASE_SECS))
}

/// Delay before the next attempt after `attempts` failures.
pub fn backoff_for(attempts: i32) -> ChronoDuration {
    let exp = attempts.clamp(0, 20) as u32;
    ChronoDuration::seconds(BASE_BACKOFF_SECS.saturating_pow(exp).min(MAX_BACKOFF_SECS))
}

/// Stores a message as pending. The row starts leased to the caller, which is
/// expected to attempt delivery right away.
pub async fn enqueue<C: ConnectionTrait>(
    db: &C,
    message: &OutboundMessage,
    lease: ChronoDuration,
) -> Result<notification_outbox::Model, ServiceError> {
    let now = Utc::now();
    let row = notification_outbox::ActiveModel {
        id: Set(Uuid::new_v4()),
        message_type: Set(message.message_type().to_string()),
        payload: Set(serde_json::to_string(message)?),
        status: Set(OutboxStatus::Pending),
        attempts: Set(0),
        last_error: Set(None),
        available_at: Set(now + lease),
        created_at: Set(now),
        delivered_at: Set(None),
    }
    .insert(db)
    .await?;

    debug!(outbox_id = %row.id, message_type = %row.message_type, "enqueued notification");
    Ok(row)
}

/// Sends one stored message and records the result on its row.
pub async fn attempt_delivery(
    db: &DatabaseConnection,
    channel: &dyn FulfillmentChannel,
    row: notification_outbox::Model,
) -> Result<(), ServiceError> {
    let attempts = row.attempts + 1;
    let id = row.id;

    let result = match serde_json::from_str::<OutboundMessage>(&row.payload) {
        Ok(message) => deliver(channel, &message).await,
        Err(e) => Err(ServiceError::SerializationError(e)),
    };

    let now = Utc::now();
    let mut active: notification_outbox::ActiveModel = row.into();
    active.attempts = Set(attempts);

    match &result {
        Ok(()) => {
            active.status = Set(OutboxStatus::Delivered);
            active.delivered_at = Set(Some(now));
            active.last_error = Set(None);
        }
        Err(e) => {
            active.last_error = Set(Some(e.to_string()));
            // undecodable payloads will never succeed
            if attempts >= MAX_ATTEMPTS || matches!(e, ServiceError::SerializationError(_)) {
                active.status = Set(OutboxStatus::Failed);
                error!(outbox_id = %id, attempts, "notification given up");
            } else {
                active.available_at = Set(now + backoff_for(attempts));
            }
        }
    }

    active.update(db).await?;
    result
}

/// Takes ownership of a due row so concurrent workers do not send it twice.
async fn claim(
    db: &DatabaseConnection,
    id: Uuid,
    lease: ChronoDuration,
) -> Result<bool, ServiceError> {
    let now = Utc::now();
    let res = notification_outbox::Entity::update_many()
        .col_expr(
            notification_outbox::Column::AvailableAt,
            Expr::value(now + lease),
        )
        .filter(notification_outbox::Column::Id.eq(id))
        .filter(notification_outbox::Column::Status.eq(OutboxStatus::Pending))
        .filter(notification_outbox::Column::AvailableAt.lte(now))
        .exec(db)
        .await?;
    Ok(res.rows_affected == 1)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Delivers every due pending message, oldest first.
pub async fn drain_once(
    db: &DatabaseConnection,
    channel: &dyn FulfillmentChannel,
    batch_size: u64,
) -> Result<DrainReport, ServiceError> {
    let due = notification_outbox::Entity::find()
        .filter(notification_outbox::Column::Status.eq(OutboxStatus::Pending))
        .filter(notification_outbox::Column::AvailableAt.lte(Utc::now()))
        .order_by_asc(notification_outbox::Column::CreatedAt)
        .limit(batch_size)
        .all(db)
        .await?;

    let lease = claim_lease(channel);
    let mut report = DrainReport::default();
    for row in due {
        if !claim(db, row.id, lease).await? {
            continue;
        }
        let id = row.id;
        match attempt_delivery(db, channel, row).await {
            Ok(()) => report.delivered += 1,
            Err(ServiceError::StorageError(e)) => return Err(ServiceError::StorageError(e)),
            Err(e) => {
                warn!(outbox_id = %id, error = %e, "outbox delivery failed");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

/// Background worker polling the outbox.
pub fn start_worker(
    db: Arc<DatabaseConnection>,
    channel: Arc<dyn FulfillmentChannel>,
    interval: Duration,
) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "starting notification outbox worker");
    tokio::spawn(async move {
        loop {
            match drain_once(&db, channel.as_ref(), 50).await {
                Ok(report) if report.delivered + report.failed > 0 => {
                    info!(
                        delivered = report.delivered,
                        failed = report.failed,
                        "outbox drained"
                    );
                }
                Ok(_) => {}
                Err(e) => error!("outbox worker error: {}", e),
            }
            sleep(interval).await;
        }
    })
}

pub async fn list(
    db: &DatabaseConnection,
    status: Option<OutboxStatus>,
    limit: u64,
) -> Result<Vec<notification_outbox::Model>, ServiceError> {
    let mut query = notification_outbox::Entity::find();
    if let Some(status) = status {
        query = query.filter(notification_outbox::Column::Status.eq(status));
    }
    Ok(query
        .order_by_desc(notification_outbox::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?)
}

/// Puts a failed message back in line with a fresh attempt budget.
pub async fn requeue(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<notification_outbox::Model, ServiceError> {
    let row = notification_outbox::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Outbox message", id))?;

    if row.status != OutboxStatus::Failed {
        return Err(ServiceError::InvalidTransition(format!(
            "outbox message {} is {}, only failed messages can be requeued",
            id, row.status
        )));
    }

    let mut active: notification_outbox::ActiveModel = row.into();
    active.status = Set(OutboxStatus::Pending);
    active.attempts = Set(0);
    active.available_at = Set(Utc::now());
    let updated = active.update(db).await?;
    info!(outbox_id = %id, "outbox message requeued");
    Ok(updated)
}
