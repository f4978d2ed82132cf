//! Outbound notifications to the Production and Sales-and-Shipping systems.
//!
//! Messages are persisted to the notification outbox before the first delivery
//! attempt, so a failed call is retried by the outbox worker and never by
//! re-running the stock transition that produced it.

pub mod http;
pub mod outbox;

use crate::entities::MaterialCategory;
use crate::errors::ServiceError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub use http::HttpFulfillmentChannel;

/// Finished-goods line handed to Production, one per material and quality batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProductionItem {
    pub material_id: i64,
    pub task_ids: Vec<i64>,
    pub quantity: i32,
    pub category: MaterialCategory,
    pub material_type: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub absorbency: Option<Decimal>,
    pub whiteness: Option<Decimal>,
}

/// Raw supply line handed to Production. Dye lines carry their measured
/// attributes; film and packaging lines only a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RawMaterialItem {
    pub task_id: i64,
    pub material_id: i64,
    pub category: MaterialCategory,
    pub quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ink_density: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viscosity: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_delta: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ShipmentStatus {
    ReadyForShipment,
    ReadyForPickup,
}

/// A single outbound call, as stored in the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Production {
        items: Vec<ProductionItem>,
    },
    ProductionRawMaterial {
        items: Vec<RawMaterialItem>,
    },
    Shipment {
        order_line_ref: String,
        status: ShipmentStatus,
    },
}

impl OutboundMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            OutboundMessage::Production { .. } => "production",
            OutboundMessage::ProductionRawMaterial { .. } => "production_raw_material",
            OutboundMessage::Shipment { .. } => "shipment",
        }
    }
}

/// Transport to the external systems.
#[async_trait]
pub trait FulfillmentChannel: Send + Sync {
    async fn notify_production(&self, items: &[ProductionItem]) -> Result<(), ServiceError>;

    async fn notify_production_raw_material(
        &self,
        items: &[RawMaterialItem],
    ) -> Result<(), ServiceError>;

    async fn notify_shipment(
        &self,
        order_line_ref: &str,
        status: ShipmentStatus,
    ) -> Result<(), ServiceError>;

    /// Longest a single call may take, retries included. The outbox keeps a
    /// claimed message hidden for at least this long.
    fn delivery_budget(&self) -> std::time::Duration {
        std::time::Duration::ZERO
    }
}

/// Routes a stored message to the matching channel call.
pub async fn deliver(
    channel: &dyn FulfillmentChannel,
    message: &OutboundMessage,
) -> Result<(), ServiceError> {
    match message {
        OutboundMessage::Production { items } => channel.notify_production(items).await,
        OutboundMessage::ProductionRawMaterial { items } => {
            channel.notify_production_raw_material(items).await
        }
        OutboundMessage::Shipment {
            order_line_ref,
            status,
        } => channel.notify_shipment(order_line_ref, *status).await,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Delivered { outbox_id: Uuid },
    /// Left in the outbox for the retry worker.
    Deferred { outbox_id: Uuid, error: String },
    /// Could not even be stored; the message is lost.
    Dropped { error: String },
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered { .. })
    }
}

/// Persists outbound messages and makes the first delivery attempt inline.
#[derive(Clone)]
pub struct NotificationDispatcher {
    db: Arc<DatabaseConnection>,
    channel: Arc<dyn FulfillmentChannel>,
}

impl NotificationDispatcher {
    pub fn new(db: Arc<DatabaseConnection>, channel: Arc<dyn FulfillmentChannel>) -> Self {
        Self { db, channel }
    }

    pub fn channel(&self) -> Arc<dyn FulfillmentChannel> {
        self.channel.clone()
    }

    /// Never fails: problems are logged and reported in the outcome.
    #[instrument(skip(self, message), fields(message_type = message.message_type()))]
    pub async fn dispatch(&self, message: OutboundMessage) -> DispatchOutcome {
        let lease = outbox::claim_lease(self.channel.as_ref());
        let row = match outbox::enqueue(&*self.db, &message, lease).await {
            Ok(row) => row,
            Err(e) => {
                metrics::counter!("warehouse.notifications.failed", 1);
                warn!(error = %e, "could not store outbound notification");
                return DispatchOutcome::Dropped {
                    error: e.to_string(),
                };
            }
        };

        let outbox_id = row.id;
        match outbox::attempt_delivery(&self.db, self.channel.as_ref(), row).await {
            Ok(()) => {
                info!(%outbox_id, "notification delivered");
                DispatchOutcome::Delivered { outbox_id }
            }
            Err(e) => {
                metrics::counter!("warehouse.notifications.failed", 1);
                warn!(%outbox_id, error = %e, "notification deferred to outbox worker");
                DispatchOutcome::Deferred {
                    outbox_id,
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_serialize_with_type_tag() {
        let msg = OutboundMessage::Shipment {
            order_line_ref: "SO-1-3".into(),
            status: ShipmentStatus::ReadyForShipment,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "shipment");
        assert_eq!(json["status"], "ready-for-shipment");
        assert_eq!(msg.message_type(), "shipment");
    }

    #[test]
    fn raw_items_omit_missing_quality_attributes() {
        let item = RawMaterialItem {
            task_id: 1,
            material_id: 2,
            category: MaterialCategory::Packaging,
            quantity: 40,
            ink_density: None,
            viscosity: None,
            color_delta: None,
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("viscosity"));
        assert!(json.contains("\"category\":\"packaging\""));
    }
}
