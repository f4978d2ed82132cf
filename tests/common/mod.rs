#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use printshop_warehouse::{
    config::{AppConfig, NotificationConfig},
    db,
    entities::{
        material::{self, MaterialIdentity},
        stock_lot, task, MaterialCategory, Requester, WarehouseKind,
    },
    errors::ServiceError,
    events,
    handlers::AppServices,
    notifications::{
        FulfillmentChannel, OutboundMessage, ProductionItem, RawMaterialItem, ShipmentStatus,
    },
    services::{
        allocation::WithdrawalRequest, catalog, intake::DeliveryReceipt, stock_ledger,
    },
    AppState,
};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::Value;
use tower::ServiceExt;

/// Fulfillment channel that records every call and can be switched to fail.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<OutboundMessage>>,
    failing: AtomicBool,
}

impl RecordingChannel {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn shipments(&self) -> Vec<(String, ShipmentStatus)> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::Shipment {
                    order_line_ref,
                    status,
                } => Some((order_line_ref, status)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, message: OutboundMessage) -> Result<(), ServiceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServiceError::NotificationFailure(
                "downstream unavailable".to_string(),
            ));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

#[async_trait]
impl FulfillmentChannel for RecordingChannel {
    async fn notify_production(&self, items: &[ProductionItem]) -> Result<(), ServiceError> {
        self.record(OutboundMessage::Production {
            items: items.to_vec(),
        })
    }

    async fn notify_production_raw_material(
        &self,
        items: &[RawMaterialItem],
    ) -> Result<(), ServiceError> {
        self.record(OutboundMessage::ProductionRawMaterial {
            items: items.to_vec(),
        })
    }

    async fn notify_shipment(
        &self,
        order_line_ref: &str,
        status: ShipmentStatus,
    ) -> Result<(), ServiceError> {
        self.record(OutboundMessage::Shipment {
            order_line_ref: order_line_ref.to_string(),
            status,
        })
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 18_080,
        environment: "test".to_string(),
        log_level: "debug".to_string(),
        log_json: false,
        auto_migrate: true,
        db_max_connections: 1,
        event_channel_capacity: 256,
        notifications: NotificationConfig {
            worker_enabled: false,
            ..NotificationConfig::default()
        },
    }
}

/// Application state over a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub channel: Arc<RecordingChannel>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let channel = Arc::new(RecordingChannel::default());
        Self::build(channel.clone(), channel).await
    }

    /// Same as `new`, but outbound calls go to `channel` instead of the recorder.
    pub async fn with_channel(channel: Arc<dyn FulfillmentChannel>) -> Self {
        Self::build(channel, Arc::new(RecordingChannel::default())).await
    }

    async fn build(channel: Arc<dyn FulfillmentChannel>, recorder: Arc<RecordingChannel>) -> Self {
        let cfg = test_config();
        let pool = db::establish_connection(&cfg.database_url)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, event_rx) = events::channel(cfg.event_channel_capacity);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender, channel);
        let router = printshop_warehouse::build_router(state.clone());

        Self {
            router,
            state,
            channel: recorder,
            _event_task: event_task,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    /// Sends a request through the full router and decodes the JSON body.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn material(
        &self,
        warehouse: WarehouseKind,
        category: MaterialCategory,
        color: &str,
        is_standard: bool,
    ) -> material::Model {
        let identity = MaterialIdentity {
            warehouse_id: warehouse.seeded_id(),
            category,
            material_type: Some("organic".to_string()),
            size: Some("M".to_string()),
            color: Some(color.to_string()),
            artwork_url: None,
        };
        catalog::find_or_create_material(self.db(), &identity, is_standard)
            .await
            .unwrap()
    }

    pub async fn shirt(&self) -> material::Model {
        self.material(
            WarehouseKind::RawMaterial,
            MaterialCategory::TShirt,
            "white",
            true,
        )
        .await
    }

    /// Receives `quantity` accepted units and puts them away, returning the new lot.
    pub async fn stock_lot(&self, material_id: i64, quantity: i32) -> stock_lot::Model {
        let intake = self
            .services()
            .intake
            .receive_delivery(receipt(material_id, quantity))
            .await
            .unwrap();
        let delivery_id = intake.deliveries[0].id;

        let outcome = self
            .services()
            .intake
            .put_away_deliveries(vec![delivery_id])
            .await;
        assert_eq!(outcome.completed, vec![delivery_id]);

        stock_ledger::lots_for_material(self.db(), material_id, None)
            .await
            .unwrap()
            .into_iter()
            .find(|lot| lot.intake_id == Some(delivery_id))
            .unwrap()
    }

    pub async fn lot(&self, lot_id: i64) -> Option<stock_lot::Model> {
        stock_lot::Entity::find_by_id(lot_id)
            .one(self.db())
            .await
            .unwrap()
    }

    pub async fn task(&self, task_id: i64) -> task::Model {
        self.services().lifecycle.get_task(task_id).await.unwrap()
    }

    pub async fn withdraw(
        &self,
        material_id: i64,
        quantity: i32,
        requester: Requester,
        order_line_ref: Option<&str>,
    ) -> Result<Vec<task::Model>, ServiceError> {
        self.services()
            .allocation
            .allocate(withdrawal(material_id, quantity, requester, order_line_ref))
            .await
    }
}

pub fn receipt(material_id: i64, accepted: i32) -> DeliveryReceipt {
    DeliveryReceipt {
        material_id: Some(material_id),
        warehouse: WarehouseKind::RawMaterial,
        category: None,
        material_type: None,
        size: None,
        color: None,
        artwork_url: None,
        material_order_id: None,
        accepted,
        quarantined: 0,
        disputed: 0,
        complaint_reason: None,
        quality: None,
        delivery_date: None,
    }
}

pub fn withdrawal(
    material_id: i64,
    quantity: i32,
    requester: Requester,
    order_line_ref: Option<&str>,
) -> WithdrawalRequest {
    WithdrawalRequest {
        material_id,
        warehouse_id: None,
        quantity,
        requester,
        order_line_ref: order_line_ref.map(str::to_string),
    }
}
