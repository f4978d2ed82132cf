pub mod allocations;
pub mod common;
pub mod health;
pub mod intake;
pub mod outbox;
pub mod procurement;
pub mod stock;
pub mod tasks;

use crate::events::EventSender;
use crate::locks::MaterialLocks;
use crate::notifications::{FulfillmentChannel, NotificationDispatcher};
use crate::services::{
    allocation::AllocationEngine, fulfillment::FulfillmentNotifier, intake::IntakeService,
    material_orders::MaterialOrderService, minimum_stock::MinimumStockService,
    put_away::PutAwayService, stock_queries::StockQueryService,
    task_lifecycle::TaskLifecycleManager,
};
use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services used by the HTTP handlers. All of them share one lock registry so
/// allocation, completion, put-away and cleanup serialize per material.
#[derive(Clone)]
pub struct AppServices {
    pub allocation: AllocationEngine,
    pub lifecycle: TaskLifecycleManager,
    pub notifier: FulfillmentNotifier,
    pub put_away: PutAwayService,
    pub intake: IntakeService,
    pub material_orders: MaterialOrderService,
    pub minimum_stock: MinimumStockService,
    pub stock: StockQueryService,
    pub dispatcher: NotificationDispatcher,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        channel: Arc<dyn FulfillmentChannel>,
    ) -> Self {
        let locks = MaterialLocks::new();
        let dispatcher = NotificationDispatcher::new(db.clone(), channel);
        let notifier = FulfillmentNotifier::new(
            db.clone(),
            locks.clone(),
            dispatcher.clone(),
            event_sender.clone(),
        );
        let minimum_stock = MinimumStockService::new(db.clone(), event_sender.clone());
        let lifecycle = TaskLifecycleManager::new(
            db.clone(),
            locks.clone(),
            notifier.clone(),
            minimum_stock.clone(),
            event_sender.clone(),
        );

        Self {
            allocation: AllocationEngine::new(db.clone(), locks.clone(), event_sender.clone()),
            lifecycle,
            notifier,
            put_away: PutAwayService::new(db.clone(), locks.clone(), event_sender.clone()),
            intake: IntakeService::new(db.clone(), locks, event_sender),
            material_orders: MaterialOrderService::new(db.clone()),
            minimum_stock,
            stock: StockQueryService::new(db),
            dispatcher,
        }
    }
}

/// Every versioned route, to be nested under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(allocations::router())
        .merge(tasks::router())
        .merge(stock::router())
        .merge(intake::router())
        .merge(procurement::router())
        .nest("/outbox", outbox::router())
}
