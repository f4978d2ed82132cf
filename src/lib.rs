//! Print shop warehouse library
//!
//! Stock reservation and fulfillment for a shirt printing shop: FIFO lot
//! allocation, the task lifecycle, goods intake and outbound notifications to
//! the Production and Sales-and-Shipping systems.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod locks;
pub mod migrator;
pub mod notifications;
pub mod openapi;
pub mod services;

use axum::Router;
use notifications::{FulfillmentChannel, HttpFulfillmentChannel};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
        channel: Arc<dyn FulfillmentChannel>,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), event_sender.clone(), channel);
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }

    /// State wired to the real Production and Sales-and-Shipping endpoints.
    pub fn with_http_channel(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Result<Self, errors::ServiceError> {
        let channel: Arc<dyn FulfillmentChannel> =
            Arc::new(HttpFulfillmentChannel::new(&config.notifications)?);
        Ok(Self::new(db, config, event_sender, channel))
    }
}

pub fn api_v1_routes() -> Router<AppState> {
    handlers::api_routes()
}

/// Full application router: versioned API, health probes and API docs.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes())
        .merge(handlers::health::router())
        .merge(openapi::swagger_ui())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
