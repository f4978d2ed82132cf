use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_PRODUCTION_URL: &str = "http://produktion:3000/api";
const DEFAULT_SALES_URL: &str = "http://verkaufundversand:3000/api";
const DEFAULT_NOTIFICATION_TIMEOUT_SECS: u64 = 10;
const DEFAULT_NOTIFICATION_MAX_RETRIES: u32 = 3;
const DEFAULT_WORKER_INTERVAL_SECS: u64 = 5;

/// Endpoints and retry policy for the Production and Sales-and-Shipping systems.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct NotificationConfig {
    /// Base URL of the Production system
    #[validate(length(min = 1))]
    #[serde(default = "default_production_url")]
    pub production_url: String,

    /// Base URL of the Sales-and-Shipping system
    #[validate(length(min = 1))]
    #[serde(default = "default_sales_url")]
    pub sales_url: String,

    /// Per-request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_notification_timeout_secs")]
    pub timeout_secs: u64,

    /// In-call retries before a message is left to the outbox worker
    #[validate(range(max = 10))]
    #[serde(default = "default_notification_max_retries")]
    pub max_retries: u32,

    /// Poll interval of the outbox worker
    #[validate(range(min = 1))]
    #[serde(default = "default_worker_interval_secs")]
    pub worker_interval_secs: u64,

    /// Run the outbox worker in this process
    #[serde(default = "default_true_bool")]
    pub worker_enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            production_url: default_production_url(),
            sales_url: default_sales_url(),
            timeout_secs: default_notification_timeout_secs(),
            max_retries: default_notification_max_retries(),
            worker_interval_secs: default_worker_interval_secs(),
            worker_enabled: true,
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    #[validate(custom = "validate_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1, max = 100000))]
    pub event_channel_capacity: usize,

    #[serde(default)]
    #[validate]
    pub notifications: NotificationConfig,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_production_url() -> String {
    DEFAULT_PRODUCTION_URL.to_string()
}

fn default_sales_url() -> String {
    DEFAULT_SALES_URL.to_string()
}

fn default_notification_timeout_secs() -> u64 {
    DEFAULT_NOTIFICATION_TIMEOUT_SECS
}

fn default_notification_max_retries() -> u32 {
    DEFAULT_NOTIFICATION_MAX_RETRIES
}

fn default_worker_interval_secs() -> u64 {
    DEFAULT_WORKER_INTERVAL_SECS
}

fn default_true_bool() -> bool {
    true
}

fn validate_port(port: u16) -> Result<(), ValidationError> {
    if port < 1024 {
        let mut err = ValidationError::new("port");
        err.message = Some("port must be between 1024 and 65535".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("printshop_warehouse={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::try_new(&filter_directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    if let Err(e) = result {
        eprintln!("tracing already initialized: {}", e);
    }
}

/// Loads configuration from defaults, `config/` files and `APP__*` environment variables.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://warehouse.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("auto_migrate", true)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
