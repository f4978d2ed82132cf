use super::{FulfillmentChannel, ProductionItem, RawMaterialItem, ShipmentStatus};
use crate::config::NotificationConfig;
use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::Serialize;
use reqwest::Url;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Talks to the Production and Sales-and-Shipping services over HTTP with a
/// short in-call retry; longer outages are covered by the outbox worker.
#[derive(Clone, Debug)]
pub struct HttpFulfillmentChannel {
    client: reqwest::Client,
    production_url: String,
    sales_url: Url,
    timeout: Duration,
    max_retries: u32,
    base_backoff: Duration,
}

#[derive(Serialize)]
struct ItemsBody<'a, T> {
    items: &'a [T],
}

#[derive(Serialize)]
struct ShipmentBody {
    status: ShipmentStatus,
}

impl HttpFulfillmentChannel {
    pub fn new(config: &NotificationConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;
        let sales_url = Url::parse(&config.sales_url).map_err(|e| {
            ServiceError::ValidationError(format!("sales_url {}: {}", config.sales_url, e))
        })?;
        if sales_url.cannot_be_a_base() {
            return Err(ServiceError::ValidationError(format!(
                "sales_url {} cannot carry a path",
                config.sales_url
            )));
        }

        Ok(Self {
            client,
            production_url: config.production_url.trim_end_matches('/').to_string(),
            sales_url,
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries.max(1),
            base_backoff: Duration::from_millis(500),
        })
    }

    pub fn with_base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    /// `{sales_url}/order-lines/{ref}` with the reference percent-encoded as a
    /// single path segment.
    fn order_line_url(&self, order_line_ref: &str) -> Url {
        let mut url = self.sales_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("order-lines").push(order_line_ref);
        }
        url
    }

    #[instrument(skip(self, body))]
    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: &B,
    ) -> Result<(), ServiceError> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            match self
                .client
                .request(method.clone(), url)
                .json(body)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    info!(%url, attempt, "notification accepted");
                    return Ok(());
                }
                Ok(response) => {
                    last_error = format!("{} responded {}", url, response.status());
                    // a 4xx will not get better by asking again
                    if response.status().is_client_error() {
                        break;
                    }
                    warn!(
                        "Notification rejected with status {} (attempt {}/{})",
                        response.status(),
                        attempt,
                        self.max_retries
                    );
                }
                Err(e) => {
                    last_error = format!("{}: {}", url, e);
                    warn!(
                        "Notification delivery error: {} (attempt {}/{})",
                        e, attempt, self.max_retries
                    );
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(self.base_backoff * 2_u32.pow(attempt - 1)).await;
            }
        }

        error!(%url, "notification delivery failed: {}", last_error);
        Err(ServiceError::NotificationFailure(last_error))
    }
}

#[async_trait]
impl FulfillmentChannel for HttpFulfillmentChannel {
    async fn notify_production(&self, items: &[ProductionItem]) -> Result<(), ServiceError> {
        let url = format!("{}/materials/ready", self.production_url);
        self.send_json(reqwest::Method::POST, &url, &ItemsBody { items })
            .await
    }

    async fn notify_production_raw_material(
        &self,
        items: &[RawMaterialItem],
    ) -> Result<(), ServiceError> {
        let url = format!("{}/raw-materials/ready", self.production_url);
        self.send_json(reqwest::Method::POST, &url, &ItemsBody { items })
            .await
    }

    async fn notify_shipment(
        &self,
        order_line_ref: &str,
        status: ShipmentStatus,
    ) -> Result<(), ServiceError> {
        let url = self.order_line_url(order_line_ref);
        self.send_json(reqwest::Method::PATCH, url.as_str(), &ShipmentBody { status })
            .await
    }

    /// Every attempt timing out plus the sleeps between them.
    fn delivery_budget(&self) -> Duration {
        let mut budget = self.timeout.saturating_mul(self.max_retries);
        for attempt in 1..self.max_retries {
            budget = budget.saturating_add(self.base_backoff.saturating_mul(2_u32.pow(attempt - 1)));
        }
        budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(max_retries: u32) -> HttpFulfillmentChannel {
        let config = NotificationConfig {
            sales_url: "http://verkauf:3000/api/".to_string(),
            timeout_secs: 10,
            max_retries,
            ..NotificationConfig::default()
        };
        HttpFulfillmentChannel::new(&config).unwrap()
    }

    #[test]
    fn order_line_reference_stays_one_segment() {
        let url = channel(1).order_line_url("SO-1/2?x#y");
        assert_eq!(
            url.as_str(),
            "http://verkauf:3000/api/order-lines/SO-1%2F2%3Fx%23y"
        );
    }

    #[test]
    fn budget_covers_timeouts_and_backoff() {
        // 3 x 10s plus 0.5s and 1s between attempts
        assert_eq!(channel(3).delivery_budget(), Duration::from_millis(31_500));
        assert_eq!(channel(1).delivery_budget(), Duration::from_secs(10));
    }

    #[test]
    fn unparsable_sales_url_is_rejected() {
        let config = NotificationConfig {
            sales_url: "not a url".to_string(),
            ..NotificationConfig::default()
        };
        assert!(matches!(
            HttpFulfillmentChannel::new(&config),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
