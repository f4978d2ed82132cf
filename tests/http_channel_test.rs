use std::time::Duration;

use assert_matches::assert_matches;
use printshop_warehouse::config::NotificationConfig;
use printshop_warehouse::entities::MaterialCategory;
use printshop_warehouse::errors::ServiceError;
use printshop_warehouse::notifications::{
    FulfillmentChannel, HttpFulfillmentChannel, ProductionItem, ShipmentStatus,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn channel_for(server: &MockServer, max_retries: u32) -> HttpFulfillmentChannel {
    let config = NotificationConfig {
        production_url: format!("{}/produktion", server.uri()),
        sales_url: format!("{}/verkauf/", server.uri()),
        timeout_secs: 2,
        max_retries,
        ..NotificationConfig::default()
    };
    HttpFulfillmentChannel::new(&config)
        .unwrap()
        .with_base_backoff(Duration::from_millis(1))
}

fn shirt_item() -> ProductionItem {
    ProductionItem {
        material_id: 7,
        task_ids: vec![1, 2],
        quantity: 12,
        category: MaterialCategory::TShirt,
        material_type: Some("organic".into()),
        size: Some("M".into()),
        color: Some("white".into()),
        absorbency: None,
        whiteness: None,
    }
}

#[tokio::test]
async fn production_receives_the_item_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/produktion/materials/ready"))
        .and(body_partial_json(json!({
            "items": [{ "material_id": 7, "quantity": 12, "category": "t-shirt" }]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    channel_for(&server, 3)
        .notify_production(&[shirt_item()])
        .await
        .unwrap();
}

#[tokio::test]
async fn shipment_status_is_patched_on_the_order_line() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/verkauf/order-lines/SO-12-3"))
        .and(body_partial_json(json!({ "status": "ready-for-shipment" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    channel_for(&server, 3)
        .notify_shipment("SO-12-3", ShipmentStatus::ReadyForShipment)
        .await
        .unwrap();
}

#[tokio::test]
async fn server_errors_are_retried_then_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/produktion/raw-materials/ready"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = channel_for(&server, 3)
        .notify_production_raw_material(&[])
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotificationFailure(_));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/verkauf/order-lines/SO-1-1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = channel_for(&server, 5)
        .notify_shipment("SO-1-1", ShipmentStatus::ReadyForPickup)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotificationFailure(_));
}

#[tokio::test]
async fn order_line_reference_is_sent_as_one_encoded_segment() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/verkauf/order-lines/SO-3%2F1%3Fnote"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    channel_for(&server, 1)
        .notify_shipment("SO-3/1?note", ShipmentStatus::ReadyForShipment)
        .await
        .unwrap();
}
