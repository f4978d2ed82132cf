mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use rstest::rstest;
use serde_json::{json, Value};

async fn stocked_shirt(app: &TestApp, lots: &[i32]) -> i64 {
    let shirt = app.shirt().await;
    for quantity in lots {
        app.stock_lot(shirt.id, *quantity).await;
    }
    shirt.id
}

fn ids(tasks: &Value) -> Vec<i64> {
    tasks
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn health_reports_database_up() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
    assert_eq!(body["database"], "up");

    let (status, _) = app.request(Method::GET, "/health/live", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn allocate_then_complete_over_http() {
    let app = TestApp::new().await;
    let material_id = stocked_shirt(&app, &[5, 10]).await;

    let (status, tasks) = app
        .request(
            Method::POST,
            "/api/v1/allocations",
            Some(json!({
                "material_id": material_id,
                "quantity": 12,
                "requester": "production"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tasks[0]["quantity"], 5);
    assert_eq!(tasks[1]["quantity"], 7);
    assert_eq!(tasks[0]["status"], "requested");

    let (status, stock) = app
        .request(
            Method::GET,
            &format!("/api/v1/materials/{}/stock", material_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stock["on_hand"], 15);
    assert_eq!(stock["free"], 3);

    let task_ids = ids(&tasks);
    let (status, result) = app
        .request(
            Method::POST,
            "/api/v1/tasks/complete",
            Some(json!({ "task_ids": task_ids, "direction": "withdrawal" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["completed"], json!(task_ids));
    assert_eq!(result["skipped"], json!([]));
    assert_eq!(result["notifications"][0]["outcome"], "delivered");

    let (_, lots) = app
        .request(
            Method::GET,
            &format!("/api/v1/materials/{}/lots", material_id),
            None,
        )
        .await;
    let quantities: Vec<i64> = lots
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["quantity"].as_i64().unwrap())
        .collect();
    assert_eq!(quantities, vec![0, 3]);
}

#[tokio::test]
async fn insufficient_stock_is_unprocessable() {
    let app = TestApp::new().await;
    let material_id = stocked_shirt(&app, &[5]).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/allocations",
            Some(json!({
                "material_id": material_id,
                "quantity": 6,
                "requester": "sales-and-shipping",
                "order_line_ref": "SO-1-1"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "insufficient_stock");
    assert_eq!(body["error"]["status"], 422);
}

#[rstest]
#[case::zero_quantity(json!({ "material_id": 1, "quantity": 0, "requester": "production" }))]
#[case::empty_order_line(json!({ "material_id": 1, "quantity": 1, "requester": "production", "order_line_ref": "" }))]
#[tokio::test]
async fn invalid_allocations_are_bad_requests(#[case] body: Value) {
    let app = TestApp::new().await;
    let (status, response) = app
        .request(Method::POST, "/api/v1/allocations", Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"]["code"], "validation_error");
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/api/v1/tasks/404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn intake_flow_over_http() {
    let app = TestApp::new().await;

    let (status, intake) = app
        .request(
            Method::POST,
            "/api/v1/deliveries",
            Some(json!({
                "category": "t-shirt",
                "material_type": "organic",
                "size": "S",
                "color": "green",
                "accepted": 8,
                "disputed": 1,
                "complaint_reason": "wrong shade"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let material_id = intake["material"]["id"].as_i64().unwrap();
    let delivery_id = intake["deliveries"][0]["id"].as_i64().unwrap();
    assert_eq!(intake["complaint"]["quantity"], 1);

    let (status, outcome) = app
        .request(
            Method::POST,
            "/api/v1/deliveries/put-away",
            Some(json!({ "ids": [delivery_id] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["completed"], json!([delivery_id]));

    let (status, availability) = app
        .request(
            Method::POST,
            "/api/v1/raw-materials/availability",
            Some(json!([
                { "category": "t-shirt", "color": "green", "material_type": "organic", "size": "S" },
                { "category": "t-shirt", "color": "pink", "material_type": "organic", "size": "S" }
            ])),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(availability[0]["material_id"], material_id);
    assert_eq!(availability[0]["free"], 8);
    assert_eq!(availability[1]["on_hand"], 0);

    let (_, complaints) = app.request(Method::GET, "/api/v1/complaints", None).await;
    assert_eq!(complaints.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn minimum_stock_shortages_are_listed() {
    let app = TestApp::new().await;
    let material_id = stocked_shirt(&app, &[3]).await;

    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/v1/minimum-stocks/{}", material_id),
            Some(json!({ "minimum_quantity": 10 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, shortages) = app
        .request(Method::GET, "/api/v1/minimum-stocks/below", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        shortages,
        json!([{ "material_id": material_id, "on_hand": 3, "minimum_quantity": 10 }])
    );
}

#[tokio::test]
async fn outbox_is_listed_for_operators() {
    let app = TestApp::new().await;
    let material_id = stocked_shirt(&app, &[2]).await;
    let (_, tasks) = app
        .request(
            Method::POST,
            "/api/v1/allocations",
            Some(json!({
                "material_id": material_id,
                "quantity": 1,
                "requester": "sales-and-shipping",
                "order_line_ref": "SO-4-2"
            })),
        )
        .await;
    app.channel.set_failing(true);
    app.request(
        Method::POST,
        "/api/v1/tasks/complete",
        Some(json!({ "task_ids": ids(&tasks), "direction": "withdrawal" })),
    )
    .await;

    let (status, rows) = app
        .request(Method::GET, "/api/v1/outbox?status=pending", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows[0]["message_type"], "shipment");
    assert_eq!(rows[0]["attempts"], 1);

    let id = rows[0]["id"].as_str().unwrap();
    let (status, body) = app
        .request(Method::POST, &format!("/api/v1/outbox/{}/retry", id), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "invalid_transition");
}
