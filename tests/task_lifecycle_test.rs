mod common;

use common::TestApp;
use printshop_warehouse::entities::{
    MaterialCategory, Requester, TaskDirection, TaskStatus, WarehouseKind,
};
use printshop_warehouse::notifications::{OutboundMessage, ShipmentStatus};
use printshop_warehouse::services::put_away::PutAwayRequest;
use printshop_warehouse::services::{stock_ledger, SkipReason};

#[tokio::test]
async fn completing_withdrawals_moves_stock_and_notifies_once() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    let a = app.stock_lot(shirt.id, 5).await;
    let b = app.stock_lot(shirt.id, 10).await;
    let tasks = app
        .withdraw(shirt.id, 12, Requester::Production, None)
        .await
        .unwrap();
    let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();

    let result = app
        .services()
        .lifecycle
        .process_batch(ids.clone(), TaskDirection::Withdrawal)
        .await;

    assert_eq!(result.outcome.completed, ids);
    assert!(result.outcome.skipped.is_empty());
    assert_eq!(app.lot(a.id).await.unwrap().quantity, 0);
    assert_eq!(app.lot(b.id).await.unwrap().quantity, 3);

    let sent = app.channel.sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        OutboundMessage::Production { items } => {
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].quantity, 12);
            assert_eq!(items[0].task_ids, ids);
        }
        other => panic!("unexpected message {:?}", other),
    }
    assert!(result.notifications.iter().all(|n| n.is_delivered()));

    for id in ids {
        let task = app.task(id).await;
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());
    }
}

#[tokio::test]
async fn completion_is_idempotent() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    let lot = app.stock_lot(shirt.id, 8).await;
    let tasks = app
        .withdraw(shirt.id, 3, Requester::Production, None)
        .await
        .unwrap();
    let id = tasks[0].id;
    let lifecycle = &app.services().lifecycle;

    let first = lifecycle.process_batch(vec![id], TaskDirection::Withdrawal).await;
    let second = lifecycle.process_batch(vec![id], TaskDirection::Withdrawal).await;

    assert_eq!(first.outcome.completed, vec![id]);
    assert!(second.outcome.completed.is_empty());
    assert_eq!(second.outcome.skipped.len(), 1);
    assert_eq!(second.outcome.skipped[0].reason, SkipReason::InvalidTransition);
    assert_eq!(app.lot(lot.id).await.unwrap().quantity, 5);
    assert_eq!(app.channel.sent().len(), 1, "no second notification");
}

#[tokio::test]
async fn drifted_lot_is_skipped_while_the_rest_completes() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    let a = app.stock_lot(shirt.id, 5).await;
    let b = app.stock_lot(shirt.id, 10).await;
    let tasks = app
        .withdraw(shirt.id, 12, Requester::Production, None)
        .await
        .unwrap();

    // someone drains lot A outside the task flow
    stock_ledger::decrement_checked(app.db(), a.id, 5).await.unwrap();

    let result = app
        .services()
        .lifecycle
        .process_batch(vec![tasks[0].id, tasks[1].id], TaskDirection::Withdrawal)
        .await;

    assert_eq!(result.outcome.completed, vec![tasks[1].id]);
    assert_eq!(result.outcome.skipped.len(), 1);
    assert_eq!(result.outcome.skipped[0].id, tasks[0].id);
    assert_eq!(result.outcome.skipped[0].reason, SkipReason::StockDrift);
    assert_eq!(app.task(tasks[0].id).await.status, TaskStatus::Requested);
    assert_eq!(app.lot(a.id).await.unwrap().quantity, 0);
    assert_eq!(app.lot(b.id).await.unwrap().quantity, 3);
}

#[tokio::test]
async fn unknown_and_mismatched_tasks_are_reported() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    app.stock_lot(shirt.id, 5).await;
    let tasks = app
        .withdraw(shirt.id, 2, Requester::Production, None)
        .await
        .unwrap();

    let result = app
        .services()
        .lifecycle
        .process_batch(vec![999, tasks[0].id], TaskDirection::PutAway)
        .await;

    assert!(result.outcome.completed.is_empty());
    assert_eq!(result.outcome.skipped[0].reason, SkipReason::NotFound);
    assert_eq!(result.outcome.skipped[1].reason, SkipReason::InvalidTransition);
    assert!(app.channel.sent().is_empty());
}

#[tokio::test]
async fn sales_withdrawals_notify_per_order_line_and_can_be_picked_up() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    app.stock_lot(shirt.id, 10).await;
    let first = app
        .withdraw(shirt.id, 2, Requester::SalesAndShipping, Some("SO-1-1"))
        .await
        .unwrap();
    let second = app
        .withdraw(shirt.id, 3, Requester::SalesAndShipping, Some("SO-1-2"))
        .await
        .unwrap();
    let ids = vec![first[0].id, second[0].id];

    let lifecycle = &app.services().lifecycle;
    lifecycle
        .process_batch(ids.clone(), TaskDirection::Withdrawal)
        .await;
    assert_eq!(
        app.channel.shipments(),
        vec![
            ("SO-1-1".to_string(), ShipmentStatus::ReadyForShipment),
            ("SO-1-2".to_string(), ShipmentStatus::ReadyForShipment),
        ]
    );

    let picked = lifecycle.mark_ready_for_pickup(ids.clone()).await;
    assert_eq!(picked.outcome.completed, ids);
    assert_eq!(app.task(ids[0]).await.status, TaskStatus::ReadyForPickup);
    assert_eq!(app.channel.shipments().len(), 4);

    let history = lifecycle
        .task_history(Some(Requester::SalesAndShipping), 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn only_completed_sales_withdrawals_become_ready_for_pickup() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    app.stock_lot(shirt.id, 10).await;
    let production = app
        .withdraw(shirt.id, 1, Requester::Production, None)
        .await
        .unwrap();
    let pending_sale = app
        .withdraw(shirt.id, 1, Requester::SalesAndShipping, Some("SO-2-1"))
        .await
        .unwrap();

    let lifecycle = &app.services().lifecycle;
    lifecycle
        .process_batch(vec![production[0].id], TaskDirection::Withdrawal)
        .await;
    let result = lifecycle
        .mark_ready_for_pickup(vec![production[0].id, pending_sale[0].id])
        .await;

    assert!(result.outcome.completed.is_empty());
    assert_eq!(result.outcome.skipped.len(), 2);
    assert!(result
        .outcome
        .skipped
        .iter()
        .all(|s| s.reason == SkipReason::InvalidTransition));
}

#[tokio::test]
async fn put_away_completion_increments_the_lot() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    let lot = app.stock_lot(shirt.id, 4).await;

    let task = app
        .services()
        .put_away
        .request_put_away(PutAwayRequest {
            material_id: shirt.id,
            quantity: 6,
            requester: Requester::Production,
            order_line_ref: None,
            quality: None,
        })
        .await
        .unwrap();
    assert_eq!(task.stock_lot_id, Some(lot.id));
    assert_eq!(app.lot(lot.id).await.unwrap().quantity, 4);

    let result = app
        .services()
        .lifecycle
        .process_batch(vec![task.id], TaskDirection::PutAway)
        .await;

    assert_eq!(result.outcome.completed, vec![task.id]);
    assert_eq!(app.lot(lot.id).await.unwrap().quantity, 10);
    assert!(result.notifications.is_empty());
    assert!(app.channel.sent().is_empty());
}

#[tokio::test]
async fn finished_goods_delivery_opens_a_lot_for_a_custom_material() {
    let app = TestApp::new().await;

    let task = app
        .services()
        .put_away
        .deliver_finished_goods(
            serde_json::from_value(serde_json::json!({
                "category": "t-shirt",
                "material_type": "organic",
                "size": "L",
                "color": "red",
                "artwork_url": "https://print.example/art/42.png",
                "quantity": 3,
                "order_line_ref": "SO-7-1"
            }))
            .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(task.direction, TaskDirection::PutAway);
    assert_eq!(task.warehouse_id, WarehouseKind::FinishedGoods.seeded_id());
    let material = printshop_warehouse::services::catalog::get_material(app.db(), task.material_id)
        .await
        .unwrap();
    assert!(!material.is_standard);
    assert_eq!(material.category, MaterialCategory::TShirt);

    app.services()
        .lifecycle
        .process_batch(vec![task.id], TaskDirection::PutAway)
        .await;
    let stock = app.services().stock.total_stock(material.id).await.unwrap();
    assert_eq!(stock.on_hand, 3);
    assert_eq!(stock.free, 3);
}

#[tokio::test]
async fn open_tasks_filter_by_requester() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    app.stock_lot(shirt.id, 10).await;
    app.withdraw(shirt.id, 1, Requester::Production, None)
        .await
        .unwrap();
    app.withdraw(shirt.id, 1, Requester::SalesAndShipping, Some("SO-3-1"))
        .await
        .unwrap();

    let lifecycle = &app.services().lifecycle;
    assert_eq!(lifecycle.open_tasks(None).await.unwrap().len(), 2);
    let sales = lifecycle
        .open_tasks(Some(Requester::SalesAndShipping))
        .await
        .unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].order_line_ref.as_deref(), Some("SO-3-1"));
}
