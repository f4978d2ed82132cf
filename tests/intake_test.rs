mod common;

use assert_matches::assert_matches;
use common::{receipt, TestApp};
use printshop_warehouse::entities::complaint::ComplaintStatus;
use printshop_warehouse::entities::inbound_delivery::DeliveryStatus;
use printshop_warehouse::entities::material_order::MaterialOrderStatus;
use printshop_warehouse::entities::quality::QualityAttributes;
use printshop_warehouse::entities::{MaterialCategory, Requester, WarehouseKind};
use printshop_warehouse::errors::ServiceError;
use printshop_warehouse::services::intake::DeliveryReceipt;
use printshop_warehouse::services::material_orders::NewMaterialOrder;
use printshop_warehouse::services::{reservation, SkipReason};
use rust_decimal_macros::dec;

fn described_receipt(color: &str, accepted: i32) -> DeliveryReceipt {
    DeliveryReceipt {
        material_id: None,
        category: Some(MaterialCategory::TShirt),
        material_type: Some("organic".into()),
        size: Some("XL".into()),
        color: Some(color.into()),
        ..receipt(0, accepted)
    }
}

#[tokio::test]
async fn delivery_is_split_into_accepted_quarantined_and_disputed() {
    let app = TestApp::new().await;
    let mut delivery = described_receipt("black", 10);
    delivery.quarantined = 3;
    delivery.disputed = 2;
    delivery.complaint_reason = Some("torn seams".into());

    let result = app
        .services()
        .intake
        .receive_delivery(delivery)
        .await
        .unwrap();

    let statuses: Vec<(DeliveryStatus, i32)> = result
        .deliveries
        .iter()
        .map(|d| (d.status, d.quantity))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (DeliveryStatus::Arrived, 10),
            (DeliveryStatus::Quarantined, 3),
            (DeliveryStatus::Disputed, 2),
        ]
    );

    let complaint = result.complaint.unwrap();
    assert_eq!(complaint.quantity, 2);
    assert_eq!(complaint.inbound_delivery_id, result.deliveries[2].id);
    assert_eq!(complaint.reason.as_deref(), Some("torn seams"));
    assert_eq!(
        app.services()
            .intake
            .list_complaints(Some(ComplaintStatus::Open))
            .await
            .unwrap()
            .len(),
        1
    );

    assert!(result.material.is_standard);
    assert_eq!(result.material.warehouse_id, WarehouseKind::RawMaterial.seeded_id());
    // nothing is stocked before put-away
    let stock = app.services().stock.total_stock(result.material.id).await.unwrap();
    assert_eq!(stock.on_hand, 0);
}

#[tokio::test]
async fn materials_and_qualities_are_reused_by_identity() {
    let app = TestApp::new().await;
    let quality = QualityAttributes {
        absorbency: Some(dec!(0.7)),
        whiteness: Some(dec!(92)),
        ..QualityAttributes::default()
    };

    let mut first = described_receipt("white", 4);
    first.quality = Some(quality.clone());
    let mut second = described_receipt("white", 6);
    second.quality = Some(quality);
    let mut third = described_receipt("grey", 1);
    third.quality = Some(QualityAttributes {
        absorbency: Some(dec!(0.6)),
        ..QualityAttributes::default()
    });

    let intake = &app.services().intake;
    let a = intake.receive_delivery(first).await.unwrap();
    let b = intake.receive_delivery(second).await.unwrap();
    let c = intake.receive_delivery(third).await.unwrap();

    assert_eq!(a.material.id, b.material.id);
    assert_ne!(a.material.id, c.material.id);
    let (qa, qb, qc) = (a.quality.unwrap(), b.quality.unwrap(), c.quality.unwrap());
    assert_eq!(qa.id, qb.id);
    assert_ne!(qa.id, qc.id);
}

#[tokio::test]
async fn quarantined_stock_is_not_allocatable_until_released() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    let mut delivery = receipt(shirt.id, 0);
    delivery.quarantined = 5;
    let result = app
        .services()
        .intake
        .receive_delivery(delivery)
        .await
        .unwrap();
    let delivery_id = result.deliveries[0].id;

    let intake = &app.services().intake;
    let blocked = intake.put_away_deliveries(vec![delivery_id]).await;
    assert!(blocked.completed.is_empty());
    assert_eq!(blocked.skipped[0].reason, SkipReason::InvalidTransition);
    let err = app
        .withdraw(shirt.id, 1, Requester::Production, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock { available: 0, .. });

    let released = intake.release_deliveries(vec![delivery_id]).await;
    assert_eq!(released.completed, vec![delivery_id]);
    let stored = intake.put_away_deliveries(vec![delivery_id]).await;
    assert_eq!(stored.completed, vec![delivery_id]);

    let tasks = app
        .withdraw(shirt.id, 5, Requester::Production, None)
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
}

#[tokio::test]
async fn arrived_deliveries_can_be_locked_but_not_twice() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    let result = app
        .services()
        .intake
        .receive_delivery(receipt(shirt.id, 3))
        .await
        .unwrap();
    let id = result.deliveries[0].id;

    let intake = &app.services().intake;
    assert_eq!(intake.lock_deliveries(vec![id]).await.completed, vec![id]);
    let again = intake.lock_deliveries(vec![id, 777]).await;
    assert!(again.completed.is_empty());
    assert_eq!(again.skipped[0].reason, SkipReason::InvalidTransition);
    assert_eq!(again.skipped[1].reason, SkipReason::NotFound);

    let quarantined = intake
        .list_deliveries(Some(DeliveryStatus::Quarantined))
        .await
        .unwrap();
    assert_eq!(quarantined.len(), 1);
}

#[tokio::test]
async fn put_away_order_defines_fifo_position() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    let intake = &app.services().intake;
    let older = intake.receive_delivery(receipt(shirt.id, 4)).await.unwrap();
    let newer = intake.receive_delivery(receipt(shirt.id, 4)).await.unwrap();
    let (older_id, newer_id) = (older.deliveries[0].id, newer.deliveries[0].id);

    // stored in reverse order, still consumed oldest intake first
    intake.put_away_deliveries(vec![newer_id]).await;
    intake.put_away_deliveries(vec![older_id]).await;

    let lots = reservation::free_lots(app.db(), shirt.id, None).await.unwrap();
    assert_eq!(lots[0].intake_id, Some(older_id));
    assert_eq!(lots[1].intake_id, Some(newer_id));

    let tasks = app
        .withdraw(shirt.id, 2, Requester::Production, None)
        .await
        .unwrap();
    assert_eq!(tasks[0].stock_lot_id, Some(lots[0].lot_id));

    let again = intake.put_away_deliveries(vec![older_id]).await;
    assert_eq!(again.skipped[0].reason, SkipReason::InvalidTransition);
}

#[tokio::test]
async fn delivery_settles_its_submitted_material_order() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    let orders = &app.services().material_orders;
    let order = orders
        .create(NewMaterialOrder {
            supplier_id: 3,
            material_id: shirt.id,
            quantity: 50,
        })
        .await
        .unwrap();
    assert_eq!(order.status, MaterialOrderStatus::Open);
    assert_eq!(orders.submit(vec![order.id]).await.completed, vec![order.id]);

    let mut delivery = receipt(shirt.id, 50);
    delivery.material_order_id = Some(order.id);
    app.services()
        .intake
        .receive_delivery(delivery)
        .await
        .unwrap();

    let completed = orders
        .list(Some(MaterialOrderStatus::Completed))
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, order.id);
}

#[tokio::test]
async fn empty_or_unidentified_deliveries_are_rejected() {
    let app = TestApp::new().await;
    let intake = &app.services().intake;

    let shirt = app.shirt().await;
    let err = intake.receive_delivery(receipt(shirt.id, 0)).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let mut anonymous = receipt(0, 3);
    anonymous.material_id = None;
    let err = intake.receive_delivery(anonymous).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}
