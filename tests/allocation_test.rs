mod common;

use assert_matches::assert_matches;
use common::{withdrawal, TestApp};
use printshop_warehouse::entities::{Requester, TaskDirection, TaskStatus};
use printshop_warehouse::errors::ServiceError;
use printshop_warehouse::locks::MaterialLocks;
use printshop_warehouse::services::allocation::AllocationEngine;
use printshop_warehouse::services::put_away::{PutAwayRequest, PutAwayService};
use printshop_warehouse::services::reservation;

#[tokio::test]
async fn splits_demand_across_lots_oldest_intake_first() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    let a = app.stock_lot(shirt.id, 5).await;
    let b = app.stock_lot(shirt.id, 10).await;

    let tasks = app
        .withdraw(shirt.id, 12, Requester::Production, None)
        .await
        .unwrap();

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].stock_lot_id, Some(a.id));
    assert_eq!(tasks[0].quantity, 5);
    assert_eq!(tasks[1].stock_lot_id, Some(b.id));
    assert_eq!(tasks[1].quantity, 7);
    for t in &tasks {
        assert_eq!(t.status, TaskStatus::Requested);
        assert_eq!(t.direction, TaskDirection::Withdrawal);
        assert_eq!(t.requester, Requester::Production);
    }

    // allocation reserves, it does not move stock
    assert_eq!(app.lot(a.id).await.unwrap().quantity, 5);
    assert_eq!(app.lot(b.id).await.unwrap().quantity, 10);

    let free = reservation::free_lots(app.db(), shirt.id, None).await.unwrap();
    assert_eq!(free[0].free, 0);
    assert_eq!(free[1].free, 3);
}

#[tokio::test]
async fn rejects_demand_above_free_stock_without_side_effects() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    app.stock_lot(shirt.id, 5).await;
    let b = app.stock_lot(shirt.id, 10).await;

    app.services()
        .allocation
        .allocate_from_lot(b.id, 4, Requester::SalesAndShipping, Some("SO-9-1".into()))
        .await
        .unwrap();

    let err = app
        .withdraw(shirt.id, 12, Requester::Production, None)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientStock {
            requested: 12,
            available: 11,
            ..
        }
    );

    let open = app.services().lifecycle.open_tasks(None).await.unwrap();
    assert_eq!(open.len(), 1, "only the earlier reservation exists");
}

#[tokio::test]
async fn fully_reserved_lots_get_no_task() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    let a = app.stock_lot(shirt.id, 5).await;
    let b = app.stock_lot(shirt.id, 10).await;

    app.withdraw(shirt.id, 5, Requester::Production, None)
        .await
        .unwrap();
    let tasks = app
        .withdraw(shirt.id, 3, Requester::Production, None)
        .await
        .unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].stock_lot_id, Some(b.id));
    assert_ne!(tasks[0].stock_lot_id, Some(a.id));
}

#[tokio::test]
async fn unknown_material_is_not_found() {
    let app = TestApp::new().await;
    let err = app
        .withdraw(4242, 1, Requester::Production, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn non_positive_quantity_is_rejected() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    app.stock_lot(shirt.id, 5).await;

    let err = app
        .withdraw(shirt.id, 0, Requester::Production, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn batch_requests_succeed_or_fail_per_material() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    let black = app
        .material(
            printshop_warehouse::entities::WarehouseKind::RawMaterial,
            printshop_warehouse::entities::MaterialCategory::TShirt,
            "black",
            true,
        )
        .await;
    app.stock_lot(shirt.id, 5).await;
    app.stock_lot(black.id, 2).await;

    let results = app
        .services()
        .allocation
        .allocate_batch(vec![
            withdrawal(shirt.id, 4, Requester::Production, None),
            withdrawal(black.id, 3, Requester::Production, None),
        ])
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].tasks.len(), 1);
    assert!(results[0].error.is_none());
    assert!(results[1].tasks.is_empty());
    let failure = results[1].error.as_ref().unwrap();
    assert_eq!(failure.code, "insufficient_stock");
    assert_eq!(failure.available, Some(2));
}

#[tokio::test]
async fn concurrent_allocations_never_overcommit() {
    let app = TestApp::new().await;
    let shirt = app.shirt().await;
    app.stock_lot(shirt.id, 6).await;
    app.stock_lot(shirt.id, 4).await;

    let engine = app.services().allocation.clone();
    let attempts = (0..20).map(|_| {
        let engine = engine.clone();
        let material_id = shirt.id;
        tokio::spawn(async move {
            engine
                .allocate(withdrawal(material_id, 1, Requester::Production, None))
                .await
                .is_ok()
        })
    });
    let results = futures::future::join_all(attempts).await;
    let succeeded = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();

    assert_eq!(succeeded, 10, "exactly the stocked quantity can be reserved");
    let free = reservation::free_lots(app.db(), shirt.id, None).await.unwrap();
    assert!(free.iter().all(|l| l.free == 0));
    let reserved: i32 = free.iter().map(|l| l.reserved).sum();
    assert_eq!(reserved, 10);
}

#[tokio::test]
async fn unknown_materials_leave_no_lock_entries() {
    let app = TestApp::new().await;
    let locks = MaterialLocks::new();
    let engine = AllocationEngine::new(
        app.state.db.clone(),
        locks.clone(),
        app.state.event_sender.clone(),
    );
    let put_away = PutAwayService::new(
        app.state.db.clone(),
        locks.clone(),
        app.state.event_sender.clone(),
    );

    for material_id in 10_000..10_050 {
        let err = engine
            .allocate(withdrawal(material_id, 1, Requester::Production, None))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));

        let err = put_away
            .request_put_away(PutAwayRequest {
                material_id,
                quantity: 1,
                requester: Requester::Production,
                order_line_ref: None,
                quality: None,
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }
    assert!(locks.is_empty());

    let shirt = app.shirt().await;
    app.stock_lot(shirt.id, 2).await;
    engine
        .allocate(withdrawal(shirt.id, 1, Requester::Production, None))
        .await
        .unwrap();
    assert_eq!(locks.len(), 1);
}
