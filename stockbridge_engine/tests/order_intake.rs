use chrono::{Duration, Utc};
use stockbridge_common::Platform;
use stockbridge_engine::{
    db_types::{MovementTable, STATUS_CANCELLED, STATUS_RTS},
    events::EventProducers,
    test_utils::{
        fake_marketplace::{vendor_order, FakeMarketplace},
        prepare_env::{fresh_database, seed_catalog_entry, tear_down},
    },
    EngineConfig,
    ErrorCode,
    IntakeOutcome,
    InventoryManagement,
    OrderIntakeApi,
    OrderManagement,
    SqliteDatabase,
    StatusNotification,
};

async fn setup() -> (SqliteDatabase, OrderIntakeApi<SqliteDatabase>) {
    let db = fresh_database().await;
    seed_catalog_entry(&db, "A", 5, 200).await;
    seed_catalog_entry(&db, "B", 5, 300).await;
    db.save_bundle("BUNDLE1", &["A".to_string(), "B".to_string()]).await.unwrap();
    let api = OrderIntakeApi::new(db.clone(), EventProducers::default(), EngineConfig::default());
    (db, api)
}

async fn quantity(db: &SqliteDatabase, sku: &str) -> i64 {
    db.fetch_catalog_entries(&[sku.to_string()]).await.unwrap()[0].total_quantity
}

async fn tables(db: &SqliteDatabase, platform: Platform, order_id: &str) -> Vec<MovementTable> {
    db.fetch_movements_for_order(platform, order_id).await.unwrap().into_iter().map(|m| m.table).collect()
}

#[tokio::test]
async fn pending_webhook_records_a_bundle_order() {
    let (db, api) = setup().await;
    let lazada = FakeMarketplace::new(Platform::Lazada);
    lazada.add_order(vendor_order("LZD1", "pending", &[("BUNDLE1", 1)]));

    let outcome = api.handle_status_event(&lazada, StatusNotification::new(Platform::Lazada, "LZD1", "pending")).await.unwrap();
    assert_eq!(outcome, IntakeOutcome::Recorded { order_id: "LZD1".into(), movements: 2, missing_skus: vec![] });

    let order = db.fetch_order(Platform::Lazada, "LZD1").await.unwrap().unwrap();
    assert_eq!(order.status, "pending");
    assert_eq!(order.total_cost.value(), 500);
    let rows = db.fetch_movements_for_order(Platform::Lazada, "LZD1").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|m| m.table == MovementTable::PendingOut));
    let ids = rows.iter().map(|m| m.row.id.as_str()).collect::<Vec<_>>();
    assert!(ids.contains(&"LAZADA_LZD1_1") && ids.contains(&"LAZADA_LZD1_2"));
    assert!(rows.iter().all(|m| m.row.lazada && !m.row.shopee && !m.row.tiktok));
    assert_eq!(quantity(&db, "A").await, 4);
    assert_eq!(quantity(&db, "B").await, 4);
    tear_down(db).await;
}

#[tokio::test]
async fn replayed_webhooks_are_idempotent() {
    let (db, api) = setup().await;
    let lazada = FakeMarketplace::new(Platform::Lazada);
    lazada.add_order(vendor_order("LZD2", "pending", &[("A", 2)]));
    let event = StatusNotification::new(Platform::Lazada, "LZD2", "pending");

    api.handle_status_event(&lazada, event.clone()).await.unwrap();
    let replay = api.handle_status_event(&lazada, event).await.unwrap();
    assert!(matches!(replay, IntakeOutcome::Ignored { .. }));
    // A poll that sees the same order later must not record it again either
    let summary = api.poll_pending_orders(&lazada, Utc::now()).await.unwrap();
    assert_eq!(summary.listed, 1);
    assert_eq!(summary.already_recorded, 1);
    assert_eq!(summary.recorded, 0);

    assert_eq!(db.fetch_movements_for_order(Platform::Lazada, "LZD2").await.unwrap().len(), 2);
    assert_eq!(quantity(&db, "A").await, 3);
    tear_down(db).await;
}

#[tokio::test]
async fn unpaid_orders_are_never_stored() {
    let (db, api) = setup().await;
    let shopee = FakeMarketplace::new(Platform::Shopee);
    shopee.add_order(vendor_order("SP1", "UNPAID", &[("A", 1)]));
    let outcome = api.handle_status_event(&shopee, StatusNotification::new(Platform::Shopee, "SP1", "UNPAID")).await.unwrap();
    assert!(matches!(outcome, IntakeOutcome::Ignored { .. }));
    assert!(db.fetch_order(Platform::Shopee, "SP1").await.unwrap().is_none());
    assert_eq!(quantity(&db, "A").await, 5);
    tear_down(db).await;
}

#[tokio::test]
async fn unknown_skus_are_reported_and_gifts_rejected() {
    let (db, api) = setup().await;
    let tiktok = FakeMarketplace::new(Platform::Tiktok);
    let order = vendor_order("TT1", "AWAITING_SHIPMENT", &[("A", 1), ("GHOST", 1)]);
    let outcome = api.intake_order(Platform::Tiktok, &order).await.unwrap();
    assert_eq!(outcome, IntakeOutcome::Recorded {
        order_id: "TT1".into(),
        movements: 1,
        missing_skus: vec!["GHOST".into()]
    });

    let all_missing = vendor_order("TT2", "AWAITING_SHIPMENT", &[("GHOST", 3)]);
    let err = api.intake_order(Platform::Tiktok, &all_missing).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::CatalogMismatch);
    assert!(db.fetch_order(Platform::Tiktok, "TT2").await.unwrap().is_none());

    let mut gift = vendor_order("TT3", "AWAITING_SHIPMENT", &[("A", 1)]);
    gift.is_gift = true;
    tiktok.add_order(gift);
    let ev = StatusNotification::new(Platform::Tiktok, "TT3", "AWAITING_SHIPMENT");
    let err = api.handle_status_event(&tiktok, ev.clone()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert!(db.fetch_order(Platform::Tiktok, "TT3").await.unwrap().is_none());
    // The failed delivery released its claim, so the vendor's retry is processed again
    let err = api.handle_status_event(&tiktok, ev).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    tear_down(db).await;
}

#[tokio::test]
async fn cancellation_is_sticky() {
    let (db, api) = setup().await;
    let shopee = FakeMarketplace::new(Platform::Shopee);
    shopee.add_order(vendor_order("SP2", "READY_TO_SHIP", &[("A", 2)]));
    api.handle_status_event(&shopee, StatusNotification::new(Platform::Shopee, "SP2", "READY_TO_SHIP")).await.unwrap();
    assert_eq!(quantity(&db, "A").await, 3);

    shopee.set_status("SP2", "CANCELLED", Some("Out of stock"));
    let outcome = api.handle_status_event(&shopee, StatusNotification::new(Platform::Shopee, "SP2", "CANCELLED")).await.unwrap();
    assert!(matches!(outcome, IntakeOutcome::Transitioned { ref status, moved_rows: 2, .. } if status == STATUS_CANCELLED));
    assert_eq!(tables(&db, Platform::Shopee, "SP2").await, vec![MovementTable::CancelledOut; 2]);
    assert_eq!(quantity(&db, "A").await, 5);

    // A later status can neither move the rows again nor revive the order
    let order = db.fetch_order(Platform::Shopee, "SP2").await.unwrap().unwrap();
    let outcome =
        api.apply_status(order.clone(), stockbridge_engine::StatusKind::Cancelled, "CANCELLED").await.unwrap();
    assert!(matches!(outcome, IntakeOutcome::Ignored { .. }));
    let outcome = api.apply_status(order, stockbridge_engine::StatusKind::Delivered, "COMPLETED").await.unwrap();
    assert!(matches!(outcome, IntakeOutcome::Ignored { .. }));
    assert_eq!(tables(&db, Platform::Shopee, "SP2").await, vec![MovementTable::CancelledOut; 2]);
    assert_eq!(quantity(&db, "A").await, 5);
    assert_eq!(db.fetch_order(Platform::Shopee, "SP2").await.unwrap().unwrap().status, STATUS_CANCELLED);
    tear_down(db).await;
}

#[tokio::test]
async fn failed_delivery_is_a_return_to_sender() {
    let (db, api) = setup().await;
    let shopee = FakeMarketplace::new(Platform::Shopee);
    shopee.add_order(vendor_order("SP3", "READY_TO_SHIP", &[("B", 1)]));
    api.handle_status_event(&shopee, StatusNotification::new(Platform::Shopee, "SP3", "READY_TO_SHIP")).await.unwrap();

    // The webhook carries no reason, so it is looked up on the order
    shopee.set_status("SP3", "CANCELLED", Some("Failed Delivery"));
    api.handle_status_event(&shopee, StatusNotification::new(Platform::Shopee, "SP3", "CANCELLED")).await.unwrap();
    let order = db.fetch_order(Platform::Shopee, "SP3").await.unwrap().unwrap();
    assert_eq!(order.status, STATUS_RTS);
    assert_eq!(tables(&db, Platform::Shopee, "SP3").await, vec![MovementTable::PendingIn]);
    // Goods in transit back to the warehouse are not in stock yet
    assert_eq!(quantity(&db, "B").await, 4);

    let units = api.receive_return(Platform::Shopee, "SP3").await.unwrap();
    assert_eq!(units, 1);
    assert_eq!(tables(&db, Platform::Shopee, "SP3").await, vec![MovementTable::CompletedIn]);
    assert_eq!(quantity(&db, "B").await, 5);
    let err = api.receive_return(Platform::Shopee, "SP3").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NothingToDo);
    tear_down(db).await;
}

#[tokio::test]
async fn delivery_completes_the_outbound_rows() {
    let (db, api) = setup().await;
    let tiktok = FakeMarketplace::new(Platform::Tiktok);
    tiktok.add_order(vendor_order("TT4", "AWAITING_SHIPMENT", &[("A", 1), ("B", 1)]));
    api.handle_status_event(&tiktok, StatusNotification::new(Platform::Tiktok, "TT4", "AWAITING_SHIPMENT")).await.unwrap();
    let outcome =
        api.handle_status_event(&tiktok, StatusNotification::new(Platform::Tiktok, "TT4", "IN_TRANSIT")).await.unwrap();
    assert!(matches!(outcome, IntakeOutcome::Transitioned { moved_rows: 0, .. }));
    let outcome =
        api.handle_status_event(&tiktok, StatusNotification::new(Platform::Tiktok, "TT4", "DELIVERED")).await.unwrap();
    assert!(matches!(outcome, IntakeOutcome::Transitioned { moved_rows: 2, .. }));
    assert_eq!(tables(&db, Platform::Tiktok, "TT4").await, vec![MovementTable::CompletedOut; 2]);
    tear_down(db).await;
}

#[tokio::test]
async fn status_refresh_catches_missed_deliveries() {
    let (db, api) = setup().await;
    let lazada = FakeMarketplace::new(Platform::Lazada);
    let mut old = vendor_order("LZD5", "pending", &[("A", 1)]);
    old.created_at = Utc::now() - Duration::days(5);
    lazada.add_order(old);
    let recent = vendor_order("LZD6", "pending", &[("B", 1)]);
    lazada.add_order(recent);
    let summary = api.poll_pending_orders(&lazada, Utc::now()).await.unwrap();
    assert_eq!(summary.recorded, 2);

    lazada.set_status("LZD5", "confirmed", None);
    lazada.set_status("LZD6", "delivered", None);
    let summary = api.refresh_statuses(&lazada, Utc::now()).await.unwrap();
    // Only the order older than three days is looked at
    assert_eq!(summary.candidates, 1);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.not_listed, 1);

    lazada.set_status("LZD5", "delivered", None);
    let summary = api.refresh_statuses(&lazada, Utc::now()).await.unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(db.fetch_order(Platform::Lazada, "LZD5").await.unwrap().unwrap().status, "delivered");
    assert_eq!(tables(&db, Platform::Lazada, "LZD5").await, vec![MovementTable::CompletedOut]);
    assert_eq!(tables(&db, Platform::Lazada, "LZD6").await, vec![MovementTable::PendingOut]);

    let err = api.refresh_statuses(&lazada, Utc::now()).await.unwrap_err();
    assert!(err.code().is_benign());
    tear_down(db).await;
}

#[tokio::test]
async fn second_intake_of_the_same_order_changes_nothing() {
    let (db, api) = setup().await;
    let order = vendor_order("LZD90", "pending", &[("A", 2), ("B", 1)]);

    let first = api.intake_order(Platform::Lazada, &order).await.unwrap();
    assert_eq!(first, IntakeOutcome::Recorded { order_id: "LZD90".into(), movements: 3, missing_skus: vec![] });
    // Both paths got past their own checks, so the insert itself has to refuse the second one
    let second = api.intake_order(Platform::Lazada, &order).await.unwrap();
    assert_eq!(second, IntakeOutcome::AlreadyRecorded { order_id: "LZD90".into() });

    let rows = db.fetch_movements_for_order(Platform::Lazada, "LZD90").await.unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|m| m.table == MovementTable::PendingOut));
    assert_eq!(quantity(&db, "A").await, 3);
    assert_eq!(quantity(&db, "B").await, 4);
    tear_down(db).await;
}
