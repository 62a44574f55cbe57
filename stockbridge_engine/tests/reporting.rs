use chrono::{Days, Duration, Utc};
use stockbridge_common::Platform;
use stockbridge_engine::{
    db_types::MovementTable,
    events::EventProducers,
    test_utils::{
        fake_marketplace::vendor_order,
        prepare_env::{fresh_database, seed_catalog_entry, tear_down},
    },
    traits::DateRange,
    EngineConfig,
    OrderIntakeApi,
    ReportingApi,
};

#[tokio::test]
async fn orders_and_movements_by_day() {
    let db = fresh_database().await;
    seed_catalog_entry(&db, "A", 10, 200).await;
    let intake = OrderIntakeApi::new(db.clone(), EventProducers::default(), EngineConfig::default());
    let api = ReportingApi::new(db.clone());

    let mut older = vendor_order("TT1", "AWAITING_SHIPMENT", &[("A", 1)]);
    older.created_at = Utc::now() - Duration::minutes(5);
    intake.intake_order(Platform::Tiktok, &older).await.unwrap();
    intake.intake_order(Platform::Shopee, &vendor_order("SP1", "READY_TO_SHIP", &[("A", 2)])).await.unwrap();

    let today = Utc::now().date_naive();
    let range = DateRange::whole_days(today, today).unwrap();
    let orders = api.orders(None, range).await.unwrap();
    let ids = orders.iter().map(|o| o.order_id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["TT1", "SP1"]);
    assert_eq!(api.orders(Some(Platform::Lazada), range).await.unwrap().len(), 0);

    let rows = api.movements(MovementTable::PendingOut, Some(Platform::Shopee), range).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(api.movements(MovementTable::PendingOut, None, range).await.unwrap().len(), 3);
    assert!(api.movements(MovementTable::CompletedOut, None, range).await.unwrap().is_empty());

    let last_week = today.checked_sub_days(Days::new(7)).unwrap();
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap();
    let past = DateRange::whole_days(last_week, yesterday).unwrap();
    assert!(api.orders(None, past).await.unwrap().is_empty());
    assert!(DateRange::whole_days(today, yesterday).is_none());

    api.ping().await.unwrap();
    tear_down(db).await;
}
