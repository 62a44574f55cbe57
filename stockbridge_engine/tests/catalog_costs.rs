use stockbridge_common::{Cents, Platform};
use stockbridge_engine::{
    db_types::CatalogEntry,
    events::EventProducers,
    test_utils::{
        fake_marketplace::{vendor_order, FakeMarketplace},
        prepare_env::{fresh_database, seed_catalog_entry, tear_down},
    },
    EngineConfig,
    InventoryManagement,
    OrderIntakeApi,
    SqliteDatabase,
    StatusNotification,
};

async fn entry(db: &SqliteDatabase, sku: &str) -> CatalogEntry {
    db.fetch_catalog_entries(&[sku.to_string()]).await.unwrap().remove(0)
}

#[tokio::test]
async fn cancelled_units_come_back_at_a_weighted_cost() {
    let db = fresh_database().await;
    seed_catalog_entry(&db, "A", 15, 1_000).await;
    let api = OrderIntakeApi::new(db.clone(), EventProducers::default(), EngineConfig::default());
    let lazada = FakeMarketplace::new(Platform::Lazada);
    lazada.add_order(vendor_order("LZD1", "pending", &[("A", 5)]));
    api.handle_status_event(&lazada, StatusNotification::new(Platform::Lazada, "LZD1", "pending")).await.unwrap();

    // The next delivery from the supplier was cheaper
    let mut a = entry(&db, "A").await;
    assert_eq!(a.total_quantity, 10);
    a.cost_of_goods = Cents::from(800);
    db.save_catalog_entry(&a).await.unwrap();

    api.handle_status_event(&lazada, StatusNotification::new(Platform::Lazada, "LZD1", "canceled")).await.unwrap();
    let a = entry(&db, "A").await;
    assert_eq!(a.total_quantity, 15);
    assert_eq!(a.cost_of_goods, Cents::from(867));
    assert_eq!(a.cost_of_goods.to_string(), "8.67");
    tear_down(db).await;
}

#[tokio::test]
async fn returned_units_come_back_at_a_weighted_cost() {
    let db = fresh_database().await;
    seed_catalog_entry(&db, "A", 4, 500).await;
    seed_catalog_entry(&db, "B", 4, 250).await;
    let api = OrderIntakeApi::new(db.clone(), EventProducers::default(), EngineConfig::default());
    let tiktok = FakeMarketplace::new(Platform::Tiktok);
    tiktok.add_order(vendor_order("TT1", "AWAITING_SHIPMENT", &[("A", 2), ("B", 1)]));
    api.handle_status_event(&tiktok, StatusNotification::new(Platform::Tiktok, "TT1", "AWAITING_SHIPMENT")).await.unwrap();
    let mut a = entry(&db, "A").await;
    a.cost_of_goods = Cents::from(200);
    db.save_catalog_entry(&a).await.unwrap();

    tiktok.set_status("TT1", "CANCELLED", Some("Package delivery failed"));
    api.handle_status_event(&tiktok, StatusNotification::new(Platform::Tiktok, "TT1", "CANCELLED")).await.unwrap();
    assert_eq!(entry(&db, "A").await.total_quantity, 2);
    api.receive_return(Platform::Tiktok, "TT1").await.unwrap();

    let a = entry(&db, "A").await;
    assert_eq!(a.total_quantity, 4);
    // (2 × 2.00 + 2 × 5.00) / 4
    assert_eq!(a.cost_of_goods, Cents::from(350));
    let b = entry(&db, "B").await;
    assert_eq!(b.total_quantity, 4);
    assert_eq!(b.cost_of_goods, Cents::from(250));
    tear_down(db).await;
}
