use std::path::Path;

use log::*;
use marketplace_tools::ShopCredentials;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use stockbridge_common::{Cents, Platform};

use crate::{db_types::CatalogEntry, InventoryManagement, ReconciliationDatabase, ShopTokenManagement, SqliteDatabase};

pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await;
}

pub fn random_db_path() -> String {
    format!("sqlite://../data/test_store_{}", rand::random::<u64>())
}

pub async fn run_migrations(url: &str) {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().unwrap();
    if let Err(e) = Sqlite::drop_database(p).await {
        warn!("Error dropping database {p}: {e:?}");
    }
    Sqlite::create_database(p).await.expect("Error creating database");
    info!("Created Sqlite database {p}");
}

/// A fresh, migrated database with credentials for every platform.
pub async fn fresh_database() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    for platform in Platform::ALL {
        db.save_credentials(&test_credentials(platform)).await.expect("Error saving credentials");
    }
    db
}

pub async fn tear_down(mut db: SqliteDatabase) {
    let url = db.url().to_string();
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Failed to drop database {url}: {e}");
    }
}

pub fn test_credentials(platform: Platform) -> ShopCredentials {
    ShopCredentials::new(platform, "test-app-key", "test-app-secret")
        .with_tokens("test-access-token", "test-refresh-token")
        .with_shop_id("100200")
        .with_partner_id("300400")
        .with_shop_cipher("test-cipher")
}

/// Stores a catalog entry with the given quantity and unit cost in cents.
pub async fn seed_catalog_entry(db: &SqliteDatabase, sku: &str, quantity: i64, cost: i64) -> CatalogEntry {
    let entry = CatalogEntry {
        sku: sku.to_string(),
        product_name: format!("Product {sku}"),
        cost_of_goods: Cents::from(cost),
        total_quantity: quantity,
        old_quantity: quantity,
        version: 0,
    };
    db.save_catalog_entry(&entry).await.expect("Error saving catalog entry")
}
