//! Pushes warehouse stock movements out to the marketplaces.
//!
//! Every marketplace adjusts its own stock when it sells something, but knows nothing about sales on the other two.
//! [`StockSyncApi::change_inventory`] closes that gap: it picks up movement rows whose flag for this marketplace is
//! still unset, reads the current listing stock, and writes back the adjusted absolute level. Marketplaces only
//! accept absolute levels, so pushes for one platform are serialized behind a lock.
use std::{collections::HashSet, fmt::Debug, sync::Arc};

use log::*;
use marketplace_tools::{ListingStock, MarketplaceClient, ShopCredentials, StockUpdate, StockUpdateReport};
use serde::{Deserialize, Serialize, Serializer};
use stockbridge_common::Platform;
use tokio::sync::{Mutex, MutexGuard};

use crate::{
    db_types::{MovementRow, MovementTable, StockDirection},
    recon_api::{
        config::{EngineConfig, FailedPushPolicy},
        load_credentials,
        vendor_data,
    },
    traits::{ReconciliationDatabase, ReconciliationError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuQuantity {
    pub sku: String,
    pub quantity: i64,
}

impl SkuQuantity {
    pub fn new<S: Into<String>>(sku: S, quantity: i64) -> Self {
        Self { sku: sku.into(), quantity }
    }
}

/// Sums the quantities of rows by SKU, in order of first appearance.
pub fn sku_quantities<'a, I: IntoIterator<Item = &'a MovementRow>>(rows: I) -> Vec<SkuQuantity> {
    let mut result: Vec<SkuQuantity> = Vec::new();
    for row in rows {
        match result.iter_mut().find(|q| q.sku == row.product_sku) {
            Some(q) => q.quantity += 1,
            None => result.push(SkuQuantity::new(row.product_sku.clone(), 1)),
        }
    }
    result
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockPlan {
    pub updates: Vec<StockUpdate>,
    /// SKUs with no listing on the marketplace.
    pub unlisted: Vec<String>,
}

/// Computes the new absolute stock of every listing. Deductions never take a listing below zero.
pub fn plan_stock_updates(direction: StockDirection, quantities: &[SkuQuantity], levels: &[ListingStock]) -> StockPlan {
    let mut plan = StockPlan::default();
    for q in quantities {
        let listings = levels.iter().filter(|l| l.listing.sku == q.sku).collect::<Vec<_>>();
        if listings.is_empty() {
            plan.unlisted.push(q.sku.clone());
            continue;
        }
        for l in listings {
            let stock = direction.apply(l.stock, q.quantity).max(0);
            plan.updates.push(StockUpdate { listing: l.listing.clone(), stock });
        }
    }
    plan
}

/// The ids of the rows whose flag gets set once a batch has been pushed.
pub fn rows_to_flag<'a>(policy: FailedPushPolicy, rows: &'a [MovementRow], failed_skus: &[String]) -> Vec<&'a str> {
    rows.iter()
        .filter(|r| policy == FailedPushPolicy::MarkDone || !failed_skus.contains(&r.product_sku))
        .map(|r| r.id.as_str())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPushSummary {
    pub rows: usize,
    pub updated: Vec<String>,
    pub not_updated: Vec<String>,
    pub unlisted: Vec<String>,
    pub flagged: u64,
}

/// How a stock sync ended on one platform. Serialized as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCode {
    Error = 0,
    Success = 1,
    /// Some listings could not be updated.
    Partial = 2,
    /// None of the SKUs are listed on the platform.
    NothingListed = 3,
}

impl Serialize for SyncCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformStockResult {
    pub platform: Platform,
    pub code: SyncCode,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub success: Vec<String>,
}

impl PlatformStockResult {
    fn new(platform: Platform) -> Self {
        Self { platform, code: SyncCode::Success, errors: vec![], warnings: vec![], success: vec![] }
    }

    fn error<S: Into<String>>(mut self, message: S) -> Self {
        self.code = SyncCode::Error;
        self.errors.push(message.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityMode {
    /// Listings are set to the given quantity.
    Absolute,
    /// The given quantity is added to the current listing stock.
    Add,
}

#[derive(Default)]
struct PlatformLocks {
    shopee: Mutex<()>,
    lazada: Mutex<()>,
    tiktok: Mutex<()>,
}

impl PlatformLocks {
    async fn lock(&self, platform: Platform) -> MutexGuard<'_, ()> {
        match platform {
            Platform::Shopee => self.shopee.lock().await,
            Platform::Lazada => self.lazada.lock().await,
            Platform::Tiktok => self.tiktok.lock().await,
        }
    }
}

/// Clones share the same per-platform locks.
#[derive(Clone)]
pub struct StockSyncApi<B> {
    db: B,
    config: EngineConfig,
    locks: Arc<PlatformLocks>,
}

impl<B> Debug for StockSyncApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StockSyncApi")
    }
}

impl<B> StockSyncApi<B> {
    pub fn new(db: B, config: EngineConfig) -> Self {
        Self { db, config, locks: Arc::new(PlatformLocks::default()) }
    }
}

impl<B> StockSyncApi<B>
where B: ReconciliationDatabase
{
    /// Runs one deduction or restock batch for the client's platform.
    ///
    /// A deduction batch takes rows from `Pending_Inventory_Out` first, then `Completed_Inventory_Out`. A restock
    /// batch takes rows from `Cancelled_Inventory_Out` and `Completed_Inventory_In`. If the stock levels cannot be
    /// read, nothing is flagged and the whole batch is retried on the next run. Rows whose push failed are flagged
    /// according to the configured [`FailedPushPolicy`].
    pub async fn change_inventory<M: MarketplaceClient>(
        &self,
        client: &M,
        direction: StockDirection,
    ) -> Result<StockPushSummary, ReconciliationError> {
        let platform = client.platform();
        let _guard = self.locks.lock(platform).await;
        let batch = self.fetch_batch(platform, direction).await?;
        let rows = batch.iter().flat_map(|(_, rows)| rows.iter()).count();
        if rows == 0 {
            return Err(ReconciliationError::NothingToDo(format!("No {platform} stock to {direction}")));
        }
        let creds = load_credentials(&self.db, platform).await?;
        let quantities = sku_quantities(batch.iter().flat_map(|(_, rows)| rows.iter()));
        let skus = quantities.iter().map(|q| q.sku.clone()).collect::<Vec<_>>();
        let levels = vendor_data(client, client.get_stock_levels(&creds, &skus).await)?;
        let plan = plan_stock_updates(direction, &quantities, &levels);
        if !plan.unlisted.is_empty() {
            info!("🔄️ These SKUs are not listed on {platform}: {}", plan.unlisted.join(", "));
        }
        let report = self.push_updates(client, &creds, &plan.updates).await;
        if !report.failed.is_empty() {
            warn!("🔄️ {platform} did not update the stock of {}", report.failed.join(", "));
        }
        let mut flagged = 0;
        for (table, rows) in &batch {
            let ids = rows_to_flag(self.config.failed_push_policy, rows, &report.failed)
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>();
            if !ids.is_empty() {
                flagged += self.db.mark_adjusted(platform, *table, &ids).await?;
            }
        }
        info!(
            "🔄️ {platform} {direction}: {rows} rows, {} SKUs updated, {} not updated, {flagged} rows flagged",
            report.updated.len(),
            report.failed.len()
        );
        Ok(StockPushSummary {
            rows,
            updated: report.updated,
            not_updated: report.failed,
            unlisted: plan.unlisted,
            flagged,
        })
    }

    async fn fetch_batch(
        &self,
        platform: Platform,
        direction: StockDirection,
    ) -> Result<Vec<(MovementTable, Vec<MovementRow>)>, ReconciliationError> {
        let mut batch = Vec::with_capacity(2);
        let mut seen = HashSet::new();
        let mut remaining = self.config.deduction_batch_size;
        for table in direction.tables() {
            let limit = match direction {
                StockDirection::Deduct => remaining,
                StockDirection::Restock => self.config.restock_batch_size,
            };
            if limit <= 0 {
                break;
            }
            let mut rows = self.db.fetch_unadjusted_movements(platform, *table, limit).await?;
            // A row delivered between the two reads shows up in both tables
            rows.retain(|r| seen.insert(r.id.clone()));
            remaining -= rows.len() as i64;
            trace!("🔄️ {} {table} rows to push to {platform}", rows.len());
            batch.push((*table, rows));
        }
        Ok(batch)
    }

    async fn push_updates<M: MarketplaceClient>(
        &self,
        client: &M,
        creds: &ShopCredentials,
        updates: &[StockUpdate],
    ) -> StockUpdateReport {
        if updates.is_empty() {
            return StockUpdateReport::default();
        }
        let result = client.update_stock(creds, updates).await;
        if result.is_ok() {
            return result.data.unwrap_or_default();
        }
        warn!("🔄️ {} stock update failed. {}", client.platform(), result.error_message());
        let mut report = StockUpdateReport::default();
        for u in updates {
            if !report.failed.contains(&u.listing.sku) {
                report.record(&u.listing.sku, false);
            }
        }
        report
    }

    /// Sets or adds stock for the given SKUs on every client's marketplace, reporting each platform separately.
    pub async fn set_product_quantity<M: MarketplaceClient>(
        &self,
        clients: &[M],
        items: &[SkuQuantity],
        mode: QuantityMode,
    ) -> Vec<PlatformStockResult> {
        let mut results = Vec::with_capacity(clients.len());
        for client in clients {
            let result = self.set_quantity_on(client, items, mode).await;
            debug!("🔄️ Stock sync on {}: code {:?}", result.platform, result.code);
            results.push(result);
        }
        results
    }

    async fn set_quantity_on<M: MarketplaceClient>(
        &self,
        client: &M,
        items: &[SkuQuantity],
        mode: QuantityMode,
    ) -> PlatformStockResult {
        let platform = client.platform();
        let result = PlatformStockResult::new(platform);
        let _guard = self.locks.lock(platform).await;
        let creds = match load_credentials(&self.db, platform).await {
            Ok(c) => c,
            Err(e) => return result.error(e.to_string()),
        };
        let skus = items.iter().map(|i| i.sku.clone()).collect::<Vec<_>>();
        let levels = match vendor_data(client, client.get_stock_levels(&creds, &skus).await) {
            Ok(l) => l,
            Err(e) => return result.error(e.to_string()),
        };
        let mut result = result;
        if levels.is_empty() {
            result.code = SyncCode::NothingListed;
            result.warnings.push(format!("None of the SKUs are listed on {platform}"));
            return result;
        }
        let mut updates = Vec::with_capacity(levels.len());
        for item in items {
            let listings = levels.iter().filter(|l| l.listing.sku == item.sku).collect::<Vec<_>>();
            if listings.is_empty() {
                result.warnings.push(format!("{} is not listed on {platform}", item.sku));
            }
            for l in listings {
                let stock = match mode {
                    QuantityMode::Absolute => item.quantity,
                    QuantityMode::Add => l.stock + item.quantity,
                };
                updates.push(StockUpdate { listing: l.listing.clone(), stock: stock.max(0) });
            }
        }
        let report = match vendor_data(client, client.update_stock(&creds, &updates).await) {
            Ok(r) => r,
            Err(e) => return result.error(e.to_string()),
        };
        if !report.failed.is_empty() {
            result.code = SyncCode::Partial;
            result.warnings.push(format!("not_updated: {}", report.failed.join(", ")));
        }
        result.success = report.updated;
        result
    }

    /// Writes every catalog SKU's quantity to every marketplace.
    pub async fn sync_inventories<M: MarketplaceClient>(
        &self,
        clients: &[M],
    ) -> Result<Vec<PlatformStockResult>, ReconciliationError> {
        let catalog = self.db.fetch_catalog().await?;
        if catalog.is_empty() {
            return Err(ReconciliationError::NothingToDo("The catalog is empty".into()));
        }
        let items = catalog.into_iter().map(|e| SkuQuantity::new(e.sku, e.total_quantity.max(0))).collect::<Vec<_>>();
        Ok(self.set_product_quantity(clients, &items, QuantityMode::Absolute).await)
    }

    /// Sets a SKU's stock to zero on every marketplace.
    pub async fn sold_out<M: MarketplaceClient>(&self, clients: &[M], sku: &str) -> Vec<PlatformStockResult> {
        info!("🔄️ Marking {sku} as sold out everywhere");
        self.set_product_quantity(clients, &[SkuQuantity::new(sku, 0)], QuantityMode::Absolute).await
    }

    /// Adds newly received stock on every marketplace.
    pub async fn add_inventory<M: MarketplaceClient>(
        &self,
        clients: &[M],
        items: &[SkuQuantity],
    ) -> Result<Vec<PlatformStockResult>, ReconciliationError> {
        if items.is_empty() || items.iter().any(|i| i.quantity <= 0) {
            return Err(ReconciliationError::InvalidRequest("Quantities to add must be positive".into()));
        }
        Ok(self.set_product_quantity(clients, items, QuantityMode::Add).await)
    }
}
