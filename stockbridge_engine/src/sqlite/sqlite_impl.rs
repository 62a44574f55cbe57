//! `SqliteDatabase` is the SQLite implementation of a reconciliation engine backend.
//!
//! It implements all the traits defined in the [`crate::traits`] module. Every state transition runs in a single
//! transaction, so an error on any path rolls back the whole transition when the transaction is dropped.
use std::{collections::HashMap, fmt::Debug};

use chrono::{DateTime, Duration, Utc};
use log::*;
use marketplace_tools::{ShopCredentials, ThreadAssignment, TokenPair};
use sqlx::{SqliteConnection, SqlitePool};
use stockbridge_common::{Cents, Platform};

use super::db::{catalog, db_url, idempotency, movements, new_pool, orders, shop_tokens};
use crate::{
    db_types::{
        returned_units,
        CatalogEntry,
        MovementRow,
        MovementTable,
        NewOrder,
        Order,
        OrderSettlement,
        ResolvedItem,
        Reversal,
        STATUS_CANCELLED,
        STATUS_RTS,
    },
    traits::{
        DateRange,
        IdempotencyStore,
        InsertOrderResult,
        InventoryManagement,
        LocatedMovement,
        OrderManagement,
        ReconciliationDatabase,
        ReconciliationError,
        ShopTokenManagement,
        TransitionResult,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `SB_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) -> Result<(), sqlx::Error> {
        self.pool.close().await;
        Ok(())
    }

    /// Brings the schema up to date with the embedded migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}

/// Puts returned units back in the catalog, recomputing each SKU's cost as a weighted average.
async fn restock_catalog(rows: &[MovementRow], conn: &mut SqliteConnection) -> Result<(), ReconciliationError> {
    for units in returned_units(rows) {
        let entry = match catalog::fetch_entry(&units.sku, &mut *conn).await? {
            Some(entry) => entry,
            None => {
                warn!("🗃️ {} is no longer in the catalog. {} returned units are not restocked.", units.sku, units.quantity);
                continue;
            },
        };
        let new_cost =
            Cents::weighted_average(entry.total_quantity, entry.cost_of_goods, units.quantity, units.unit_cost);
        if !catalog::restock(&entry, units.quantity, new_cost, &mut *conn).await? {
            return Err(ReconciliationError::ConcurrentModification(units.sku));
        }
        debug!(
            "🗃️ {} restocked: {} + {} units, cost {} -> {new_cost}",
            units.sku, entry.total_quantity, units.quantity, entry.cost_of_goods
        );
    }
    Ok(())
}

async fn fetch_order_or_fail(
    platform: Platform,
    order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Order, ReconciliationError> {
    orders::fetch_order(platform, order_id, conn)
        .await?
        .ok_or_else(|| ReconciliationError::OrderNotFound { platform, order_id: order_id.to_string() })
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, platform: Platform, order_id: &str) -> Result<Option<Order>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(platform, order_id, &mut conn).await?;
        Ok(order)
    }

    async fn existing_order_ids(
        &self,
        platform: Platform,
        order_ids: &[String],
    ) -> Result<Vec<String>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let ids = orders::existing_order_ids(platform, order_ids, &mut conn).await?;
        Ok(ids)
    }

    async fn insert_order_with_movements(
        &self,
        order: NewOrder,
        items: &[ResolvedItem],
    ) -> Result<InsertOrderResult, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let (stored, inserted) = orders::idempotent_insert(order, &mut tx).await?;
        if !inserted {
            debug!("🗃️ {} order {} already exists. Nothing more to do.", stored.platform, stored.order_id);
            tx.commit().await?;
            return Ok(InsertOrderResult { order: stored, inserted: false, movements: 0 });
        }
        let rows = MovementRow::explode(stored.platform, &stored.order_id, stored.created_at, items);
        movements::insert_movements(MovementTable::PendingOut, &rows, &mut tx).await?;
        for item in items {
            if !catalog::decrement(&item.sku, item.quantity, &mut tx).await? {
                warn!("🗃️ {} is not in the catalog, so its quantity was not decremented", item.sku);
            }
        }
        tx.commit().await?;
        debug!("🗃️ {} order {} saved with {} movement rows", stored.platform, stored.order_id, rows.len());
        Ok(InsertOrderResult { order: stored, inserted: true, movements: rows.len() })
    }

    async fn update_order_status(
        &self,
        platform: Platform,
        order_id: &str,
        status: &str,
    ) -> Result<TransitionResult, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let order = fetch_order_or_fail(platform, order_id, &mut tx).await?;
        if order.is_annulled() {
            trace!("🗃️ {platform} order {order_id} is {}. Ignoring status {status}", order.status);
            return Ok(TransitionResult::Ignored(order));
        }
        let order = orders::update_status(platform, order_id, status, &mut tx)
            .await?
            .ok_or_else(|| ReconciliationError::OrderNotFound { platform, order_id: order_id.to_string() })?;
        tx.commit().await?;
        Ok(TransitionResult::Applied { order, moved_rows: 0 })
    }

    async fn complete_delivery(
        &self,
        platform: Platform,
        order_id: &str,
        status: &str,
    ) -> Result<TransitionResult, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let order = fetch_order_or_fail(platform, order_id, &mut tx).await?;
        if order.is_annulled() {
            trace!("🗃️ {platform} order {order_id} is {}. Ignoring delivery", order.status);
            return Ok(TransitionResult::Ignored(order));
        }
        let moved = movements::move_rows(
            MovementTable::PendingOut,
            MovementTable::CompletedOut,
            platform,
            order_id,
            &mut tx,
        )
        .await?;
        let order = orders::update_status(platform, order_id, status, &mut tx)
            .await?
            .ok_or_else(|| ReconciliationError::OrderNotFound { platform, order_id: order_id.to_string() })?;
        tx.commit().await?;
        debug!("🗃️ {platform} order {order_id} delivered. {moved} units completed.");
        Ok(TransitionResult::Applied { order, moved_rows: moved as usize })
    }

    async fn reverse_order(
        &self,
        platform: Platform,
        order_id: &str,
        reversal: Reversal,
    ) -> Result<TransitionResult, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let order = fetch_order_or_fail(platform, order_id, &mut tx).await?;
        if order.is_annulled() {
            debug!("🗃️ {platform} order {order_id} is already {}. Nothing to reverse.", order.status);
            return Ok(TransitionResult::Ignored(order));
        }
        let mut returned = Vec::new();
        let mut moved = 0;
        for &source in reversal.sources() {
            if reversal == Reversal::Cancellation {
                returned.extend(movements::fetch_for_order(source, platform, order_id, &mut tx).await?);
            }
            moved += movements::reverse_rows(source, reversal, platform, order_id, &mut tx).await?;
        }
        if reversal == Reversal::Cancellation {
            restock_catalog(&returned, &mut tx).await?;
        }
        let order = orders::update_status(platform, order_id, reversal.stored_status(), &mut tx)
            .await?
            .ok_or_else(|| ReconciliationError::OrderNotFound { platform, order_id: order_id.to_string() })?;
        tx.commit().await?;
        info!("🗃️ {platform} order {order_id} is now {}. {moved} units moved to {}", order.status, reversal.target());
        Ok(TransitionResult::Applied { order, moved_rows: moved as usize })
    }

    async fn receive_return(&self, platform: Platform, order_id: &str) -> Result<usize, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let order = fetch_order_or_fail(platform, order_id, &mut tx).await?;
        if order.status != STATUS_RTS {
            return Err(ReconciliationError::InvalidRequest(format!(
                "{platform} order {order_id} is {}, not returned to sender",
                order.status
            )));
        }
        let rows = movements::fetch_for_order(MovementTable::PendingIn, platform, order_id, &mut tx).await?;
        if rows.is_empty() {
            return Err(ReconciliationError::NothingToDo(format!(
                "The return of {platform} order {order_id} has already been received"
            )));
        }
        movements::move_rows(MovementTable::PendingIn, MovementTable::CompletedIn, platform, order_id, &mut tx).await?;
        restock_catalog(&rows, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ {} returned units of {platform} order {order_id} are back in stock", rows.len());
        Ok(rows.len())
    }

    async fn fetch_orders_for_status_refresh(
        &self,
        platform: Platform,
        final_statuses: &[&str],
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Order>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let mut finals = vec![STATUS_CANCELLED, STATUS_RTS];
        finals.extend_from_slice(final_statuses);
        let orders = orders::fetch_orders_for_status_refresh(platform, &finals, created_before, limit, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_unsettled_orders(
        &self,
        platform: Platform,
        statuses: &[&str],
        limit: i64,
    ) -> Result<Vec<Order>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_unsettled_orders(platform, statuses, limit, &mut conn).await?;
        Ok(orders)
    }

    async fn record_settlements(
        &self,
        platform: Platform,
        settlements: &[OrderSettlement],
    ) -> Result<u64, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let count = orders::record_settlements(platform, settlements, &mut tx).await?;
        tx.commit().await?;
        Ok(count)
    }

    async fn fetch_orders_without_thread(&self, platform: Platform, limit: i64) -> Result<Vec<Order>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let orders =
            orders::fetch_orders_without_thread(platform, &[STATUS_CANCELLED, STATUS_RTS], limit, &mut conn).await?;
        Ok(orders)
    }

    async fn assign_threads(
        &self,
        platform: Platform,
        assignments: &[ThreadAssignment],
    ) -> Result<u64, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let count = orders::assign_threads(platform, assignments, &mut tx).await?;
        tx.commit().await?;
        Ok(count)
    }

    async fn search_orders(&self, platform: Platform, range: DateRange) -> Result<Vec<Order>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(platform, range, &mut conn).await?;
        Ok(orders)
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn fetch_bundle_components(
        &self,
        skus: &[String],
    ) -> Result<HashMap<String, Vec<String>>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let components = catalog::fetch_bundles(skus, &mut conn).await?;
        let bundles = components.into_iter().fold(HashMap::<String, Vec<String>>::new(), |mut acc, c| {
            acc.entry(c.sku).or_default().push(c.component_sku);
            acc
        });
        Ok(bundles)
    }

    async fn save_bundle(&self, sku: &str, components: &[String]) -> Result<(), ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        catalog::replace_bundle(sku, components, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_catalog_entries(&self, skus: &[String]) -> Result<Vec<CatalogEntry>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let entries = catalog::fetch_entries(skus, &mut conn).await?;
        Ok(entries)
    }

    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let entries = catalog::fetch_all(&mut conn).await?;
        Ok(entries)
    }

    async fn save_catalog_entry(&self, entry: &CatalogEntry) -> Result<CatalogEntry, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let entry = catalog::upsert(entry, &mut conn).await?;
        Ok(entry)
    }

    async fn fetch_unadjusted_movements(
        &self,
        platform: Platform,
        table: MovementTable,
        limit: i64,
    ) -> Result<Vec<MovementRow>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let rows = movements::fetch_unadjusted(platform, table, limit, &mut conn).await?;
        Ok(rows)
    }

    async fn mark_adjusted(
        &self,
        platform: Platform,
        table: MovementTable,
        ids: &[String],
    ) -> Result<u64, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let mut count = movements::mark_adjusted(platform, table, ids, &mut tx).await?;
        trace!("🗃️ {count} rows of {table} flagged as adjusted for {platform}");
        if table.is_outbound() && count < ids.len() as u64 {
            // Rows that were delivered, cancelled or returned while the stock was being pushed
            for other in MovementTable::ALL.into_iter().filter(|t| *t != table) {
                let value = other.is_outbound();
                let moved = movements::set_flag(platform, other, ids, value, &mut tx).await?;
                if moved > 0 {
                    debug!("🗃️ {moved} pushed rows had moved to {other}. Their {platform} flag is now {value}.");
                }
                count += moved;
            }
        }
        tx.commit().await?;
        Ok(count)
    }

    async fn fetch_movements_for_order(
        &self,
        platform: Platform,
        order_id: &str,
    ) -> Result<Vec<LocatedMovement>, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let mut result = Vec::new();
        for table in MovementTable::ALL {
            let rows = movements::fetch_for_order(table, platform, order_id, &mut tx).await?;
            result.extend(rows.into_iter().map(|row| LocatedMovement { table, row }));
        }
        tx.commit().await?;
        Ok(result)
    }

    async fn search_movements(
        &self,
        table: MovementTable,
        platform: Option<Platform>,
        range: DateRange,
    ) -> Result<Vec<MovementRow>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let rows = movements::search(table, platform, range, &mut conn).await?;
        Ok(rows)
    }
}

impl ShopTokenManagement for SqliteDatabase {
    async fn fetch_credentials(&self, platform: Platform) -> Result<Option<ShopCredentials>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let creds = shop_tokens::fetch_credentials(platform, &mut conn).await?;
        Ok(creds)
    }

    async fn save_credentials(&self, creds: &ShopCredentials) -> Result<(), ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        shop_tokens::upsert_credentials(creds, &mut conn).await?;
        debug!("🗃️ {} credentials saved", creds.platform);
        Ok(())
    }

    async fn update_tokens(&self, platform: Platform, tokens: &TokenPair) -> Result<(), ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        if !shop_tokens::update_tokens(platform, tokens, &mut conn).await? {
            return Err(ReconciliationError::NoCredentials(platform));
        }
        debug!("🗃️ {platform} tokens updated");
        Ok(())
    }
}

impl IdempotencyStore for SqliteDatabase {
    async fn claim_key(&self, key: &str, ttl: Duration) -> Result<bool, ReconciliationError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let claimed = idempotency::claim(key, now, now + ttl, &mut tx).await?;
        tx.commit().await?;
        Ok(claimed)
    }

    async fn release_key(&self, key: &str) -> Result<(), ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        idempotency::release(key, &mut conn).await?;
        Ok(())
    }

    async fn purge_expired_keys(&self) -> Result<u64, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let count = idempotency::purge_expired(Utc::now(), &mut conn).await?;
        Ok(count)
    }
}

impl ReconciliationDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn ping(&self) -> Result<(), ReconciliationError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
