use std::collections::HashMap;

use stockbridge_common::Platform;

use crate::{
    db_types::{CatalogEntry, MovementRow, MovementTable},
    traits::{DateRange, LocatedMovement, ReconciliationError},
};

#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    /// The component SKUs of every bundle among `skus`, in listing order. SKUs that are not bundles are absent.
    async fn fetch_bundle_components(
        &self,
        skus: &[String],
    ) -> Result<HashMap<String, Vec<String>>, ReconciliationError>;

    /// Defines `sku` as a bundle of `components`, replacing any previous definition.
    async fn save_bundle(&self, sku: &str, components: &[String]) -> Result<(), ReconciliationError>;

    /// Catalog rows for `skus`, fetched in a single query. Unknown SKUs are absent.
    async fn fetch_catalog_entries(&self, skus: &[String]) -> Result<Vec<CatalogEntry>, ReconciliationError>;

    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, ReconciliationError>;

    /// Creates or replaces a catalog entry's name, cost and quantity.
    async fn save_catalog_entry(&self, entry: &CatalogEntry) -> Result<CatalogEntry, ReconciliationError>;

    /// Up to `limit` rows from `table` whose `platform` flag is still unset, oldest orders first.
    ///
    /// Rows never come back for the platform that sold them, except after a failed delivery: that platform's flag is
    /// cleared when the order is returned to sender, so its own stock is restored too.
    async fn fetch_unadjusted_movements(
        &self,
        platform: Platform,
        table: MovementTable,
        limit: i64,
    ) -> Result<Vec<MovementRow>, ReconciliationError>;

    /// Sets the `platform` flag on the given rows of `table`, once their stock has been pushed to the platform.
    ///
    /// Outbound rows can be delivered, cancelled or returned after the batch was read. Pushed rows that are still
    /// outbound get their flag set wherever they are now. Pushed rows that were reversed get their flag cleared, so
    /// that the restock batch gives the deducted units back.
    async fn mark_adjusted(
        &self,
        platform: Platform,
        table: MovementTable,
        ids: &[String],
    ) -> Result<u64, ReconciliationError>;

    /// Every movement row of the order, whichever table it is in.
    async fn fetch_movements_for_order(
        &self,
        platform: Platform,
        order_id: &str,
    ) -> Result<Vec<LocatedMovement>, ReconciliationError>;

    /// Rows of `table` whose order was created inside `range`, optionally restricted to one platform.
    async fn search_movements(
        &self,
        table: MovementTable,
        platform: Option<Platform>,
        range: DateRange,
    ) -> Result<Vec<MovementRow>, ReconciliationError>;
}
