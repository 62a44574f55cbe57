use chrono::{DateTime, Utc};
use marketplace_tools::ThreadAssignment;
use stockbridge_common::Platform;

use crate::{
    db_types::{NewOrder, Order, OrderSettlement, ResolvedItem, Reversal},
    traits::{DateRange, InsertOrderResult, ReconciliationError, TransitionResult},
};

#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order(&self, platform: Platform, order_id: &str) -> Result<Option<Order>, ReconciliationError>;

    /// The subset of `order_ids` that is already stored.
    async fn existing_order_ids(
        &self,
        platform: Platform,
        order_ids: &[String],
    ) -> Result<Vec<String>, ReconciliationError>;

    /// In a single atomic transaction:
    /// * inserts the order header, unless the order already exists. In that case nothing else happens.
    /// * writes one `Pending_Inventory_Out` row per unit of every item, with ids `{PLATFORM}_{order_id}_{n}` for
    ///   `n` in `1..=N`. The origin platform's flag is set on each row.
    /// * decrements the catalog quantity of every item.
    async fn insert_order_with_movements(
        &self,
        order: NewOrder,
        items: &[ResolvedItem],
    ) -> Result<InsertOrderResult, ReconciliationError>;

    /// Writes a new vendor status on the order. Annulled orders are left alone.
    async fn update_order_status(
        &self,
        platform: Platform,
        order_id: &str,
        status: &str,
    ) -> Result<TransitionResult, ReconciliationError>;

    /// Writes the delivered status and moves the order's rows from `Pending_Inventory_Out` to
    /// `Completed_Inventory_Out`.
    async fn complete_delivery(
        &self,
        platform: Platform,
        order_id: &str,
        status: &str,
    ) -> Result<TransitionResult, ReconciliationError>;

    /// Cancels the order or marks it returned to sender, moving its outbound rows to the reversal's target table.
    /// A cancellation also puts the units back into the catalog at a weighted-average cost.
    ///
    /// A no-op on orders that are already annulled.
    async fn reverse_order(
        &self,
        platform: Platform,
        order_id: &str,
        reversal: Reversal,
    ) -> Result<TransitionResult, ReconciliationError>;

    /// Confirms that the goods of a returned order are back. Moves its rows from `Pending_Inventory_In` to
    /// `Completed_Inventory_In` and restocks the catalog at a weighted-average cost. Returns the number of units.
    async fn receive_return(&self, platform: Platform, order_id: &str) -> Result<usize, ReconciliationError>;

    /// Up to `limit` orders created before `created_before` that are not yet in a final state, oldest first.
    async fn fetch_orders_for_status_refresh(
        &self,
        platform: Platform,
        final_statuses: &[&str],
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Order>, ReconciliationError>;

    /// Up to `limit` unsettled orders whose status is one of `statuses`, oldest first.
    async fn fetch_unsettled_orders(
        &self,
        platform: Platform,
        statuses: &[&str],
        limit: i64,
    ) -> Result<Vec<Order>, ReconciliationError>;

    /// Writes settlement figures for all the orders in one statement and marks them settled.
    async fn record_settlements(
        &self,
        platform: Platform,
        settlements: &[OrderSettlement],
    ) -> Result<u64, ReconciliationError>;

    /// Up to `limit` orders that have no notification thread yet, oldest first. Annulled orders are skipped.
    async fn fetch_orders_without_thread(&self, platform: Platform, limit: i64) -> Result<Vec<Order>, ReconciliationError>;

    async fn assign_threads(
        &self,
        platform: Platform,
        assignments: &[ThreadAssignment],
    ) -> Result<u64, ReconciliationError>;

    /// Orders created inside `range`, oldest first.
    async fn search_orders(&self, platform: Platform, range: DateRange) -> Result<Vec<Order>, ReconciliationError>;
}
