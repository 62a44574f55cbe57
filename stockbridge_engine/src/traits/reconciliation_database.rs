use crate::traits::{IdempotencyStore, InventoryManagement, OrderManagement, ReconciliationError, ShopTokenManagement};

/// The highest level contract for backends supporting the reconciliation engine.
#[allow(async_fn_in_trait)]
pub trait ReconciliationDatabase:
    Clone + OrderManagement + InventoryManagement + ShopTokenManagement + IdempotencyStore
{
    /// The URL of the database
    fn url(&self) -> &str;

    /// A database round trip, for health checks.
    async fn ping(&self) -> Result<(), ReconciliationError>;
}
