use chrono::Duration;

use crate::traits::ReconciliationError;

/// A shared record of deliveries that are being, or have been, processed.
///
/// Keys expire after their time-to-live so the store stays bounded, and a restart does not forget what was handled.
#[allow(async_fn_in_trait)]
pub trait IdempotencyStore {
    /// Claims `key` for `ttl`. Returns `false` if an unexpired claim on the key already exists.
    async fn claim_key(&self, key: &str, ttl: Duration) -> Result<bool, ReconciliationError>;

    /// Gives up a claim so that a later delivery of the same event is processed.
    async fn release_key(&self, key: &str) -> Result<(), ReconciliationError>;

    /// Deletes expired claims, returning how many were removed.
    async fn purge_expired_keys(&self) -> Result<u64, ReconciliationError>;
}
