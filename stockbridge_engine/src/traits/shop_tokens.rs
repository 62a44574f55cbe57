use marketplace_tools::{ShopCredentials, TokenPair};
use stockbridge_common::Platform;

use crate::traits::ReconciliationError;

#[allow(async_fn_in_trait)]
pub trait ShopTokenManagement {
    async fn fetch_credentials(&self, platform: Platform) -> Result<Option<ShopCredentials>, ReconciliationError>;

    /// Creates or replaces the credentials for `creds.platform`.
    async fn save_credentials(&self, creds: &ShopCredentials) -> Result<(), ReconciliationError>;

    /// Stores a freshly issued token pair. Fails with `NoCredentials` if the platform has no credentials yet.
    async fn update_tokens(&self, platform: Platform, tokens: &TokenPair) -> Result<(), ReconciliationError>;
}
