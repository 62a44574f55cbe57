use std::fmt::Debug;

use log::*;
use marketplace_tools::MarketplaceClient;

use crate::{
    recon_api::{load_credentials, vendor_data},
    traits::{ReconciliationDatabase, ReconciliationError},
};

/// Keeps the stored API tokens of each shop fresh.
pub struct TokenApi<B> {
    db: B,
}

impl<B> Debug for TokenApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenApi")
    }
}

impl<B> TokenApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> TokenApi<B>
where B: ReconciliationDatabase
{
    /// Trades the stored refresh token for a new token pair and stores it. The old tokens stay in place if the vendor
    /// refuses.
    pub async fn refresh_tokens<M: MarketplaceClient>(&self, client: &M) -> Result<(), ReconciliationError> {
        let platform = client.platform();
        let creds = load_credentials(&self.db, platform).await?;
        if creds.refresh_token.is_empty() {
            return Err(ReconciliationError::NoCredentials(platform));
        }
        let tokens = vendor_data(client, client.refresh_tokens(&creds).await)?;
        if tokens.access_token.is_empty() || tokens.refresh_token.is_empty() {
            return Err(ReconciliationError::vendor(platform, "The token refresh returned an empty token"));
        }
        self.db.update_tokens(platform, &tokens).await?;
        info!("🔑️ {platform} access token refreshed");
        Ok(())
    }
}
