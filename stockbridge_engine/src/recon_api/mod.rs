//! The public workflows of the reconciliation engine.
//!
//! Every workflow is generic over the database backend, and over the [`MarketplaceClient`] it talks to, so the same
//! code serves all three marketplaces.
use log::*;
use marketplace_tools::{ApiResult, MarketplaceClient, ShopCredentials};
use stockbridge_common::Platform;

use crate::traits::{ReconciliationError, ShopTokenManagement};

pub mod config;
pub mod intake_api;
pub mod notification_api;
pub mod reporting_api;
pub mod resolver;
pub mod settlement_api;
pub mod status;
pub mod stock_sync_api;
pub mod token_api;

pub(crate) async fn load_credentials<B: ShopTokenManagement>(
    db: &B,
    platform: Platform,
) -> Result<ShopCredentials, ReconciliationError> {
    db.fetch_credentials(platform).await?.ok_or_else(|| {
        info!("🔑️ No credentials are configured for {platform}");
        ReconciliationError::NoCredentials(platform)
    })
}

/// Unwraps a marketplace result, turning a failed call into `VendorUnavailable`.
pub(crate) fn vendor_data<M: MarketplaceClient, T>(client: &M, result: ApiResult<T>) -> Result<T, ReconciliationError> {
    let platform = client.platform();
    if let Some(payload) = &result.vendor_payload {
        warn!("🛍️ {platform} rejected the request: {payload}");
    }
    result.into_result().map_err(|e| {
        warn!("🛍️ {platform} call failed. {e}");
        ReconciliationError::vendor(platform, e)
    })
}
