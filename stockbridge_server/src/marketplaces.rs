use log::*;
use marketplace_tools::{MarketplaceApi, MarketplaceClient, MarketplaceConfig};
use stockbridge_common::Platform;

use crate::errors::ServerError;

/// The marketplace clients the server talks to, at most one per platform.
#[derive(Debug, Clone)]
pub struct Marketplaces<M> {
    clients: Vec<M>,
}

impl<M: MarketplaceClient> Marketplaces<M> {
    pub fn new(clients: Vec<M>) -> Self {
        Self { clients }
    }

    pub fn get(&self, platform: Platform) -> Result<&M, ServerError> {
        self.clients
            .iter()
            .find(|c| c.platform() == platform)
            .ok_or_else(|| ServerError::NotConfigured(format!("There is no {platform} client")))
    }

    pub fn all(&self) -> &[M] {
        &self.clients
    }
}

impl Marketplaces<MarketplaceApi> {
    /// One REST client for every platform.
    pub fn from_config(config: &MarketplaceConfig) -> Result<Self, ServerError> {
        let clients = Platform::ALL
            .into_iter()
            .map(|p| MarketplaceApi::new(p, config.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ServerError::InitializeError(format!("Could not create the marketplace clients. {e}")))?;
        debug!("🛍️ Created clients for {} marketplaces", clients.len());
        Ok(Self::new(clients))
    }
}
