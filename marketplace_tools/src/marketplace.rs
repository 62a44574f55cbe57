use stockbridge_common::Platform;

use crate::{
    client::MarketplaceClient,
    ApiResult,
    LazadaApi,
    ListingStock,
    MarketplaceApiError,
    MarketplaceConfig,
    MarketplaceOrder,
    OrderSummary,
    SettlementLine,
    SettlementQuery,
    ShopCredentials,
    ShopeeApi,
    StockUpdate,
    StockUpdateReport,
    TiktokApi,
    TimeWindow,
    TokenPair,
};

/// One concrete client type for all three vendors, so that workflows can hold a client per platform.
#[derive(Debug, Clone)]
pub enum MarketplaceApi {
    Shopee(ShopeeApi),
    Lazada(LazadaApi),
    Tiktok(TiktokApi),
}

impl MarketplaceApi {
    pub fn new(platform: Platform, config: MarketplaceConfig) -> Result<Self, MarketplaceApiError> {
        let api = match platform {
            Platform::Shopee => Self::Shopee(ShopeeApi::new(config)?),
            Platform::Lazada => Self::Lazada(LazadaApi::new(config)?),
            Platform::Tiktok => Self::Tiktok(TiktokApi::new(config)?),
        };
        Ok(api)
    }
}

macro_rules! dispatch {
    ($self:ident, $api:ident => $call:expr) => {
        match $self {
            MarketplaceApi::Shopee($api) => $call,
            MarketplaceApi::Lazada($api) => $call,
            MarketplaceApi::Tiktok($api) => $call,
        }
    };
}

impl MarketplaceClient for MarketplaceApi {
    fn platform(&self) -> Platform {
        dispatch!(self, api => api.platform())
    }

    async fn list_orders(
        &self,
        creds: &ShopCredentials,
        window: &TimeWindow,
        status: Option<&str>,
    ) -> ApiResult<Vec<OrderSummary>> {
        dispatch!(self, api => api.list_orders(creds, window, status).await)
    }

    async fn get_order_details(&self, creds: &ShopCredentials, order_ids: &[String]) -> ApiResult<Vec<MarketplaceOrder>> {
        dispatch!(self, api => api.get_order_details(creds, order_ids).await)
    }

    async fn get_stock_levels(&self, creds: &ShopCredentials, skus: &[String]) -> ApiResult<Vec<ListingStock>> {
        dispatch!(self, api => api.get_stock_levels(creds, skus).await)
    }

    async fn update_stock(&self, creds: &ShopCredentials, updates: &[StockUpdate]) -> ApiResult<StockUpdateReport> {
        dispatch!(self, api => api.update_stock(creds, updates).await)
    }

    async fn get_settlement_lines(
        &self,
        creds: &ShopCredentials,
        query: &SettlementQuery,
    ) -> ApiResult<Vec<SettlementLine>> {
        dispatch!(self, api => api.get_settlement_lines(creds, query).await)
    }

    async fn refresh_tokens(&self, creds: &ShopCredentials) -> ApiResult<TokenPair> {
        dispatch!(self, api => api.refresh_tokens(creds).await)
    }
}
