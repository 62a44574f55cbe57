use stockbridge_common::Platform;

use crate::{
    ApiResult,
    ListingStock,
    MarketplaceOrder,
    OrderSummary,
    SettlementLine,
    SettlementQuery,
    ShopCredentials,
    StockUpdate,
    StockUpdateReport,
    TimeWindow,
    TokenPair,
};

/// The operations the reconciliation workflows need from a marketplace.
///
/// Implementations sign every request and never fail past the [`ApiResult`] envelope. Stock is always written as an
/// absolute level: callers read the current level with [`MarketplaceClient::get_stock_levels`] and submit the new
/// value.
#[allow(async_fn_in_trait)]
pub trait MarketplaceClient {
    fn platform(&self) -> Platform;

    /// Lists orders created inside `window`, following the vendor's pagination to the end. `status` filters on the
    /// vendor's own status vocabulary.
    async fn list_orders(
        &self,
        creds: &ShopCredentials,
        window: &TimeWindow,
        status: Option<&str>,
    ) -> ApiResult<Vec<OrderSummary>>;

    async fn get_order_details(&self, creds: &ShopCredentials, order_ids: &[String]) -> ApiResult<Vec<MarketplaceOrder>>;

    /// Current stock for each SKU that is listed on the marketplace. Unlisted SKUs are simply absent.
    async fn get_stock_levels(&self, creds: &ShopCredentials, skus: &[String]) -> ApiResult<Vec<ListingStock>>;

    async fn update_stock(&self, creds: &ShopCredentials, updates: &[StockUpdate]) -> ApiResult<StockUpdateReport>;

    async fn get_settlement_lines(
        &self,
        creds: &ShopCredentials,
        query: &SettlementQuery,
    ) -> ApiResult<Vec<SettlementLine>>;

    async fn refresh_tokens(&self, creds: &ShopCredentials) -> ApiResult<TokenPair>;
}
