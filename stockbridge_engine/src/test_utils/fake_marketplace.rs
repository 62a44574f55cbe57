//! An in-memory marketplace that answers every call from its own state.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use marketplace_tools::{
    ApiResult,
    ListingRef,
    ListingStock,
    MarketplaceClient,
    MarketplaceOrder,
    OrderSummary,
    OrderedItem,
    SettlementLine,
    SettlementQuery,
    ShopCredentials,
    StockUpdate,
    StockUpdateReport,
    TimeWindow,
    TokenPair,
};
use serde_json::json;
use stockbridge_common::{Cents, Platform};

#[derive(Debug, Default)]
struct FakeState {
    orders: Vec<MarketplaceOrder>,
    stock: HashMap<String, i64>,
    pushes: Vec<StockUpdate>,
    reject_updates: bool,
    failing_skus: Vec<String>,
    settlement_lines: Vec<SettlementLine>,
    tokens: Option<TokenPair>,
}

#[derive(Debug, Clone)]
pub struct FakeMarketplace {
    platform: Platform,
    state: Arc<Mutex<FakeState>>,
}

pub fn vendor_order(order_id: &str, status: &str, items: &[(&str, i64)]) -> MarketplaceOrder {
    MarketplaceOrder {
        order_id: order_id.to_string(),
        status: status.to_string(),
        created_at: chrono::Utc::now(),
        items: items.iter().map(|(sku, qty)| OrderedItem::new(*sku, *qty)).collect(),
        receivables: Cents::from(10_000),
        cancel_reason: None,
        is_gift: false,
    }
}

impl FakeMarketplace {
    pub fn new(platform: Platform) -> Self {
        Self { platform, state: Arc::new(Mutex::new(FakeState::default())) }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("Fake marketplace state is poisoned")
    }

    pub fn add_order(&self, order: MarketplaceOrder) {
        let mut state = self.state();
        state.orders.retain(|o| o.order_id != order.order_id);
        state.orders.push(order);
    }

    pub fn set_status(&self, order_id: &str, status: &str, cancel_reason: Option<&str>) {
        let mut state = self.state();
        if let Some(o) = state.orders.iter_mut().find(|o| o.order_id == order_id) {
            o.status = status.to_string();
            o.cancel_reason = cancel_reason.map(String::from);
        }
    }

    pub fn list_sku(&self, sku: &str, stock: i64) {
        self.state().stock.insert(sku.to_string(), stock);
    }

    pub fn stock_of(&self, sku: &str) -> Option<i64> {
        self.state().stock.get(sku).copied()
    }

    pub fn pushes(&self) -> Vec<StockUpdate> {
        self.state().pushes.clone()
    }

    /// Rejects every stock update call as a whole.
    pub fn reject_stock_updates(&self, reject: bool) {
        self.state().reject_updates = reject;
    }

    /// Accepts the call, but reports these SKUs as not updated.
    pub fn fail_sku_updates(&self, skus: &[&str]) {
        self.state().failing_skus = skus.iter().map(|s| s.to_string()).collect();
    }

    pub fn add_settlement_line(&self, line: SettlementLine) {
        self.state().settlement_lines.push(line);
    }

    pub fn issue_tokens(&self, access_token: &str, refresh_token: &str) {
        self.state().tokens =
            Some(TokenPair { access_token: access_token.to_string(), refresh_token: refresh_token.to_string() });
    }
}

impl MarketplaceClient for FakeMarketplace {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn list_orders(
        &self,
        _creds: &ShopCredentials,
        window: &TimeWindow,
        status: Option<&str>,
    ) -> ApiResult<Vec<OrderSummary>> {
        let orders = self
            .state()
            .orders
            .iter()
            .filter(|o| window.contains(o.created_at))
            .filter(|o| status.map(|s| s.eq_ignore_ascii_case(&o.status)).unwrap_or(true))
            .map(|o| OrderSummary { order_id: o.order_id.clone(), status: o.status.clone() })
            .collect();
        ApiResult::success(orders)
    }

    async fn get_order_details(&self, _creds: &ShopCredentials, order_ids: &[String]) -> ApiResult<Vec<MarketplaceOrder>> {
        let orders = self.state().orders.iter().filter(|o| order_ids.contains(&o.order_id)).cloned().collect();
        ApiResult::success(orders)
    }

    async fn get_stock_levels(&self, _creds: &ShopCredentials, skus: &[String]) -> ApiResult<Vec<ListingStock>> {
        let state = self.state();
        let levels = skus
            .iter()
            .filter_map(|sku| {
                state.stock.get(sku).map(|stock| ListingStock {
                    listing: ListingRef { sku: sku.clone(), item_id: format!("item-{sku}"), variant_id: None },
                    stock: *stock,
                })
            })
            .collect();
        ApiResult::success(levels)
    }

    async fn update_stock(&self, _creds: &ShopCredentials, updates: &[StockUpdate]) -> ApiResult<StockUpdateReport> {
        let mut state = self.state();
        if state.reject_updates {
            return ApiResult::rejected("stock update rejected", json!({"error": "rejected", "count": updates.len()}));
        }
        let mut report = StockUpdateReport::default();
        for u in updates {
            let ok = !state.failing_skus.contains(&u.listing.sku);
            if ok {
                state.stock.insert(u.listing.sku.clone(), u.stock);
                state.pushes.push(u.clone());
            }
            report.record(&u.listing.sku, ok);
        }
        ApiResult::success(report)
    }

    async fn get_settlement_lines(
        &self,
        _creds: &ShopCredentials,
        query: &SettlementQuery,
    ) -> ApiResult<Vec<SettlementLine>> {
        let lines =
            self.state().settlement_lines.iter().filter(|l| query.order_ids.contains(&l.order_id)).cloned().collect();
        ApiResult::success(lines)
    }

    async fn refresh_tokens(&self, _creds: &ShopCredentials) -> ApiResult<TokenPair> {
        match self.state().tokens.clone() {
            Some(tokens) => ApiResult::success(tokens),
            None => ApiResult::failure("refresh token expired"),
        }
    }
}
