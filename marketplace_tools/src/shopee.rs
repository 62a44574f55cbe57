use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use log::*;
use reqwest::Client;
use serde_json::{json, Value};
use stockbridge_common::{Cents, Platform};

use crate::{
    client::MarketplaceClient,
    helpers::{amount, array, id_text, integer, required_id, unix_time},
    rest::{build_client, send_for_json},
    signing::{shopee_signature, ShopeeShop},
    ApiResult,
    ListingRef,
    ListingStock,
    MarketplaceApiError,
    MarketplaceConfig,
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
    ITEM_PRICE_CREDIT,
};

const ORDER_LIST_PATH: &str = "/api/v2/order/get_order_list";
const ORDER_DETAIL_PATH: &str = "/api/v2/order/get_order_detail";
const SEARCH_ITEM_PATH: &str = "/api/v2/product/search_item";
const ITEM_INFO_PATH: &str = "/api/v2/product/get_item_base_info";
const UPDATE_STOCK_PATH: &str = "/api/v2/product/update_stock";
const ESCROW_PATH: &str = "/api/v2/payment/get_escrow_detail";
const TOKEN_PATH: &str = "/api/v2/auth/access_token/get";
const DETAIL_FIELDS: &str = "buyer_user_id,buyer_username,item_list,payment_method,total_amount,cancel_reason";
const MAX_BATCH: usize = 50;
pub const SHOPEE_FEES: &str = "Shopee Fees";

#[derive(Clone)]
pub struct ShopeeApi {
    config: MarketplaceConfig,
    client: Arc<Client>,
}

impl std::fmt::Debug for ShopeeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ShopeeApi ({})", self.config.shopee_host)
    }
}

impl ShopeeApi {
    pub fn new(config: MarketplaceConfig) -> Result<Self, MarketplaceApiError> {
        let client = build_client(&config)?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.shopee_host)
    }

    fn auth_params(creds: &ShopCredentials, path: &str, shop_level: bool) -> Result<Vec<(String, String)>, MarketplaceApiError> {
        let partner_id = creds.numeric_partner_id()?;
        let timestamp = Utc::now().timestamp();
        let mut params = vec![("partner_id".to_string(), partner_id.to_string()), ("timestamp".to_string(), timestamp.to_string())];
        let shop = if shop_level {
            let shop_id = creds.numeric_shop_id()?;
            params.push(("access_token".to_string(), creds.access_token.reveal().clone()));
            params.push(("shop_id".to_string(), shop_id.to_string()));
            Some(ShopeeShop { access_token: creds.access_token.reveal().as_str(), shop_id })
        } else {
            None
        };
        let sign = shopee_signature(creds.app_secret.reveal(), partner_id, path, timestamp, shop);
        params.push(("sign".to_string(), sign));
        Ok(params)
    }

    /// Shopee reports failures in the `error` field, with a human-readable `message`.
    fn check_response(value: Value) -> Result<Value, MarketplaceApiError> {
        match value["error"].as_str() {
            Some(error) if !error.is_empty() => {
                let message = format!("{error}. {}", value["message"].as_str().unwrap_or_default());
                Err(MarketplaceApiError::VendorRejected { message, payload: value })
            },
            _ => Ok(value),
        }
    }

    pub async fn shop_get(
        &self,
        creds: &ShopCredentials,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, MarketplaceApiError> {
        let mut query = Self::auth_params(creds, path, true)?;
        query.extend(params.iter().map(|(k, v)| (k.to_string(), v.clone())));
        trace!("Sending Shopee GET {path}");
        let req = self.client.get(self.url(path)).query(&query);
        send_for_json(req).await.and_then(Self::check_response)
    }

    pub async fn shop_post(&self, creds: &ShopCredentials, path: &str, body: &Value) -> Result<Value, MarketplaceApiError> {
        let query = Self::auth_params(creds, path, true)?;
        trace!("Sending Shopee POST {path}");
        let req = self.client.post(self.url(path)).query(&query).json(body);
        send_for_json(req).await.and_then(Self::check_response)
    }

    pub async fn fetch_order_list(
        &self,
        creds: &ShopCredentials,
        window: &TimeWindow,
        status: Option<&str>,
    ) -> Result<Vec<OrderSummary>, MarketplaceApiError> {
        let mut orders = Vec::new();
        let mut cursor = String::new();
        loop {
            let mut params = vec![
                ("time_range_field", "create_time".to_string()),
                ("time_from", window.start.timestamp().to_string()),
                ("time_to", window.end.timestamp().to_string()),
                ("page_size", "100".to_string()),
                ("cursor", cursor.clone()),
                ("response_optional_fields", "order_status".to_string()),
            ];
            if let Some(status) = status {
                params.push(("order_status", status.to_string()));
            }
            let value = self.shop_get(creds, ORDER_LIST_PATH, &params).await?;
            let response = &value["response"];
            for order in array(response, "order_list") {
                let order_id = required_id(order, "order_sn")?;
                let status = order["order_status"].as_str().or(status).unwrap_or_default().to_string();
                orders.push(OrderSummary { order_id, status });
            }
            cursor = response["next_cursor"].as_str().unwrap_or_default().to_string();
            if !response["more"].as_bool().unwrap_or(false) || cursor.is_empty() {
                break;
            }
        }
        debug!("Fetched {} Shopee orders", orders.len());
        Ok(orders)
    }

    pub async fn fetch_order_details(
        &self,
        creds: &ShopCredentials,
        order_ids: &[String],
    ) -> Result<Vec<MarketplaceOrder>, MarketplaceApiError> {
        let mut orders = Vec::with_capacity(order_ids.len());
        for chunk in order_ids.chunks(MAX_BATCH) {
            let params = [("order_sn_list", chunk.join(",")), ("response_optional_fields", DETAIL_FIELDS.to_string())];
            let value = self.shop_get(creds, ORDER_DETAIL_PATH, &params).await?;
            for order in array(&value["response"], "order_list") {
                orders.push(parse_order_detail(order)?);
            }
        }
        Ok(orders)
    }

    /// Shopee has no lookup by SKU, so each SKU is searched for its item id first.
    pub async fn fetch_stock_levels(
        &self,
        creds: &ShopCredentials,
        skus: &[String],
    ) -> Result<Vec<ListingStock>, MarketplaceApiError> {
        let mut item_skus = HashMap::new();
        for sku in skus {
            let params = [("page_size", "1".to_string()), ("attribute_status", "2".to_string()), ("item_sku", sku.clone())];
            let value = self.shop_get(creds, SEARCH_ITEM_PATH, &params).await?;
            match array(&value["response"], "item_id_list").first().and_then(id_text) {
                Some(item_id) => {
                    item_skus.insert(item_id, sku.clone());
                },
                None => debug!("SKU {sku} is not listed on Shopee"),
            }
        }
        let item_ids = item_skus.keys().cloned().collect::<Vec<String>>();
        let mut levels = Vec::with_capacity(item_ids.len());
        for chunk in item_ids.chunks(MAX_BATCH) {
            let value = self.shop_get(creds, ITEM_INFO_PATH, &[("item_id_list", chunk.join(","))]).await?;
            for item in array(&value["response"], "item_list") {
                let item_id = required_id(item, "item_id")?;
                let Some(sku) = item_skus.get(&item_id) else { continue };
                let stock = integer(&item["stock_info_v2"]["seller_stock"][0]["stock"]).unwrap_or_default();
                let listing = ListingRef { sku: sku.clone(), item_id, variant_id: None };
                levels.push(ListingStock { listing, stock });
            }
        }
        Ok(levels)
    }

    pub async fn push_stock(&self, creds: &ShopCredentials, updates: &[StockUpdate]) -> StockUpdateReport {
        let mut report = StockUpdateReport::default();
        for update in updates {
            let model_id = update.listing.variant_id.as_deref().and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
            let item_id = update.listing.item_id.parse::<i64>().ok();
            let body = json!({
                "item_id": item_id,
                "stock_list": [{ "model_id": model_id, "seller_stock": [{ "stock": update.stock }] }],
            });
            let ok = match self.shop_post(creds, UPDATE_STOCK_PATH, &body).await {
                Ok(value) => array(&value["response"], "failure_list").is_empty(),
                Err(e) => {
                    warn!("🔄️ Shopee rejected the stock update for {}. {e}", update.listing.sku);
                    false
                },
            };
            report.record(&update.listing.sku, ok);
        }
        report
    }

    /// Shopee settles order by order. Orders whose escrow cannot be fetched are skipped and tried again later.
    pub async fn fetch_settlement_lines(
        &self,
        creds: &ShopCredentials,
        order_ids: &[String],
    ) -> Result<Vec<SettlementLine>, MarketplaceApiError> {
        let mut lines = Vec::new();
        for order_id in order_ids {
            let value = match self.shop_get(creds, ESCROW_PATH, &[("order_sn", order_id.clone())]).await {
                Ok(v) => v,
                Err(e) => {
                    info!("💰️ Could not fetch the Shopee escrow for order {order_id}. Skipping it. {e}");
                    continue;
                },
            };
            lines.extend(escrow_lines(order_id, &value["response"]["order_income"])?);
        }
        Ok(lines)
    }

    pub async fn fetch_new_tokens(&self, creds: &ShopCredentials) -> Result<TokenPair, MarketplaceApiError> {
        let query = Self::auth_params(creds, TOKEN_PATH, false)?;
        let body = json!({
            "refresh_token": creds.refresh_token.reveal(),
            "partner_id": creds.numeric_partner_id()?,
            "shop_id": creds.numeric_shop_id()?,
        });
        let req = self.client.post(self.url(TOKEN_PATH)).query(&query).json(&body);
        let value = send_for_json(req).await.and_then(Self::check_response)?;
        token_pair(&value)
    }
}

pub(crate) fn token_pair(value: &Value) -> Result<TokenPair, MarketplaceApiError> {
    let field = |name: &str| {
        value[name]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(String::from)
            .ok_or_else(|| MarketplaceApiError::MissingField(name.to_string()))
    };
    Ok(TokenPair { access_token: field("access_token")?, refresh_token: field("refresh_token")? })
}

/// Normalizes one entry of `get_order_detail`'s `order_list`.
///
/// The SKU is the model SKU when the listing has variations, otherwise the item SKU. Receivables are the discounted
/// model price times the quantity purchased.
pub fn parse_order_detail(order: &Value) -> Result<MarketplaceOrder, MarketplaceApiError> {
    let order_id = required_id(order, "order_sn")?;
    let created_at = unix_time(&order["create_time"]).ok_or_else(|| MarketplaceApiError::MissingField("create_time".into()))?;
    let mut items = Vec::new();
    let mut receivables = Cents::default();
    for item in array(order, "item_list") {
        let sku = match item["model_sku"].as_str() {
            Some(s) if !s.is_empty() => s,
            _ => item["item_sku"].as_str().unwrap_or_default(),
        };
        let quantity = integer(&item["model_quantity_purchased"]).unwrap_or(1);
        receivables += amount(&item["model_discounted_price"])? * quantity;
        items.push(OrderedItem::new(sku, quantity));
    }
    let cancel_reason = order["cancel_reason"].as_str().filter(|s| !s.is_empty()).map(String::from);
    Ok(MarketplaceOrder {
        order_id,
        status: order["order_status"].as_str().unwrap_or_default().to_string(),
        created_at,
        items,
        receivables,
        cancel_reason,
        is_gift: false,
    })
}

/// Splits Shopee's escrow into an item credit and a single fee line so that `credit - fees` is the escrow paid out.
/// An escrow above the subtotal is a rebate. It is folded into the credit, so the fee line is never negative.
pub fn escrow_lines(order_id: &str, income: &Value) -> Result<Vec<SettlementLine>, MarketplaceApiError> {
    if income.is_null() {
        return Ok(Vec::new());
    }
    let subtotal = amount(&income["cost_of_goods_sold"])?;
    let escrow = match &income["escrow_amount_after_adjustment"] {
        Value::Null => amount(&income["escrow_amount"])?,
        v => amount(v)?,
    };
    let credit = subtotal.max(escrow);
    Ok(vec![
        SettlementLine::new(order_id, ITEM_PRICE_CREDIT, credit),
        SettlementLine::new(order_id, SHOPEE_FEES, credit - escrow),
    ])
}

impl MarketplaceClient for ShopeeApi {
    fn platform(&self) -> Platform {
        Platform::Shopee
    }

    async fn list_orders(
        &self,
        creds: &ShopCredentials,
        window: &TimeWindow,
        status: Option<&str>,
    ) -> ApiResult<Vec<OrderSummary>> {
        self.fetch_order_list(creds, window, status).await.into()
    }

    async fn get_order_details(&self, creds: &ShopCredentials, order_ids: &[String]) -> ApiResult<Vec<MarketplaceOrder>> {
        self.fetch_order_details(creds, order_ids).await.into()
    }

    async fn get_stock_levels(&self, creds: &ShopCredentials, skus: &[String]) -> ApiResult<Vec<ListingStock>> {
        self.fetch_stock_levels(creds, skus).await.into()
    }

    async fn update_stock(&self, creds: &ShopCredentials, updates: &[StockUpdate]) -> ApiResult<StockUpdateReport> {
        ApiResult::success(self.push_stock(creds, updates).await)
    }

    async fn get_settlement_lines(
        &self,
        creds: &ShopCredentials,
        query: &SettlementQuery,
    ) -> ApiResult<Vec<SettlementLine>> {
        self.fetch_settlement_lines(creds, &query.order_ids).await.into()
    }

    async fn refresh_tokens(&self, creds: &ShopCredentials) -> ApiResult<TokenPair> {
        self.fetch_new_tokens(creds).await.into()
    }
}
