use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use log::*;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use stockbridge_common::{Cents, Platform};

use crate::{
    client::MarketplaceClient,
    helpers::{amount, array, id_text, integer, required_id, unix_time},
    rest::{build_client, check_zero_code, send_for_json},
    signing::tiktok_signature,
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

const ORDER_SEARCH_PATH: &str = "/order/202309/orders/search";
const ORDER_DETAIL_PATH: &str = "/order/202309/orders";
const PRODUCT_SEARCH_PATH: &str = "/product/202312/products/search";
const STATEMENTS_PATH: &str = "/finance/202309/statements";
const TOKEN_REFRESH_PATH: &str = "/api/v2/token/refresh";
const MAX_BATCH: usize = 50;
pub const TIKTOK_FEES: &str = "TikTok Fees";

#[derive(Clone)]
pub struct TiktokApi {
    config: MarketplaceConfig,
    client: Arc<Client>,
}

impl std::fmt::Debug for TiktokApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TiktokApi ({})", self.config.tiktok_host)
    }
}

impl TiktokApi {
    pub fn new(config: MarketplaceConfig) -> Result<Self, MarketplaceApiError> {
        let client = build_client(&config)?;
        Ok(Self { config, client: Arc::new(client) })
    }

    /// Signs and sends a shop-level call. The JSON body is serialized once so that the signed and the sent bytes are
    /// identical.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        creds: &ShopCredentials,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, MarketplaceApiError> {
        let mut query = BTreeMap::new();
        query.insert("app_key".to_string(), creds.app_key.clone());
        query.insert("shop_cipher".to_string(), creds.shop_cipher()?.to_string());
        query.insert("timestamp".to_string(), Utc::now().timestamp().to_string());
        params.iter().for_each(|(k, v)| {
            query.insert(k.to_string(), v.clone());
        });
        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| MarketplaceApiError::RestRequestError(e.to_string()))?;
        let sign = tiktok_signature(path, &query, body.as_deref(), creds.app_secret.reveal());
        query.insert("sign".to_string(), sign);
        trace!("Sending TikTok {method} {path}");
        let mut req = self
            .client
            .request(method, format!("{}{path}", self.config.tiktok_host))
            .header("x-tts-access-token", creds.access_token.reveal().as_str())
            .query(&query.into_iter().collect::<Vec<(String, String)>>());
        if let Some(body) = body {
            req = req.body(body);
        }
        send_for_json(req).await.and_then(check_zero_code)
    }

    pub async fn fetch_order_list(
        &self,
        creds: &ShopCredentials,
        window: &TimeWindow,
        status: Option<&str>,
    ) -> Result<Vec<OrderSummary>, MarketplaceApiError> {
        let mut body = json!({
            "create_time_ge": window.start.timestamp(),
            "create_time_lt": window.end.timestamp(),
        });
        if let Some(status) = status {
            body["order_status"] = json!(status);
        }
        let mut orders = Vec::new();
        let mut page_token = String::new();
        loop {
            let mut params = vec![
                ("page_size", "100".to_string()),
                ("sort_field", "create_time".to_string()),
                ("sort_order", "ASC".to_string()),
            ];
            if !page_token.is_empty() {
                params.push(("page_token", page_token.clone()));
            }
            let value = self.call(Method::POST, ORDER_SEARCH_PATH, creds, &params, Some(&body)).await?;
            let data = &value["data"];
            for order in array(data, "orders") {
                let status = order["status"].as_str().or(status).unwrap_or_default();
                orders.push(OrderSummary { order_id: required_id(order, "id")?, status: status.to_string() });
            }
            page_token = data["next_page_token"].as_str().unwrap_or_default().to_string();
            if page_token.is_empty() || array(data, "orders").is_empty() {
                break;
            }
        }
        debug!("Fetched {} TikTok orders", orders.len());
        Ok(orders)
    }

    pub async fn fetch_order_details(
        &self,
        creds: &ShopCredentials,
        order_ids: &[String],
    ) -> Result<Vec<MarketplaceOrder>, MarketplaceApiError> {
        let mut orders = Vec::with_capacity(order_ids.len());
        for chunk in order_ids.chunks(MAX_BATCH) {
            let value = self.call(Method::GET, ORDER_DETAIL_PATH, creds, &[("ids", chunk.join(","))], None).await?;
            for order in array(&value["data"], "orders") {
                orders.push(parse_order(order)?);
            }
        }
        Ok(orders)
    }

    pub async fn fetch_stock_levels(
        &self,
        creds: &ShopCredentials,
        skus: &[String],
    ) -> Result<Vec<ListingStock>, MarketplaceApiError> {
        let mut levels = Vec::new();
        for chunk in skus.chunks(MAX_BATCH) {
            let body = json!({ "seller_skus": chunk });
            let mut page_token = String::new();
            loop {
                let mut params = vec![("page_size", "100".to_string())];
                if !page_token.is_empty() {
                    params.push(("page_token", page_token.clone()));
                }
                let value = self.call(Method::POST, PRODUCT_SEARCH_PATH, creds, &params, Some(&body)).await?;
                levels.extend(parse_products(&value["data"], chunk)?);
                page_token = value["data"]["next_page_token"].as_str().unwrap_or_default().to_string();
                if page_token.is_empty() || array(&value["data"], "products").is_empty() {
                    break;
                }
            }
        }
        Ok(levels)
    }

    pub async fn push_stock(&self, creds: &ShopCredentials, updates: &[StockUpdate]) -> StockUpdateReport {
        let mut report = StockUpdateReport::default();
        for update in updates {
            let path = format!("/product/202309/products/{}/inventory/update", update.listing.item_id);
            let body = json!({
                "skus": [{ "id": update.listing.variant_id, "inventory": [{ "quantity": update.stock.max(0) }] }],
            });
            let result = self.call(Method::POST, &path, creds, &[], Some(&body)).await;
            if let Err(e) = &result {
                warn!("🔄️ TikTok rejected the stock update for {}. {e}", update.listing.sku);
            }
            report.record(&update.listing.sku, result.is_ok());
        }
        report
    }

    /// Walks every statement issued inside the window and collects its order transactions. A statement whose
    /// transactions cannot be fetched is skipped.
    pub async fn fetch_settlement_lines(
        &self,
        creds: &ShopCredentials,
        window: &TimeWindow,
    ) -> Result<Vec<SettlementLine>, MarketplaceApiError> {
        let mut statement_ids = Vec::new();
        let mut page_token = String::new();
        loop {
            let mut params = vec![
                ("statement_time_ge", window.start.timestamp().to_string()),
                ("statement_time_lt", window.end.timestamp().to_string()),
                ("page_size", "100".to_string()),
                ("sort_field", "statement_time".to_string()),
            ];
            if !page_token.is_empty() {
                params.push(("page_token", page_token.clone()));
            }
            let value = self.call(Method::GET, STATEMENTS_PATH, creds, &params, None).await?;
            for statement in array(&value["data"], "statements") {
                statement_ids.push(required_id(statement, "id")?);
            }
            page_token = value["data"]["next_page_token"].as_str().unwrap_or_default().to_string();
            if page_token.is_empty() || array(&value["data"], "statements").is_empty() {
                break;
            }
        }
        let mut lines = Vec::new();
        for id in statement_ids {
            match self.fetch_statement_transactions(creds, &id).await {
                Ok(transactions) => lines.extend(transaction_lines(&transactions)?),
                Err(e) => info!("💰️ Could not fetch TikTok statement {id}. Skipping it. {e}"),
            }
        }
        Ok(lines)
    }

    async fn fetch_statement_transactions(&self, creds: &ShopCredentials, id: &str) -> Result<Vec<Value>, MarketplaceApiError> {
        let path = format!("{STATEMENTS_PATH}/{id}/statement_transactions");
        let mut transactions = Vec::new();
        let mut page_token = String::new();
        loop {
            let mut params = vec![("sort_field", "order_create_time".to_string()), ("page_size", "50".to_string())];
            if !page_token.is_empty() {
                params.push(("page_token", page_token.clone()));
            }
            let value = self.call(Method::GET, &path, creds, &params, None).await?;
            let page = array(&value["data"], "statement_transactions");
            transactions.extend_from_slice(page);
            page_token = value["data"]["next_page_token"].as_str().unwrap_or_default().to_string();
            if page_token.is_empty() || page.is_empty() {
                break;
            }
        }
        Ok(transactions)
    }

    pub async fn fetch_new_tokens(&self, creds: &ShopCredentials) -> Result<TokenPair, MarketplaceApiError> {
        let query = [
            ("app_key", creds.app_key.as_str()),
            ("app_secret", creds.app_secret.reveal().as_str()),
            ("refresh_token", creds.refresh_token.reveal().as_str()),
            ("grant_type", "refresh_token"),
        ];
        let url = format!("{}{TOKEN_REFRESH_PATH}", self.config.tiktok_auth_host);
        let value = send_for_json(self.client.get(url).query(&query)).await.and_then(check_zero_code)?;
        crate::shopee::token_pair(&value["data"])
    }
}

/// One unit per line item. Receivables are `sub_total + platform_discount - shipping_fee_seller_discount`; a
/// non-positive subtotal marks a gift order.
pub fn parse_order(order: &Value) -> Result<MarketplaceOrder, MarketplaceApiError> {
    let order_id = required_id(order, "id")?;
    let created_at = unix_time(&order["create_time"]).ok_or_else(|| MarketplaceApiError::MissingField("create_time".into()))?;
    let items = array(order, "line_items")
        .iter()
        .map(|item| OrderedItem::new(item["seller_sku"].as_str().unwrap_or_default(), 1))
        .collect();
    let payment = &order["payment"];
    let sub_total = amount(&payment["sub_total"])?;
    let receivables = sub_total + amount(&payment["platform_discount"])? - amount(&payment["shipping_fee_seller_discount"])?;
    Ok(MarketplaceOrder {
        order_id,
        status: order["status"].as_str().unwrap_or_default().to_string(),
        created_at,
        items,
        receivables,
        cancel_reason: order["cancel_reason"].as_str().filter(|s| !s.is_empty()).map(String::from),
        is_gift: !sub_total.is_positive(),
    })
}

pub fn parse_products(data: &Value, requested: &[String]) -> Result<Vec<ListingStock>, MarketplaceApiError> {
    let mut levels = Vec::new();
    for product in array(data, "products") {
        let item_id = required_id(product, "id")?;
        for sku in array(product, "skus") {
            let seller_sku = sku["seller_sku"].as_str().unwrap_or_default();
            if !requested.iter().any(|r| r == seller_sku) {
                continue;
            }
            let stock: i64 = array(sku, "inventory").iter().filter_map(|i| integer(&i["quantity"])).sum();
            let listing = ListingRef { sku: seller_sku.to_string(), item_id: item_id.clone(), variant_id: id_text(&sku["id"]) };
            levels.push(ListingStock { listing, stock });
        }
    }
    Ok(levels)
}

/// TikTok reports the net settlement and the total fees per order. They are expressed as an item credit of
/// `settlement + fees` and one fee line.
pub fn transaction_lines(transactions: &[Value]) -> Result<Vec<SettlementLine>, MarketplaceApiError> {
    let mut lines = Vec::with_capacity(transactions.len() * 2);
    for t in transactions {
        let Some(order_id) = id_text(&t["order_id"]) else { continue };
        let settlement = amount(&t["settlement_amount"])?;
        let fees = amount(&t["fee_amount"])?.abs();
        lines.push(SettlementLine::new(order_id.clone(), ITEM_PRICE_CREDIT, settlement + fees));
        lines.push(SettlementLine::new(order_id, TIKTOK_FEES, fees));
    }
    Ok(lines)
}

impl MarketplaceClient for TiktokApi {
    fn platform(&self) -> Platform {
        Platform::Tiktok
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
        self.fetch_settlement_lines(creds, &query.window).await.into()
    }

    async fn refresh_tokens(&self, creds: &ShopCredentials) -> ApiResult<TokenPair> {
        self.fetch_new_tokens(creds).await.into()
    }
}
