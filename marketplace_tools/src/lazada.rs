use std::{collections::BTreeMap, sync::Arc};

use chrono::{SecondsFormat, Utc};
use log::*;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use stockbridge_common::{Cents, Platform};

use crate::{
    client::MarketplaceClient,
    helpers::{amount, array, id_text, integer, lazada_time, required_id},
    rest::{build_client, check_zero_code, send_for_json},
    shopee::token_pair,
    signing::{lazada_signature, scalar_text},
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
};

const ORDER_LIST_PATH: &str = "/orders/get";
const ORDER_ITEMS_PATH: &str = "/orders/items/get";
const PRODUCTS_PATH: &str = "/products/get";
const SELLABLE_UPDATE_PATH: &str = "/product/stock/sellable/update";
const TRANSACTIONS_PATH: &str = "/finance/transaction/details/get";
const TOKEN_REFRESH_PATH: &str = "/auth/token/refresh";
const ORDER_PAGE_SIZE: usize = 100;
const TRANSACTION_PAGE_SIZE: usize = 500;
const MAX_BATCH: usize = 50;

#[derive(Clone)]
pub struct LazadaApi {
    config: MarketplaceConfig,
    client: Arc<Client>,
}

impl std::fmt::Debug for LazadaApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LazadaApi ({})", self.config.lazada_host)
    }
}

impl LazadaApi {
    pub fn new(config: MarketplaceConfig) -> Result<Self, MarketplaceApiError> {
        let client = build_client(&config)?;
        Ok(Self { config, client: Arc::new(client) })
    }

    /// Signs and sends a call. `params` are the call's own parameters; the common ones are added here.
    ///
    /// Calls to the auth host carry no access token.
    pub async fn call(
        &self,
        method: Method,
        host: &str,
        path: &str,
        creds: &ShopCredentials,
        params: BTreeMap<String, Value>,
    ) -> Result<Value, MarketplaceApiError> {
        let mut all = params;
        all.insert("app_key".into(), json!(creds.app_key));
        all.insert("timestamp".into(), json!(Utc::now().timestamp_millis()));
        all.insert("sign_method".into(), json!("sha256"));
        if host != self.config.lazada_auth_host {
            all.insert("access_token".into(), json!(creds.access_token.reveal()));
        }
        let sign = lazada_signature(path, &all, creds.app_secret.reveal());
        let mut query = all.iter().filter_map(|(k, v)| scalar_text(v).map(|v| (k.clone(), v))).collect::<Vec<_>>();
        query.push(("sign".to_string(), sign));
        trace!("Sending Lazada {method} {path}");
        let req = self.client.request(method, format!("{host}{path}")).query(&query);
        send_for_json(req).await.and_then(check_zero_code)
    }

    async fn get(&self, path: &str, creds: &ShopCredentials, params: BTreeMap<String, Value>) -> Result<Value, MarketplaceApiError> {
        self.call(Method::GET, &self.config.lazada_host, path, creds, params).await
    }

    pub async fn fetch_order_list(
        &self,
        creds: &ShopCredentials,
        window: &TimeWindow,
        status: Option<&str>,
    ) -> Result<Vec<OrderSummary>, MarketplaceApiError> {
        let mut orders = Vec::new();
        loop {
            let mut params = BTreeMap::new();
            params.insert("created_after".into(), json!(window.start.to_rfc3339_opts(SecondsFormat::Secs, false)));
            params.insert("created_before".into(), json!(window.end.to_rfc3339_opts(SecondsFormat::Secs, false)));
            params.insert("sort_by".into(), json!("created_at"));
            params.insert("sort_direction".into(), json!("ASC"));
            params.insert("offset".into(), json!(orders.len()));
            params.insert("limit".into(), json!(ORDER_PAGE_SIZE));
            if let Some(status) = status {
                params.insert("status".into(), json!(status));
            }
            let value = self.get(ORDER_LIST_PATH, creds, params).await?;
            let page = array(&value["data"], "orders");
            for order in page {
                let order_id = id_text(&order["order_number"])
                    .or_else(|| id_text(&order["order_id"]))
                    .ok_or_else(|| MarketplaceApiError::MissingField("order_number".into()))?;
                let vendor_status = array(order, "statuses").first().and_then(|s| s.as_str()).or(status).unwrap_or_default();
                orders.push(OrderSummary { order_id, status: vendor_status.to_string() });
            }
            if page.len() < ORDER_PAGE_SIZE {
                break;
            }
        }
        debug!("Fetched {} Lazada orders", orders.len());
        Ok(orders)
    }

    pub async fn fetch_order_details(
        &self,
        creds: &ShopCredentials,
        order_ids: &[String],
    ) -> Result<Vec<MarketplaceOrder>, MarketplaceApiError> {
        let mut orders = Vec::with_capacity(order_ids.len());
        for chunk in order_ids.chunks(MAX_BATCH) {
            let ids = serde_json::to_string(chunk).map_err(|e| MarketplaceApiError::RestRequestError(e.to_string()))?;
            let mut params = BTreeMap::new();
            params.insert("order_ids".into(), json!(ids));
            let value = self.get(ORDER_ITEMS_PATH, creds, params).await?;
            for entry in value["data"].as_array().map(|v| v.as_slice()).unwrap_or(&[]) {
                let order_id = id_text(&entry["order_number"]).or_else(|| id_text(&entry["order_id"]));
                let Some(order_id) = order_id else { continue };
                orders.push(parse_order_items(&order_id, array(entry, "order_items"))?);
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
            let list = serde_json::to_string(chunk).map_err(|e| MarketplaceApiError::RestRequestError(e.to_string()))?;
            let mut params = BTreeMap::new();
            params.insert("sku_seller_list".into(), json!(list));
            let value = self.get(PRODUCTS_PATH, creds, params).await?;
            levels.extend(parse_products(&value["data"], chunk)?);
        }
        Ok(levels)
    }

    /// Lazada updates every SKU in one call, so the whole batch succeeds or fails together.
    pub async fn push_stock(&self, creds: &ShopCredentials, updates: &[StockUpdate]) -> StockUpdateReport {
        let mut report = StockUpdateReport::default();
        if updates.is_empty() {
            return report;
        }
        let mut params = BTreeMap::new();
        params.insert("payload".into(), json!(sellable_quantity_payload(updates)));
        let result = self.call(Method::POST, &self.config.lazada_host, SELLABLE_UPDATE_PATH, creds, params).await;
        if let Err(e) = &result {
            warn!("🔄️ Lazada rejected the stock update for {} SKUs. {e}", updates.len());
        }
        updates.iter().for_each(|u| report.record(&u.listing.sku, result.is_ok()));
        report
    }

    pub async fn fetch_settlement_lines(
        &self,
        creds: &ShopCredentials,
        window: &TimeWindow,
    ) -> Result<Vec<SettlementLine>, MarketplaceApiError> {
        let start = window.start.format("%Y-%m-%d").to_string();
        let end = window.end.format("%Y-%m-%d").to_string();
        let mut transactions = Vec::new();
        loop {
            let mut params = BTreeMap::new();
            params.insert("start_time".into(), json!(start));
            params.insert("end_time".into(), json!(end));
            params.insert("limit".into(), json!(TRANSACTION_PAGE_SIZE));
            if !transactions.is_empty() {
                params.insert("offset".into(), json!(transactions.len()));
            }
            let value = self.get(TRANSACTIONS_PATH, creds, params).await?;
            let page = value["data"].as_array().cloned().unwrap_or_default();
            let full_page = page.len() == TRANSACTION_PAGE_SIZE;
            transactions.extend(page);
            if !full_page {
                break;
            }
        }
        debug!("💰️ Fetched {} Lazada transactions from {start} to {end}", transactions.len());
        paid_transaction_lines(&transactions)
    }

    pub async fn fetch_new_tokens(&self, creds: &ShopCredentials) -> Result<TokenPair, MarketplaceApiError> {
        let mut params = BTreeMap::new();
        params.insert("refresh_token".into(), json!(creds.refresh_token.reveal()));
        let host = self.config.lazada_auth_host.clone();
        let value = self.call(Method::POST, &host, TOKEN_REFRESH_PATH, creds, params).await?;
        token_pair(&value)
    }
}

/// One unit per item row. The catalog SKU is the seller SKU up to the first `-`; the rest is a variation suffix.
pub fn parse_order_items(order_id: &str, items: &[Value]) -> Result<MarketplaceOrder, MarketplaceApiError> {
    let first = items.first().ok_or_else(|| MarketplaceApiError::MissingField(format!("order_items of {order_id}")))?;
    let created_at = lazada_time(&first["created_at"]).ok_or_else(|| MarketplaceApiError::MissingField("created_at".into()))?;
    let mut receivables = Cents::default();
    let mut ordered = Vec::with_capacity(items.len());
    for item in items {
        let sku = item["sku"].as_str().unwrap_or_default();
        let sku = sku.split('-').next().unwrap_or(sku);
        ordered.push(OrderedItem::new(sku, 1));
        receivables += amount(&item["item_price"])?;
    }
    Ok(MarketplaceOrder {
        order_id: order_id.to_string(),
        status: first["status"].as_str().unwrap_or_default().to_string(),
        created_at,
        items: ordered,
        receivables,
        cancel_reason: first["reason"].as_str().filter(|s| !s.is_empty()).map(String::from),
        is_gift: false,
    })
}

pub fn parse_products(data: &Value, requested: &[String]) -> Result<Vec<ListingStock>, MarketplaceApiError> {
    let mut levels = Vec::new();
    for product in array(data, "products") {
        let item_id = required_id(product, "item_id")?;
        for sku in array(product, "skus") {
            let seller_sku = sku["SellerSku"].as_str().unwrap_or_default();
            if !requested.iter().any(|r| r == seller_sku) {
                continue;
            }
            let listing = ListingRef { sku: seller_sku.to_string(), item_id: item_id.clone(), variant_id: id_text(&sku["SkuId"]) };
            let stock = integer(&sku["quantity"]).unwrap_or_default();
            levels.push(ListingStock { listing, stock });
        }
    }
    Ok(levels)
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;").replace('\'', "&apos;")
}

pub fn sellable_quantity_payload(updates: &[StockUpdate]) -> String {
    let skus = updates
        .iter()
        .map(|u| {
            format!(
                "<Sku><ItemId>{}</ItemId><SkuId>{}</SkuId><SellerSku>{}</SellerSku><SellableQuantity>{}</SellableQuantity></Sku>",
                xml_escape(&u.listing.item_id),
                xml_escape(u.listing.variant_id.as_deref().unwrap_or_default()),
                xml_escape(&u.listing.sku),
                u.stock.max(0)
            )
        })
        .collect::<String>();
    format!("<Request><Product><Skus>{skus}</Skus></Product></Request>")
}

/// Only transactions that Lazada has actually paid out count towards a settlement.
pub fn paid_transaction_lines(transactions: &[Value]) -> Result<Vec<SettlementLine>, MarketplaceApiError> {
    transactions
        .iter()
        .filter(|t| t["paid_status"].as_str() == Some("paid"))
        .filter_map(|t| id_text(&t["order_no"]).map(|order_id| (order_id, t)))
        .map(|(order_id, t)| {
            let fee_name = t["fee_name"].as_str().unwrap_or_default();
            Ok(SettlementLine::new(order_id, fee_name, amount(&t["amount"])?))
        })
        .collect()
}

impl MarketplaceClient for LazadaApi {
    fn platform(&self) -> Platform {
        Platform::Lazada
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
