use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use stockbridge_common::{Platform, Secret};

use crate::{rest::send_for_json, MarketplaceApiError, MarketplaceOrder};

pub const CREATE_THREAD_PATH: &str = "/api/notifications/orders/createOrderThread";
pub const UPDATE_THREAD_PATH: &str = "/api/notifications/orders/updateOrderThread";

/// A Discord thread the bot opened for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadAssignment {
    pub order_id: String,
    #[serde(deserialize_with = "thread_id")]
    pub thread_id: String,
}

fn thread_id<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    crate::helpers::id_text(&v).ok_or_else(|| serde::de::Error::custom(format!("invalid thread id {v}")))
}

#[derive(Debug, Deserialize)]
struct CreateThreadsResponse {
    #[serde(default)]
    updated: Vec<ThreadAssignment>,
}

/// Client for the service that fronts the Discord bot.
#[derive(Clone)]
pub struct BotNotifier {
    base_url: String,
    client: Arc<Client>,
}

impl std::fmt::Debug for BotNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BotNotifier ({})", self.base_url)
    }
}

impl BotNotifier {
    pub fn new(base_url: &str, api_key: &Secret<String>) -> Result<Self, MarketplaceApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let key = HeaderValue::from_str(api_key.reveal()).map_err(|e| MarketplaceApiError::Initialization(e.to_string()))?;
        headers.insert("x-api-key", key);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MarketplaceApiError::Initialization(e.to_string()))?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client: Arc::new(client) })
    }

    pub async fn create_order_threads(
        &self,
        platform: Platform,
        orders: &[MarketplaceOrder],
    ) -> Result<Vec<ThreadAssignment>, MarketplaceApiError> {
        let body = json!({ "data": orders, "platform": platform });
        let url = format!("{}{CREATE_THREAD_PATH}", self.base_url);
        let value = send_for_json(self.client.post(url).json(&body)).await?;
        let response: CreateThreadsResponse =
            serde_json::from_value(value).map_err(|e| MarketplaceApiError::JsonError(e.to_string()))?;
        info!("📣️ The bot opened {} threads for {platform} orders", response.updated.len());
        Ok(response.updated)
    }

    pub async fn update_order_thread(
        &self,
        platform: Platform,
        thread_id: &str,
        status: &str,
    ) -> Result<(), MarketplaceApiError> {
        let body = json!({ "status": status, "threadId": thread_id, "platform": platform });
        let url = format!("{}{UPDATE_THREAD_PATH}", self.base_url);
        send_for_json(self.client.post(url).json(&body)).await?;
        debug!("📣️ Posted status {status} to thread {thread_id}");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn thread_ids_may_be_numbers() {
        let r: CreateThreadsResponse =
            serde_json::from_str(r#"{"updated": [{"orderId": "X1", "threadId": 1210987654321}, {"orderId": "X2", "threadId": "77"}]}"#)
                .unwrap();
        assert_eq!(r.updated[0].thread_id, "1210987654321");
        assert_eq!(r.updated[1], ThreadAssignment { order_id: "X2".into(), thread_id: "77".into() });
        let empty: CreateThreadsResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.updated.is_empty());
    }
}
