//! Turns the marketplaces' push payloads into engine status notifications.
//!
//! | Platform | Order status message | Order id | Status |
//! |---|---|---|---|
//! | Shopee | `code == 3` | `data.ordersn` | `data.status` |
//! | Lazada | `message_type == 0` | `data.trade_order_id` | `data.order_status` |
//! | TikTok | `type == 1` | `data.order_id` | `data.order_status` |
//!
//! Every other message type is acknowledged and ignored.
use log::*;
use serde_json::Value;
use stockbridge_common::Platform;
use stockbridge_engine::StatusNotification;
use thiserror::Error;

pub const SHOPEE_ORDER_STATUS_CODE: i64 = 3;
pub const LAZADA_ORDER_STATUS_TYPE: i64 = 0;
pub const TIKTOK_ORDER_STATUS_TYPE: i64 = 1;

#[derive(Debug, Clone, Error)]
pub enum WebhookParseError {
    #[error("The webhook body is not valid JSON. {0}")]
    InvalidJson(String),
    #[error("The webhook payload has no {0} field")]
    MissingField(&'static str),
}

/// Extracts the order status notification from a webhook body. `Ok(None)` means the message is not about an order
/// status.
pub fn parse_webhook(platform: Platform, body: &[u8]) -> Result<Option<StatusNotification>, WebhookParseError> {
    let payload: Value = serde_json::from_slice(body).map_err(|e| WebhookParseError::InvalidJson(e.to_string()))?;
    let (type_field, expected, id_field, status_field) = match platform {
        Platform::Shopee => ("code", SHOPEE_ORDER_STATUS_CODE, "ordersn", "status"),
        Platform::Lazada => ("message_type", LAZADA_ORDER_STATUS_TYPE, "trade_order_id", "order_status"),
        Platform::Tiktok => ("type", TIKTOK_ORDER_STATUS_TYPE, "order_id", "order_status"),
    };
    let message_type = payload.get(type_field).and_then(integer);
    if message_type != Some(expected) {
        debug!("🛍️ Ignoring {platform} push of type {message_type:?}");
        return Ok(None);
    }
    let data = payload.get("data").ok_or(WebhookParseError::MissingField("data"))?;
    let order_id = data.get(id_field).and_then(text).ok_or(WebhookParseError::MissingField(id_field))?;
    let status = data.get(status_field).and_then(text).ok_or(WebhookParseError::MissingField(status_field))?;
    let mut notification = StatusNotification::new(platform, order_id, status);
    if let Some(reason) = data.get("cancel_reason").and_then(text) {
        notification = notification.with_cancel_reason(reason);
    }
    Ok(Some(notification))
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Ids arrive as strings or numbers, depending on the vendor.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
