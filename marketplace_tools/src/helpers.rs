use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use stockbridge_common::Cents;

use crate::MarketplaceApiError;

/// Vendors send identifiers as numbers or strings, depending on the endpoint.
pub fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn required_id(value: &Value, field: &str) -> Result<String, MarketplaceApiError> {
    id_text(&value[field]).ok_or_else(|| MarketplaceApiError::MissingField(field.to_string()))
}

/// Parses a vendor amount that may be a number, a numeric string, or a string with thousands separators.
pub fn amount(value: &Value) -> Result<Cents, MarketplaceApiError> {
    match value {
        Value::Number(n) => {
            n.as_f64().map(Cents::from_decimal).ok_or_else(|| MarketplaceApiError::InvalidCurrencyAmount(n.to_string()))
        },
        Value::String(s) => s.parse::<Cents>().map_err(|e| MarketplaceApiError::InvalidCurrencyAmount(e.to_string())),
        Value::Null => Ok(Cents::default()),
        other => Err(MarketplaceApiError::InvalidCurrencyAmount(other.to_string())),
    }
}

pub fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub fn unix_time(value: &Value) -> Option<DateTime<Utc>> {
    integer(value).and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

/// Parses Lazada's `2024-03-01 10:00:00 +0800` timestamps, and falls back to RFC 3339.
pub fn lazada_time(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S %z")
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok().map(|d| Utc.from_utc_datetime(&d)))
}

pub fn array<'a>(value: &'a Value, field: &str) -> &'a [Value] {
    value[field].as_array().map(|v| v.as_slice()).unwrap_or(&[])
}
