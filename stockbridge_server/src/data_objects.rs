use std::fmt::Display;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stockbridge_common::Platform;
use stockbridge_engine::SkuQuantity;

use crate::helpers::{any_case_platform, optional_any_case_platform};

/// The envelope every endpoint answers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub ok: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { ok: true, message: message.to_string(), data: None }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { ok: false, message: message.to_string(), data: None }
    }

    /// Attaches a payload. Values that cannot be represented as JSON are dropped.
    pub fn with_data<T: Serialize>(mut self, data: &T) -> Self {
        self.data = serde_json::to_value(data).ok();
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformParam {
    #[serde(deserialize_with = "any_case_platform")]
    pub platform: Platform,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReturnParams {
    #[serde(deserialize_with = "any_case_platform")]
    pub platform: Platform,
    pub order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SkuParam {
    pub sku: String,
}

/// `YYYY-MM-DD` dates, both days included.
#[derive(Debug, Clone, Deserialize)]
pub struct MovementQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, deserialize_with = "optional_any_case_platform")]
    pub platform: Option<Platform>,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetailOrderQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, deserialize_with = "optional_any_case_platform")]
    pub platform: Option<Platform>,
}

/// Accepts a bare list of items or one wrapped in `{"items": [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AddInventoryRequest {
    Items(Vec<SkuQuantity>),
    Wrapped { items: Vec<SkuQuantity> },
}

impl AddInventoryRequest {
    pub fn into_items(self) -> Vec<SkuQuantity> {
        match self {
            Self::Items(items) | Self::Wrapped { items } => items,
        }
    }
}

/// An optional `platform` query parameter. Absent or empty means every platform.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformFilter {
    #[serde(default, deserialize_with = "optional_any_case_platform")]
    pub platform: Option<Platform>,
}
