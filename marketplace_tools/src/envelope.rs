use std::fmt::Display;

use serde::Serialize;
use serde_json::Value;

use crate::MarketplaceApiError;

/// The uniform result of every marketplace call: `{ok, data, error}`.
///
/// Client operations never fail past this boundary. Transport and parse failures become `ok: false` with an `error`
/// message. Vendor rejections additionally carry the raw vendor payload in `vendor_payload` for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResult<T> {
    pub ok: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_payload: Option<Value>,
}

impl<T> ApiResult<T> {
    pub fn success(data: T) -> Self {
        Self { ok: true, data: Some(data), error: None, vendor_payload: None }
    }

    pub fn failure<E: Display>(error: E) -> Self {
        Self { ok: false, data: None, error: Some(error.to_string()), vendor_payload: None }
    }

    pub fn rejected<E: Display>(error: E, payload: Value) -> Self {
        Self { ok: false, data: None, error: Some(error.to_string()), vendor_payload: Some(payload) }
    }

    pub fn is_ok(&self) -> bool {
        self.ok && self.data.is_some()
    }

    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown marketplace error")
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ApiResult<U> {
        ApiResult { ok: self.ok, data: self.data.map(f), error: self.error, vendor_payload: self.vendor_payload }
    }

    /// Collapses the envelope into a `Result`, for callers that prefer `?`.
    pub fn into_result(self) -> Result<T, String> {
        match (self.ok, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(self.error.unwrap_or_else(|| "unknown marketplace error".to_string())),
        }
    }
}

impl<T> From<Result<T, MarketplaceApiError>> for ApiResult<T> {
    fn from(result: Result<T, MarketplaceApiError>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(MarketplaceApiError::VendorRejected { message, payload }) => Self::rejected(message, payload),
            Err(e) => Self::failure(e),
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn rejection_keeps_vendor_payload() {
        let err = MarketplaceApiError::VendorRejected {
            message: "IllegalAccessToken".into(),
            payload: json!({"code": "IllegalAccessToken"}),
        };
        let result: ApiResult<u32> = Err(err).into();
        assert!(!result.ok);
        assert_eq!(result.error_message(), "IllegalAccessToken");
        assert_eq!(result.vendor_payload, Some(json!({"code": "IllegalAccessToken"})));
    }

    #[test]
    fn transport_failure_has_no_payload() {
        let result: ApiResult<u32> = Err(MarketplaceApiError::RestResponseError("timeout".into())).into();
        assert!(!result.is_ok());
        assert!(result.vendor_payload.is_none());
        assert_eq!(result.into_result().unwrap_err(), "Invalid REST response: timeout");
    }

    #[test]
    fn serializes_as_envelope() {
        let result = ApiResult::success(vec![1, 2]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, json!({"ok": true, "data": [1, 2]}));
    }
}
