use std::time::Duration;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    RequestBuilder,
};
use serde_json::Value;

use crate::{MarketplaceApiError, MarketplaceConfig};

pub(crate) fn build_client(config: &MarketplaceConfig) -> Result<Client, MarketplaceApiError> {
    let mut headers = HeaderMap::with_capacity(1);
    headers.insert("Content-Type", HeaderValue::from_static("application/json"));
    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| MarketplaceApiError::Initialization(e.to_string()))
}

/// Sends the request and parses the body as JSON. Vendor-level success codes are checked by the caller.
pub(crate) async fn send_for_json(req: RequestBuilder) -> Result<Value, MarketplaceApiError> {
    let response = req.send().await.map_err(|e| MarketplaceApiError::RestResponseError(e.to_string()))?;
    let status = response.status();
    if status.is_success() {
        trace!("REST query successful. {status}");
        response.json::<Value>().await.map_err(|e| MarketplaceApiError::JsonError(e.to_string()))
    } else {
        let message = response.text().await.map_err(|e| MarketplaceApiError::RestResponseError(e.to_string()))?;
        Err(MarketplaceApiError::QueryError { status: status.as_u16(), message })
    }
}

/// Vendors signal success with `code == 0`, sent either as a number or a string.
pub(crate) fn check_zero_code(value: Value) -> Result<Value, MarketplaceApiError> {
    let ok = match &value["code"] {
        Value::Number(n) => n.as_i64() == Some(0),
        Value::String(s) => s == "0",
        _ => false,
    };
    if ok {
        Ok(value)
    } else {
        let message = value["message"]
            .as_str()
            .or_else(|| value["code"].as_str())
            .map(String::from)
            .unwrap_or_else(|| format!("code {}", value["code"]));
        Err(MarketplaceApiError::VendorRejected { message, payload: value })
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn zero_codes() {
        assert!(check_zero_code(json!({"code": 0, "data": {}})).is_ok());
        assert!(check_zero_code(json!({"code": "0", "data": {}})).is_ok());
        let err = check_zero_code(json!({"code": "IllegalAccessToken", "message": "The specified access token is invalid"}));
        match err {
            Err(MarketplaceApiError::VendorRejected { message, payload }) => {
                assert_eq!(message, "The specified access token is invalid");
                assert_eq!(payload["code"], "IllegalAccessToken");
            },
            _ => panic!("expected a vendor rejection"),
        }
        assert!(check_zero_code(json!({"data": {}})).is_err());
    }
}
