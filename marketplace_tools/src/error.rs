use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketplaceApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The marketplace rejected the request. {message}")]
    VendorRejected { message: String, payload: Value },
    #[error("Credentials are missing a required field: {0}")]
    MissingCredential(&'static str),
    #[error("Vendor response is missing the field {0}")]
    MissingField(String),
    #[error("Invalid currency amount: {0}")]
    InvalidCurrencyAmount(String),
}

impl MarketplaceApiError {
    /// The raw vendor payload, if the marketplace answered but rejected the request.
    pub fn vendor_payload(&self) -> Option<&Value> {
        match self {
            Self::VendorRejected { payload, .. } => Some(payload),
            _ => None,
        }
    }
}
