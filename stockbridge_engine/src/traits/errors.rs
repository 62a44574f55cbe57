use std::fmt::Display;

use serde::{Deserialize, Serialize};
use stockbridge_common::Platform;
use thiserror::Error;

/// The catalog of failure classes the engine reports to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    VendorUnavailable,
    DuplicateOrder,
    CatalogMismatch,
    SignatureInvalid,
    NotFound,
    NoCredentials,
    NothingToDo,
    ConcurrentModification,
    DatabaseError,
    InvalidRequest,
}

impl ErrorCode {
    /// "Expected empty" conditions. Callers treat these as a benign early exit.
    pub fn is_benign(&self) -> bool {
        matches!(self, ErrorCode::NothingToDo | ErrorCode::DuplicateOrder)
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("{platform} did not respond successfully. {message}")]
    VendorUnavailable { platform: Platform, message: String },
    #[error("Order {0} has already been processed")]
    DuplicateOrder(String),
    #[error("No products found in the catalog for SKUs {0:?}")]
    CatalogMismatch(Vec<String>),
    #[error("Webhook signature is missing or invalid")]
    SignatureInvalid,
    #[error("{platform} order {order_id} does not exist")]
    OrderNotFound { platform: Platform, order_id: String },
    #[error("No API credentials are configured for {0}")]
    NoCredentials(Platform),
    #[error("Nothing to do. {0}")]
    NothingToDo(String),
    #[error("Catalog entry {0} was modified concurrently. Try again.")]
    ConcurrentModification(String),
    #[error("Invalid request. {0}")]
    InvalidRequest(String),
    #[error("The notification service did not respond successfully. {0}")]
    NotifierUnavailable(String),
}

impl ReconciliationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DatabaseError(_) => ErrorCode::DatabaseError,
            Self::VendorUnavailable { .. } => ErrorCode::VendorUnavailable,
            Self::DuplicateOrder(_) => ErrorCode::DuplicateOrder,
            Self::CatalogMismatch(_) => ErrorCode::CatalogMismatch,
            Self::SignatureInvalid => ErrorCode::SignatureInvalid,
            Self::OrderNotFound { .. } => ErrorCode::NotFound,
            Self::NoCredentials(_) => ErrorCode::NoCredentials,
            Self::NothingToDo(_) => ErrorCode::NothingToDo,
            Self::ConcurrentModification(_) => ErrorCode::ConcurrentModification,
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::NotifierUnavailable(_) => ErrorCode::VendorUnavailable,
        }
    }

    pub fn vendor<S: Into<String>>(platform: Platform, message: S) -> Self {
        Self::VendorUnavailable { platform, message: message.into() }
    }
}

impl From<sqlx::Error> for ReconciliationError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}
