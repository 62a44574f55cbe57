use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use stockbridge_engine::{ErrorCode, ReconciliationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("Invalid query parameters: {0}")]
    InvalidQuery(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Missing or invalid API key.")]
    Unauthorized,
    #[error("{0}")]
    Reconciliation(#[from] ReconciliationError),
    /// A webhook that could not be processed. The vendor should deliver it again.
    #[error("Webhook could not be processed. {0}")]
    WebhookFailed(ReconciliationError),
    #[error("The service is not configured. {0}")]
    NotConfigured(String),
}

impl ServerError {
    /// The engine error code behind this error, if there is one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Reconciliation(e) | Self::WebhookFailed(e) => Some(e.code()),
            _ => None,
        }
    }
}

fn status_for_code(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NothingToDo => StatusCode::OK,
        ErrorCode::DuplicateOrder => StatusCode::CONFLICT,
        ErrorCode::VendorUnavailable => StatusCode::BAD_GATEWAY,
        ErrorCode::CatalogMismatch => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::SignatureInvalid => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::NoCredentials => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::ConcurrentModification => StatusCode::CONFLICT,
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::NOT_FOUND,
            Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Reconciliation(e) => status_for_code(e.code()),
            Self::WebhookFailed(e) => match e.code() {
                ErrorCode::SignatureInvalid => StatusCode::UNAUTHORIZED,
                code if code.is_benign() => StatusCode::OK,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Expected-empty outcomes still answer 200, with `ok` set so the caller can tell them from failures.
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = serde_json::json!({
            "ok": status.is_success(),
            "message": self.to_string(),
            "code": self.code(),
        });
        HttpResponse::build(status).insert_header(ContentType::json()).body(body.to_string())
    }
}
