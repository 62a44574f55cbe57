mod api_key;
mod webhook_signature;

pub use api_key::{ApiKeyMiddlewareFactory, ApiKeyMiddlewareService, API_KEY_HEADER};
pub use webhook_signature::{WebhookSignatureFactory, WebhookSignatureService, SIGNATURE_HEADER};
