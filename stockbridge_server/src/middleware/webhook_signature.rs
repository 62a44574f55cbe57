//! Webhook signature middleware.
//!
//! The marketplaces sign every push with an HMAC-SHA256 of the request body, sent hex-encoded in the `Authorization`
//! header:
//! * Shopee signs `callback_url + "|" + body` with the partner key.
//! * Lazada and TikTok sign `app_key + body` with the app secret.
//!
//! The keys are read from the shop credentials in the database on each request, so that rotated secrets take effect
//! without a restart. The platform is the last segment of the request path (`/webhook/{platform}`).
//!
//! A missing or invalid signature is rejected with a 401.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::*;
use marketplace_tools::signing::verify_webhook_signature;
use stockbridge_common::Platform;
use stockbridge_engine::{ReconciliationError, ShopTokenManagement};

use crate::errors::ServerError;

pub const SIGNATURE_HEADER: &str = "Authorization";

pub struct WebhookSignatureFactory<D> {
    db: D,
    shopee_callback_url: String,
    // If false, then the middleware will not check the signature and always allow the call
    enabled: bool,
}

impl<D> WebhookSignatureFactory<D> {
    pub fn new(db: D, shopee_callback_url: &str, enabled: bool) -> Self {
        WebhookSignatureFactory { db, shopee_callback_url: shopee_callback_url.to_string(), enabled }
    }
}

impl<S, B, D> Transform<S, ServiceRequest> for WebhookSignatureFactory<D>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    D: ShopTokenManagement + Clone + 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = WebhookSignatureService<S, D>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(WebhookSignatureService {
            db: self.db.clone(),
            shopee_callback_url: self.shopee_callback_url.clone(),
            enabled: self.enabled,
            service: Rc::new(service),
        }))
    }
}

pub struct WebhookSignatureService<S, D> {
    db: D,
    shopee_callback_url: String,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B, D> Service<ServiceRequest> for WebhookSignatureService<S, D>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    D: ShopTokenManagement + Clone + 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let db = self.db.clone();
        let callback_url = self.shopee_callback_url.clone();
        let enabled = self.enabled;
        Box::pin(async move {
            trace!("🔐️ Checking webhook signature for {}", req.path());
            if !enabled {
                trace!("🔐️ Webhook signature checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            let platform = req
                .path()
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .and_then(|s| s.parse::<Platform>().ok())
                .ok_or_else(|| ServerError::InvalidRequestPath(format!("{} is not a webhook path", req.path())))?;
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract {platform} webhook body: {e:?}");
                ServerError::InvalidRequestBody(e.to_string())
            })?;
            let signature = req
                .headers()
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
                .ok_or_else(|| {
                    warn!("🔐️ No signature found in {platform} webhook. Denying access.");
                    ServerError::WebhookFailed(ReconciliationError::SignatureInvalid)
                })?;
            let creds = db
                .fetch_credentials(platform)
                .await
                .map_err(ServerError::Reconciliation)?
                .ok_or(ServerError::Reconciliation(ReconciliationError::NoCredentials(platform)))?;
            let valid = verify_webhook_signature(
                platform,
                creds.app_secret.reveal(),
                &creds.app_key,
                &callback_url,
                data.as_ref(),
                &signature,
            );
            if valid {
                trace!("🔐️ {platform} webhook signature ✅️");
                req.set_payload(bytes_to_payload(data));
                service.call(req).await
            } else {
                warn!("🔐️ Invalid {platform} webhook signature. Denying access.");
                Err(ServerError::WebhookFailed(ReconciliationError::SignatureInvalid).into())
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
