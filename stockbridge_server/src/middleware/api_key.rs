//! API key middleware for the operational endpoints.
//!
//! Every request must carry the configured key in the `x-api-key` header. If no key is configured, every request is
//! refused with a 401.
use std::{future::Future, pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::{ok, Ready};
use log::*;
use stockbridge_common::Secret;

use crate::{errors::ServerError, helpers::constant_time_eq};

pub const API_KEY_HEADER: &str = "x-api-key";

pub struct ApiKeyMiddlewareFactory {
    api_key: Secret<String>,
}

impl ApiKeyMiddlewareFactory {
    pub fn new(api_key: Secret<String>) -> Self {
        ApiKeyMiddlewareFactory { api_key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = ApiKeyMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ApiKeyMiddlewareService { api_key: self.api_key.clone(), service: Rc::new(service) })
    }
}

pub struct ApiKeyMiddlewareService<S> {
    api_key: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let expected = self.api_key.clone();
        Box::pin(async move {
            let provided = req.headers().get(API_KEY_HEADER).map(|v| v.as_bytes()).unwrap_or_default();
            if !expected.is_empty() && constant_time_eq(provided, expected.reveal().as_bytes()) {
                service.call(req).await
            } else {
                warn!("🔐️ Refused {} {}: missing or invalid API key", req.method(), req.path());
                Err(ServerError::Unauthorized.into())
            }
        })
    }
}
