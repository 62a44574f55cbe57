//! Request and webhook signatures for the three marketplaces.
//!
//! Every vendor signs with HMAC-SHA256, but each canonicalizes the request differently:
//!
//! * **Shopee** concatenates `partner_id + path + timestamp` and, for shop-level calls, `access_token + shop_id`.
//!   The digest is lowercase hex, keyed with the partner key.
//! * **Lazada** sorts the scalar request parameters by name (excluding `sign`), appends `name + value` pairs to the
//!   API path, and uppercases the hex digest. Keyed with the app secret.
//! * **TikTok** sorts the query parameters (excluding `sign` and `access_token`), appends `name + value` pairs and
//!   the JSON body to the path, then wraps the whole string between two copies of the app secret before signing
//!   it with that same secret. Lowercase hex.
//!
//! Vendors reject a request whose signature does not match byte-for-byte, so the body that is signed must be the
//! exact string that is sent.
use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use log::*;
use serde_json::Value;
use sha2::Sha256;
use stockbridge_common::Platform;

type HmacSha256 = Hmac<Sha256>;

fn new_mac(key: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length, so this never fails
    match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts keys of any size"),
    }
}

/// Lowercase hex HMAC-SHA256 of `message` under `key`.
pub fn hmac_sha256_hex(key: &[u8], message: &[u8]) -> String {
    let mut mac = new_mac(key);
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Shop-level parameters that Shopee appends to the base string of authenticated calls.
#[derive(Debug, Clone, Copy)]
pub struct ShopeeShop<'a> {
    pub access_token: &'a str,
    pub shop_id: i64,
}

pub fn shopee_signature(
    partner_key: &str,
    partner_id: i64,
    path: &str,
    timestamp: i64,
    shop: Option<ShopeeShop<'_>>,
) -> String {
    let mut base = format!("{partner_id}{path}{timestamp}");
    if let Some(shop) = shop {
        base.push_str(shop.access_token);
        base.push_str(&shop.shop_id.to_string());
    }
    hmac_sha256_hex(partner_key.as_bytes(), base.as_bytes())
}

/// The textual form of a scalar request parameter. Objects, arrays and nulls have no textual form and are left out of
/// Lazada's canonical string.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

pub fn lazada_signature(api_path: &str, params: &BTreeMap<String, Value>, app_secret: &str) -> String {
    let mut canonical = String::from(api_path);
    params
        .iter()
        .filter(|(k, _)| k.as_str() != "sign")
        .filter_map(|(k, v)| scalar_text(v).map(|v| (k, v)))
        .for_each(|(k, v)| {
            canonical.push_str(k);
            canonical.push_str(&v);
        });
    trace!("🔐️ Lazada canonical string for {api_path} has {} bytes", canonical.len());
    hmac_sha256_hex(app_secret.as_bytes(), canonical.as_bytes()).to_uppercase()
}

pub fn tiktok_signature(path: &str, params: &BTreeMap<String, String>, body: Option<&str>, app_secret: &str) -> String {
    let mut canonical = String::from(path);
    params.iter().filter(|(k, _)| !matches!(k.as_str(), "sign" | "access_token")).for_each(|(k, v)| {
        canonical.push_str(k);
        canonical.push_str(v);
    });
    if let Some(body) = body {
        canonical.push_str(body);
    }
    let wrapped = format!("{app_secret}{canonical}{app_secret}");
    hmac_sha256_hex(app_secret.as_bytes(), wrapped.as_bytes())
}

/// The message a marketplace signs when it pushes a webhook.
///
/// Shopee signs `url|body` where `url` is the callback URL registered with Shopee. Lazada and TikTok sign
/// `app_key + body`.
pub fn webhook_message(platform: Platform, app_key: &str, callback_url: &str, body: &[u8]) -> Vec<u8> {
    let prefix = match platform {
        Platform::Shopee => format!("{callback_url}|"),
        Platform::Lazada | Platform::Tiktok => app_key.to_string(),
    };
    let mut message = Vec::with_capacity(prefix.len() + body.len());
    message.extend_from_slice(prefix.as_bytes());
    message.extend_from_slice(body);
    message
}

/// Checks a hex-encoded webhook signature in constant time.
///
/// `key` is the Shopee partner key or the Lazada/TikTok app secret. Signatures that are not valid hex never verify.
pub fn verify_webhook_signature(
    platform: Platform,
    key: &str,
    app_key: &str,
    callback_url: &str,
    body: &[u8],
    signature: &str,
) -> bool {
    let provided = match hex::decode(signature.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("🔐️ {platform} webhook signature is not hex. {e}");
            return false;
        },
    };
    let mut mac = new_mac(key.as_bytes());
    mac.update(&webhook_message(platform, app_key, callback_url, body));
    mac.verify_slice(&provided).is_ok()
}
