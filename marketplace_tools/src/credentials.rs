use serde::{Deserialize, Serialize};
use stockbridge_common::{Platform, Secret};

use crate::MarketplaceApiError;

/// One shop's API credentials, as stored in the `shop_tokens` table.
///
/// For Shopee, `app_secret` holds the partner key and `partner_id`/`shop_id` must be numeric.
/// TikTok calls additionally need `shop_cipher`.
#[derive(Debug, Clone)]
pub struct ShopCredentials {
    pub platform: Platform,
    pub app_key: String,
    pub app_secret: Secret<String>,
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
    pub shop_id: Option<String>,
    pub partner_id: Option<String>,
    pub shop_cipher: Option<String>,
}

impl ShopCredentials {
    pub fn new(platform: Platform, app_key: &str, app_secret: &str) -> Self {
        Self {
            platform,
            app_key: app_key.to_string(),
            app_secret: Secret::new(app_secret.to_string()),
            access_token: Secret::default(),
            refresh_token: Secret::default(),
            shop_id: None,
            partner_id: None,
            shop_cipher: None,
        }
    }

    pub fn with_tokens(mut self, access_token: &str, refresh_token: &str) -> Self {
        self.access_token = Secret::new(access_token.to_string());
        self.refresh_token = Secret::new(refresh_token.to_string());
        self
    }

    pub fn with_shop_id(mut self, shop_id: &str) -> Self {
        self.shop_id = Some(shop_id.to_string());
        self
    }

    pub fn with_partner_id(mut self, partner_id: &str) -> Self {
        self.partner_id = Some(partner_id.to_string());
        self
    }

    pub fn with_shop_cipher(mut self, shop_cipher: &str) -> Self {
        self.shop_cipher = Some(shop_cipher.to_string());
        self
    }

    pub fn numeric_shop_id(&self) -> Result<i64, MarketplaceApiError> {
        numeric(self.shop_id.as_deref(), "shop_id")
    }

    pub fn numeric_partner_id(&self) -> Result<i64, MarketplaceApiError> {
        numeric(self.partner_id.as_deref(), "partner_id")
    }

    pub fn shop_cipher(&self) -> Result<&str, MarketplaceApiError> {
        self.shop_cipher.as_deref().filter(|s| !s.is_empty()).ok_or(MarketplaceApiError::MissingCredential("shop_cipher"))
    }
}

fn numeric(value: Option<&str>, field: &'static str) -> Result<i64, MarketplaceApiError> {
    value.and_then(|s| s.trim().parse::<i64>().ok()).ok_or(MarketplaceApiError::MissingCredential(field))
}

/// A freshly issued access/refresh token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}
