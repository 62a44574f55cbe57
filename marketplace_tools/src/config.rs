use log::*;

pub const DEFAULT_SHOPEE_HOST: &str = "https://partner.shopeemobile.com";
pub const DEFAULT_LAZADA_HOST: &str = "https://api.lazada.com.ph/rest";
pub const DEFAULT_LAZADA_AUTH_HOST: &str = "https://auth.lazada.com/rest";
pub const DEFAULT_TIKTOK_HOST: &str = "https://open-api.tiktokglobalshop.com";
pub const DEFAULT_TIKTOK_AUTH_HOST: &str = "https://auth.tiktok-shops.com";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Vendor hosts. Credentials are not part of this configuration; they are loaded from the database for each call.
#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    pub shopee_host: String,
    pub lazada_host: String,
    pub lazada_auth_host: String,
    pub tiktok_host: String,
    pub tiktok_auth_host: String,
    pub request_timeout_secs: u64,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            shopee_host: DEFAULT_SHOPEE_HOST.to_string(),
            lazada_host: DEFAULT_LAZADA_HOST.to_string(),
            lazada_auth_host: DEFAULT_LAZADA_AUTH_HOST.to_string(),
            tiktok_host: DEFAULT_TIKTOK_HOST.to_string(),
            tiktok_auth_host: DEFAULT_TIKTOK_AUTH_HOST.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

fn host_from_env(var: &str, default: &str) -> String {
    match std::env::var(var) {
        Ok(s) if !s.trim().is_empty() => s.trim().trim_end_matches('/').to_string(),
        _ => {
            debug!("🪛️ {var} not set, using {default}");
            default.to_string()
        },
    }
}

impl MarketplaceConfig {
    pub fn new_from_env_or_default() -> Self {
        let request_timeout_secs = std::env::var("SB_MARKETPLACE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid SB_MARKETPLACE_TIMEOUT_SECS ({s}). {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        Self {
            shopee_host: host_from_env("SB_SHOPEE_HOST", DEFAULT_SHOPEE_HOST),
            lazada_host: host_from_env("SB_LAZADA_HOST", DEFAULT_LAZADA_HOST),
            lazada_auth_host: host_from_env("SB_LAZADA_AUTH_HOST", DEFAULT_LAZADA_AUTH_HOST),
            tiktok_host: host_from_env("SB_TIKTOK_HOST", DEFAULT_TIKTOK_HOST),
            tiktok_auth_host: host_from_env("SB_TIKTOK_AUTH_HOST", DEFAULT_TIKTOK_AUTH_HOST),
            request_timeout_secs,
        }
    }
}
