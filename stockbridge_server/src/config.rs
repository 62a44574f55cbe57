use std::{env, fmt::Display, str::FromStr};

use chrono::Duration;
use log::*;
use marketplace_tools::MarketplaceConfig;
use stockbridge_common::{
    helpers::{parse_boolean_flag, parse_number},
    Secret,
};
use stockbridge_engine::{EngineConfig, FailedPushPolicy};

const DEFAULT_SB_HOST: &str = "127.0.0.1";
const DEFAULT_SB_PORT: u16 = 8380;
const DEFAULT_POLL_WINDOW_DAYS: u64 = 7;
const DEFAULT_DEDUCTION_BATCH_SIZE: i64 = 20;
const DEFAULT_RESTOCK_BATCH_SIZE: i64 = 10;
const DEFAULT_SETTLEMENT_BATCH_SIZE: i64 = 10;
const DEFAULT_STATUS_BATCH_SIZE: i64 = 30;
const DEFAULT_NOTIFICATION_BATCH_SIZE: i64 = 10;
const DEFAULT_DEDUP_TTL_HOURS: i64 = 72;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 1800;
const DEFAULT_STATUS_REFRESH_INTERVAL_SECS: u64 = 6 * 3600;
const MIN_INTERVAL_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Required in the `x-api-key` header of every `/jobs` and `/inventory` call.
    pub api_key: Secret<String>,
    pub webhooks: WebhookConfig,
    /// The service fronting the Discord bot. Notifications are off when this is not set.
    pub bot: Option<BotConfig>,
    pub marketplace: MarketplaceConfig,
    pub engine: EngineConfig,
    /// When true, none of the timed jobs run. The `/jobs` endpoints still work.
    pub disable_scheduler: bool,
    pub scheduler: SchedulerConfig,
}

/// Periods of the timed jobs that can be tuned. The other periods follow the vendors' token and payout cycles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// How often each platform is polled for pending orders that no webhook told us about.
    pub poll_interval: std::time::Duration,
    /// How often each platform's stored orders are checked for status changes.
    pub status_refresh_interval: std::time::Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: std::time::Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            status_refresh_interval: std::time::Duration::from_secs(DEFAULT_STATUS_REFRESH_INTERVAL_SECS),
        }
    }
}

impl SchedulerConfig {
    /// Periods shorter than a minute are raised to one minute.
    pub fn from_env_or_default() -> Self {
        let secs = |var: &str, default: u64| {
            let secs = env_number(var, default);
            if secs < MIN_INTERVAL_SECS {
                warn!("🪛️ {var} is {secs}s. Using the minimum of {MIN_INTERVAL_SECS}s instead.");
            }
            std::time::Duration::from_secs(secs.max(MIN_INTERVAL_SECS))
        };
        Self {
            poll_interval: secs("SB_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS),
            status_refresh_interval: secs("SB_STATUS_REFRESH_INTERVAL_SECS", DEFAULT_STATUS_REFRESH_INTERVAL_SECS),
        }
    }
}

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    /// The callback URL registered with Shopee. Shopee signs it together with the body.
    pub shopee_callback_url: String,
    /// If false, webhook signatures are not checked. **DANGER**
    pub signature_checks: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { shopee_callback_url: String::default(), signature_checks: true }
    }
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub url: String,
    pub api_key: Secret<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SB_HOST.to_string(),
            port: DEFAULT_SB_PORT,
            database_url: String::default(),
            api_key: Secret::default(),
            webhooks: WebhookConfig::default(),
            bot: None,
            marketplace: MarketplaceConfig::default(),
            engine: EngineConfig::default(),
            disable_scheduler: false,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SB_HOST").ok().unwrap_or_else(|| DEFAULT_SB_HOST.into());
        let port = env_number("SB_PORT", DEFAULT_SB_PORT);
        let database_url = env::var("SB_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SB_DATABASE_URL is not set. Please set it to the URL for the stockbridge database.");
            String::default()
        });
        let api_key = Secret::new(env::var("SB_API_KEY").ok().unwrap_or_default());
        if api_key.is_empty() {
            warn!(
                "🚨️🚨️🚨️ SB_API_KEY is not set. Every request to the /jobs and /inventory endpoints will be refused \
                 until it is. 🚨️🚨️🚨️"
            );
        }
        let webhooks = WebhookConfig::from_env_or_default();
        let bot = BotConfig::from_env();
        let marketplace = MarketplaceConfig::new_from_env_or_default();
        let engine = engine_config_from_env();
        let disable_scheduler = parse_boolean_flag(env::var("SB_DISABLE_SCHEDULER").ok(), false);
        if disable_scheduler {
            info!("🪛️ The scheduler is disabled. Jobs will only run when their endpoints are called.");
        }
        let scheduler = SchedulerConfig::from_env_or_default();
        Self { host, port, database_url, api_key, webhooks, bot, marketplace, engine, disable_scheduler, scheduler }
    }
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let shopee_callback_url = env::var("SB_SHOPEE_WEBHOOK_URL").ok().unwrap_or_else(|| {
            warn!(
                "🪛️ SB_SHOPEE_WEBHOOK_URL is not set. Shopee signs its pushes with the callback URL, so no Shopee \
                 webhook will pass the signature check."
            );
            String::default()
        });
        let signature_checks = parse_boolean_flag(env::var("SB_WEBHOOK_SIGNATURE_CHECKS").ok(), true);
        if !signature_checks {
            warn!("🚨️ Webhook signature checks are disabled. Anyone can post order events to this server.");
        }
        Self { shopee_callback_url, signature_checks }
    }
}

impl BotConfig {
    pub fn from_env() -> Option<Self> {
        let url = match env::var("SB_BOT_URL") {
            Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                info!("🪛️ SB_BOT_URL is not set. Discord notifications are disabled.");
                return None;
            },
        };
        let api_key = Secret::new(env::var("SB_BOT_API_KEY").ok().unwrap_or_default());
        if api_key.is_empty() {
            warn!("🪛️ SB_BOT_API_KEY is not set. The notification service will probably refuse our calls.");
        }
        Some(Self { url, api_key })
    }
}

fn env_number<T: FromStr + Display + Copy>(var: &str, default: T) -> T {
    parse_number(env::var(var).ok(), default).unwrap_or_else(|s| {
        warn!("🪛️ {s} is not a valid value for {var}. Using the default, {default}, instead.");
        default
    })
}

/// Batch sizes are clamped to at least one row.
fn engine_config_from_env() -> EngineConfig {
    let batch = |var: &str, default: i64| env_number(var, default).max(1);
    let failed_push_policy = env::var("SB_FAILED_PUSH_POLICY")
        .ok()
        .map(|s| {
            s.parse::<FailedPushPolicy>().unwrap_or_else(|e| {
                warn!("🪛️ {e}. Using the default policy, {}.", FailedPushPolicy::default());
                FailedPushPolicy::default()
            })
        })
        .unwrap_or_default();
    info!("🪛️ Movement rows whose stock push fails are handled with the {failed_push_policy} policy");
    EngineConfig {
        poll_window_days: env_number("SB_POLL_WINDOW_DAYS", DEFAULT_POLL_WINDOW_DAYS),
        deduction_batch_size: batch("SB_DEDUCTION_BATCH_SIZE", DEFAULT_DEDUCTION_BATCH_SIZE),
        restock_batch_size: batch("SB_RESTOCK_BATCH_SIZE", DEFAULT_RESTOCK_BATCH_SIZE),
        settlement_batch_size: batch("SB_SETTLEMENT_BATCH_SIZE", DEFAULT_SETTLEMENT_BATCH_SIZE),
        status_batch_size: batch("SB_STATUS_BATCH_SIZE", DEFAULT_STATUS_BATCH_SIZE),
        notification_batch_size: batch("SB_NOTIFICATION_BATCH_SIZE", DEFAULT_NOTIFICATION_BATCH_SIZE),
        dedup_ttl: Duration::hours(env_number("SB_DEDUP_TTL_HOURS", DEFAULT_DEDUP_TTL_HOURS).max(1)),
        failed_push_policy,
        ..Default::default()
    }
}
