//! Marketplace tools
//!
//! Signed REST clients for the Shopee, Lazada and TikTok Shop seller APIs, normalized into one
//! [`MarketplaceClient`] interface, plus the client for the Discord bot's notification service.
//!
//! Every vendor operation returns an [`ApiResult`] envelope rather than an error, so the reconciliation workflows
//! branch on `ok` instead of handling transport failures themselves.
mod client;
mod config;
mod credentials;
mod data_objects;
mod envelope;
mod error;
mod helpers;
mod lazada;
mod marketplace;
mod notifier;
mod rest;
mod shopee;
mod tiktok;

pub mod signing;

pub use client::MarketplaceClient;
pub use config::MarketplaceConfig;
pub use credentials::{ShopCredentials, TokenPair};
pub use data_objects::{
    ListingRef,
    ListingStock,
    MarketplaceOrder,
    OrderSummary,
    OrderedItem,
    SettlementLine,
    SettlementQuery,
    StockUpdate,
    StockUpdateReport,
    TimeWindow,
    ITEM_PRICE_CREDIT,
};
pub use envelope::ApiResult;
pub use error::MarketplaceApiError;
pub use lazada::LazadaApi;
pub use marketplace::MarketplaceApi;
pub use notifier::{BotNotifier, ThreadAssignment};
pub use shopee::{ShopeeApi, SHOPEE_FEES};
pub use tiktok::{TiktokApi, TIKTOK_FEES};
