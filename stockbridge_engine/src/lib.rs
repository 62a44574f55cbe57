//! Stockbridge reconciliation engine
//!
//! The engine keeps one warehouse's stock consistent across the Shopee, Lazada and TikTok shops that sell from it. It
//! is marketplace-agnostic: every workflow talks to the vendors through [`marketplace_tools::MarketplaceClient`].
//!
//! The library is divided into three main sections:
//! 1. Database contracts ([`mod@traits`]) and their SQLite implementation ([`SqliteDatabase`]). The data types stored
//!    in the database are defined in [`mod@db_types`] and are public.
//! 2. The workflows ([`OrderIntakeApi`], [`StockSyncApi`], [`SettlementApi`], [`TokenApi`], [`NotificationApi`] and
//!    [`ReportingApi`]).
//!    Each unit of a sold product is tracked as a movement row that travels between five tables as its order is
//!    paid, delivered, cancelled or returned. The stock sync workflow pushes those movements to the marketplaces
//!    that did not make the sale.
//! 3. Order lifecycle events ([`mod@events`]) that other components can hook into.
pub mod db_types;
pub mod events;
mod recon_api;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use recon_api::{
    config::{EngineConfig, FailedPushPolicy},
    intake_api::{IntakeOutcome, OrderIntakeApi, PollSummary, RefreshSummary, StatusNotification},
    notification_api::{notify_status_change, NotificationApi, OrderNotifier},
    reporting_api::ReportingApi,
    resolver::{expand_and_merge, zip_catalog, InventoryResolver, ResolvedItems},
    settlement_api::{compute_settlement, match_settlements, settlement_window, SettlementApi, SettlementSummary},
    status::{self, StatusKind},
    stock_sync_api::{PlatformStockResult, QuantityMode, SkuQuantity, StockPushSummary, StockSyncApi, SyncCode},
    token_api::TokenApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    ErrorCode,
    IdempotencyStore,
    InventoryManagement,
    OrderManagement,
    ReconciliationDatabase,
    ReconciliationError,
    ShopTokenManagement,
};
