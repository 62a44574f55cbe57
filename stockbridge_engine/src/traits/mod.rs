//! # Database backend contracts
//!
//! The reconciliation workflows are written against these traits and never against a concrete database.
//!
//! * [`OrderManagement`] stores order headers and runs every order state transition, moving the order's inventory
//!   movement rows between tables in the same transaction.
//! * [`InventoryManagement`] reads the catalog and bundle listings, and hands out batches of movement rows that still
//!   need their stock pushed to a marketplace.
//! * [`ShopTokenManagement`] loads and rotates the per-platform API credentials.
//! * [`IdempotencyStore`] is the durable, TTL-bounded record of webhook deliveries that have already been claimed.
//! * [`ReconciliationDatabase`] ties them together.
mod data_objects;
mod errors;
mod idempotency;
mod inventory_management;
mod order_management;
mod reconciliation_database;
mod shop_tokens;

pub use data_objects::{DateRange, InsertOrderResult, LocatedMovement, TransitionResult};
pub use errors::{ErrorCode, ReconciliationError};
pub use idempotency::IdempotencyStore;
pub use inventory_management::InventoryManagement;
pub use order_management::OrderManagement;
pub use reconciliation_database::ReconciliationDatabase;
pub use shop_tokens::ShopTokenManagement;
