//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open a transaction when a state transition touches more
//! than one table, and call through to the functions without any other changes.
//!
//! Every value is bound as a query parameter. The only text spliced into SQL is a movement table name or a platform
//! flag column, and both come from closed enums.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod catalog;
pub mod idempotency;
pub mod movements;
pub mod orders;
pub mod shop_tokens;

const SQLITE_DB_URL: &str = "sqlite://data/stockbridge.db";

pub fn db_url() -> String {
    let result = env::var("SB_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ SB_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true).busy_timeout(Duration::from_secs(10));
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
