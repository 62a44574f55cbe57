//! # Stockbridge server
//!
//! The HTTP face of the reconciliation engine. It is responsible for:
//! * Receiving order status pushes from Shopee, Lazada and TikTok, checking their signatures and handing them to the
//!   engine.
//! * Running the reconciliation jobs on a timer, and on demand through the `/jobs` endpoints.
//! * Answering operator queries about orders and inventory movements, and applying manual stock changes.
//! * Posting order updates to the Discord bot.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: returns a 200 OK response.
//! * `/webhook/{platform}`: marketplace pushes. Signed.
//! * `/jobs/{job}`: the reconciliation jobs. Requires the API key.
//! * `/inventory/...`: stock queries and manual stock changes. Requires the API key.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod jobs;
pub mod marketplaces;
pub mod middleware;
pub mod routes;
pub mod scheduler;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
