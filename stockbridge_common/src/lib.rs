//! Leaf types shared by every crate in the stockbridge workspace.
//!
//! * [`Cents`] is the money type. Amounts are held as integer cents so that receivables, costs and settlement
//!   figures never accumulate floating point drift.
//! * [`Platform`] names the three marketplaces the system reconciles.
//! * [`Secret`] wraps credentials so that they never end up in a log line.
mod cents;
mod platform;
mod secret;

pub mod helpers;
pub mod op;

pub use cents::{Cents, CentsConversionError};
pub use platform::{Platform, PlatformParseError};
pub use secret::Secret;
