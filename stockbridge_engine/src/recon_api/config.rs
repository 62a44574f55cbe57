use std::{fmt::Display, str::FromStr};

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// What happens to a movement row whose stock push a marketplace rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedPushPolicy {
    /// The row is flagged as adjusted anyway and never retried. The failure is only logged.
    #[default]
    MarkDone,
    /// The row stays unflagged and is picked up again by the next batch.
    Retry,
}

impl Display for FailedPushPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailedPushPolicy::MarkDone => f.write_str("mark_done"),
            FailedPushPolicy::Retry => f.write_str("retry"),
        }
    }
}

impl FromStr for FailedPushPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mark_done" | "markdone" | "drop" => Ok(FailedPushPolicy::MarkDone),
            "retry" => Ok(FailedPushPolicy::Retry),
            _ => Err(format!("Invalid failed push policy: {s}")),
        }
    }
}

/// Batch sizes and windows for the engine's workflows.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How many days back order polling looks.
    pub poll_window_days: u64,
    /// Rows per deduction batch, across both outbound tables.
    pub deduction_batch_size: i64,
    /// Rows per restock batch, for each inbound table.
    pub restock_batch_size: i64,
    pub settlement_batch_size: i64,
    pub status_batch_size: i64,
    /// Orders younger than this are left to the webhooks.
    pub status_min_age: Duration,
    pub notification_batch_size: i64,
    /// How long a claimed webhook delivery is remembered.
    pub dedup_ttl: Duration,
    pub failed_push_policy: FailedPushPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_window_days: 7,
            deduction_batch_size: 20,
            restock_batch_size: 10,
            settlement_batch_size: 10,
            status_batch_size: 30,
            status_min_age: Duration::days(3),
            notification_batch_size: 10,
            dedup_ttl: Duration::hours(72),
            failed_push_policy: FailedPushPolicy::MarkDone,
        }
    }
}
