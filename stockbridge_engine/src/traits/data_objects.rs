use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{MovementRow, MovementTable, Order};

/// The result of recording a new order with its movement rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOrderResult {
    pub order: Order,
    /// `false` when the order already existed. Nothing else was written in that case.
    pub inserted: bool,
    pub movements: usize,
}

/// What a status transition did to an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// The order's status (and possibly its movement rows) changed.
    Applied { order: Order, moved_rows: usize },
    /// The order is cancelled or returned to sender and no longer changes.
    Ignored(Order),
}

impl TransitionResult {
    pub fn order(&self) -> &Order {
        match self {
            TransitionResult::Applied { order, .. } => order,
            TransitionResult::Ignored(order) => order,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionResult::Applied { .. })
    }
}

/// A movement row together with the table it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedMovement {
    pub table: MovementTable,
    pub row: MovementRow,
}

/// Filters for searching movement rows and orders by date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl DateRange {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { since, until }
    }

    /// From the start of `first` to the last microsecond of `last`, both in UTC. `None` if `last` is before `first`.
    pub fn whole_days(first: NaiveDate, last: NaiveDate) -> Option<Self> {
        if last < first {
            return None;
        }
        let since = first.and_time(NaiveTime::MIN).and_utc();
        let until = last.and_hms_micro_opt(23, 59, 59, 999_999)?.and_utc();
        Some(Self { since, until })
    }
}
