use serde::{Deserialize, Serialize};

use crate::db_types::Order;

/// An order was recorded for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderEvent {
    pub order: Order,
    /// Ordered SKUs that are not in the catalog and were left out of the movement rows.
    pub missing_skus: Vec<String>,
}

impl NewOrderEvent {
    pub fn new(order: Order, missing_skus: Vec<String>) -> Self {
        Self { order, missing_skus }
    }
}

/// A stored order changed status. `order` carries the new status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: String,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: String) -> Self {
        Self { order, old_status }
    }

    /// The notification thread of the order, if the bot has opened one.
    pub fn thread_id(&self) -> Option<&str> {
        self.order.discord_channel.as_deref()
    }
}
