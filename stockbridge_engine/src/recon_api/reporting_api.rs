use std::fmt::Debug;

use log::*;
use stockbridge_common::Platform;

use crate::{
    db_types::{MovementRow, MovementTable, Order},
    traits::{DateRange, ReconciliationDatabase, ReconciliationError},
};

/// Read-only queries over the stored orders and inventory movements, for operators.
pub struct ReportingApi<B> {
    db: B,
}

impl<B> Debug for ReportingApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReportingApi")
    }
}

impl<B> ReportingApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ReportingApi<B>
where B: ReconciliationDatabase
{
    /// Movement rows in `table` whose orders were created inside `range`.
    pub async fn movements(
        &self,
        table: MovementTable,
        platform: Option<Platform>,
        range: DateRange,
    ) -> Result<Vec<MovementRow>, ReconciliationError> {
        let rows = self.db.search_movements(table, platform, range).await?;
        debug!("🗃️ {} rows in {table} between {} and {}", rows.len(), range.since, range.until);
        Ok(rows)
    }

    /// Orders created inside `range`, for one platform or all of them, oldest first.
    pub async fn orders(&self, platform: Option<Platform>, range: DateRange) -> Result<Vec<Order>, ReconciliationError> {
        let platforms = match platform {
            Some(p) => vec![p],
            None => Platform::ALL.to_vec(),
        };
        let mut orders = Vec::new();
        for p in platforms {
            orders.extend(self.db.search_orders(p, range).await?);
        }
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    pub async fn ping(&self) -> Result<(), ReconciliationError> {
        self.db.ping().await
    }
}
