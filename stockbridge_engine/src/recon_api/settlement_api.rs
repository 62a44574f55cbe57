use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use marketplace_tools::{MarketplaceClient, SettlementLine, SettlementQuery, TimeWindow};
use serde::{Deserialize, Serialize};
use stockbridge_common::{Cents, Platform};

use crate::{
    db_types::{Order, OrderSettlement, Settlement},
    recon_api::{config::EngineConfig, load_credentials, status::delivered_statuses, vendor_data},
    traits::{ReconciliationDatabase, ReconciliationError},
};

/// The statement window to search for the settlements of orders created at `created`.
///
/// Lazada pays out up to two weeks after delivery, so its window runs from two days before the first order to
/// fourteen days after the last. TikTok statements start five days after the first order and run up to `now`.
/// Shopee settles per order, so the window only records the batch's span.
pub fn settlement_window(platform: Platform, created: &[DateTime<Utc>], now: DateTime<Utc>) -> Option<TimeWindow> {
    let span = TimeWindow::spanning(created.iter().copied())?;
    let window = match platform {
        Platform::Lazada => TimeWindow::new(span.start - Duration::days(2), span.end + Duration::days(14)),
        Platform::Tiktok => TimeWindow::new((span.start + Duration::days(5)).min(now), now),
        Platform::Shopee => span,
    };
    Some(window)
}

/// Nets one order's statement lines. Amounts are compared by magnitude, since vendors disagree on signs.
pub fn compute_settlement<'a, I: IntoIterator<Item = &'a SettlementLine>>(lines: I) -> Settlement {
    let (credit, fees) = lines.into_iter().fold((Cents::default(), Cents::default()), |(credit, fees), line| {
        if line.is_item_price_credit() {
            (credit + line.amount.abs(), fees)
        } else {
            (credit, fees + line.amount.abs())
        }
    });
    Settlement { net_amount: credit - fees, fees }
}

/// Pairs orders with their statement lines. Orders without any lines are returned separately.
pub fn match_settlements(orders: &[Order], lines: &[SettlementLine]) -> (Vec<OrderSettlement>, Vec<String>) {
    let mut settled = Vec::with_capacity(orders.len());
    let mut unmatched = Vec::new();
    for order in orders {
        let mut matching = lines.iter().filter(|l| l.order_id == order.order_id).peekable();
        if matching.peek().is_none() {
            unmatched.push(order.order_id.clone());
            continue;
        }
        settled.push(OrderSettlement { order_id: order.order_id.clone(), settlement: compute_settlement(matching) });
    }
    (settled, unmatched)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub candidates: usize,
    pub settled: u64,
    /// Orders with no statement lines yet. They are tried again on the next run.
    pub unmatched: Vec<String>,
}

pub struct SettlementApi<B> {
    db: B,
    config: EngineConfig,
}

impl<B> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi")
    }
}

impl<B> SettlementApi<B> {
    pub fn new(db: B, config: EngineConfig) -> Self {
        Self { db, config }
    }
}

impl<B> SettlementApi<B>
where B: ReconciliationDatabase
{
    /// Settles the next batch of delivered orders of the client's platform.
    pub async fn settle<M: MarketplaceClient>(
        &self,
        client: &M,
        now: DateTime<Utc>,
    ) -> Result<SettlementSummary, ReconciliationError> {
        let platform = client.platform();
        let creds = load_credentials(&self.db, platform).await?;
        let statuses = delivered_statuses(platform);
        let orders = self.db.fetch_unsettled_orders(platform, statuses, self.config.settlement_batch_size).await?;
        let created = orders.iter().map(|o| o.created_at).collect::<Vec<_>>();
        let Some(window) = settlement_window(platform, &created, now) else {
            return Err(ReconciliationError::NothingToDo(format!("No {platform} orders are waiting for settlement")));
        };
        let query = SettlementQuery { window, order_ids: orders.iter().map(|o| o.order_id.clone()).collect() };
        trace!("💰️ Fetching {platform} settlements from {} to {}", window.start, window.end);
        let lines = vendor_data(client, client.get_settlement_lines(&creds, &query).await)?;
        let (settlements, unmatched) = match_settlements(&orders, &lines);
        let settled =
            if settlements.is_empty() { 0 } else { self.db.record_settlements(platform, &settlements).await? };
        if !unmatched.is_empty() {
            info!("💰️ {} {platform} orders have no settlement yet: {}", unmatched.len(), unmatched.join(", "));
        }
        info!("💰️ Settled {settled} of {} {platform} orders", orders.len());
        Ok(SettlementSummary { candidates: orders.len(), settled, unmatched })
    }
}
