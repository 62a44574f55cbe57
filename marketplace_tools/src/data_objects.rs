use chrono::{DateTime, Days, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use stockbridge_common::Cents;

/// The fee name that carries the item revenue in settlement statements. Every other fee name is a deduction.
pub const ITEM_PRICE_CREDIT: &str = "Item Price Credit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// From the start of the day `days` days before `now` until the end of `now`'s day.
    pub fn trailing_days(now: DateTime<Utc>, days: u64) -> Self {
        let first_day = now.date_naive().checked_sub_days(Days::new(days)).unwrap_or(now.date_naive());
        let start = Utc.from_utc_datetime(&first_day.and_time(NaiveTime::MIN));
        let end = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN)) + Duration::days(1)
            - Duration::seconds(1);
        Self { start, end }
    }

    /// The smallest window holding every timestamp, or `None` for an empty list.
    pub fn spanning<I: IntoIterator<Item = DateTime<Utc>>>(dates: I) -> Option<Self> {
        dates.into_iter().fold(None, |acc, d| match acc {
            None => Some(Self::new(d, d)),
            Some(w) => Some(Self::new(w.start.min(d), w.end.max(d))),
        })
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

/// An order as it appears in a vendor's order list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedItem {
    pub sku: String,
    pub quantity: i64,
}

impl OrderedItem {
    pub fn new<S: Into<String>>(sku: S, quantity: i64) -> Self {
        Self { sku: sku.into(), quantity }
    }
}

/// A vendor order, normalized across marketplaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceOrder {
    pub order_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderedItem>,
    pub receivables: Cents,
    pub cancel_reason: Option<String>,
    /// Zero-value promotional orders. Only TikTok reports these.
    pub is_gift: bool,
}

/// Where a SKU lives on a marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRef {
    pub sku: String,
    pub item_id: String,
    pub variant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingStock {
    pub listing: ListingRef,
    pub stock: i64,
}

/// An absolute stock level to write to a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdate {
    pub listing: ListingRef,
    pub stock: i64,
}

/// Per-SKU outcome of a stock push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdateReport {
    pub updated: Vec<String>,
    pub failed: Vec<String>,
}

impl StockUpdateReport {
    pub fn record(&mut self, sku: &str, ok: bool) {
        if ok {
            self.updated.push(sku.to_string());
        } else {
            self.failed.push(sku.to_string());
        }
    }
}

/// One fee line of a settlement statement, matched to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementLine {
    pub order_id: String,
    pub fee_name: String,
    pub amount: Cents,
}

impl SettlementLine {
    pub fn new<S: Into<String>, F: Into<String>>(order_id: S, fee_name: F, amount: Cents) -> Self {
        Self { order_id: order_id.into(), fee_name: fee_name.into(), amount }
    }

    pub fn is_item_price_credit(&self) -> bool {
        self.fee_name == ITEM_PRICE_CREDIT
    }
}

/// What to fetch from a vendor's finance API.
///
/// Statement-based vendors (Lazada, TikTok) use the window; per-order vendors (Shopee) use the order ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementQuery {
    pub window: TimeWindow,
    pub order_ids: Vec<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn trailing_window_covers_whole_days() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap();
        let w = TimeWindow::trailing_days(now, 7);
        assert_eq!(w.start, Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap());
        assert_eq!(w.end, Utc.with_ymd_and_hms(2024, 3, 10, 23, 59, 59).unwrap());
        assert!(w.contains(now));
    }

    #[test]
    fn spanning_window() {
        let a = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let c = Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap();
        let w = TimeWindow::spanning([a, b, c]).unwrap();
        assert_eq!(w.start, b);
        assert_eq!(w.end, a);
        assert!(TimeWindow::spanning(Vec::<DateTime<Utc>>::new()).is_none());
    }
}
