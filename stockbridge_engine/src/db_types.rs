use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use marketplace_tools::ShopCredentials;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stockbridge_common::{Cents, Platform, Secret};
use thiserror::Error;

//--------------------------------------        Orders         ---------------------------------------------------------

/// Stored status of an order that was cancelled by the buyer, seller or marketplace.
pub const STATUS_CANCELLED: &str = "CANCELLED";
/// Stored status of an order whose delivery failed and whose goods are on their way back.
pub const STATUS_RTS: &str = "RTS";

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub platform: Platform,
    pub order_id: String,
    pub status: String,
    pub receivables_amount: Cents,
    pub total_cost: Cents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub settled: bool,
    pub net_settlement_amount: Option<Cents>,
    pub net_settlement_fees: Option<Cents>,
    pub settled_at: Option<DateTime<Utc>>,
    pub discord_channel: Option<String>,
}

impl Order {
    /// Cancelled and returned-to-sender orders never change again.
    pub fn is_annulled(&self) -> bool {
        self.status == STATUS_CANCELLED || self.status == STATUS_RTS
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub platform: Platform,
    pub order_id: String,
    pub status: String,
    pub receivables_amount: Cents,
    pub total_cost: Cents,
    pub created_at: DateTime<Utc>,
}

/// The settlement figures for one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub net_amount: Cents,
    pub fees: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSettlement {
    pub order_id: String,
    pub settlement: Settlement,
}

//--------------------------------------       Movements       ---------------------------------------------------------

/// The five inventory movement tables. Table names are only ever taken from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementTable {
    PendingOut,
    CompletedOut,
    CancelledOut,
    PendingIn,
    CompletedIn,
}

impl MovementTable {
    pub const ALL: [MovementTable; 5] = [
        MovementTable::PendingOut,
        MovementTable::CompletedOut,
        MovementTable::CancelledOut,
        MovementTable::PendingIn,
        MovementTable::CompletedIn,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            MovementTable::PendingOut => "pending_inventory_out",
            MovementTable::CompletedOut => "completed_inventory_out",
            MovementTable::CancelledOut => "cancelled_inventory_out",
            MovementTable::PendingIn => "pending_inventory_in",
            MovementTable::CompletedIn => "completed_inventory_in",
        }
    }

    pub fn is_outbound(&self) -> bool {
        matches!(self, MovementTable::PendingOut | MovementTable::CompletedOut)
    }
}

impl Display for MovementTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MovementTable::PendingOut => "PENDING OUT",
            MovementTable::CompletedOut => "COMPLETED OUT",
            MovementTable::CancelledOut => "CANCELLED",
            MovementTable::PendingIn => "PENDING IN",
            MovementTable::CompletedIn => "COMPLETED IN",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unknown inventory status: {0}")]
pub struct MovementTableParseError(pub String);

impl FromStr for MovementTable {
    type Err = MovementTableParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "PENDING OUT" => Ok(MovementTable::PendingOut),
            "COMPLETED OUT" => Ok(MovementTable::CompletedOut),
            "CANCELLED" | "CANCELLED OUT" => Ok(MovementTable::CancelledOut),
            "PENDING IN" => Ok(MovementTable::PendingIn),
            "COMPLETED IN" => Ok(MovementTable::CompletedIn),
            _ => Err(MovementTableParseError(s.to_string())),
        }
    }
}

/// One physical unit of one SKU, tracked through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct MovementRow {
    pub id: String,
    pub order_id: String,
    pub platform: Platform,
    pub product_sku: String,
    pub product_name: String,
    pub order_created: DateTime<Utc>,
    pub product_cogs: Cents,
    pub shopee: bool,
    pub lazada: bool,
    pub tiktok: bool,
}

impl MovementRow {
    pub fn movement_id(platform: Platform, order_id: &str, counter: usize) -> String {
        format!("{platform}_{order_id}_{counter}")
    }

    /// One row per physical unit of every item. Ids run from `{PLATFORM}_{order_id}_1` to `..._N`, where `N` is the
    /// total quantity. The origin platform already adjusted its own stock when the sale happened, so its flag is set.
    pub fn explode(
        platform: Platform,
        order_id: &str,
        order_created: DateTime<Utc>,
        items: &[ResolvedItem],
    ) -> Vec<MovementRow> {
        items
            .iter()
            .flat_map(|item| (0..item.quantity.max(0)).map(move |_| item))
            .enumerate()
            .map(|(i, item)| MovementRow {
                id: Self::movement_id(platform, order_id, i + 1),
                order_id: order_id.to_string(),
                platform,
                product_sku: item.sku.clone(),
                product_name: item.name.clone(),
                order_created,
                product_cogs: item.cost,
                shopee: platform == Platform::Shopee,
                lazada: platform == Platform::Lazada,
                tiktok: platform == Platform::Tiktok,
            })
            .collect()
    }

    pub fn is_adjusted_for(&self, platform: Platform) -> bool {
        match platform {
            Platform::Shopee => self.shopee,
            Platform::Lazada => self.lazada,
            Platform::Tiktok => self.tiktok,
        }
    }
}

/// Which way a batch of movement rows moves marketplace stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockDirection {
    Deduct,
    Restock,
}

impl StockDirection {
    /// The movement tables this direction draws its work from.
    pub fn tables(&self) -> &'static [MovementTable] {
        match self {
            StockDirection::Deduct => &[MovementTable::PendingOut, MovementTable::CompletedOut],
            StockDirection::Restock => &[MovementTable::CancelledOut, MovementTable::CompletedIn],
        }
    }

    pub fn apply(&self, current: i64, quantity: i64) -> i64 {
        match self {
            StockDirection::Deduct => current - quantity,
            StockDirection::Restock => current + quantity,
        }
    }
}

impl Display for StockDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockDirection::Deduct => f.write_str("deduct"),
            StockDirection::Restock => f.write_str("restock"),
        }
    }
}

/// Why rows leave the outbound tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reversal {
    /// The order was cancelled before delivery. The origin marketplace restores its own stock.
    Cancellation,
    /// The delivery failed and the goods come back to the warehouse.
    ReturnToSender,
}

impl Reversal {
    pub fn target(&self) -> MovementTable {
        match self {
            Reversal::Cancellation => MovementTable::CancelledOut,
            Reversal::ReturnToSender => MovementTable::PendingIn,
        }
    }

    pub fn sources(&self) -> &'static [MovementTable] {
        match self {
            Reversal::Cancellation => &[MovementTable::PendingOut],
            Reversal::ReturnToSender => &[MovementTable::PendingOut, MovementTable::CompletedOut],
        }
    }

    pub fn stored_status(&self) -> &'static str {
        match self {
            Reversal::Cancellation => STATUS_CANCELLED,
            Reversal::ReturnToSender => STATUS_RTS,
        }
    }

    /// The value the origin platform's flag takes once its rows are reversed.
    ///
    /// Every other platform's flag is inverted on the way: a platform that deducted stock for the row must now restock
    /// it, and one that never deducted has nothing to undo.
    pub fn origin_flag(&self) -> bool {
        matches!(self, Reversal::Cancellation)
    }
}

//--------------------------------------        Catalog        ---------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub sku: String,
    pub product_name: String,
    pub cost_of_goods: Cents,
    pub total_quantity: i64,
    pub old_quantity: i64,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct BundleComponent {
    pub sku: String,
    pub component_sku: String,
    pub position: i64,
}

/// A catalog-resolved line item: a concrete SKU with its name and unit cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedItem {
    pub sku: String,
    pub name: String,
    pub cost: Cents,
    pub quantity: i64,
}

/// Units of one SKU coming back into the catalog at one unit cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnedUnits {
    pub sku: String,
    pub quantity: i64,
    pub unit_cost: Cents,
}

/// Groups movement rows by SKU and cost, in order of first appearance.
pub fn returned_units(rows: &[MovementRow]) -> Vec<ReturnedUnits> {
    let mut result: Vec<ReturnedUnits> = Vec::new();
    for row in rows {
        match result.iter_mut().find(|u| u.sku == row.product_sku && u.unit_cost == row.product_cogs) {
            Some(units) => units.quantity += 1,
            None => result.push(ReturnedUnits {
                sku: row.product_sku.clone(),
                quantity: 1,
                unit_cost: row.product_cogs,
            }),
        }
    }
    result
}

//--------------------------------------      Shop tokens      ---------------------------------------------------------

#[derive(Debug, Clone, FromRow)]
pub struct ShopTokenRow {
    pub platform: Platform,
    pub app_key: String,
    pub app_secret: String,
    pub access_token: String,
    pub refresh_token: String,
    pub shop_id: Option<String>,
    pub partner_id: Option<String>,
    pub shop_cipher: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<ShopTokenRow> for ShopCredentials {
    fn from(row: ShopTokenRow) -> Self {
        ShopCredentials {
            platform: row.platform,
            app_key: row.app_key,
            app_secret: Secret::new(row.app_secret),
            access_token: Secret::new(row.access_token),
            refresh_token: Secret::new(row.refresh_token),
            shop_id: row.shop_id,
            partner_id: row.partner_id,
            shop_cipher: row.shop_cipher,
        }
    }
}
