//! Maps each marketplace's order status vocabulary onto the engine's lifecycle.
use serde::{Deserialize, Serialize};
use stockbridge_common::Platform;

/// The lifecycle transition a vendor status triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusKind {
    /// Not paid yet. Never persisted.
    Unpaid,
    /// Paid and awaiting shipment. First sighting records the order.
    Pending,
    Cancelled,
    /// Delivery failed. The goods come back.
    ReturnToSender,
    Delivered,
    /// Any other status. Written to the order as-is.
    Other,
}

const SHOPEE_FAILED_DELIVERY: &str = "Failed Delivery";
const TIKTOK_FAILED_DELIVERY: &str = "Package delivery failed";

fn is_any(status: &str, options: &[&str]) -> bool {
    options.iter().any(|o| o.eq_ignore_ascii_case(status))
}

pub fn classify(platform: Platform, status: &str, cancel_reason: Option<&str>) -> StatusKind {
    let status = status.trim();
    match platform {
        Platform::Lazada => match status.to_ascii_lowercase().as_str() {
            "unpaid" => StatusKind::Unpaid,
            "pending" => StatusKind::Pending,
            "canceled" | "cancelled" => StatusKind::Cancelled,
            "shipped_back" | "returned" | "failed_delivery" | "shipped_back_success" => StatusKind::ReturnToSender,
            "delivered" | "confirmed" => StatusKind::Delivered,
            _ => StatusKind::Other,
        },
        Platform::Shopee => match status.to_ascii_uppercase().as_str() {
            "UNPAID" => StatusKind::Unpaid,
            "READY_TO_SHIP" => StatusKind::Pending,
            "CANCELLED" if is_failed_delivery(cancel_reason, SHOPEE_FAILED_DELIVERY) => StatusKind::ReturnToSender,
            "CANCELLED" => StatusKind::Cancelled,
            "TO_RETURN" => StatusKind::ReturnToSender,
            "COMPLETED" => StatusKind::Delivered,
            _ => StatusKind::Other,
        },
        Platform::Tiktok => match status.to_ascii_uppercase().as_str() {
            "UNPAID" => StatusKind::Unpaid,
            "AWAITING_SHIPMENT" => StatusKind::Pending,
            "CANCELLED" | "CANCEL" if is_failed_delivery(cancel_reason, TIKTOK_FAILED_DELIVERY) => {
                StatusKind::ReturnToSender
            },
            "CANCELLED" | "CANCEL" => StatusKind::Cancelled,
            "DELIVERED" | "COMPLETED" => StatusKind::Delivered,
            _ => StatusKind::Other,
        },
    }
}

fn is_failed_delivery(reason: Option<&str>, failed: &str) -> bool {
    reason.map(|r| r.trim().eq_ignore_ascii_case(failed)).unwrap_or(false)
}

/// Whether telling a cancellation from a failed delivery needs the order's cancel reason, which webhooks from this
/// platform do not carry.
pub fn needs_cancel_reason(platform: Platform, status: &str) -> bool {
    match platform {
        Platform::Lazada => false,
        Platform::Shopee => status.trim().eq_ignore_ascii_case("CANCELLED"),
        Platform::Tiktok => is_any(status.trim(), &["CANCELLED", "CANCEL"]),
    }
}

/// The vendor status of orders that are paid and waiting to ship.
pub fn pending_status(platform: Platform) -> &'static str {
    match platform {
        Platform::Shopee => "READY_TO_SHIP",
        Platform::Lazada => "pending",
        Platform::Tiktok => "AWAITING_SHIPMENT",
    }
}

/// The vendor status filter the status refresh lists orders with.
pub fn completion_filter(platform: Platform) -> &'static str {
    match platform {
        Platform::Shopee => "COMPLETED",
        Platform::Lazada => "delivered",
        Platform::Tiktok => "COMPLETED",
    }
}

/// Stored statuses of delivered orders. These orders are ready for settlement.
pub fn delivered_statuses(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::Shopee => &["COMPLETED"],
        Platform::Lazada => &["delivered", "confirmed"],
        Platform::Tiktok => &["DELIVERED", "COMPLETED"],
    }
}

/// The status to store for a vendor status. Lazada's `confirmed` is stored as `delivered`.
pub fn normalize_status(platform: Platform, status: &str) -> String {
    match platform {
        Platform::Lazada if status.trim().eq_ignore_ascii_case("confirmed") => "delivered".to_string(),
        _ => status.trim().to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lazada_vocabulary() {
        assert_eq!(classify(Platform::Lazada, "unpaid", None), StatusKind::Unpaid);
        assert_eq!(classify(Platform::Lazada, "pending", None), StatusKind::Pending);
        assert_eq!(classify(Platform::Lazada, "canceled", None), StatusKind::Cancelled);
        assert_eq!(classify(Platform::Lazada, "shipped_back", None), StatusKind::ReturnToSender);
        assert_eq!(classify(Platform::Lazada, "confirmed", None), StatusKind::Delivered);
        assert_eq!(classify(Platform::Lazada, "ready_to_ship", None), StatusKind::Other);
        assert_eq!(normalize_status(Platform::Lazada, "confirmed"), "delivered");
        assert!(!needs_cancel_reason(Platform::Lazada, "canceled"));
    }

    #[test]
    fn shopee_failed_delivery_is_a_return() {
        assert_eq!(classify(Platform::Shopee, "UNPAID", None), StatusKind::Unpaid);
        assert_eq!(classify(Platform::Shopee, "READY_TO_SHIP", None), StatusKind::Pending);
        assert_eq!(classify(Platform::Shopee, "CANCELLED", None), StatusKind::Cancelled);
        assert_eq!(classify(Platform::Shopee, "CANCELLED", Some("Out of stock")), StatusKind::Cancelled);
        assert_eq!(classify(Platform::Shopee, "CANCELLED", Some("Failed Delivery")), StatusKind::ReturnToSender);
        assert_eq!(classify(Platform::Shopee, "TO_RETURN", None), StatusKind::ReturnToSender);
        assert_eq!(classify(Platform::Shopee, "SHIPPED", None), StatusKind::Other);
        assert!(needs_cancel_reason(Platform::Shopee, "CANCELLED"));
        assert_eq!(normalize_status(Platform::Shopee, "COMPLETED"), "COMPLETED");
    }

    #[test]
    fn tiktok_vocabulary() {
        assert_eq!(classify(Platform::Tiktok, "AWAITING_SHIPMENT", None), StatusKind::Pending);
        assert_eq!(classify(Platform::Tiktok, "CANCEL", None), StatusKind::Cancelled);
        assert_eq!(
            classify(Platform::Tiktok, "CANCELLED", Some("Package delivery failed")),
            StatusKind::ReturnToSender
        );
        assert_eq!(classify(Platform::Tiktok, "DELIVERED", None), StatusKind::Delivered);
        assert_eq!(classify(Platform::Tiktok, "IN_TRANSIT", None), StatusKind::Other);
        assert!(needs_cancel_reason(Platform::Tiktok, "CANCEL"));
        assert!(!needs_cancel_reason(Platform::Tiktok, "DELIVERED"));
    }
}
