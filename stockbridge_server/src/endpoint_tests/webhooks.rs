use actix_web::{http::StatusCode, test::TestRequest};
use stockbridge_common::Platform;
use stockbridge_engine::{
    db_types::MovementTable,
    test_utils::{fake_marketplace::vendor_order, prepare_env::tear_down},
    traits::DateRange,
    InventoryManagement,
};

use super::helpers::{json, signed_webhook, TestContext};
use crate::middleware::SIGNATURE_HEADER;

const LAZADA_PENDING: &str = r#"{"seller_id":"1001","message_type":0,"data":{"trade_order_id":"LZD1","order_status":"pending"}}"#;

#[actix_web::test]
async fn unsigned_webhook_is_rejected() {
    let ctx = TestContext::new().await;
    let req = TestRequest::post().uri("/webhook/lazada").set_payload(LAZADA_PENDING);
    let (status, body) = ctx.send(req, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json(&body)["ok"], false);
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn forged_signature_is_rejected() {
    let ctx = TestContext::new().await;
    let req = TestRequest::post()
        .uri("/webhook/lazada")
        .insert_header((SIGNATURE_HEADER, "00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff"))
        .set_payload(LAZADA_PENDING);
    let (status, _) = ctx.send(req, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // A signature over a different body does not carry over
    let req = signed_webhook(Platform::Lazada, "{}").set_payload(LAZADA_PENDING);
    let (status, _) = ctx.send(req, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn signed_pending_order_is_recorded_once() {
    let ctx = TestContext::new().await;
    ctx.lazada.add_order(vendor_order("LZD1", "pending", &[("A", 2), ("B", 1)]));

    let (status, body) = ctx.send(signed_webhook(Platform::Lazada, LAZADA_PENDING), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["ok"], true);
    assert_eq!(body["data"]["outcome"], "recorded");
    assert_eq!(body["data"]["order_id"], "LZD1");
    assert_eq!(body["data"]["movements"], 3);

    let today = chrono::Utc::now().date_naive();
    let range = DateRange::whole_days(today, today).unwrap();
    let rows = ctx.db.search_movements(MovementTable::PendingOut, Some(Platform::Lazada), range).await.unwrap();
    assert_eq!(rows.len(), 3);

    // The vendor delivers the same push again
    let (status, body) = ctx.send(signed_webhook(Platform::Lazada, LAZADA_PENDING), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["data"]["outcome"], "ignored");
    let rows = ctx.db.search_movements(MovementTable::PendingOut, Some(Platform::Lazada), range).await.unwrap();
    assert_eq!(rows.len(), 3);
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn shopee_signs_the_callback_url() {
    let ctx = TestContext::new().await;
    ctx.shopee.add_order(vendor_order("SP1", "READY_TO_SHIP", &[("A", 1)]));
    let body = r#"{"code":3,"shop_id":100200,"data":{"ordersn":"SP1","status":"READY_TO_SHIP"}}"#;
    let (status, body) = ctx.send(signed_webhook(Platform::Shopee, body), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["data"]["outcome"], "recorded");
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn other_message_types_are_acknowledged() {
    let ctx = TestContext::new().await;
    let body = r#"{"type":6,"data":{"product_id":"99"}}"#;
    let (status, body) = ctx.send(signed_webhook(Platform::Tiktok, body), None).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["ok"], true);
    assert_eq!(body["message"], "Message acknowledged");
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn malformed_payload_is_a_bad_request() {
    let ctx = TestContext::new().await;
    let body = r#"{"type":1,"data":{"order_id":"5761"}}"#;
    let (status, _) = ctx.send(signed_webhook(Platform::Tiktok, body), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn unknown_platform() {
    let ctx = TestContext::new().await;
    let req = TestRequest::post().uri("/webhook/amazon").set_payload("{}");
    let (status, _) = ctx.send(req, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn unknown_vendor_order_is_retried() {
    let ctx = TestContext::new().await;
    // The vendor does not return details for LZD1, so the push fails and the claim on it is released
    let (status, body) = ctx.send(signed_webhook(Platform::Lazada, LAZADA_PENDING), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    ctx.lazada.add_order(vendor_order("LZD1", "pending", &[("A", 1)]));
    let (status, body) = ctx.send(signed_webhook(Platform::Lazada, LAZADA_PENDING), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["data"]["outcome"], "recorded");
    tear_down(ctx.db).await;
}
