use actix_web::{http::StatusCode, test::TestRequest};
use marketplace_tools::{MarketplaceOrder, ThreadAssignment};
use stockbridge_common::Platform;
use stockbridge_engine::{
    test_utils::{fake_marketplace::vendor_order, prepare_env::tear_down},
    OrderManagement,
    ShopTokenManagement,
};

use super::{
    helpers::{authorized_get, json, TestContext},
    mocks::MockNotifier,
};
use crate::middleware::API_KEY_HEADER;

#[actix_web::test]
async fn jobs_need_the_api_key() {
    let ctx = TestContext::new().await;
    let (status, _) = ctx.send(TestRequest::get().uri("/jobs/ping"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let req = TestRequest::get().uri("/jobs/ping").insert_header((API_KEY_HEADER, "guess"));
    let (status, body) = ctx.send(req, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json(&body)["ok"], false);
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn ping() {
    let ctx = TestContext::new().await;
    let (status, body) = ctx.send(authorized_get("/jobs/ping"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["message"], "pong");
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn unknown_job() {
    let ctx = TestContext::new().await;
    let (status, _) = ctx.send(authorized_get("/jobs/settleAmazon"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = ctx.send(authorized_get("/jobs/dropTables"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn poll_records_missed_orders() {
    let ctx = TestContext::new().await;
    ctx.lazada.add_order(vendor_order("LZD7", "pending", &[("A", 1)]));
    ctx.lazada.add_order(vendor_order("LZD8", "delivered", &[("B", 1)]));

    let (status, body) = ctx.send(authorized_get("/jobs/getPendingLazadaOrders"), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["data"]["listed"], 1);
    assert_eq!(body["data"]["recorded"], 1);
    assert!(ctx.db.fetch_order(Platform::Lazada, "LZD7").await.unwrap().is_some());
    assert!(ctx.db.fetch_order(Platform::Lazada, "LZD8").await.unwrap().is_none());

    let (status, body) = ctx.send(authorized_get("/jobs/getPendingLazadaOrders"), None).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["data"]["recorded"], 0);
    assert_eq!(body["data"]["already_recorded"], 1);
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn nothing_to_settle_is_not_an_error() {
    let ctx = TestContext::new().await;
    let (status, body) = ctx.send(authorized_get("/jobs/settleTiktok"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["ok"], true);
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn token_refresh() {
    let ctx = TestContext::new().await;
    ctx.shopee.issue_tokens("new-access", "new-refresh");
    let (status, body) = ctx.send(authorized_get("/jobs/refreshShopeeTokens"), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let creds = ctx.db.fetch_credentials(Platform::Shopee).await.unwrap().unwrap();
    assert_eq!(creds.access_token.reveal(), "new-access");
    assert_eq!(creds.refresh_token.reveal(), "new-refresh");

    // TikTok refuses, so the old tokens stay
    let (status, body) = ctx.send(authorized_get("/jobs/refreshTiktokTokens"), None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY, "{body}");
    let creds = ctx.db.fetch_credentials(Platform::Tiktok).await.unwrap().unwrap();
    assert_eq!(creds.refresh_token.reveal(), "test-refresh-token");
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn status_refresh_takes_an_optional_platform() {
    let ctx = TestContext::new().await;
    let (status, body) = ctx.send(authorized_get("/jobs/updateOrderStatuses?platform=lazada"), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert!(body["data"]["LAZADA"].is_object());
    assert!(body["data"]["SHOPEE"].is_null());

    let (status, body) = ctx.send(authorized_get("/jobs/updateOrderStatuses"), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    for p in ["SHOPEE", "LAZADA", "TIKTOK"] {
        assert_eq!(body["data"][p]["ok"], true);
    }

    let (status, _) = ctx.send(authorized_get("/jobs/updateOrderStatuses?platform=ebay"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn discord_notifications_need_a_bot() {
    let ctx = TestContext::new().await;
    let (status, _) = ctx.send(authorized_get("/jobs/runDiscordNotif"), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn discord_threads_are_opened_for_new_orders() {
    let ctx = TestContext::new().await;
    let order = vendor_order("LZD9", "pending", &[("A", 1)]);
    ctx.lazada.add_order(order.clone());
    ctx.intake_api().intake_order(Platform::Lazada, &order).await.unwrap();

    let mut notifier = MockNotifier::new();
    notifier.expect_create_order_threads().times(1).returning(|platform, orders: &[MarketplaceOrder]| {
        assert_eq!(platform, Platform::Lazada);
        Ok(orders
            .iter()
            .map(|o| ThreadAssignment { order_id: o.order_id.clone(), thread_id: "thread-1".to_string() })
            .collect())
    });
    let (status, body) = ctx.send(authorized_get("/jobs/runDiscordNotif"), Some(notifier)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["data"]["LAZADA"]["data"], 1);
    // Shopee and TikTok have no orders, which is not a failure
    assert_eq!(body["data"]["SHOPEE"]["ok"], true);
    let stored = ctx.db.fetch_order(Platform::Lazada, "LZD9").await.unwrap().unwrap();
    assert_eq!(stored.discord_channel.as_deref(), Some("thread-1"));
    tear_down(ctx.db).await;
}
