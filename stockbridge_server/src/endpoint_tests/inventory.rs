use actix_web::{http::StatusCode, test::TestRequest};
use chrono::{Days, Utc};
use stockbridge_common::Platform;
use stockbridge_engine::test_utils::{fake_marketplace::vendor_order, prepare_env::tear_down};

use super::helpers::{authorized_get, json, TestContext, API_KEY};
use crate::middleware::API_KEY_HEADER;

fn today() -> String {
    Utc::now().date_naive().to_string()
}

async fn record_lazada_order(ctx: &TestContext, order_id: &str, items: &[(&str, i64)]) {
    let order = vendor_order(order_id, "pending", items);
    ctx.intake_api().intake_order(Platform::Lazada, &order).await.unwrap();
}

#[actix_web::test]
async fn inventory_needs_the_api_key() {
    let ctx = TestContext::new().await;
    let (status, _) = ctx.send(TestRequest::get().uri("/inventory/syncInventories"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn movements_by_status() {
    let ctx = TestContext::new().await;
    record_lazada_order(&ctx, "LZD1", &[("A", 2)]).await;
    let day = today();
    let uri = format!("/inventory/getInventoryProductOrders?start_date={day}&end_date={day}&status=PENDING%20OUT");
    let (status, body) = ctx.send(authorized_get(&uri), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["data"].as_array().map(|a| a.len()), Some(2));

    let uri = format!(
        "/inventory/getInventoryProductOrders?start_date={day}&end_date={day}&status=COMPLETED%20OUT&platform=lazada"
    );
    let (status, body) = ctx.send(authorized_get(&uri), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["data"].as_array().map(|a| a.len()), Some(0));
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn bad_movement_queries() {
    let ctx = TestContext::new().await;
    let day = today();
    let uri = format!("/inventory/getInventoryProductOrders?start_date={day}&end_date={day}&status=LOST");
    let (status, body) = ctx.send(authorized_get(&uri), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["ok"], false);

    let yesterday = Utc::now().date_naive().checked_sub_days(Days::new(1)).unwrap();
    let uri = format!("/inventory/getRetailOrders?start_date={day}&end_date={yesterday}");
    let (status, _) = ctx.send(authorized_get(&uri), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx.send(authorized_get("/inventory/getRetailOrders?start_date=today"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn retail_orders_across_platforms() {
    let ctx = TestContext::new().await;
    record_lazada_order(&ctx, "LZD1", &[("A", 1)]).await;
    let order = vendor_order("SP1", "READY_TO_SHIP", &[("B", 1)]);
    ctx.intake_api().intake_order(Platform::Shopee, &order).await.unwrap();
    let day = today();

    let (status, body) =
        ctx.send(authorized_get(&format!("/inventory/getRetailOrders?start_date={day}&end_date={day}")), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["data"].as_array().map(|a| a.len()), Some(2));

    let uri = format!("/inventory/getRetailOrders?start_date={day}&end_date={day}&platform=Shopee");
    let (status, body) = ctx.send(authorized_get(&uri), None).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["data"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(body["data"][0]["order_id"], "SP1");
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn deduct_retail_stock() {
    let ctx = TestContext::new().await;
    record_lazada_order(&ctx, "LZD1", &[("A", 3)]).await;
    ctx.shopee.list_sku("A", 20);

    let (status, body) = ctx.send(authorized_get("/inventory/deductRetailStock?platform=shopee"), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["ok"], true);
    assert_eq!(body["data"]["deduct"]["data"]["rows"], 3);
    assert_eq!(ctx.shopee.stock_of("A"), Some(17));

    // Everything is flagged for Shopee now
    let (status, _) = ctx.send(authorized_get("/inventory/deductRetailStock?platform=shopee"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctx.shopee.stock_of("A"), Some(17));

    let (status, _) = ctx.send(authorized_get("/inventory/deductRetailStock"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn rejected_stock_push_is_reported() {
    let ctx = TestContext::new().await;
    ctx.tiktok.list_sku("A", 20);
    ctx.tiktok.reject_stock_updates(true);
    let (status, body) = ctx.send(authorized_get("/inventory/soldOut?sku=A"), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{body}");
    let body = json(&body);
    assert_eq!(body["ok"], false);
    let results = body["data"].as_array().cloned().unwrap_or_default();
    let tiktok = results.iter().find(|r| r["platform"] == "TIKTOK").unwrap();
    assert_eq!(tiktok["code"], 0);
    assert_eq!(ctx.tiktok.stock_of("A"), Some(20));
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn sold_out() {
    let ctx = TestContext::new().await;
    ctx.shopee.list_sku("A", 20);
    ctx.lazada.list_sku("A", 11);
    let (status, body) = ctx.send(authorized_get("/inventory/soldOut?sku=A"), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(ctx.shopee.stock_of("A"), Some(0));
    assert_eq!(ctx.lazada.stock_of("A"), Some(0));
    // TikTok does not list the SKU
    let results = json(&body)["data"].as_array().cloned().unwrap_or_default();
    let tiktok = results.iter().find(|r| r["platform"] == "TIKTOK").unwrap();
    assert_eq!(tiktok["code"], 3);

    let (status, _) = ctx.send(authorized_get("/inventory/soldOut?sku=%20"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn sync_inventories_writes_catalog_quantities() {
    let ctx = TestContext::new().await;
    ctx.shopee.list_sku("A", 3);
    ctx.shopee.list_sku("B", 4);
    ctx.tiktok.list_sku("B", 40);
    let (status, body) = ctx.send(authorized_get("/inventory/syncInventories"), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(ctx.shopee.stock_of("A"), Some(50));
    assert_eq!(ctx.shopee.stock_of("B"), Some(50));
    assert_eq!(ctx.tiktok.stock_of("B"), Some(50));
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn add_inventory() {
    let ctx = TestContext::new().await;
    ctx.lazada.list_sku("A", 5);
    ctx.lazada.list_sku("B", 1);
    let req = TestRequest::post()
        .uri("/inventory/addInventory")
        .insert_header((API_KEY_HEADER, API_KEY))
        .set_json(serde_json::json!({"items": [{"sku": "A", "quantity": 10}, {"sku": "B", "quantity": 2}]}));
    let (status, body) = ctx.send(req, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(ctx.lazada.stock_of("A"), Some(15));
    assert_eq!(ctx.lazada.stock_of("B"), Some(3));

    // A bare list works too
    let req = TestRequest::post()
        .uri("/inventory/addInventory")
        .insert_header((API_KEY_HEADER, API_KEY))
        .set_json(serde_json::json!([{"sku": "A", "quantity": 1}]));
    let (status, _) = ctx.send(req, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctx.lazada.stock_of("A"), Some(16));
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn add_inventory_rejects_bad_quantities() {
    let ctx = TestContext::new().await;
    ctx.lazada.list_sku("A", 5);
    let req = TestRequest::post()
        .uri("/inventory/addInventory")
        .insert_header((API_KEY_HEADER, API_KEY))
        .set_json(serde_json::json!([{"sku": "A", "quantity": 0}]));
    let (status, _) = ctx.send(req, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = TestRequest::post()
        .uri("/inventory/addInventory")
        .insert_header((API_KEY_HEADER, API_KEY))
        .set_json(serde_json::json!({"sku": "A"}));
    let (status, _) = ctx.send(req, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ctx.lazada.stock_of("A"), Some(5));
    tear_down(ctx.db).await;
}

#[actix_web::test]
async fn receive_return_needs_an_order() {
    let ctx = TestContext::new().await;
    let (status, _) = ctx.send(authorized_get("/inventory/receiveReturn?platform=lazada"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    tear_down(ctx.db).await;
}
