use marketplace_tools::{
    MarketplaceApi,
    MarketplaceClient,
    MarketplaceConfig,
    SettlementQuery,
    ShopCredentials,
    TimeWindow,
};
use stockbridge_common::Platform;

fn unreachable_config() -> MarketplaceConfig {
    let host = "http://127.0.0.1:9".to_string();
    MarketplaceConfig {
        shopee_host: host.clone(),
        lazada_host: host.clone(),
        lazada_auth_host: host.clone(),
        tiktok_host: host.clone(),
        tiktok_auth_host: host,
        request_timeout_secs: 2,
    }
}

fn creds(platform: Platform) -> ShopCredentials {
    ShopCredentials::new(platform, "app-key", "app-secret")
        .with_tokens("access", "refresh")
        .with_shop_id("1234")
        .with_partner_id("5678")
        .with_shop_cipher("CIPHER")
}

#[tokio::test]
async fn transport_failures_are_reported_not_raised() {
    let _ = env_logger::try_init();
    let window = TimeWindow::trailing_days(chrono::Utc::now(), 7);
    for platform in Platform::ALL {
        let api = MarketplaceApi::new(platform, unreachable_config()).unwrap();
        let creds = creds(platform);
        let orders = api.list_orders(&creds, &window, Some("pending")).await;
        assert!(!orders.ok, "{platform} list_orders should fail");
        assert!(orders.error.is_some());
        assert!(orders.vendor_payload.is_none());

        let details = api.get_order_details(&creds, &["1".to_string()]).await;
        assert!(!details.ok);

        let tokens = api.refresh_tokens(&creds).await;
        assert!(!tokens.ok);
    }
}

#[tokio::test]
async fn failed_stock_pushes_are_listed_per_sku() {
    let _ = env_logger::try_init();
    let update = marketplace_tools::StockUpdate {
        listing: marketplace_tools::ListingRef { sku: "A".into(), item_id: "1".into(), variant_id: Some("2".into()) },
        stock: 5,
    };
    for platform in Platform::ALL {
        let api = MarketplaceApi::new(platform, unreachable_config()).unwrap();
        let report = api.update_stock(&creds(platform), &[update.clone()]).await;
        assert!(report.ok);
        let report = report.data.unwrap();
        assert!(report.updated.is_empty());
        assert_eq!(report.failed, vec!["A".to_string()]);
    }
}

#[tokio::test]
async fn missing_credentials_fail_softly() {
    let api = MarketplaceApi::new(Platform::Tiktok, unreachable_config()).unwrap();
    let bare = ShopCredentials::new(Platform::Tiktok, "k", "s");
    let query = SettlementQuery { window: TimeWindow::trailing_days(chrono::Utc::now(), 1), order_ids: vec![] };
    let result = api.get_settlement_lines(&bare, &query).await;
    assert!(!result.ok);
    assert!(result.error_message().contains("shop_cipher"));
}
