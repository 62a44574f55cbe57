use actix_web::{
    body::{to_bytes, BoxBody},
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    App,
    HttpResponse,
};
use log::debug;
use marketplace_tools::signing::hmac_sha256_hex;
use stockbridge_common::{Platform, Secret};
use stockbridge_engine::{
    events::EventProducers,
    test_utils::{
        fake_marketplace::FakeMarketplace,
        prepare_env::{fresh_database, seed_catalog_entry},
    },
    EngineConfig,
    OrderIntakeApi,
    ReportingApi,
    SqliteDatabase,
    StockSyncApi,
};

use super::mocks::MockNotifier;
use crate::{
    jobs::JobRunner,
    marketplaces::Marketplaces,
    middleware::{ApiKeyMiddlewareFactory, WebhookSignatureFactory, API_KEY_HEADER, SIGNATURE_HEADER},
    routes::{
        health,
        AddInventoryRoute,
        DeductRetailStockRoute,
        InventoryProductOrdersRoute,
        ReceiveReturnRoute,
        RetailOrdersRoute,
        RunJobRoute,
        SoldOutRoute,
        SyncInventoriesRoute,
        WebhookRoute,
    },
};

pub const API_KEY: &str = "test-api-key";
pub const SHOPEE_CALLBACK_URL: &str = "https://stockbridge.example.com/webhook/shopee";
// Matches the credentials stored by `fresh_database`
const APP_KEY: &str = "test-app-key";
const APP_SECRET: &str = "test-app-secret";

/// A fresh database with two catalog SKUs and an empty fake shop on every platform.
pub struct TestContext {
    pub db: SqliteDatabase,
    pub shopee: FakeMarketplace,
    pub lazada: FakeMarketplace,
    pub tiktok: FakeMarketplace,
}

impl TestContext {
    pub async fn new() -> Self {
        let db = fresh_database().await;
        seed_catalog_entry(&db, "A", 50, 200).await;
        seed_catalog_entry(&db, "B", 50, 300).await;
        Self {
            db,
            shopee: FakeMarketplace::new(Platform::Shopee),
            lazada: FakeMarketplace::new(Platform::Lazada),
            tiktok: FakeMarketplace::new(Platform::Tiktok),
        }
    }

    pub fn intake_api(&self) -> OrderIntakeApi<SqliteDatabase> {
        OrderIntakeApi::new(self.db.clone(), EventProducers::default(), EngineConfig::default())
    }

    fn marketplaces(&self) -> Marketplaces<FakeMarketplace> {
        Marketplaces::new(vec![self.shopee.clone(), self.lazada.clone(), self.tiktok.clone()])
    }

    /// Sends `req` to an app wired like the production server, and returns the status and body of the response.
    pub async fn send(&self, req: TestRequest, notifier: Option<MockNotifier>) -> (StatusCode, String) {
        let db = self.db.clone();
        let config = EngineConfig::default();
        let stock = StockSyncApi::new(db.clone(), config.clone());
        let marketplaces = self.marketplaces();
        let runner =
            JobRunner::new(db.clone(), EventProducers::default(), config, stock.clone(), marketplaces.clone(), notifier);
        let app = App::new()
            .app_data(web::Data::new(self.intake_api()))
            .app_data(web::Data::new(ReportingApi::new(db.clone())))
            .app_data(web::Data::new(stock))
            .app_data(web::Data::new(marketplaces))
            .app_data(web::Data::new(runner))
            .service(health)
            .service(
                web::scope("/webhook")
                    .wrap(WebhookSignatureFactory::new(db.clone(), SHOPEE_CALLBACK_URL, true))
                    .service(WebhookRoute::<SqliteDatabase, FakeMarketplace>::new()),
            )
            .service(
                web::scope("/jobs")
                    .wrap(ApiKeyMiddlewareFactory::new(Secret::new(API_KEY.to_string())))
                    .service(RunJobRoute::<SqliteDatabase, FakeMarketplace, MockNotifier>::new()),
            )
            .service(
                web::scope("/inventory")
                    .wrap(ApiKeyMiddlewareFactory::new(Secret::new(API_KEY.to_string())))
                    .service(InventoryProductOrdersRoute::<SqliteDatabase>::new())
                    .service(RetailOrdersRoute::<SqliteDatabase>::new())
                    .service(DeductRetailStockRoute::<SqliteDatabase, FakeMarketplace>::new())
                    .service(ReceiveReturnRoute::<SqliteDatabase>::new())
                    .service(SoldOutRoute::<SqliteDatabase, FakeMarketplace>::new())
                    .service(SyncInventoriesRoute::<SqliteDatabase, FakeMarketplace>::new())
                    .service(AddInventoryRoute::<SqliteDatabase, FakeMarketplace>::new()),
            );
        let service = test::init_service(app).await;
        debug!("Making request");
        // Middleware rejections arrive as errors rather than responses
        let res: HttpResponse<BoxBody> = match test::try_call_service(&service, req.to_request()).await {
            Ok(res) => res.map_into_boxed_body().into_parts().1,
            Err(e) => e.error_response(),
        };
        let status = res.status();
        let body = to_bytes(res.into_body()).await.map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap();
        (status, body)
    }
}

pub fn authorized_get(path: &str) -> TestRequest {
    TestRequest::get().uri(path).insert_header((API_KEY_HEADER, API_KEY))
}

/// A webhook post signed the way the marketplace signs it.
pub fn signed_webhook(platform: Platform, body: &str) -> TestRequest {
    let message = match platform {
        Platform::Shopee => format!("{SHOPEE_CALLBACK_URL}|{body}"),
        Platform::Lazada | Platform::Tiktok => format!("{APP_KEY}{body}"),
    };
    let signature = hmac_sha256_hex(APP_SECRET.as_bytes(), message.as_bytes());
    TestRequest::post()
        .uri(&format!("/webhook/{}", platform.as_str().to_lowercase()))
        .insert_header((SIGNATURE_HEADER, signature))
        .set_payload(body.to_string())
}

pub fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap()
}
