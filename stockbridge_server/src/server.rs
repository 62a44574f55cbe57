use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use marketplace_tools::{BotNotifier, MarketplaceApi};
use stockbridge_engine::{events::EventProducers, OrderIntakeApi, ReportingApi, SqliteDatabase, StockSyncApi};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::discord::create_notification_handlers,
    jobs::JobRunner,
    marketplaces::Marketplaces,
    middleware::{ApiKeyMiddlewareFactory, WebhookSignatureFactory},
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
    scheduler::{start_scheduler, ServerJobRunner},
};

const MAX_DB_CONNECTIONS: u32 = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let marketplaces = Marketplaces::from_config(&config.marketplace)?;
    let notifier = match &config.bot {
        Some(bot) => Some(
            BotNotifier::new(&bot.url, &bot.api_key)
                .map_err(|e| ServerError::InitializeError(format!("Could not create the bot client. {e}")))?,
        ),
        None => {
            info!("📣️ No bot is configured. Order notifications are disabled.");
            None
        },
    };
    let producers = match &notifier {
        Some(n) => {
            let handlers = create_notification_handlers(n.clone());
            let producers = handlers.producers();
            handlers.start_handlers().await;
            producers
        },
        None => EventProducers::default(),
    };
    let stock = StockSyncApi::new(db.clone(), config.engine.clone());
    let has_notifier = notifier.is_some();
    let runner = Arc::new(JobRunner::new(
        db.clone(),
        producers.clone(),
        config.engine.clone(),
        stock.clone(),
        marketplaces.clone(),
        notifier,
    ));
    if config.disable_scheduler {
        info!("🕰️ The scheduler is disabled");
    } else {
        let _workers = start_scheduler(db.clone(), Arc::clone(&runner), &config.scheduler, has_notifier);
    }
    let state = AppState { db, producers, stock, marketplaces, runner };
    let srv = create_server_instance(config, state)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Everything the handlers share. The stock API and the job runner are shared across workers so that stock pushes
/// for one platform never overlap.
#[derive(Clone)]
pub struct AppState {
    pub db: SqliteDatabase,
    pub producers: EventProducers,
    pub stock: StockSyncApi<SqliteDatabase>,
    pub marketplaces: Marketplaces<MarketplaceApi>,
    pub runner: Arc<ServerJobRunner>,
}

pub fn create_server_instance(config: ServerConfig, state: AppState) -> Result<Server, ServerError> {
    let stock = web::Data::new(state.stock.clone());
    let marketplaces = web::Data::new(state.marketplaces.clone());
    let runner = web::Data::from(Arc::clone(&state.runner));
    let srv = HttpServer::new(move || {
        let intake_api = OrderIntakeApi::new(state.db.clone(), state.producers.clone(), config.engine.clone());
        let reporting_api = ReportingApi::new(state.db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("stockbridge::access_log"))
            .app_data(web::Data::new(intake_api))
            .app_data(web::Data::new(reporting_api))
            .app_data(stock.clone())
            .app_data(marketplaces.clone())
            .app_data(runner.clone());
        let webhook_scope = web::scope("/webhook")
            .wrap(WebhookSignatureFactory::new(
                state.db.clone(),
                &config.webhooks.shopee_callback_url,
                config.webhooks.signature_checks,
            ))
            .service(WebhookRoute::<SqliteDatabase, MarketplaceApi>::new());
        let jobs_scope = web::scope("/jobs")
            .wrap(ApiKeyMiddlewareFactory::new(config.api_key.clone()))
            .service(RunJobRoute::<SqliteDatabase, MarketplaceApi, BotNotifier>::new());
        let inventory_scope = web::scope("/inventory")
            .wrap(ApiKeyMiddlewareFactory::new(config.api_key.clone()))
            .service(InventoryProductOrdersRoute::<SqliteDatabase>::new())
            .service(RetailOrdersRoute::<SqliteDatabase>::new())
            .service(DeductRetailStockRoute::<SqliteDatabase, MarketplaceApi>::new())
            .service(ReceiveReturnRoute::<SqliteDatabase>::new())
            .service(SoldOutRoute::<SqliteDatabase, MarketplaceApi>::new())
            .service(SyncInventoriesRoute::<SqliteDatabase, MarketplaceApi>::new())
            .service(AddInventoryRoute::<SqliteDatabase, MarketplaceApi>::new());
        app.service(health).service(webhook_scope).service(jobs_scope).service(inventory_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
