//! Request handler definitions
//!
//! Define each route and its handler here. Anything longer than a few lines belongs in the engine or in
//! [`crate::jobs`]. Keep this module neat and tidy 🙏
//!
//! Every handler that touches the database or a marketplace is async. Each worker thread processes its requests
//! sequentially, so a handler that blocks the thread stalls every request queued on that worker.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use marketplace_tools::MarketplaceClient;
use stockbridge_common::Platform;
use stockbridge_engine::{
    db_types::MovementTable,
    traits::DateRange,
    OrderIntakeApi,
    OrderNotifier,
    PlatformStockResult,
    ReconciliationDatabase,
    ReportingApi,
    StockSyncApi,
    SyncCode,
};

use crate::{
    data_objects::{
        AddInventoryRequest,
        JsonResponse,
        MovementQuery,
        PlatformFilter,
        PlatformParam,
        RetailOrderQuery,
        ReturnParams,
        SkuParam,
    },
    errors::ServerError,
    helpers::Job,
    integrations::webhooks::parse_webhook,
    jobs::{run_stock_batches, JobRunner},
    marketplaces::Marketplaces,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

#[get("/health")]
pub async fn health() -> impl Responder {
    "👍️\n"
}

//----------------------------------------------   Webhooks  ----------------------------------------------------

route!(webhook => Post "/{platform}" impl ReconciliationDatabase, MarketplaceClient);
/// Receives an order status push from a marketplace. The signature has already been checked by the middleware.
///
/// Pushes that are not about an order status are acknowledged with a 200. A push that cannot be processed gets an
/// error status so that the vendor delivers it again.
pub async fn webhook<B, M>(
    path: web::Path<String>,
    body: web::Bytes,
    api: web::Data<OrderIntakeApi<B>>,
    marketplaces: web::Data<Marketplaces<M>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReconciliationDatabase,
    M: MarketplaceClient,
{
    let platform = parse_platform(&path)?;
    trace!("🛍️ Received {platform} webhook");
    let notification = match parse_webhook(platform, &body) {
        Ok(Some(n)) => n,
        Ok(None) => return Ok(HttpResponse::Ok().json(JsonResponse::success("Message acknowledged"))),
        Err(e) => {
            warn!("🛍️ Could not read {platform} webhook. {e}");
            return Err(ServerError::InvalidRequestBody(e.to_string()));
        },
    };
    let client = marketplaces.get(platform)?;
    let outcome = api.handle_status_event(client, notification).await.map_err(ServerError::WebhookFailed)?;
    info!("🛍️ {platform} webhook handled: {outcome:?}");
    Ok(HttpResponse::Ok().json(JsonResponse::success("Webhook processed").with_data(&outcome)))
}

//----------------------------------------------   Jobs  ----------------------------------------------------

route!(run_job => Get "/{job}" impl ReconciliationDatabase, MarketplaceClient, OrderNotifier);
pub async fn run_job<B, M, N>(
    path: web::Path<String>,
    filter: web::Query<PlatformFilter>,
    runner: web::Data<JobRunner<B, M, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReconciliationDatabase,
    M: MarketplaceClient,
    N: OrderNotifier,
{
    let job = path.parse::<Job>().map_err(|e| ServerError::InvalidRequestPath(e.to_string()))?;
    let response = runner.run(job, filter.platform).await?;
    Ok(respond(response))
}

//----------------------------------------------   Inventory  ----------------------------------------------------

route!(inventory_product_orders => Get "/getInventoryProductOrders" impl ReconciliationDatabase);
/// The movement rows in one inventory table for orders created between two dates.
pub async fn inventory_product_orders<B: ReconciliationDatabase>(
    query: web::Query<MovementQuery>,
    api: web::Data<ReportingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    let table = query.status.parse::<MovementTable>().map_err(|e| ServerError::InvalidQuery(e.to_string()))?;
    let range = date_range(query.start_date, query.end_date)?;
    let rows = api.movements(table, query.platform, range).await?;
    let message = format!("{} rows in {table}", rows.len());
    Ok(HttpResponse::Ok().json(JsonResponse::success(message).with_data(&rows)))
}

route!(retail_orders => Get "/getRetailOrders" impl ReconciliationDatabase);
pub async fn retail_orders<B: ReconciliationDatabase>(
    query: web::Query<RetailOrderQuery>,
    api: web::Data<ReportingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    let range = date_range(query.start_date, query.end_date)?;
    let orders = api.orders(query.platform, range).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("{} orders", orders.len())).with_data(&orders)))
}

route!(deduct_retail_stock => Get "/deductRetailStock" impl ReconciliationDatabase, MarketplaceClient);
/// Runs one deduction batch and one restock batch for a platform's sales.
pub async fn deduct_retail_stock<B, M>(
    query: web::Query<PlatformParam>,
    api: web::Data<StockSyncApi<B>>,
    marketplaces: web::Data<Marketplaces<M>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReconciliationDatabase,
    M: MarketplaceClient,
{
    let client = marketplaces.get(query.platform)?;
    Ok(respond(run_stock_batches(&api, client).await))
}

route!(receive_return => Get "/receiveReturn" impl ReconciliationDatabase);
/// Records that the goods of a returned order are back in the warehouse.
pub async fn receive_return<B: ReconciliationDatabase>(
    query: web::Query<ReturnParams>,
    api: web::Data<OrderIntakeApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let ReturnParams { platform, order_id } = query.into_inner();
    let moved = api.receive_return(platform, &order_id).await?;
    let message = format!("{moved} units of {platform} order {order_id} are back in stock");
    Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
}

route!(sold_out => Get "/soldOut" impl ReconciliationDatabase, MarketplaceClient);
pub async fn sold_out<B, M>(
    query: web::Query<SkuParam>,
    api: web::Data<StockSyncApi<B>>,
    marketplaces: web::Data<Marketplaces<M>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReconciliationDatabase,
    M: MarketplaceClient,
{
    let sku = query.sku.trim();
    if sku.is_empty() {
        return Err(ServerError::InvalidQuery("sku must not be empty".into()));
    }
    let results = api.sold_out(marketplaces.all(), sku).await;
    Ok(stock_results(format!("{sku} marked as sold out"), &results))
}

route!(sync_inventories => Get "/syncInventories" impl ReconciliationDatabase, MarketplaceClient);
/// Overwrites every marketplace listing with the catalog quantities.
pub async fn sync_inventories<B, M>(
    api: web::Data<StockSyncApi<B>>,
    marketplaces: web::Data<Marketplaces<M>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReconciliationDatabase,
    M: MarketplaceClient,
{
    let results = api.sync_inventories(marketplaces.all()).await?;
    Ok(stock_results("Inventories synced".to_string(), &results))
}

route!(add_inventory => Post "/addInventory" impl ReconciliationDatabase, MarketplaceClient);
pub async fn add_inventory<B, M>(
    body: web::Json<AddInventoryRequest>,
    api: web::Data<StockSyncApi<B>>,
    marketplaces: web::Data<Marketplaces<M>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReconciliationDatabase,
    M: MarketplaceClient,
{
    let items = body.into_inner().into_items();
    let results = api.add_inventory(marketplaces.all(), &items).await?;
    Ok(stock_results(format!("Stock added for {} SKUs", items.len()), &results))
}

fn parse_platform(s: &str) -> Result<Platform, ServerError> {
    s.parse::<Platform>().map_err(|_| ServerError::InvalidRequestPath(format!("{s} is not a supported platform")))
}

fn date_range(start: chrono::NaiveDate, end: chrono::NaiveDate) -> Result<DateRange, ServerError> {
    DateRange::whole_days(start, end)
        .ok_or_else(|| ServerError::InvalidQuery(format!("start_date {start} is after end_date {end}")))
}

fn stock_results(message: String, results: &[PlatformStockResult]) -> HttpResponse {
    let ok = results.iter().all(|r| r.code != SyncCode::Error);
    respond(JsonResponse { ok, message, data: None }.with_data(&results))
}

/// Jobs that ran but failed somewhere report `ok: false` with a 500.
fn respond(response: JsonResponse) -> HttpResponse {
    if response.ok {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::InternalServerError().json(response)
    }
}
