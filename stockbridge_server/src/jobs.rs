//! The reconciliation jobs, shared by the `/jobs` endpoints and the scheduler.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use marketplace_tools::MarketplaceClient;
use serde::Serialize;
use serde_json::{Map, Value};
use stockbridge_common::Platform;
use stockbridge_engine::{
    db_types::StockDirection,
    events::EventProducers,
    EngineConfig,
    NotificationApi,
    OrderIntakeApi,
    OrderNotifier,
    ReconciliationDatabase,
    ReconciliationError,
    ReportingApi,
    SettlementApi,
    StockSyncApi,
    TokenApi,
};

use crate::{data_objects::JsonResponse, errors::ServerError, helpers::Job, marketplaces::Marketplaces};

pub struct JobRunner<B, M, N> {
    intake: OrderIntakeApi<B>,
    settlement: SettlementApi<B>,
    tokens: TokenApi<B>,
    notifications: NotificationApi<B>,
    stock: StockSyncApi<B>,
    reporting: ReportingApi<B>,
    marketplaces: Marketplaces<M>,
    notifier: Option<N>,
}

impl<B, M, N> Debug for JobRunner<B, M, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JobRunner")
    }
}

impl<B, M, N> JobRunner<B, M, N>
where
    B: ReconciliationDatabase,
    M: MarketplaceClient,
    N: OrderNotifier,
{
    /// `stock` is passed in so that the runner shares its per-platform locks with the inventory endpoints.
    pub fn new(
        db: B,
        producers: EventProducers,
        config: EngineConfig,
        stock: StockSyncApi<B>,
        marketplaces: Marketplaces<M>,
        notifier: Option<N>,
    ) -> Self {
        Self {
            intake: OrderIntakeApi::new(db.clone(), producers, config.clone()),
            settlement: SettlementApi::new(db.clone(), config.clone()),
            tokens: TokenApi::new(db.clone()),
            notifications: NotificationApi::new(db.clone(), config),
            reporting: ReportingApi::new(db),
            stock,
            marketplaces,
            notifier,
        }
    }

    /// Runs one job. `platform` restricts `updateOrderStatuses` to one platform; the other jobs ignore it.
    pub async fn run(&self, job: Job, platform: Option<Platform>) -> Result<JsonResponse, ServerError> {
        debug!("🕰️ Running {job:?}");
        let response = match job {
            Job::PollPendingOrders(p) => {
                let summary = self.intake.poll_pending_orders(self.marketplaces.get(p)?, Utc::now()).await?;
                JsonResponse::success(format!("Recorded {} new {p} orders", summary.recorded)).with_data(&summary)
            },
            Job::Settle(p) => {
                let summary = self.settlement.settle(self.marketplaces.get(p)?, Utc::now()).await?;
                let message = format!("Settled {} of {} {p} orders", summary.settled, summary.candidates);
                JsonResponse::success(message).with_data(&summary)
            },
            Job::RefreshTokens(p) => {
                self.tokens.refresh_tokens(self.marketplaces.get(p)?).await?;
                JsonResponse::success(format!("{p} tokens refreshed"))
            },
            Job::UpdateOrderStatuses => {
                let mut results = Vec::new();
                for client in self.clients_for(platform)? {
                    results.push((client.platform(), self.intake.refresh_statuses(client, Utc::now()).await));
                }
                per_platform("Order statuses refreshed", results)
            },
            Job::DiscordNotifications => {
                let notifier = self
                    .notifier
                    .as_ref()
                    .ok_or_else(|| ServerError::NotConfigured("Discord notifications are disabled".into()))?;
                let mut results = Vec::new();
                for client in self.marketplaces.all() {
                    results.push((client.platform(), self.notifications.open_threads(client, notifier).await));
                }
                per_platform("Order threads opened", results)
            },
            Job::Ping => {
                self.reporting.ping().await?;
                JsonResponse::success("pong")
            },
        };
        Ok(response)
    }

    /// One deduction and one restock batch for `platform`.
    pub async fn sync_stock(&self, platform: Platform) -> Result<JsonResponse, ServerError> {
        let client = self.marketplaces.get(platform)?;
        Ok(run_stock_batches(&self.stock, client).await)
    }

    fn clients_for(&self, platform: Option<Platform>) -> Result<Vec<&M>, ServerError> {
        match platform {
            Some(p) => Ok(vec![self.marketplaces.get(p)?]),
            None => Ok(self.marketplaces.all().iter().collect()),
        }
    }
}

/// Runs a deduction batch then a restock batch. A failing direction does not stop the other one.
pub async fn run_stock_batches<B, M>(api: &StockSyncApi<B>, client: &M) -> JsonResponse
where
    B: ReconciliationDatabase,
    M: MarketplaceClient,
{
    let platform = client.platform();
    let mut results = Vec::with_capacity(2);
    for direction in [StockDirection::Deduct, StockDirection::Restock] {
        results.push((direction, api.change_inventory(client, direction).await));
    }
    let mut data = Map::new();
    let mut ok = true;
    for (direction, result) in results {
        let entry = match result {
            Ok(summary) => JsonResponse::success(format!("{} rows processed", summary.rows)).with_data(&summary),
            Err(e) => {
                log_job_error(&format!("{direction} {platform} stock"), &e);
                ok &= e.code().is_benign();
                report_error(&e)
            },
        };
        data.insert(direction.to_string(), to_value(&entry));
    }
    let message = if ok { format!("{platform} stock is up to date") } else { format!("{platform} stock sync failed") };
    JsonResponse { ok, message, data: Some(Value::Object(data)) }
}

/// Collects the results of a job that ran on several platforms. A platform that fails does not fail the others, but
/// the response is only `ok` when none of them failed.
fn per_platform<T: Serialize>(message: &str, results: Vec<(Platform, Result<T, ReconciliationError>)>) -> JsonResponse {
    let mut data = Map::new();
    let mut ok = true;
    for (platform, result) in results {
        let entry = match result {
            Ok(v) => JsonResponse::success("Done").with_data(&v),
            Err(e) => {
                log_job_error(&format!("{message} on {platform}"), &e);
                ok &= e.code().is_benign();
                report_error(&e)
            },
        };
        data.insert(platform.to_string(), to_value(&entry));
    }
    let message = if ok { message.to_string() } else { format!("{message}, with errors") };
    JsonResponse { ok, message, data: Some(Value::Object(data)) }
}

fn report_error(e: &ReconciliationError) -> JsonResponse {
    if e.code().is_benign() {
        JsonResponse::success(e)
    } else {
        JsonResponse::failure(e)
    }
}

fn to_value(response: &JsonResponse) -> Value {
    serde_json::to_value(response).unwrap_or(Value::Null)
}

pub fn log_job_error(job: &str, e: &ReconciliationError) {
    if e.code().is_benign() {
        info!("🕰️ {job}: {e}");
    } else {
        error!("🕰️ {job} failed. {e}");
    }
}
