//! Timed workers.
//!
//! Each schedule entry runs in its own tokio task. The first run happens one period after startup. A run that fails
//! is logged and the job simply runs again at the next tick.
use std::{sync::Arc, time::Duration};

use log::*;
use marketplace_tools::{BotNotifier, MarketplaceApi};
use stockbridge_common::Platform;
use stockbridge_engine::{IdempotencyStore, SqliteDatabase};
use tokio::{task::JoinHandle, time::Instant};

use crate::{config::SchedulerConfig, helpers::Job, jobs::JobRunner};

pub type ServerJobRunner = JobRunner<SqliteDatabase, MarketplaceApi, BotNotifier>;

const HOUR: u64 = 3600;
const DAY: u64 = 24 * HOUR;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledTask {
    Job(Job),
    /// Checks one platform's stored orders for status changes.
    RefreshStatuses(Platform),
    /// A deduction batch followed by a restock batch.
    SyncStock(Platform),
    PurgeIdempotencyKeys,
}

/// The timed jobs and their periods.
pub fn schedule(config: &SchedulerConfig, notifications: bool) -> Vec<(ScheduledTask, Duration)> {
    let every = |job: Job, secs: u64| (ScheduledTask::Job(job), Duration::from_secs(secs));
    let mut tasks = vec![
        every(Job::RefreshTokens(Platform::Shopee), 3 * HOUR),
        every(Job::RefreshTokens(Platform::Tiktok), 5 * DAY),
        every(Job::RefreshTokens(Platform::Lazada), 29 * DAY),
        every(Job::Settle(Platform::Shopee), 4 * HOUR),
        every(Job::Settle(Platform::Lazada), 4 * HOUR),
        every(Job::Settle(Platform::Tiktok), DAY),
        (ScheduledTask::PurgeIdempotencyKeys, Duration::from_secs(HOUR)),
    ];
    for p in Platform::ALL {
        tasks.push(every(Job::PollPendingOrders(p), config.poll_interval.as_secs()));
        tasks.push((ScheduledTask::RefreshStatuses(p), config.status_refresh_interval));
        tasks.push((ScheduledTask::SyncStock(p), Duration::from_secs(600)));
    }
    if notifications {
        tasks.push(every(Job::DiscordNotifications, 900));
    }
    tasks
}

/// Starts every scheduled worker. Do not await the returned handles, as they run indefinitely.
pub fn start_scheduler(
    db: SqliteDatabase,
    runner: Arc<ServerJobRunner>,
    config: &SchedulerConfig,
    notifications: bool,
) -> Vec<JoinHandle<()>> {
    let tasks = schedule(config, notifications);
    info!("🕰️ Starting {} scheduled workers", tasks.len());
    tasks.into_iter().map(|(task, period)| start_worker(db.clone(), Arc::clone(&runner), task, period)).collect()
}

fn start_worker(
    db: SqliteDatabase,
    runner: Arc<ServerJobRunner>,
    task: ScheduledTask,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        debug!("🕰️ {task:?} will run every {}s", period.as_secs());
        loop {
            timer.tick().await;
            run_task(&db, &runner, task).await;
        }
    })
}

async fn run_task(db: &SqliteDatabase, runner: &ServerJobRunner, task: ScheduledTask) {
    match task {
        ScheduledTask::Job(job) => match runner.run(job, None).await {
            Ok(r) if r.ok => info!("🕰️ {job:?}: {}", r.message),
            Ok(r) => warn!("🕰️ {job:?}: {}", r.message),
            Err(e) if e.code().is_some_and(|c| c.is_benign()) => info!("🕰️ {job:?}: {e}"),
            Err(e) => error!("🕰️ {job:?} failed. {e}"),
        },
        ScheduledTask::RefreshStatuses(platform) => match runner.run(Job::UpdateOrderStatuses, Some(platform)).await {
            Ok(r) if r.ok => info!("🕰️ {platform} statuses: {}", r.message),
            Ok(r) => warn!("🕰️ {platform} statuses: {}", r.message),
            Err(e) => error!("🕰️ {platform} status refresh could not run. {e}"),
        },
        ScheduledTask::SyncStock(platform) => match runner.sync_stock(platform).await {
            Ok(r) => debug!("🕰️ {}", r.message),
            Err(e) => error!("🕰️ {platform} stock sync could not run. {e}"),
        },
        ScheduledTask::PurgeIdempotencyKeys => match db.purge_expired_keys().await {
            Ok(0) => trace!("🕰️ No expired idempotency keys"),
            Ok(n) => info!("🕰️ {n} expired idempotency keys purged"),
            Err(e) => error!("🕰️ Could not purge idempotency keys. {e}"),
        },
    }
}
