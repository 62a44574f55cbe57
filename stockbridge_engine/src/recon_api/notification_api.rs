//! Keeps the Discord bot's order threads in step with the orders.
use std::fmt::Debug;

use log::*;
use marketplace_tools::{BotNotifier, MarketplaceClient, MarketplaceOrder, ThreadAssignment};
use stockbridge_common::Platform;

use crate::{
    events::OrderStatusChangedEvent,
    recon_api::{config::EngineConfig, load_credentials, vendor_data},
    traits::{ReconciliationDatabase, ReconciliationError},
};

/// Where order notifications go.
#[allow(async_fn_in_trait)]
pub trait OrderNotifier {
    /// Opens one thread per order and returns the thread ids that were assigned.
    async fn create_order_threads(
        &self,
        platform: Platform,
        orders: &[MarketplaceOrder],
    ) -> Result<Vec<ThreadAssignment>, ReconciliationError>;

    async fn update_order_thread(
        &self,
        platform: Platform,
        thread_id: &str,
        status: &str,
    ) -> Result<(), ReconciliationError>;
}

impl OrderNotifier for BotNotifier {
    async fn create_order_threads(
        &self,
        platform: Platform,
        orders: &[MarketplaceOrder],
    ) -> Result<Vec<ThreadAssignment>, ReconciliationError> {
        BotNotifier::create_order_threads(self, platform, orders)
            .await
            .map_err(|e| ReconciliationError::NotifierUnavailable(e.to_string()))
    }

    async fn update_order_thread(
        &self,
        platform: Platform,
        thread_id: &str,
        status: &str,
    ) -> Result<(), ReconciliationError> {
        BotNotifier::update_order_thread(self, platform, thread_id, status)
            .await
            .map_err(|e| ReconciliationError::NotifierUnavailable(e.to_string()))
    }
}

/// Posts a status change to the order's thread. Orders without a thread are skipped.
pub async fn notify_status_change<N: OrderNotifier>(
    notifier: &N,
    event: &OrderStatusChangedEvent,
) -> Result<bool, ReconciliationError> {
    let Some(thread_id) = event.thread_id() else {
        trace!("📣️ {} order {} has no thread", event.order.platform, event.order.order_id);
        return Ok(false);
    };
    notifier.update_order_thread(event.order.platform, thread_id, &event.order.status).await?;
    Ok(true)
}

pub struct NotificationApi<B> {
    db: B,
    config: EngineConfig,
}

impl<B> Debug for NotificationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotificationApi")
    }
}

impl<B> NotificationApi<B> {
    pub fn new(db: B, config: EngineConfig) -> Self {
        Self { db, config }
    }
}

impl<B> NotificationApi<B>
where B: ReconciliationDatabase
{
    /// Opens bot threads for the next batch of orders that have none, and stores the thread ids the bot returns.
    pub async fn open_threads<M: MarketplaceClient, N: OrderNotifier>(
        &self,
        client: &M,
        notifier: &N,
    ) -> Result<u64, ReconciliationError> {
        let platform = client.platform();
        let orders = self.db.fetch_orders_without_thread(platform, self.config.notification_batch_size).await?;
        if orders.is_empty() {
            return Err(ReconciliationError::NothingToDo(format!("All {platform} orders have a thread")));
        }
        let creds = load_credentials(&self.db, platform).await?;
        let ids = orders.iter().map(|o| o.order_id.clone()).collect::<Vec<_>>();
        let details = vendor_data(client, client.get_order_details(&creds, &ids).await)?;
        let assignments = notifier.create_order_threads(platform, &details).await?;
        let known = assignments.into_iter().filter(|a| ids.contains(&a.order_id)).collect::<Vec<_>>();
        if known.is_empty() {
            info!("📣️ The bot did not open any threads for {} {platform} orders", ids.len());
            return Ok(0);
        }
        let updated = self.db.assign_threads(platform, &known).await?;
        info!("📣️ {updated} {platform} orders now have a thread");
        Ok(updated)
    }
}
