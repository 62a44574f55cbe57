use futures::future::BoxFuture;
use log::*;
use marketplace_tools::BotNotifier;
use stockbridge_engine::{
    events::{EventHandlers, EventHooks, OrderStatusChangedEvent},
    notify_status_change,
    OrderNotifier,
};

pub const NOTIFICATION_EVENT_BUFFER_SIZE: usize = 25;

/// Wires order lifecycle events to the Discord bot.
///
/// 1. NewOrderEvent - logged. Threads for new orders are opened in batches by the notification job, since the bot
///    wants the full vendor order details.
/// 2. OrderStatusChangedEvent - if the order has a thread, the new status is posted to it. Failures are logged and
///    otherwise ignored.
pub fn create_notification_handlers(notifier: BotNotifier) -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_new_order(|ev| {
        if !ev.missing_skus.is_empty() {
            warn!(
                "📣️ {} order {} has SKUs that are not in the catalog: {}",
                ev.order.platform,
                ev.order.order_id,
                ev.missing_skus.join(", ")
            );
        }
        debug!("📣️ New {} order {}", ev.order.platform, ev.order.order_id);
        no_op()
    });
    hooks.on_status_changed(move |ev| {
        let notifier = notifier.clone();
        Box::pin(async move { post_status(&notifier, ev).await })
    });
    EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks)
}

async fn post_status<N: OrderNotifier>(notifier: &N, ev: OrderStatusChangedEvent) {
    let order = &ev.order;
    match notify_status_change(notifier, &ev).await {
        Ok(true) => info!("📣️ {} order {} is now {}. Thread updated.", order.platform, order.order_id, order.status),
        Ok(false) => trace!("📣️ {} order {} has no thread yet", order.platform, order.order_id),
        Err(e) => warn!("📣️ Could not post the new status of {} order {}. {e}", order.platform, order.order_id),
    }
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
