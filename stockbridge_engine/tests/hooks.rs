use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use log::*;
use marketplace_tools::{MarketplaceOrder, ThreadAssignment};
use stockbridge_common::Platform;
use stockbridge_engine::{
    events::{EventHandlers, EventHooks, NewOrderEvent, OrderStatusChangedEvent},
    notify_status_change,
    test_utils::{
        fake_marketplace::{vendor_order, FakeMarketplace},
        prepare_env::{fresh_database, seed_catalog_entry, tear_down},
    },
    EngineConfig,
    ErrorCode,
    NotificationApi,
    OrderIntakeApi,
    OrderManagement,
    OrderNotifier,
    ReconciliationError,
    StatusNotification,
};
use tokio::sync::mpsc;

/// Records every call instead of talking to the bot.
#[derive(Default, Clone)]
struct RecordingNotifier {
    threads: Arc<Mutex<Vec<String>>>,
    updates: Arc<Mutex<Vec<(String, String)>>>,
}

impl OrderNotifier for RecordingNotifier {
    async fn create_order_threads(
        &self,
        _platform: Platform,
        orders: &[MarketplaceOrder],
    ) -> Result<Vec<ThreadAssignment>, ReconciliationError> {
        let mut threads = self.threads.lock().unwrap();
        let result = orders
            .iter()
            .map(|o| {
                threads.push(o.order_id.clone());
                ThreadAssignment { order_id: o.order_id.clone(), thread_id: format!("thread-{}", o.order_id) }
            })
            .collect();
        Ok(result)
    }

    async fn update_order_thread(
        &self,
        _platform: Platform,
        thread_id: &str,
        status: &str,
    ) -> Result<(), ReconciliationError> {
        self.updates.lock().unwrap().push((thread_id.to_string(), status.to_string()));
        Ok(())
    }
}

#[tokio::test]
async fn lifecycle_events_reach_their_hooks() {
    let db = fresh_database().await;
    seed_catalog_entry(&db, "A", 10, 100).await;
    let (new_tx, mut new_rx) = mpsc::unbounded_channel::<NewOrderEvent>();
    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<OrderStatusChangedEvent>();
    let mut hooks = EventHooks::default();
    hooks
        .on_new_order(move |ev| {
            info!("🪝️ New order {}", ev.order.order_id);
            let _ = new_tx.send(ev);
            async {}.boxed()
        })
        .on_status_changed(move |ev| {
            let _ = status_tx.send(ev);
            async {}.boxed()
        });
    let handlers = EventHandlers::new(8, hooks);
    let api = OrderIntakeApi::new(db.clone(), handlers.producers(), EngineConfig::default());
    handlers.start_handlers().await;

    let lazada = FakeMarketplace::new(Platform::Lazada);
    lazada.add_order(vendor_order("LZD1", "pending", &[("A", 1), ("GHOST", 2)]));
    api.handle_status_event(&lazada, StatusNotification::new(Platform::Lazada, "LZD1", "pending")).await.unwrap();
    api.handle_status_event(&lazada, StatusNotification::new(Platform::Lazada, "LZD1", "ready_to_ship")).await.unwrap();
    api.handle_status_event(&lazada, StatusNotification::new(Platform::Lazada, "LZD1", "canceled")).await.unwrap();
    // Sticky, so no third status event
    api.handle_status_event(&lazada, StatusNotification::new(Platform::Lazada, "LZD1", "delivered")).await.unwrap();
    drop(api);

    let ev = new_rx.recv().await.unwrap();
    assert_eq!(ev.order.order_id, "LZD1");
    assert_eq!(ev.missing_skus, vec!["GHOST".to_string()]);
    assert!(new_rx.recv().await.is_none());
    let ev = status_rx.recv().await.unwrap();
    assert_eq!((ev.old_status.as_str(), ev.order.status.as_str()), ("pending", "ready_to_ship"));
    let ev = status_rx.recv().await.unwrap();
    assert_eq!((ev.old_status.as_str(), ev.order.status.as_str()), ("ready_to_ship", "CANCELLED"));
    assert!(status_rx.recv().await.is_none());
    tear_down(db).await;
}

#[tokio::test]
async fn threads_are_opened_and_followed() {
    let db = fresh_database().await;
    seed_catalog_entry(&db, "A", 10, 100).await;
    let intake = OrderIntakeApi::new(db.clone(), Default::default(), EngineConfig::default());
    let notifications = NotificationApi::new(db.clone(), EngineConfig::default());
    let notifier = RecordingNotifier::default();
    let shopee = FakeMarketplace::new(Platform::Shopee);
    for id in ["SP1", "SP2"] {
        shopee.add_order(vendor_order(id, "READY_TO_SHIP", &[("A", 1)]));
        intake.handle_status_event(&shopee, StatusNotification::new(Platform::Shopee, id, "READY_TO_SHIP")).await.unwrap();
    }

    let opened = notifications.open_threads(&shopee, &notifier).await.unwrap();
    assert_eq!(opened, 2);
    assert_eq!(*notifier.threads.lock().unwrap(), vec!["SP1".to_string(), "SP2".to_string()]);
    let order = db.fetch_order(Platform::Shopee, "SP1").await.unwrap().unwrap();
    assert_eq!(order.discord_channel.as_deref(), Some("thread-SP1"));
    let err = notifications.open_threads(&shopee, &notifier).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NothingToDo);

    let event = OrderStatusChangedEvent::new(order, "READY_TO_SHIP".into());
    assert!(notify_status_change(&notifier, &event).await.unwrap());
    assert_eq!(*notifier.updates.lock().unwrap(), vec![("thread-SP1".to_string(), "READY_TO_SHIP".to_string())]);
    tear_down(db).await;
}
