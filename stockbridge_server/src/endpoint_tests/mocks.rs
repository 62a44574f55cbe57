use marketplace_tools::{MarketplaceOrder, ThreadAssignment};
use mockall::mock;
use stockbridge_common::Platform;
use stockbridge_engine::{OrderNotifier, ReconciliationError};

mock! {
    pub Notifier {}
    impl OrderNotifier for Notifier {
        async fn create_order_threads(&self, platform: Platform, orders: &[MarketplaceOrder]) -> Result<Vec<ThreadAssignment>, ReconciliationError>;
        async fn update_order_thread(&self, platform: Platform, thread_id: &str, status: &str) -> Result<(), ReconciliationError>;
    }
}
