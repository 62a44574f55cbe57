use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use marketplace_tools::{MarketplaceClient, MarketplaceOrder, TimeWindow};
use serde::{Deserialize, Serialize};
use stockbridge_common::Platform;

use crate::{
    db_types::{NewOrder, Order, Reversal},
    events::{EventProducers, NewOrderEvent, OrderStatusChangedEvent},
    recon_api::{
        config::EngineConfig,
        load_credentials,
        resolver::InventoryResolver,
        status::{classify, completion_filter, delivered_statuses, needs_cancel_reason, normalize_status, pending_status, StatusKind},
        vendor_data,
    },
    traits::{ReconciliationDatabase, ReconciliationError, TransitionResult},
};

/// A vendor telling us that an order now has `status`. Webhooks and polls both produce these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusNotification {
    pub platform: Platform,
    pub order_id: String,
    pub status: String,
    pub cancel_reason: Option<String>,
}

impl StatusNotification {
    pub fn new<S: Into<String>, T: Into<String>>(platform: Platform, order_id: S, status: T) -> Self {
        Self { platform, order_id: order_id.into(), status: status.into(), cancel_reason: None }
    }

    pub fn with_cancel_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.cancel_reason = Some(reason.into());
        self
    }

    /// The key a delivery of this notification is deduplicated on.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}-{}", self.platform, self.order_id, self.status.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IntakeOutcome {
    /// Nothing was written.
    Ignored { reason: String },
    /// The order was seen for the first time and its units were recorded.
    Recorded { order_id: String, movements: usize, missing_skus: Vec<String> },
    AlreadyRecorded { order_id: String },
    Transitioned { order_id: String, status: String, moved_rows: usize },
}

impl IntakeOutcome {
    fn ignored<S: Into<String>>(reason: S) -> Self {
        Self::Ignored { reason: reason.into() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSummary {
    pub listed: usize,
    pub already_recorded: usize,
    pub recorded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub candidates: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Orders the vendor did not list with a completed status.
    pub not_listed: usize,
}

/// `OrderIntakeApi` records new orders and drives stored orders through their lifecycle in response to webhooks,
/// polls and operator actions.
pub struct OrderIntakeApi<B> {
    db: B,
    resolver: InventoryResolver<B>,
    producers: EventProducers,
    config: EngineConfig,
}

impl<B> Debug for OrderIntakeApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderIntakeApi")
    }
}

impl<B: Clone> OrderIntakeApi<B> {
    pub fn new(db: B, producers: EventProducers, config: EngineConfig) -> Self {
        let resolver = InventoryResolver::new(db.clone());
        Self { db, resolver, producers, config }
    }
}

impl<B> OrderIntakeApi<B>
where B: ReconciliationDatabase
{
    /// Handles one status notification.
    ///
    /// Unpaid orders are never stored. Every other notification is claimed in the idempotency store first, so a
    /// redelivery of the same order and status is ignored. If processing fails, the claim is released so the vendor's
    /// retry goes through.
    pub async fn handle_status_event<M: MarketplaceClient>(
        &self,
        client: &M,
        event: StatusNotification,
    ) -> Result<IntakeOutcome, ReconciliationError> {
        let platform = event.platform;
        let kind = classify(platform, &event.status, event.cancel_reason.as_deref());
        if kind == StatusKind::Unpaid {
            debug!("📦️ {platform} order {} is unpaid. Ignoring", event.order_id);
            return Ok(IntakeOutcome::ignored("Unpaid orders are not recorded"));
        }
        let key = event.dedup_key();
        if !self.db.claim_key(&key, self.config.dedup_ttl).await? {
            info!("📦️ {key} has already been handled. Ignoring this delivery.");
            return Ok(IntakeOutcome::ignored(format!("{key} has already been handled")));
        }
        let result = self.process_status_event(client, &event, kind).await;
        if let Err(e) = &result {
            warn!("📦️ Could not process {key}. {e}");
            if let Err(e) = self.db.release_key(&key).await {
                error!("📦️ Could not release the claim on {key}. {e}");
            }
        }
        result
    }

    async fn process_status_event<M: MarketplaceClient>(
        &self,
        client: &M,
        event: &StatusNotification,
        kind: StatusKind,
    ) -> Result<IntakeOutcome, ReconciliationError> {
        let platform = event.platform;
        let order_id = event.order_id.as_str();
        let existing = self.db.fetch_order(platform, order_id).await?;
        if kind == StatusKind::Pending {
            if existing.is_some() {
                debug!("📦️ {platform} order {order_id} is already recorded");
                return Ok(IntakeOutcome::AlreadyRecorded { order_id: order_id.to_string() });
            }
            let mut order = self.fetch_order_details(client, order_id).await?;
            order.status = event.status.clone();
            return self.intake_order(platform, &order).await;
        }
        let Some(existing) = existing else {
            info!("📦️ {platform} order {order_id} is not recorded. Ignoring status {}", event.status);
            return Ok(IntakeOutcome::ignored(format!("Order {order_id} is not recorded")));
        };
        let kind = if event.cancel_reason.is_none() && needs_cancel_reason(platform, &event.status) {
            let details = self.fetch_order_details(client, order_id).await?;
            classify(platform, &event.status, details.cancel_reason.as_deref())
        } else {
            kind
        };
        self.apply_status(existing, kind, &event.status).await
    }

    async fn fetch_order_details<M: MarketplaceClient>(
        &self,
        client: &M,
        order_id: &str,
    ) -> Result<MarketplaceOrder, ReconciliationError> {
        let platform = client.platform();
        let creds = load_credentials(&self.db, platform).await?;
        let ids = [order_id.to_string()];
        let details = vendor_data(client, client.get_order_details(&creds, &ids).await)?;
        details
            .into_iter()
            .find(|o| o.order_id == order_id)
            .ok_or_else(|| ReconciliationError::OrderNotFound { platform, order_id: order_id.to_string() })
    }

    /// Records a vendor order that has not been seen before, with one outbound movement row per unit.
    ///
    /// Gift orders are rejected. If the order is already stored, nothing is written and `AlreadyRecorded` is
    /// returned.
    pub async fn intake_order(
        &self,
        platform: Platform,
        order: &MarketplaceOrder,
    ) -> Result<IntakeOutcome, ReconciliationError> {
        if order.is_gift {
            return Err(ReconciliationError::InvalidRequest(format!(
                "{platform} order {} is a gift order and is not recorded",
                order.order_id
            )));
        }
        let resolved = self.resolver.resolve(&order.items).await?;
        let new_order = NewOrder {
            platform,
            order_id: order.order_id.clone(),
            status: normalize_status(platform, &order.status),
            receivables_amount: order.receivables,
            total_cost: resolved.total_cost(),
            created_at: order.created_at,
        };
        let result = self.db.insert_order_with_movements(new_order, &resolved.items).await?;
        if !result.inserted {
            debug!("📦️ {platform} order {} was recorded by someone else first", order.order_id);
            return Ok(IntakeOutcome::AlreadyRecorded { order_id: order.order_id.clone() });
        }
        info!("📦️ Recorded {platform} order {} with {} units", order.order_id, result.movements);
        let event = NewOrderEvent::new(result.order, resolved.missing.clone());
        for producer in &self.producers.new_order_producer {
            producer.publish_event(event.clone()).await;
        }
        Ok(IntakeOutcome::Recorded {
            order_id: order.order_id.clone(),
            movements: result.movements,
            missing_skus: resolved.missing,
        })
    }

    /// Runs the transition that `kind` calls for on a stored order.
    pub async fn apply_status(
        &self,
        order: Order,
        kind: StatusKind,
        status: &str,
    ) -> Result<IntakeOutcome, ReconciliationError> {
        let platform = order.platform;
        let order_id = order.order_id.as_str();
        let stored = normalize_status(platform, status);
        let result = match kind {
            StatusKind::Unpaid => return Ok(IntakeOutcome::ignored("Unpaid orders are not recorded")),
            StatusKind::Cancelled => self.db.reverse_order(platform, order_id, Reversal::Cancellation).await?,
            StatusKind::ReturnToSender => self.db.reverse_order(platform, order_id, Reversal::ReturnToSender).await?,
            StatusKind::Delivered => self.db.complete_delivery(platform, order_id, &stored).await?,
            StatusKind::Pending | StatusKind::Other => self.db.update_order_status(platform, order_id, &stored).await?,
        };
        match result {
            TransitionResult::Applied { order: updated, moved_rows } => {
                if updated.status != order.status {
                    info!("📦️ {platform} order {order_id}: {} -> {}", order.status, updated.status);
                    self.call_status_changed_hook(&updated, &order.status).await;
                }
                Ok(IntakeOutcome::Transitioned { order_id: order_id.to_string(), status: updated.status, moved_rows })
            },
            TransitionResult::Ignored(current) => {
                debug!("📦️ {platform} order {order_id} is {}. Status {status} ignored", current.status);
                Ok(IntakeOutcome::ignored(format!("Order {order_id} is already {}", current.status)))
            },
        }
    }

    async fn call_status_changed_hook(&self, order: &Order, old_status: &str) {
        for producer in &self.producers.status_changed_producer {
            let event = OrderStatusChangedEvent::new(order.clone(), old_status.to_string());
            producer.publish_event(event).await;
        }
    }

    /// Backfills pending orders the webhooks missed, looking back over the configured polling window.
    pub async fn poll_pending_orders<M: MarketplaceClient>(
        &self,
        client: &M,
        now: DateTime<Utc>,
    ) -> Result<PollSummary, ReconciliationError> {
        let platform = client.platform();
        let creds = load_credentials(&self.db, platform).await?;
        let window = TimeWindow::trailing_days(now, self.config.poll_window_days);
        let status = pending_status(platform);
        let listed = vendor_data(client, client.list_orders(&creds, &window, Some(status)).await)?;
        if listed.is_empty() {
            return Err(ReconciliationError::NothingToDo(format!("{platform} has no {status} orders")));
        }
        let ids = listed.iter().map(|o| o.order_id.clone()).collect::<Vec<_>>();
        let existing = self.db.existing_order_ids(platform, &ids).await?;
        let new_ids = ids.into_iter().filter(|id| !existing.contains(id)).collect::<Vec<_>>();
        let mut summary = PollSummary { listed: listed.len(), already_recorded: existing.len(), ..Default::default() };
        if new_ids.is_empty() {
            info!("📦️ All {} {platform} {status} orders are already recorded", listed.len());
            return Ok(summary);
        }
        let details = vendor_data(client, client.get_order_details(&creds, &new_ids).await)?;
        for mut order in details {
            if let Some(s) = listed.iter().find(|s| s.order_id == order.order_id) {
                order.status = s.status.clone();
            }
            match self.intake_order(platform, &order).await {
                Ok(IntakeOutcome::Recorded { .. }) => summary.recorded += 1,
                Ok(_) => summary.already_recorded += 1,
                Err(e) => {
                    warn!("📦️ Could not record {platform} order {}. {e}", order.order_id);
                    summary.failed += 1;
                },
            }
        }
        info!(
            "📦️ {platform} poll: {} listed, {} recorded, {} already known, {} failed",
            summary.listed, summary.recorded, summary.already_recorded, summary.failed
        );
        Ok(summary)
    }

    /// Catches up on delivery for stored orders that are old enough to have been missed by the webhooks.
    pub async fn refresh_statuses<M: MarketplaceClient>(
        &self,
        client: &M,
        now: DateTime<Utc>,
    ) -> Result<RefreshSummary, ReconciliationError> {
        let platform = client.platform();
        let creds = load_credentials(&self.db, platform).await?;
        let created_before = now - self.config.status_min_age;
        let orders = self
            .db
            .fetch_orders_for_status_refresh(
                platform,
                delivered_statuses(platform),
                created_before,
                self.config.status_batch_size,
            )
            .await?;
        let Some(span) = TimeWindow::spanning(orders.iter().map(|o| o.created_at)) else {
            return Err(ReconciliationError::NothingToDo(format!("No {platform} orders need a status refresh")));
        };
        let window = TimeWindow::new(span.start, span.end + Duration::seconds(1));
        let filter = completion_filter(platform);
        let listed = vendor_data(client, client.list_orders(&creds, &window, Some(filter)).await)?;
        let mut summary = RefreshSummary { candidates: orders.len(), ..Default::default() };
        for order in orders {
            let Some(vendor) = listed.iter().find(|s| s.order_id == order.order_id) else {
                summary.not_listed += 1;
                continue;
            };
            if normalize_status(platform, &vendor.status) == order.status {
                summary.unchanged += 1;
                continue;
            }
            let kind = classify(platform, &vendor.status, None);
            let order_id = order.order_id.clone();
            match self.apply_status(order, kind, &vendor.status).await {
                Ok(IntakeOutcome::Transitioned { .. }) => summary.updated += 1,
                Ok(_) => summary.unchanged += 1,
                Err(e) => warn!("📦️ Could not refresh {platform} order {order_id}. {e}"),
            }
        }
        info!(
            "📦️ {platform} status refresh: {} candidates, {} updated, {} unchanged, {} not listed",
            summary.candidates, summary.updated, summary.unchanged, summary.not_listed
        );
        Ok(summary)
    }

    /// Confirms that the goods of a returned order are back on the shelf. Returns the number of units restocked.
    pub async fn receive_return(&self, platform: Platform, order_id: &str) -> Result<usize, ReconciliationError> {
        let units = self.db.receive_return(platform, order_id).await?;
        info!("📦️ {units} units of {platform} order {order_id} are back in stock");
        Ok(units)
    }
}
