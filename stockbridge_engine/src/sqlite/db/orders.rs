use chrono::{DateTime, Utc};
use log::*;
use marketplace_tools::ThreadAssignment;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use stockbridge_common::Platform;

use crate::{
    db_types::{NewOrder, Order, OrderSettlement},
    traits::{DateRange, ReconciliationError},
};

pub async fn fetch_order(
    platform: Platform,
    order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE platform = $1 AND order_id = $2")
        .bind(platform)
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn existing_order_ids(
    platform: Platform,
    order_ids: &[String],
    conn: &mut SqliteConnection,
) -> Result<Vec<String>, sqlx::Error> {
    if order_ids.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT order_id FROM orders WHERE platform = ");
    builder.push_bind(platform);
    builder.push(" AND order_id IN (");
    let mut ids = builder.separated(", ");
    for id in order_ids {
        ids.push_bind(id.clone());
    }
    builder.push(")");
    let rows: Vec<(String,)> = builder.build_query_as().fetch_all(conn).await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Inserts the order header, returning `false` in the second parameter if the order already exists. An existing order
/// is returned unchanged.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), ReconciliationError> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
            INSERT INTO orders (platform, order_id, status, receivables_amount, total_cost, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (platform, order_id) DO NOTHING
        "#,
    )
    .bind(order.platform)
    .bind(&order.order_id)
    .bind(&order.status)
    .bind(order.receivables_amount)
    .bind(order.total_cost)
    .bind(order.created_at)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    let inserted = result.rows_affected() == 1;
    let stored = fetch_order(order.platform, &order.order_id, conn).await?.ok_or_else(|| {
        ReconciliationError::OrderNotFound { platform: order.platform, order_id: order.order_id.clone() }
    })?;
    if inserted {
        debug!("🗃️ {} order [{}] inserted", order.platform, order.order_id);
    }
    Ok((stored, inserted))
}

pub async fn update_status(
    platform: Platform,
    order_id: &str,
    status: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = $2 WHERE platform = $3 AND order_id = $4 RETURNING *",
    )
    .bind(status)
    .bind(Utc::now())
    .bind(platform)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_orders_for_status_refresh(
    platform: Platform,
    final_statuses: &[&str],
    created_before: DateTime<Utc>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM orders WHERE platform = ");
    builder.push_bind(platform);
    builder.push(" AND created_at < ");
    builder.push_bind(created_before);
    if !final_statuses.is_empty() {
        builder.push(" AND status NOT IN (");
        let mut statuses = builder.separated(", ");
        for status in final_statuses {
            statuses.push_bind(status.to_string());
        }
        builder.push(")");
    }
    builder.push(" ORDER BY created_at ASC LIMIT ");
    builder.push_bind(limit);
    let orders = builder.build_query_as().fetch_all(conn).await?;
    Ok(orders)
}

pub async fn fetch_unsettled_orders(
    platform: Platform,
    statuses: &[&str],
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    if statuses.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM orders WHERE settled = 0 AND platform = ");
    builder.push_bind(platform);
    builder.push(" AND status IN (");
    let mut separated = builder.separated(", ");
    for status in statuses {
        separated.push_bind(status.to_string());
    }
    builder.push(") ORDER BY created_at ASC LIMIT ");
    builder.push_bind(limit);
    let orders = builder.build_query_as().fetch_all(conn).await?;
    Ok(orders)
}

/// Writes the settlement figures of every order in a single `UPDATE ... CASE order_id WHEN ...` statement.
pub async fn record_settlements(
    platform: Platform,
    settlements: &[OrderSettlement],
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    if settlements.is_empty() {
        return Ok(0);
    }
    let now = Utc::now();
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET net_settlement_amount = CASE order_id");
    for s in settlements {
        builder.push(" WHEN ");
        builder.push_bind(s.order_id.clone());
        builder.push(" THEN ");
        builder.push_bind(s.settlement.net_amount);
    }
    builder.push(" END, net_settlement_fees = CASE order_id");
    for s in settlements {
        builder.push(" WHEN ");
        builder.push_bind(s.order_id.clone());
        builder.push(" THEN ");
        builder.push_bind(s.settlement.fees);
    }
    builder.push(" END, settled = 1, settled_at = ");
    builder.push_bind(now);
    builder.push(", updated_at = ");
    builder.push_bind(now);
    builder.push(" WHERE platform = ");
    builder.push_bind(platform);
    builder.push(" AND order_id IN (");
    let mut ids = builder.separated(", ");
    for s in settlements {
        ids.push_bind(s.order_id.clone());
    }
    builder.push(")");
    let result = builder.build().execute(conn).await?;
    trace!("🗃️ {} {platform} orders settled", result.rows_affected());
    Ok(result.rows_affected())
}

pub async fn fetch_orders_without_thread(
    platform: Platform,
    annulled: &[&str],
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Sqlite>::new("SELECT * FROM orders WHERE discord_channel IS NULL AND platform = ");
    builder.push_bind(platform);
    if !annulled.is_empty() {
        builder.push(" AND status NOT IN (");
        let mut statuses = builder.separated(", ");
        for status in annulled {
            statuses.push_bind(status.to_string());
        }
        builder.push(")");
    }
    builder.push(" ORDER BY created_at ASC LIMIT ");
    builder.push_bind(limit);
    let orders = builder.build_query_as().fetch_all(conn).await?;
    Ok(orders)
}

pub async fn assign_threads(
    platform: Platform,
    assignments: &[ThreadAssignment],
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    if assignments.is_empty() {
        return Ok(0);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET discord_channel = CASE order_id");
    for a in assignments {
        builder.push(" WHEN ");
        builder.push_bind(a.order_id.clone());
        builder.push(" THEN ");
        builder.push_bind(a.thread_id.clone());
    }
    builder.push(" END WHERE platform = ");
    builder.push_bind(platform);
    builder.push(" AND order_id IN (");
    let mut ids = builder.separated(", ");
    for a in assignments {
        ids.push_bind(a.order_id.clone());
    }
    builder.push(")");
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn search_orders(
    platform: Platform,
    range: DateRange,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        "SELECT * FROM orders WHERE platform = $1 AND created_at >= $2 AND created_at <= $3 ORDER BY created_at ASC",
    )
    .bind(platform)
    .bind(range.since)
    .bind(range.until)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
