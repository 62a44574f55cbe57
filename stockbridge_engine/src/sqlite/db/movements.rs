use log::*;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use stockbridge_common::Platform;

use crate::{
    db_types::{MovementRow, MovementTable, Reversal},
    traits::DateRange,
};

const COLUMNS: &str =
    "id, order_id, platform, product_sku, product_name, order_created, product_cogs, shopee, lazada, tiktok";

pub async fn insert_movements(
    table: MovementTable,
    rows: &[MovementRow],
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    if rows.is_empty() {
        return Ok(0);
    }
    let mut builder = QueryBuilder::<Sqlite>::new(format!("INSERT INTO {} ({COLUMNS}) ", table.table_name()));
    builder.push_values(rows, |mut b, row| {
        b.push_bind(row.id.clone())
            .push_bind(row.order_id.clone())
            .push_bind(row.platform)
            .push_bind(row.product_sku.clone())
            .push_bind(row.product_name.clone())
            .push_bind(row.order_created)
            .push_bind(row.product_cogs)
            .push_bind(row.shopee)
            .push_bind(row.lazada)
            .push_bind(row.tiktok);
    });
    let result = builder.build().execute(conn).await?;
    trace!("🗃️ {} rows written to {}", result.rows_affected(), table.table_name());
    Ok(result.rows_affected())
}

pub async fn fetch_for_order(
    table: MovementTable,
    platform: Platform,
    order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<MovementRow>, sqlx::Error> {
    let sql = format!("SELECT * FROM {} WHERE platform = $1 AND order_id = $2 ORDER BY id", table.table_name());
    let rows = sqlx::query_as(&sql).bind(platform).bind(order_id).fetch_all(conn).await?;
    Ok(rows)
}

/// Moves the order's rows from one table to another, flags and all. Run this inside a transaction.
pub async fn move_rows(
    from: MovementTable,
    to: MovementTable,
    platform: Platform,
    order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let insert = format!(
        "INSERT INTO {to} ({COLUMNS}) SELECT {COLUMNS} FROM {from} WHERE platform = $1 AND order_id = $2",
        to = to.table_name(),
        from = from.table_name()
    );
    sqlx::query(&insert).bind(platform).bind(order_id).execute(&mut *conn).await?;
    let moved = delete_rows(from, platform, order_id, conn).await?;
    trace!("🗃️ Moved {moved} rows of {platform} order {order_id} from {from} to {to}");
    Ok(moved)
}

/// Moves outbound rows into the reversal's target table. The origin platform's flag becomes
/// [`Reversal::origin_flag`] and every other flag is inverted. Run this inside a transaction.
pub async fn reverse_rows(
    from: MovementTable,
    reversal: Reversal,
    platform: Platform,
    order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let flags = Platform::ALL
        .iter()
        .map(|p| {
            let col = p.flag_column();
            if *p == platform {
                format!("{}", i32::from(reversal.origin_flag()))
            } else {
                format!("1 - {col}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    let insert = format!(
        "INSERT INTO {to} ({COLUMNS}) SELECT id, order_id, platform, product_sku, product_name, order_created, \
         product_cogs, {flags} FROM {from} WHERE platform = $1 AND order_id = $2",
        to = reversal.target().table_name(),
        from = from.table_name()
    );
    sqlx::query(&insert).bind(platform).bind(order_id).execute(&mut *conn).await?;
    let moved = delete_rows(from, platform, order_id, conn).await?;
    trace!("🗃️ Reversed {moved} rows of {platform} order {order_id} from {from} into {}", reversal.target());
    Ok(moved)
}

async fn delete_rows(
    table: MovementTable,
    platform: Platform,
    order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let delete = format!("DELETE FROM {} WHERE platform = $1 AND order_id = $2", table.table_name());
    let result = sqlx::query(&delete).bind(platform).bind(order_id).execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn fetch_unadjusted(
    platform: Platform,
    table: MovementTable,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<MovementRow>, sqlx::Error> {
    let sql = format!(
        "SELECT * FROM {} WHERE {} = 0 ORDER BY order_created ASC, id ASC LIMIT $1",
        table.table_name(),
        platform.flag_column()
    );
    let rows = sqlx::query_as(&sql).bind(limit).fetch_all(conn).await?;
    Ok(rows)
}

pub async fn mark_adjusted(
    platform: Platform,
    table: MovementTable,
    ids: &[String],
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    set_flag(platform, table, ids, true, conn).await
}

/// Sets the `platform` flag of the given rows of `table` to `value`. Returns the number of rows matched.
pub async fn set_flag(
    platform: Platform,
    table: MovementTable,
    ids: &[String],
    value: bool,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }
    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "UPDATE {} SET {} = {} WHERE id IN (",
        table.table_name(),
        platform.flag_column(),
        i32::from(value)
    ));
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.clone());
    }
    builder.push(")");
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn search(
    table: MovementTable,
    platform: Option<Platform>,
    range: DateRange,
    conn: &mut SqliteConnection,
) -> Result<Vec<MovementRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {} WHERE order_created >= ", table.table_name()));
    builder.push_bind(range.since);
    builder.push(" AND order_created <= ");
    builder.push_bind(range.until);
    if let Some(platform) = platform {
        builder.push(" AND platform = ");
        builder.push_bind(platform);
    }
    builder.push(" ORDER BY order_created ASC, id ASC");
    let rows = builder.build_query_as().fetch_all(conn).await?;
    Ok(rows)
}
