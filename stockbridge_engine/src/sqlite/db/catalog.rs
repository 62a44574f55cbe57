use log::*;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use stockbridge_common::Cents;

use crate::db_types::{BundleComponent, CatalogEntry};

pub async fn fetch_entries(skus: &[String], conn: &mut SqliteConnection) -> Result<Vec<CatalogEntry>, sqlx::Error> {
    if skus.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM catalog WHERE sku IN (");
    let mut separated = builder.separated(", ");
    for sku in skus {
        separated.push_bind(sku.clone());
    }
    builder.push(")");
    let entries = builder.build_query_as().fetch_all(conn).await?;
    Ok(entries)
}

pub async fn fetch_entry(sku: &str, conn: &mut SqliteConnection) -> Result<Option<CatalogEntry>, sqlx::Error> {
    let entry = sqlx::query_as("SELECT * FROM catalog WHERE sku = $1").bind(sku).fetch_optional(conn).await?;
    Ok(entry)
}

pub async fn fetch_all(conn: &mut SqliteConnection) -> Result<Vec<CatalogEntry>, sqlx::Error> {
    let entries = sqlx::query_as("SELECT * FROM catalog ORDER BY sku").fetch_all(conn).await?;
    Ok(entries)
}

pub async fn upsert(entry: &CatalogEntry, conn: &mut SqliteConnection) -> Result<CatalogEntry, sqlx::Error> {
    let entry = sqlx::query_as(
        r#"
        INSERT INTO catalog (sku, product_name, cost_of_goods, total_quantity, old_quantity)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (sku) DO UPDATE SET
            product_name = excluded.product_name,
            cost_of_goods = excluded.cost_of_goods,
            total_quantity = excluded.total_quantity,
            old_quantity = excluded.old_quantity,
            version = catalog.version + 1
        RETURNING *
        "#,
    )
    .bind(&entry.sku)
    .bind(&entry.product_name)
    .bind(entry.cost_of_goods)
    .bind(entry.total_quantity)
    .bind(entry.old_quantity)
    .fetch_one(conn)
    .await?;
    Ok(entry)
}

/// Takes `quantity` units of `sku` out of stock in a single statement. Returns `false` if the SKU is not in the
/// catalog.
pub async fn decrement(sku: &str, quantity: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE catalog SET total_quantity = total_quantity - $1, version = version + 1 WHERE sku = $2",
    )
    .bind(quantity)
    .bind(sku)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Puts `quantity` units back at `new_cost`, provided nobody has touched the entry since it was read.
///
/// Returns `false` when the version check fails.
pub async fn restock(
    entry: &CatalogEntry,
    quantity: i64,
    new_cost: Cents,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE catalog SET
            total_quantity = total_quantity + $1,
            old_quantity = old_quantity + $1,
            cost_of_goods = $2,
            version = version + 1
        WHERE sku = $3 AND version = $4
        "#,
    )
    .bind(quantity)
    .bind(new_cost)
    .bind(&entry.sku)
    .bind(entry.version)
    .execute(conn)
    .await?;
    let ok = result.rows_affected() == 1;
    if ok {
        trace!("🗃️ {} restocked by {quantity} at {new_cost}", entry.sku);
    }
    Ok(ok)
}

pub async fn fetch_bundles(skus: &[String], conn: &mut SqliteConnection) -> Result<Vec<BundleComponent>, sqlx::Error> {
    if skus.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM bundle_listings WHERE sku IN (");
    let mut separated = builder.separated(", ");
    for sku in skus {
        separated.push_bind(sku.clone());
    }
    builder.push(") ORDER BY sku, position");
    let components = builder.build_query_as().fetch_all(conn).await?;
    Ok(components)
}

pub async fn replace_bundle(sku: &str, components: &[String], conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM bundle_listings WHERE sku = $1").bind(sku).execute(&mut *conn).await?;
    if components.is_empty() {
        return Ok(());
    }
    let mut builder = QueryBuilder::<Sqlite>::new("INSERT INTO bundle_listings (sku, component_sku, position) ");
    builder.push_values(components.iter().enumerate(), |mut b, (position, component)| {
        b.push_bind(sku.to_string()).push_bind(component.clone()).push_bind(position as i64);
    });
    builder.build().execute(conn).await?;
    Ok(())
}
