use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

/// Inserts the key unless an unexpired claim exists. An expired claim is replaced. Run this inside a transaction.
pub async fn claim(
    key: &str,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    sqlx::query("DELETE FROM idempotency_keys WHERE key = $1 AND expires_at <= $2")
        .bind(key)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    let result = sqlx::query("INSERT INTO idempotency_keys (key, expires_at) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING")
        .bind(key)
        .bind(expires_at)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn release(key: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM idempotency_keys WHERE key = $1").bind(key).execute(conn).await?;
    Ok(())
}

pub async fn purge_expired(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM idempotency_keys WHERE expires_at <= $1").bind(now).execute(conn).await?;
    Ok(result.rows_affected())
}
