use chrono::Utc;
use marketplace_tools::{ShopCredentials, TokenPair};
use sqlx::SqliteConnection;
use stockbridge_common::Platform;

use crate::db_types::ShopTokenRow;

pub async fn fetch_credentials(
    platform: Platform,
    conn: &mut SqliteConnection,
) -> Result<Option<ShopCredentials>, sqlx::Error> {
    let row: Option<ShopTokenRow> = sqlx::query_as(
        r#"
        SELECT platform, app_key, app_secret, access_token, refresh_token, shop_id, partner_id, shop_cipher, updated_at
        FROM shop_tokens WHERE platform = $1
        "#,
    )
    .bind(platform)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(ShopCredentials::from))
}

pub async fn upsert_credentials(creds: &ShopCredentials, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO shop_tokens
            (platform, app_key, app_secret, access_token, refresh_token, shop_id, partner_id, shop_cipher, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (platform) DO UPDATE SET
            app_key = excluded.app_key,
            app_secret = excluded.app_secret,
            access_token = excluded.access_token,
            refresh_token = excluded.refresh_token,
            shop_id = excluded.shop_id,
            partner_id = excluded.partner_id,
            shop_cipher = excluded.shop_cipher,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(creds.platform)
    .bind(&creds.app_key)
    .bind(creds.app_secret.reveal())
    .bind(creds.access_token.reveal())
    .bind(creds.refresh_token.reveal())
    .bind(&creds.shop_id)
    .bind(&creds.partner_id)
    .bind(&creds.shop_cipher)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

/// Returns `false` if there is no credentials row for the platform.
pub async fn update_tokens(
    platform: Platform,
    tokens: &TokenPair,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE shop_tokens SET access_token = $1, refresh_token = $2, updated_at = $3 WHERE platform = $4",
    )
    .bind(&tokens.access_token)
    .bind(&tokens.refresh_token)
    .bind(Utc::now())
    .bind(platform)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
