//! Database layer — migrations, the persisted price quote, and donation receipts.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::{EngineError, Result};
use crate::price::PriceQuote;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    // Make sure the file is created if it doesn't exist yet.
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Price quote persistence
// ─────────────────────────────────────────────────────────

/// Read back the last successful price quote, if one was ever stored.
pub async fn load_quote(pool: &SqlitePool) -> Result<Option<PriceQuote>> {
    let row: Option<(String, i64)> =
        sqlx::query_as("SELECT usd_per_eth, fetched_at FROM price_cache WHERE id = 1")
            .fetch_optional(pool)
            .await?;

    let Some((rate, fetched_at)) = row else {
        return Ok(None);
    };

    let usd_per_eth = rate
        .parse()
        .map_err(|_| EngineError::Parse(format!("stored rate is not a decimal: {rate:?}")))?;
    let fetched_at = DateTime::<Utc>::from_timestamp(fetched_at, 0)
        .ok_or_else(|| EngineError::Parse(format!("stored timestamp out of range: {fetched_at}")))?;

    Ok(Some(PriceQuote {
        usd_per_eth,
        fetched_at,
    }))
}

/// Persist the latest successful quote (single-row upsert).
pub async fn save_quote(pool: &SqlitePool, quote: &PriceQuote) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO price_cache (id, usd_per_eth, fetched_at)
        VALUES (1, ?1, ?2)
        ON CONFLICT (id) DO UPDATE
        SET usd_per_eth = excluded.usd_per_eth, fetched_at = excluded.fetched_at
        "#,
    )
    .bind(quote.usd_per_eth.to_string())
    .bind(quote.fetched_at.timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Donation receipts
// ─────────────────────────────────────────────────────────

/// A donation receipt ready to be stored.
#[derive(Debug, Clone)]
pub struct NewDonation {
    pub tx_hash: String,
    pub project_id: i64,
    pub donor: String,
    pub amount_wei: String,
    pub amount_usd: Option<String>,
    pub block_number: Option<i64>,
}

/// A donation receipt as read back from the database.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DonationRecord {
    pub id: i64,
    pub tx_hash: String,
    pub project_id: i64,
    pub donor: String,
    pub amount_wei: String,
    pub amount_usd: Option<String>,
    pub block_number: Option<i64>,
    pub created_at: i64,
}

/// Persist a donation receipt.  Receipts sharing a `tx_hash` are silently
/// ignored so a re-submitted response stays idempotent.
pub async fn insert_donation(pool: &SqlitePool, donation: &NewDonation) -> Result<bool> {
    let rows_affected = sqlx::query(
        r#"
        INSERT OR IGNORE INTO donations
            (tx_hash, project_id, donor, amount_wei, amount_usd, block_number)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&donation.tx_hash)
    .bind(donation.project_id)
    .bind(&donation.donor)
    .bind(&donation.amount_wei)
    .bind(&donation.amount_usd)
    .bind(donation.block_number)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(rows_affected > 0)
}

/// Fetch all recorded donations, newest first.
pub async fn list_donations(pool: &SqlitePool) -> Result<Vec<DonationRecord>> {
    let rows = sqlx::query_as::<_, DonationRecord>(
        r#"
        SELECT id, tx_hash, project_id, donor, amount_wei, amount_usd,
               block_number, created_at
        FROM   donations
        ORDER  BY created_at DESC, id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
