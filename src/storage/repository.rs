//! Repository layer for database operations.
//!
//! Table names are kept uppercase for compatibility with existing deployments;
//! in particular the webhook token digest lives in `TOKEN.VALUE_`. Truncating
//! `TOKEN` is the documented operator action to force token regeneration.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use crate::error::BridgeResult;

/// Repository for all bridge database operations.
#[derive(Clone)]
pub struct BridgeRepository {
    pool: SqlitePool,
}

impl BridgeRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the database schema.
    pub async fn init_schema(&self) -> BridgeResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS TOKEN (
                VALUE_ TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS POLLER (
                LAST_RUN_AT TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS WEBHOOK_MESSAGE (
                ID INTEGER PRIMARY KEY AUTOINCREMENT,
                PAYLOAD TEXT NOT NULL,
                RECEIVED_AT TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ==================== Token ====================

    /// Load the stored webhook token digest, or `None` if not yet provisioned.
    pub async fn find_token_digest(&self) -> BridgeResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT VALUE_ FROM TOKEN LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(digest,)| digest))
    }

    /// Persist a newly generated webhook token digest.
    ///
    /// A single atomic insert; concurrent first-time provisioning may race, in
    /// which case `find_token_digest` decides which row is authoritative.
    pub async fn insert_token_digest(&self, digest: &str) -> BridgeResult<()> {
        sqlx::query("INSERT INTO TOKEN (VALUE_) VALUES (?)")
            .bind(digest)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ==================== Poller ====================

    /// Read the timestamp of the last completed sync run, if any.
    pub async fn last_run_at(&self) -> BridgeResult<Option<DateTime<Utc>>> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as("SELECT LAST_RUN_AT FROM POLLER LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(at,)| at))
    }

    /// Record a completed sync run, replacing any previous timestamp.
    pub async fn record_run(&self, at: DateTime<Utc>) -> BridgeResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM POLLER").execute(&mut *tx).await?;
        sqlx::query("INSERT INTO POLLER (LAST_RUN_AT) VALUES (?)")
            .bind(at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    // ==================== Webhook messages ====================

    /// Queue a received webhook payload for the delivery pipeline.
    pub async fn save_webhook_message(
        &self,
        payload: &serde_json::Value,
        received_at: DateTime<Utc>,
    ) -> BridgeResult<()> {
        sqlx::query("INSERT INTO WEBHOOK_MESSAGE (PAYLOAD, RECEIVED_AT) VALUES (?, ?)")
            .bind(serde_json::to_string(payload)?)
            .bind(received_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Count stored token rows. Used by tests to assert provisioning shape.
    #[cfg(test)]
    pub async fn count_token_rows(&self) -> BridgeResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM TOKEN")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
