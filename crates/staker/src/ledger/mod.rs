//! Stake action ledger.
//!
//! Rows are only ever inserted and selected. The schema carries triggers that abort any
//! `UPDATE` or `DELETE` on `stake_actions`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::{path::Path, str::FromStr};
use tracing::info;

pub mod actions;
pub mod memory;
pub mod types;

pub use memory::MemoryLedger;
pub use types::*;

/// Destination for stake action records.
#[async_trait]
pub trait LedgerSink: Send + Sync {
    /// Persist one record and return its id.
    async fn append(&self, action: &NewStakeAction) -> Result<i64>;
}

/// SQLite-backed ledger.
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    /// Connect with default pool bounds, creating the database file if missing.
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::connect(database_url, 5, 1).await
    }

    /// Connect with explicit pool bounds.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        info!("Connecting to ledger database: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database url: {}", database_url))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    /// Open the database file at `path`.
    pub async fn new_with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let database_url = format!("sqlite://{}", path.as_ref().display());
        Self::new(&database_url).await
    }

    /// Create or upgrade the schema.
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running ledger migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        Ok(())
    }

    /// Connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        info!("Closing ledger database");
        self.pool.close().await;
    }

    /// Check the database answers queries.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Ledger health check failed")?;
        Ok(())
    }

    /// Row counts by outcome.
    pub async fn stats(&self) -> Result<LedgerStats> {
        let (total, success, failed, error): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(status = 'success'), 0),
                   COALESCE(SUM(status = 'failed'), 0),
                   COALESCE(SUM(status = 'error'), 0)
            FROM stake_actions
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to count stake actions")?;

        Ok(LedgerStats {
            total: total as u64,
            success: success as u64,
            failed: failed as u64,
            error: error as u64,
        })
    }
}

#[async_trait]
impl LedgerSink for Ledger {
    async fn append(&self, action: &NewStakeAction) -> Result<i64> {
        self.append_action(action).await
    }
}
