//! Stake action inserts and queries.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use taodiv_core::{Hotkey, Netuid, SentimentScore};

use super::{Ledger, NewStakeAction, StakeAction};

const SELECT_COLUMNS: &str = r#"
    SELECT id, timestamp, netuid, hotkey, sentiment, stake_type,
           tao_amount, status, error_message
    FROM stake_actions
"#;

impl Ledger {
    /// Insert one action and return its row id.
    pub async fn append_action(&self, action: &NewStakeAction) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO stake_actions (
                timestamp, netuid, hotkey, sentiment, stake_type,
                tao_amount, status, error_message
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(action.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
        .bind(action.netuid as i64)
        .bind(action.hotkey.as_str())
        .bind(action.sentiment.value())
        .bind(action.stake_type.as_str())
        .bind(action.tao_amount)
        .bind(action.status.as_str())
        .bind(action.error_message.as_deref())
        .execute(&self.pool)
        .await
        .context("Failed to append stake action")?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent actions, newest first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<StakeAction>> {
        let rows = sqlx::query(&format!("{} ORDER BY id DESC LIMIT ?", SELECT_COLUMNS))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list stake actions")?;

        rows.into_iter().map(Self::row_to_action).collect()
    }

    /// All actions for one `(netuid, hotkey)`, oldest first.
    pub async fn for_pair(&self, netuid: Netuid, hotkey: &Hotkey) -> Result<Vec<StakeAction>> {
        let rows = sqlx::query(&format!(
            "{} WHERE netuid = ? AND hotkey = ? ORDER BY id ASC",
            SELECT_COLUMNS
        ))
        .bind(netuid as i64)
        .bind(hotkey.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list stake actions for pair")?;

        rows.into_iter().map(Self::row_to_action).collect()
    }

    /// Number of recorded actions.
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stake_actions")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count stake actions")?;
        Ok(count as u64)
    }

    fn row_to_action(row: sqlx::sqlite::SqliteRow) -> Result<StakeAction> {
        let id: i64 = row.try_get("id")?;
        let timestamp: String = row.try_get("timestamp")?;
        let netuid: i64 = row.try_get("netuid")?;
        let hotkey: String = row.try_get("hotkey")?;
        let sentiment: f64 = row.try_get("sentiment")?;
        let stake_type: String = row.try_get("stake_type")?;
        let tao_amount: f64 = row.try_get("tao_amount")?;
        let status: String = row.try_get("status")?;
        let error_message: Option<String> = row.try_get("error_message")?;

        Ok(StakeAction {
            id,
            timestamp: DateTime::parse_from_rfc3339(&timestamp)
                .with_context(|| format!("Invalid timestamp in stake action {}", id))?
                .with_timezone(&Utc),
            netuid: Netuid::try_from(netuid)
                .with_context(|| format!("Invalid netuid in stake action {}", id))?,
            hotkey: Hotkey::parse(&hotkey)
                .with_context(|| format!("Invalid hotkey in stake action {}", id))?,
            sentiment: SentimentScore::new(sentiment),
            stake_type: stake_type.parse()?,
            tao_amount,
            status: status.parse()?,
            error_message,
        })
    }
}
