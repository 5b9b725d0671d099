//! Ledger record types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use taodiv_core::{Hotkey, Netuid, SentimentScore, StakeStatus, StakeType};

/// A stake action about to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStakeAction {
    /// When the outcome was reached.
    pub timestamp: DateTime<Utc>,
    /// Subnet.
    pub netuid: Netuid,
    /// Hotkey the stake targets.
    pub hotkey: Hotkey,
    /// Sentiment that triggered the action.
    pub sentiment: SentimentScore,
    /// Stake or unstake.
    pub stake_type: StakeType,
    /// Requested amount in TAO.
    pub tao_amount: f64,
    /// Outcome.
    pub status: StakeStatus,
    /// Failure reason or captured error text.
    pub error_message: Option<String>,
}

/// A recorded stake action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeAction {
    /// Row id, increasing with insertion order.
    pub id: i64,
    /// When the outcome was reached.
    pub timestamp: DateTime<Utc>,
    /// Subnet.
    pub netuid: Netuid,
    /// Hotkey the stake targets.
    pub hotkey: Hotkey,
    /// Sentiment that triggered the action.
    pub sentiment: SentimentScore,
    /// Stake or unstake.
    pub stake_type: StakeType,
    /// Requested amount in TAO.
    pub tao_amount: f64,
    /// Outcome.
    pub status: StakeStatus,
    /// Failure reason or captured error text.
    pub error_message: Option<String>,
}

impl StakeAction {
    /// Attach an id to a new action.
    pub fn from_new(id: i64, action: &NewStakeAction) -> Self {
        Self {
            id,
            timestamp: action.timestamp,
            netuid: action.netuid,
            hotkey: action.hotkey.clone(),
            sentiment: action.sentiment,
            stake_type: action.stake_type,
            tao_amount: action.tao_amount,
            status: action.status,
            error_message: action.error_message.clone(),
        }
    }
}

/// Ledger row counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    /// All rows.
    pub total: u64,
    /// Rows with status `success`.
    pub success: u64,
    /// Rows with status `failed`.
    pub failed: u64,
    /// Rows with status `error`.
    pub error: u64,
}
