//! In-memory ledger.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, PoisonError,
};

use super::{LedgerSink, NewStakeAction, StakeAction};

/// Ledger kept in a vector. Writes can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    rows: Mutex<Vec<StakeAction>>,
    fail_writes: AtomicBool,
}

impl MemoryLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent appends fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Recorded actions, oldest first.
    pub fn actions(&self) -> Vec<StakeAction> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl LedgerSink for MemoryLedger {
    async fn append(&self, action: &NewStakeAction) -> Result<i64> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("ledger unavailable");
        }

        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let id = rows.len() as i64 + 1;
        rows.push(StakeAction::from_new(id, action));
        Ok(id)
    }
}
