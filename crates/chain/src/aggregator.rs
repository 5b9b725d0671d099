//! Decodes raw `TaoDividendsPerSubnet` rows into grouped dividends.
//!
//! Failure policy:
//! - a row whose key or value cannot be decoded is logged and skipped
//! - a failed scan (connection error, stream error) yields an empty result
//! - a failed point lookup yields `None`, same as an absent value

use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use taodiv_core::{
    CorpusBuilder, DividendRecord, Hotkey, HotkeyDividend, Netuid, NetuidGroup,
    SUBTENSOR_MODULE, TAO_DIVIDENDS_PER_SUBNET,
};
use tracing::{debug, error, warn};

use crate::{
    client::{
        decode_account, decode_dividend, decode_netuid, RawEntry, StorageParam, StorageReader,
    },
    error::{ChainError, Result},
};

/// Dividend queries over a [`StorageReader`].
#[derive(Clone)]
pub struct DividendAggregator {
    reader: Arc<dyn StorageReader>,
}

impl DividendAggregator {
    /// Create an aggregator over the given storage handle.
    pub fn new(reader: Arc<dyn StorageReader>) -> Self {
        Self { reader }
    }

    /// Scan the whole map and group rows by netuid.
    ///
    /// Netuids keep first-seen order, hotkeys keep row order, duplicates append.
    pub async fn fetch_all(&self) -> Vec<NetuidGroup> {
        let rows = match self.scan(&[]).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Failed to query all dividends: {}", e);
                return Vec::new();
            }
        };

        let mut builder = CorpusBuilder::new();
        for row in rows {
            match decode_full_row(&row) {
                Ok(record) => builder.push(record),
                Err(e) => warn!(key = ?row.key, "Skipping dividend row: {}", e),
            }
        }

        debug!(rows = builder.row_count(), "Fetched dividend corpus");
        builder.finish()
    }

    /// Scan one subnet's rows.
    pub async fn fetch_for_netuid(&self, netuid: Netuid) -> Vec<HotkeyDividend> {
        let rows = match self.scan(&[StorageParam::Netuid(netuid)]).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(netuid, "Failed to query subnet dividends: {}", e);
                return Vec::new();
            }
        };

        rows.iter()
            .filter_map(|row| match decode_subnet_row(row) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(netuid, key = ?row.key, "Skipping dividend row: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Point lookup at the current chain head.
    ///
    /// Returns `None` both when no value is stored and when the chain call fails; callers
    /// cannot tell the two apart.
    pub async fn fetch_for_pair(&self, netuid: Netuid, hotkey: &Hotkey) -> Option<f64> {
        match self.query_pair(netuid, hotkey).await {
            Ok(value) => value,
            Err(e) => {
                error!(netuid, hotkey = %hotkey, "Failed to query dividend: {}", e);
                None
            }
        }
    }

    async fn query_pair(&self, netuid: Netuid, hotkey: &Hotkey) -> Result<Option<f64>> {
        let head = self.reader.chain_head().await?;
        let params = [
            StorageParam::Netuid(netuid),
            StorageParam::AccountId(*hotkey.account_id()),
        ];
        let value = self
            .reader
            .query(SUBTENSOR_MODULE, TAO_DIVIDENDS_PER_SUBNET, &params, Some(&head))
            .await?;
        value.as_ref().map(decode_dividend).transpose()
    }

    /// Collect every row of a scan, failing as a whole on any stream error.
    async fn scan(&self, params: &[StorageParam]) -> Result<Vec<RawEntry>> {
        let mut stream = self
            .reader
            .query_map(SUBTENSOR_MODULE, TAO_DIVIDENDS_PER_SUBNET, params)
            .await?;

        let mut rows = Vec::new();
        while let Some(row) = stream.next().await {
            rows.push(row?);
        }
        Ok(rows)
    }
}

fn key_component(key: &[Value], index: usize) -> Result<&Value> {
    key.get(index).ok_or_else(|| {
        ChainError::Decode(format!(
            "key has {} components, expected at least {}",
            key.len(),
            index + 1
        ))
    })
}

fn decode_full_row(row: &RawEntry) -> Result<DividendRecord> {
    let netuid = decode_netuid(key_component(&row.key, 0)?)?;
    let account = decode_account(key_component(&row.key, 1)?)?;
    Ok(DividendRecord {
        netuid,
        hotkey: Hotkey::from_account(account),
        dividend: decode_dividend(&row.value)?,
    })
}

fn decode_subnet_row(row: &RawEntry) -> Result<HotkeyDividend> {
    let account = decode_account(key_component(&row.key, 0)?)?;
    Ok(HotkeyDividend {
        hotkey: Hotkey::from_account(account),
        dividend: decode_dividend(&row.value)?,
    })
}
