//! Chain client boundary.
//!
//! Everything the service needs from the chain goes through two traits:
//! [`StorageReader`] for state queries and [`StakeOperator`] for balance reads and
//! funds-moving extrinsics. Handles are injected as `Arc<dyn ...>` so tests can swap in
//! [`crate::MemoryChain`].

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use taodiv_core::{Balance, Coldkey, Hotkey, Netuid};

use crate::error::{ChainError, Result};

/// Block hash as returned by the gateway (0x-prefixed hex).
pub type BlockHash = String;

/// Typed storage-map key component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageParam {
    /// `u16` subnet id.
    Netuid(Netuid),
    /// 32-byte account id.
    AccountId([u8; 32]),
}

impl StorageParam {
    /// JSON form sent to the gateway.
    pub fn to_json(&self) -> Value {
        match self {
            StorageParam::Netuid(netuid) => Value::from(*netuid),
            StorageParam::AccountId(account) => Value::String(format!("0x{}", hex::encode(account))),
        }
    }
}

/// One `(key, value)` row of a storage map scan.
///
/// `key` holds the key components that were not fixed by the query parameters, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    /// Remaining key components.
    pub key: Vec<Value>,
    /// Decoded storage value.
    pub value: Value,
}

/// Asynchronous sequence of storage map rows.
pub type RawEntryStream = Pin<Box<dyn Stream<Item = Result<RawEntry>> + Send>>;

/// Read access to chain storage.
#[async_trait]
pub trait StorageReader: Send + Sync {
    /// Hash of the current best block.
    async fn chain_head(&self) -> Result<BlockHash>;

    /// Point query. `Ok(None)` when the key holds no value.
    async fn query(
        &self,
        module: &str,
        storage_fn: &str,
        params: &[StorageParam],
        at: Option<&BlockHash>,
    ) -> Result<Option<Value>>;

    /// Prefix scan of a storage map.
    async fn query_map(
        &self,
        module: &str,
        storage_fn: &str,
        params: &[StorageParam],
    ) -> Result<RawEntryStream>;
}

/// Balance reads and stake extrinsics, signed by the service wallet.
///
/// Extrinsic methods return `Ok(false)` when the chain rejected the call and `Err` when
/// the outcome is unknown.
#[async_trait]
pub trait StakeOperator: Send + Sync {
    /// Spendable balance of a coldkey.
    async fn free_balance(&self, coldkey: &Coldkey) -> Result<Balance>;

    /// Amount `coldkey` has staked on `hotkey` in `netuid`.
    async fn stake(&self, coldkey: &Coldkey, hotkey: &Hotkey, netuid: Netuid) -> Result<Balance>;

    /// Whether `hotkey` is registered on `netuid`.
    async fn is_hotkey_registered(&self, netuid: Netuid, hotkey: &Hotkey) -> Result<bool>;

    /// Register `hotkey` on `netuid`, waiting for finalization.
    async fn register(&self, netuid: Netuid, hotkey: &Hotkey) -> Result<bool>;

    /// Stake `amount` onto `hotkey` in `netuid`.
    async fn add_stake(&self, netuid: Netuid, hotkey: &Hotkey, amount: Balance) -> Result<bool>;

    /// Unstake `amount` from `hotkey` in `netuid`.
    async fn remove_stake(&self, netuid: Netuid, hotkey: &Hotkey, amount: Balance)
        -> Result<bool>;
}

/// Decode a netuid key component.
pub fn decode_netuid(value: &Value) -> Result<Netuid> {
    value
        .as_u64()
        .and_then(|n| Netuid::try_from(n).ok())
        .ok_or_else(|| ChainError::Decode(format!("invalid netuid key component: {}", value)))
}

/// Decode an account-id key component.
///
/// Accepts a 0x-prefixed hex string, an array of 32 byte values, or a one-element array
/// wrapping either form (tuple-encoded keys).
pub fn decode_account(value: &Value) -> Result<[u8; 32]> {
    let mut account = [0u8; 32];
    match value {
        Value::String(s) => {
            let digits = s.strip_prefix("0x").unwrap_or(s);
            hex::decode_to_slice(digits, &mut account)
                .map_err(|e| ChainError::Decode(format!("invalid account id hex: {}", e)))?;
            Ok(account)
        }
        Value::Array(items) if items.len() == 1 => decode_account(&items[0]),
        Value::Array(items) if items.len() == 32 => {
            for (slot, item) in account.iter_mut().zip(items) {
                *slot = item
                    .as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| ChainError::Decode(format!("invalid account byte: {}", item)))?;
            }
            Ok(account)
        }
        other => Err(ChainError::Decode(format!(
            "unsupported account id encoding: {}",
            other
        ))),
    }
}

/// Decode a dividend storage value. Only JSON numbers are accepted.
pub fn decode_dividend(value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| ChainError::Decode(format!("non-numeric dividend value: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_storage_param_json() {
        assert_eq!(StorageParam::Netuid(18).to_json(), json!(18));
        assert_eq!(
            StorageParam::AccountId([0xab; 32]).to_json(),
            json!(format!("0x{}", "ab".repeat(32)))
        );
    }

    #[test]
    fn test_decode_account_forms() {
        let bytes: Vec<u8> = (0u8..32).collect();
        let expected: [u8; 32] = bytes.clone().try_into().unwrap();

        assert_eq!(decode_account(&json!(bytes)).unwrap(), expected);
        assert_eq!(decode_account(&json!([bytes])).unwrap(), expected);
        assert_eq!(
            decode_account(&json!(format!("0x{}", hex::encode(expected)))).unwrap(),
            expected
        );
    }

    #[test]
    fn test_decode_account_rejects_bad_input() {
        assert!(decode_account(&json!([1, 2, 3])).is_err());
        assert!(decode_account(&json!("0x1234")).is_err());
        assert!(decode_account(&json!(42)).is_err());

        let mut bytes = vec![0u64; 32];
        bytes[5] = 300;
        assert!(decode_account(&json!(bytes)).is_err());
    }

    #[test]
    fn test_decode_netuid_and_dividend() {
        assert_eq!(decode_netuid(&json!(7)).unwrap(), 7);
        assert!(decode_netuid(&json!(70000)).is_err());
        assert!(decode_netuid(&json!(-1)).is_err());

        assert_eq!(decode_dividend(&json!(12)).unwrap(), 12.0);
        assert_eq!(decode_dividend(&json!(0.25)).unwrap(), 0.25);
        assert!(decode_dividend(&json!("12")).is_err());
        assert!(decode_dividend(&json!(null)).is_err());
    }
}
