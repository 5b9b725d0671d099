//! Core domain types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{CACHE_KEY_ALL, RAO_PER_TAO};
use crate::error::CoreError;
use crate::ss58;

/// Subnet identifier.
pub type Netuid = u16;

/// SS58-encoded account address (prefix 42).
///
/// Validated on construction and on deserialization; the decoded 32-byte account id is
/// kept alongside the text so chain calls never re-decode.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ss58Address {
    text: String,
    account: [u8; 32],
}

/// Hotkey: the on-chain operating identity of a neuron.
pub type Hotkey = Ss58Address;

/// Coldkey: custody key holding the spendable balance.
pub type Coldkey = Ss58Address;

impl Ss58Address {
    /// Parse and validate an SS58 string.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let account = ss58::decode(text)?;
        Ok(Self {
            text: text.to_string(),
            account,
        })
    }

    /// Build an address from a raw 32-byte account id.
    pub fn from_account(account: [u8; 32]) -> Self {
        Self {
            text: ss58::encode(&account),
            account,
        }
    }

    /// Address text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Raw 32-byte account id.
    pub fn account_id(&self) -> &[u8; 32] {
        &self.account
    }
}

impl fmt::Debug for Ss58Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ss58Address({})", self.text)
    }
}

impl fmt::Display for Ss58Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Ss58Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ss58Address::parse(s)
    }
}

impl Serialize for Ss58Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for Ss58Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Ss58Address::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// One decoded row of the dividend storage map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendRecord {
    /// Subnet id.
    pub netuid: Netuid,
    /// Hotkey the dividend accrues to.
    pub hotkey: Hotkey,
    /// Dividend value.
    pub dividend: f64,
}

/// Dividend of a single hotkey within a known subnet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotkeyDividend {
    /// Hotkey address.
    pub hotkey: Hotkey,
    /// Dividend value.
    pub dividend: f64,
}

/// Dividend of a known hotkey within one subnet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetuidDividend {
    /// Subnet id.
    pub netuid: Netuid,
    /// Dividend value.
    pub dividend: f64,
}

/// All dividend rows of one subnet, in first-seen order.
///
/// Duplicate hotkeys are kept as separate entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetuidGroup {
    /// Subnet id.
    pub netuid: Netuid,
    /// `(hotkey, dividend)` entries in insertion order.
    pub hotkeys: Vec<HotkeyDividend>,
}

/// Cache scope of a dividend lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Whole corpus.
    All,
    /// One subnet.
    ByNetuid(Netuid),
    /// One `(subnet, hotkey)` pair.
    ByPair(Netuid, Hotkey),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::All => f.write_str(CACHE_KEY_ALL),
            CacheKey::ByNetuid(netuid) => write!(f, "dividends:{}:netuid", netuid),
            CacheKey::ByPair(netuid, hotkey) => {
                write!(f, "dividends:{}:netuid:{}:hotkey", netuid, hotkey)
            }
        }
    }
}

/// Direction of a stake adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StakeType {
    /// Lock balance against a hotkey.
    Stake,
    /// Unlock previously staked balance.
    Unstake,
}

impl StakeType {
    /// Storage / wire form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            StakeType::Stake => "stake",
            StakeType::Unstake => "unstake",
        }
    }
}

impl fmt::Display for StakeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StakeType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stake" => Ok(StakeType::Stake),
            "unstake" => Ok(StakeType::Unstake),
            other => Err(CoreError::InvalidStakeType(other.to_string())),
        }
    }
}

/// Terminal outcome of a stake adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StakeStatus {
    /// Transaction included.
    Success,
    /// A precondition or the transaction itself was rejected.
    Failed,
    /// An unexpected error interrupted the workflow.
    Error,
}

impl StakeStatus {
    /// Storage / wire form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            StakeStatus::Success => "success",
            StakeStatus::Failed => "failed",
            StakeStatus::Error => "error",
        }
    }
}

impl fmt::Display for StakeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StakeStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(StakeStatus::Success),
            "failed" => Ok(StakeStatus::Failed),
            "error" => Ok(StakeStatus::Error),
            other => Err(CoreError::InvalidStakeStatus(other.to_string())),
        }
    }
}

/// Token amount in rao (1 TAO = 10^9 rao).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(u64);

impl Balance {
    /// Zero balance.
    pub const ZERO: Balance = Balance(0);

    /// Construct from rao.
    pub const fn from_rao(rao: u64) -> Self {
        Balance(rao)
    }

    /// Construct from a TAO amount, rounding to the nearest rao.
    ///
    /// Negative and non-finite amounts map to zero.
    pub fn from_tao(tao: f64) -> Self {
        if !tao.is_finite() || tao <= 0.0 {
            return Balance::ZERO;
        }
        Balance((tao * RAO_PER_TAO as f64).round() as u64)
    }

    /// Amount in rao.
    pub const fn rao(&self) -> u64 {
        self.0
    }

    /// Amount in TAO.
    pub fn as_tao(&self) -> f64 {
        self.0 as f64 / RAO_PER_TAO as f64
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "τ{:.9}", self.as_tao())
    }
}
