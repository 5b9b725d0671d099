//! In-process chain state.
//!
//! [`MemoryChain`] implements both [`StorageReader`] and [`StakeOperator`] over plain
//! collections. Tests script registration and transaction outcomes and read back
//! [`CallCounts`] to assert which calls were made.

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Mutex, MutexGuard, PoisonError},
};
use taodiv_core::{
    Balance, Coldkey, Hotkey, Netuid, SUBTENSOR_MODULE, TAO_DIVIDENDS_PER_SUBNET,
};

use crate::{
    client::{BlockHash, RawEntry, RawEntryStream, StakeOperator, StorageParam, StorageReader},
    error::{ChainError, Result},
};

/// Number of calls made against a [`MemoryChain`], per method.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    /// `chain_head` calls.
    pub chain_head: usize,
    /// `query` calls.
    pub query: usize,
    /// `query_map` calls.
    pub query_map: usize,
    /// `free_balance` calls.
    pub free_balance: usize,
    /// `stake` calls.
    pub stake: usize,
    /// `is_hotkey_registered` calls.
    pub is_hotkey_registered: usize,
    /// `register` calls.
    pub register: usize,
    /// `add_stake` calls.
    pub add_stake: usize,
    /// `remove_stake` calls.
    pub remove_stake: usize,
}

impl CallCounts {
    /// Storage reads of any kind.
    pub fn reads(&self) -> usize {
        self.chain_head + self.query + self.query_map
    }

    /// Funds-moving extrinsics submitted.
    pub fn transactions(&self) -> usize {
        self.add_stake + self.remove_stake
    }

    /// Every call, reads and operator calls alike.
    pub fn total(&self) -> usize {
        self.reads()
            + self.free_balance
            + self.stake
            + self.is_hotkey_registered
            + self.register
            + self.transactions()
    }
}

#[derive(Default)]
struct State {
    /// `(netuid, account, value)` in insertion order.
    dividends: Vec<(Value, Value, Value)>,
    read_failure: Option<String>,
    balances: HashMap<[u8; 32], Balance>,
    stakes: HashMap<([u8; 32], [u8; 32], Netuid), Balance>,
    registered: HashSet<(Netuid, [u8; 32])>,
    registration_outcomes: VecDeque<std::result::Result<bool, String>>,
    transaction_outcome: Option<std::result::Result<bool, String>>,
    /// Coldkey whose funds move on stake extrinsics.
    wallet: Option<[u8; 32]>,
    calls: CallCounts,
}

/// Chain double backed by in-memory collections.
#[derive(Default)]
pub struct MemoryChain {
    state: Mutex<State>,
}

impl MemoryChain {
    /// Empty chain: no dividends, no balances, nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a `TaoDividendsPerSubnet` row.
    pub fn insert_dividend(&self, netuid: Netuid, hotkey: &Hotkey, dividend: f64) {
        self.insert_raw_dividend(
            Value::from(netuid),
            Value::from(hotkey.account_id().to_vec()),
            Value::from(dividend),
        );
    }

    /// Add a row with arbitrary key and value components, decodable or not.
    pub fn insert_raw_dividend(&self, netuid: Value, account: Value, value: Value) {
        self.state().dividends.push((netuid, account, value));
    }

    /// Make every storage read fail with a transport error.
    pub fn fail_reads(&self, message: impl Into<String>) {
        self.state().read_failure = Some(message.into());
    }

    /// Set the coldkey that signs stake extrinsics.
    pub fn set_wallet(&self, coldkey: &Coldkey) {
        self.state().wallet = Some(*coldkey.account_id());
    }

    /// Set a coldkey's free balance.
    pub fn set_balance(&self, coldkey: &Coldkey, balance: Balance) {
        self.state().balances.insert(*coldkey.account_id(), balance);
    }

    /// Set the stake a coldkey holds on a hotkey.
    pub fn set_stake(&self, coldkey: &Coldkey, hotkey: &Hotkey, netuid: Netuid, stake: Balance) {
        self.state()
            .stakes
            .insert((*coldkey.account_id(), *hotkey.account_id(), netuid), stake);
    }

    /// Mark a hotkey registered on a subnet.
    pub fn set_registered(&self, netuid: Netuid, hotkey: &Hotkey) {
        self.state().registered.insert((netuid, *hotkey.account_id()));
    }

    /// Queue outcomes for successive `register` calls. `Err` raises a transport error.
    /// Once the queue is drained registration succeeds.
    pub fn script_registrations<I>(&self, outcomes: I)
    where
        I: IntoIterator<Item = std::result::Result<bool, String>>,
    {
        self.state().registration_outcomes.extend(outcomes);
    }

    /// Outcome for every subsequent `add_stake` / `remove_stake`. Defaults to success.
    pub fn set_transaction_outcome(&self, outcome: std::result::Result<bool, String>) {
        self.state().transaction_outcome = Some(outcome);
    }

    /// Snapshot of the call counters.
    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }

    /// Current free balance of a coldkey.
    pub fn balance_of(&self, coldkey: &Coldkey) -> Balance {
        self.state()
            .balances
            .get(&*coldkey.account_id())
            .copied()
            .unwrap_or(Balance::ZERO)
    }

    /// Current stake of a coldkey on a hotkey.
    pub fn stake_of(&self, coldkey: &Coldkey, hotkey: &Hotkey, netuid: Netuid) -> Balance {
        self.state()
            .stakes
            .get(&(*coldkey.account_id(), *hotkey.account_id(), netuid))
            .copied()
            .unwrap_or(Balance::ZERO)
    }

    /// Whether a hotkey is registered on a subnet.
    pub fn is_registered(&self, netuid: Netuid, hotkey: &Hotkey) -> bool {
        self.state().registered.contains(&(netuid, *hotkey.account_id()))
    }
}

fn is_dividend_storage(module: &str, storage_fn: &str) -> bool {
    module == SUBTENSOR_MODULE && storage_fn == TAO_DIVIDENDS_PER_SUBNET
}

fn account_value(account: &[u8; 32]) -> Value {
    Value::from(account.to_vec())
}

impl State {
    fn check_reads(&self) -> Result<()> {
        match &self.read_failure {
            Some(message) => Err(ChainError::Transport(message.clone())),
            None => Ok(()),
        }
    }

    fn transaction_outcome(&self) -> Result<bool> {
        match &self.transaction_outcome {
            None => Ok(true),
            Some(Ok(accepted)) => Ok(*accepted),
            Some(Err(message)) => Err(ChainError::Transport(message.clone())),
        }
    }

    fn wallet(&self) -> Result<[u8; 32]> {
        self.wallet
            .ok_or_else(|| ChainError::Unavailable("no wallet configured".to_string()))
    }
}

#[async_trait]
impl StorageReader for MemoryChain {
    async fn chain_head(&self) -> Result<BlockHash> {
        let mut state = self.state();
        state.calls.chain_head += 1;
        state.check_reads()?;
        Ok(format!("0x{:064x}", state.dividends.len()))
    }

    async fn query(
        &self,
        module: &str,
        storage_fn: &str,
        params: &[StorageParam],
        _at: Option<&BlockHash>,
    ) -> Result<Option<Value>> {
        let mut state = self.state();
        state.calls.query += 1;
        state.check_reads()?;

        if !is_dividend_storage(module, storage_fn) {
            return Ok(None);
        }
        let [StorageParam::Netuid(netuid), StorageParam::AccountId(account)] = params else {
            return Err(ChainError::Decode(format!(
                "{} expects (netuid, account) parameters",
                storage_fn
            )));
        };

        let netuid = Value::from(*netuid);
        let account = account_value(account);
        Ok(state
            .dividends
            .iter()
            .find(|(n, a, _)| *n == netuid && *a == account)
            .map(|(_, _, value)| value.clone()))
    }

    async fn query_map(
        &self,
        module: &str,
        storage_fn: &str,
        params: &[StorageParam],
    ) -> Result<RawEntryStream> {
        let mut state = self.state();
        state.calls.query_map += 1;
        state.check_reads()?;

        let rows: Vec<RawEntry> = if !is_dividend_storage(module, storage_fn) {
            Vec::new()
        } else {
            match params {
                [] => state
                    .dividends
                    .iter()
                    .map(|(netuid, account, value)| RawEntry {
                        key: vec![netuid.clone(), account.clone()],
                        value: value.clone(),
                    })
                    .collect(),
                [StorageParam::Netuid(netuid)] => {
                    let netuid = Value::from(*netuid);
                    state
                        .dividends
                        .iter()
                        .filter(|(n, _, _)| *n == netuid)
                        .map(|(_, account, value)| RawEntry {
                            key: vec![account.clone()],
                            value: value.clone(),
                        })
                        .collect()
                }
                _ => {
                    return Err(ChainError::Decode(format!(
                        "unsupported prefix for {}",
                        storage_fn
                    )))
                }
            }
        };

        Ok(Box::pin(stream::iter(rows.into_iter().map(Ok))))
    }
}

#[async_trait]
impl StakeOperator for MemoryChain {
    async fn free_balance(&self, coldkey: &Coldkey) -> Result<Balance> {
        let mut state = self.state();
        state.calls.free_balance += 1;
        Ok(state
            .balances
            .get(&*coldkey.account_id())
            .copied()
            .unwrap_or(Balance::ZERO))
    }

    async fn stake(&self, coldkey: &Coldkey, hotkey: &Hotkey, netuid: Netuid) -> Result<Balance> {
        let mut state = self.state();
        state.calls.stake += 1;
        Ok(state
            .stakes
            .get(&(*coldkey.account_id(), *hotkey.account_id(), netuid))
            .copied()
            .unwrap_or(Balance::ZERO))
    }

    async fn is_hotkey_registered(&self, netuid: Netuid, hotkey: &Hotkey) -> Result<bool> {
        let mut state = self.state();
        state.calls.is_hotkey_registered += 1;
        Ok(state.registered.contains(&(netuid, *hotkey.account_id())))
    }

    async fn register(&self, netuid: Netuid, hotkey: &Hotkey) -> Result<bool> {
        let mut state = self.state();
        state.calls.register += 1;
        match state.registration_outcomes.pop_front().unwrap_or(Ok(true)) {
            Ok(true) => {
                state.registered.insert((netuid, *hotkey.account_id()));
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(message) => Err(ChainError::Transport(message)),
        }
    }

    async fn add_stake(&self, netuid: Netuid, hotkey: &Hotkey, amount: Balance) -> Result<bool> {
        let mut state = self.state();
        state.calls.add_stake += 1;
        if !state.transaction_outcome()? {
            return Ok(false);
        }

        let wallet = state.wallet()?;
        let free = state.balances.entry(wallet).or_insert(Balance::ZERO);
        if free.rao() < amount.rao() {
            return Ok(false);
        }
        *free = Balance::from_rao(free.rao() - amount.rao());

        let staked = state
            .stakes
            .entry((wallet, *hotkey.account_id(), netuid))
            .or_insert(Balance::ZERO);
        *staked = Balance::from_rao(staked.rao() + amount.rao());
        Ok(true)
    }

    async fn remove_stake(
        &self,
        netuid: Netuid,
        hotkey: &Hotkey,
        amount: Balance,
    ) -> Result<bool> {
        let mut state = self.state();
        state.calls.remove_stake += 1;
        if !state.transaction_outcome()? {
            return Ok(false);
        }

        let wallet = state.wallet()?;
        let staked = state
            .stakes
            .entry((wallet, *hotkey.account_id(), netuid))
            .or_insert(Balance::ZERO);
        if staked.rao() < amount.rao() {
            return Ok(false);
        }
        *staked = Balance::from_rao(staked.rao() - amount.rao());

        let free = state.balances.entry(wallet).or_insert(Balance::ZERO);
        *free = Balance::from_rao(free.rao() + amount.rao());
        Ok(true)
    }
}
