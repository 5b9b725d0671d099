//! JSON-RPC client for the chain gateway.
//!
//! The gateway is a sidecar that owns SCALE codec, metadata and wallet signing. This
//! client only speaks JSON over HTTP:
//!
//! | method                          | params                                          | result           |
//! |---------------------------------|-------------------------------------------------|------------------|
//! | `chain_getHead`                 | `[]`                                            | block hash       |
//! | `state_queryStorage`            | `[module, fn, params, at]`                      | value or `null`  |
//! | `state_queryMap`                | `[module, fn, params, start_key, page_size]`    | map page         |
//! | `balances_free`                 | `[coldkey]`                                     | rao              |
//! | `subtensor_getStake`            | `[coldkey, hotkey, netuid]`                     | rao              |
//! | `subtensor_isHotkeyRegistered`  | `[netuid, hotkey]`                              | bool             |
//! | `subtensor_burnedRegister`      | `[netuid, hotkey, wait]`                        | bool             |
//! | `subtensor_addStake`            | `[netuid, hotkey, rao, wait]`                   | bool             |
//! | `subtensor_removeStake`         | `[netuid, hotkey, rao, wait]`                   | bool             |

use anyhow::Context;
use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use taodiv_core::{Balance, Coldkey, Hotkey, Netuid};

use crate::{
    client::{BlockHash, RawEntry, RawEntryStream, StakeOperator, StorageParam, StorageReader},
    error::{ChainError, Result},
};

const DEFAULT_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct MapPage {
    entries: Vec<RawEntry>,
    next_key: Option<String>,
}

/// Chain gateway client.
#[derive(Clone)]
pub struct RpcGateway {
    client: Client,
    url: String,
    next_id: Arc<AtomicU64>,
    page_size: u32,
}

impl RpcGateway {
    /// Create a client for the gateway at `rpc_url`.
    pub fn new(rpc_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        reqwest::Url::parse(rpc_url).with_context(|| format!("Invalid chain rpc_url: {}", rpc_url))?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("taodiv/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build chain HTTP client")?;

        Ok(Self {
            client,
            url: rpc_url.to_string(),
            next_id: Arc::new(AtomicU64::new(1)),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Override the number of rows requested per `state_queryMap` page.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Gateway URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call_raw(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChainError::Transport(format!(
                "{} returned HTTP {}",
                method, status
            )));
        }

        let envelope: RpcResponse = response.json().await?;
        if let Some(err) = envelope.error {
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(envelope.result)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let result = self.call_raw(method, params).await?;
        serde_json::from_value(result)
            .map_err(|e| ChainError::Decode(format!("{}: {}", method, e)))
    }

    async fn fetch_map_page(
        &self,
        module: &str,
        storage_fn: &str,
        params: &Value,
        start_key: Option<String>,
    ) -> Result<MapPage> {
        self.call(
            "state_queryMap",
            json!([module, storage_fn, params, start_key, self.page_size]),
        )
        .await
    }
}

fn params_json(params: &[StorageParam]) -> Value {
    Value::Array(params.iter().map(StorageParam::to_json).collect())
}

fn wait_options() -> Value {
    json!({ "wait_for_inclusion": true, "wait_for_finalization": true })
}

#[async_trait]
impl StorageReader for RpcGateway {
    async fn chain_head(&self) -> Result<BlockHash> {
        self.call("chain_getHead", json!([])).await
    }

    async fn query(
        &self,
        module: &str,
        storage_fn: &str,
        params: &[StorageParam],
        at: Option<&BlockHash>,
    ) -> Result<Option<Value>> {
        let result = self
            .call_raw(
                "state_queryStorage",
                json!([module, storage_fn, params_json(params), at]),
            )
            .await?;
        Ok((!result.is_null()).then_some(result))
    }

    async fn query_map(
        &self,
        module: &str,
        storage_fn: &str,
        params: &[StorageParam],
    ) -> Result<RawEntryStream> {
        let params = params_json(params);

        // First page is fetched eagerly so connection failures surface here.
        let first = self.fetch_map_page(module, storage_fn, &params, None).await?;
        let head = stream::iter(first.entries.into_iter().map(Ok));

        let gateway = self.clone();
        let module = module.to_string();
        let storage_fn = storage_fn.to_string();
        let rest = stream::try_unfold(first.next_key, move |cursor| {
            let gateway = gateway.clone();
            let module = module.clone();
            let storage_fn = storage_fn.clone();
            let params = params.clone();
            async move {
                let Some(start_key) = cursor else {
                    return Ok::<_, ChainError>(None);
                };
                let page = gateway
                    .fetch_map_page(&module, &storage_fn, &params, Some(start_key))
                    .await?;
                Ok(Some((page.entries, page.next_key)))
            }
        })
        .map_ok(|entries| stream::iter(entries.into_iter().map(Ok::<_, ChainError>)))
        .try_flatten();

        Ok(Box::pin(head.chain(rest)))
    }
}

#[async_trait]
impl StakeOperator for RpcGateway {
    async fn free_balance(&self, coldkey: &Coldkey) -> Result<Balance> {
        let rao: u64 = self.call("balances_free", json!([coldkey.as_str()])).await?;
        Ok(Balance::from_rao(rao))
    }

    async fn stake(&self, coldkey: &Coldkey, hotkey: &Hotkey, netuid: Netuid) -> Result<Balance> {
        let rao: u64 = self
            .call(
                "subtensor_getStake",
                json!([coldkey.as_str(), hotkey.as_str(), netuid]),
            )
            .await?;
        Ok(Balance::from_rao(rao))
    }

    async fn is_hotkey_registered(&self, netuid: Netuid, hotkey: &Hotkey) -> Result<bool> {
        self.call(
            "subtensor_isHotkeyRegistered",
            json!([netuid, hotkey.as_str()]),
        )
        .await
    }

    async fn register(&self, netuid: Netuid, hotkey: &Hotkey) -> Result<bool> {
        self.call(
            "subtensor_burnedRegister",
            json!([netuid, hotkey.as_str(), wait_options()]),
        )
        .await
    }

    async fn add_stake(&self, netuid: Netuid, hotkey: &Hotkey, amount: Balance) -> Result<bool> {
        self.call(
            "subtensor_addStake",
            json!([netuid, hotkey.as_str(), amount.rao(), wait_options()]),
        )
        .await
    }

    async fn remove_stake(
        &self,
        netuid: Netuid,
        hotkey: &Hotkey,
        amount: Balance,
    ) -> Result<bool> {
        self.call(
            "subtensor_removeStake",
            json!([netuid, hotkey.as_str(), amount.rao(), wait_options()]),
        )
        .await
    }
}
