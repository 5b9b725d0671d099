//! Cache-first dividend resolution.
//!
//! Each scope checks its own key first, then derives from the all-corpus key, then goes to
//! the chain. Derivations from the all-corpus entry never backfill the narrower key.
//! Concurrent misses on the same key each fetch from the chain independently and the last
//! write wins.

use serde_json::Value;
use std::{sync::Arc, time::Duration};
use taodiv_chain::DividendAggregator;
use taodiv_core::{
    corpus, CacheKey, Hotkey, HotkeyDividend, Netuid, NetuidDividend, NetuidGroup,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CacheBackend, CachedDividends};

/// Resolution failure surfaced to the HTTP layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// The pair is absent from the corpus, or the chain read failed. The two are not
    /// distinguished.
    #[error("Unable to fetch dividend")]
    DividendUnavailable,
}

/// A resolved value and whether it came from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    /// The value.
    pub value: T,
    /// True when served from any cache entry.
    pub cached: bool,
}

impl<T> Resolved<T> {
    fn hit(value: T) -> Self {
        Self {
            value,
            cached: true,
        }
    }

    fn miss(value: T) -> Self {
        Self {
            value,
            cached: false,
        }
    }
}

/// Resolves dividend lookups against the cache and the chain.
#[derive(Clone)]
pub struct DividendResolver {
    cache: Option<Arc<dyn CacheBackend>>,
    aggregator: DividendAggregator,
    ttl: Duration,
}

impl DividendResolver {
    /// Resolver over `cache`. With no cache every lookup goes to the chain.
    pub fn new(
        cache: Option<Arc<dyn CacheBackend>>,
        aggregator: DividendAggregator,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            aggregator,
            ttl,
        }
    }

    /// Dividend of one `(netuid, hotkey)` pair.
    pub async fn resolve_pair(
        &self,
        netuid: Netuid,
        hotkey: &Hotkey,
    ) -> Result<Resolved<f64>, ResolveError> {
        let key = CacheKey::ByPair(netuid, hotkey.clone());
        if let Some(CachedDividends::Pair(dividend)) = self.lookup(&key).await {
            return Ok(Resolved::hit(dividend));
        }

        if let Some(groups) = self.lookup_corpus().await {
            // A corpus hit is authoritative: a pair missing from it is an error, not a
            // reason to go to the chain.
            return corpus::find_pair(&groups, netuid, hotkey)
                .map(Resolved::hit)
                .ok_or(ResolveError::DividendUnavailable);
        }

        let dividend = self
            .aggregator
            .fetch_for_pair(netuid, hotkey)
            .await
            .ok_or(ResolveError::DividendUnavailable)?;
        self.store(&key, &CachedDividends::Pair(dividend)).await;
        Ok(Resolved::miss(dividend))
    }

    /// Hotkeys and dividends of one subnet.
    pub async fn resolve_netuid(&self, netuid: Netuid) -> Resolved<Vec<HotkeyDividend>> {
        let key = CacheKey::ByNetuid(netuid);
        if let Some(CachedDividends::Netuid(hotkeys)) = self.lookup(&key).await {
            return Resolved::hit(hotkeys);
        }

        if let Some(groups) = self.lookup_corpus().await {
            return Resolved::hit(corpus::hotkeys_for_netuid(&groups, netuid));
        }

        let hotkeys = self.aggregator.fetch_for_netuid(netuid).await;
        self.store(&key, &CachedDividends::Netuid(hotkeys.clone()))
            .await;
        Resolved::miss(hotkeys)
    }

    /// The whole corpus.
    pub async fn resolve_all(&self) -> Resolved<Vec<NetuidGroup>> {
        if let Some(CachedDividends::All(groups)) = self.lookup(&CacheKey::All).await {
            return Resolved::hit(groups);
        }
        Resolved::miss(self.fetch_corpus().await)
    }

    /// Every netuid `hotkey` earns dividends on.
    ///
    /// There is no hotkey-scoped cache entry: this always reads or fills the all-corpus
    /// key, and a cached empty corpus counts as a hit here.
    pub async fn resolve_hotkey_across_netuids(
        &self,
        hotkey: &Hotkey,
    ) -> Resolved<Vec<NetuidDividend>> {
        if let Some(CachedDividends::All(groups)) = self.lookup(&CacheKey::All).await {
            return Resolved::hit(corpus::netuids_for_hotkey(&groups, hotkey));
        }
        let groups = self.fetch_corpus().await;
        Resolved::miss(corpus::netuids_for_hotkey(&groups, hotkey))
    }

    async fn fetch_corpus(&self) -> Vec<NetuidGroup> {
        let groups = self.aggregator.fetch_all().await;
        self.store(&CacheKey::All, &CachedDividends::All(groups.clone()))
            .await;
        groups
    }

    /// Non-empty cached corpus, for deriving narrower scopes. An empty corpus says nothing
    /// about a netuid or pair, so those fall through to their own fetch.
    async fn lookup_corpus(&self) -> Option<Vec<NetuidGroup>> {
        match self.lookup(&CacheKey::All).await {
            Some(CachedDividends::All(groups)) if !groups.is_empty() => Some(groups),
            _ => None,
        }
    }

    async fn lookup(&self, key: &CacheKey) -> Option<CachedDividends> {
        let cache = self.cache.as_ref()?;
        let scope = key;
        let key = key.to_string();
        let value = match cache.get(&key).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed");
                return None;
            }
        };
        match serde_json::from_value::<CachedDividends>(value) {
            Ok(payload) if payload.matches(scope) => {
                debug!(key = %key, "Cache hit");
                Some(payload)
            }
            Ok(_) => {
                warn!(key = %key, "Cached payload has the wrong kind");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cached payload is malformed");
                None
            }
        }
    }

    async fn store(&self, key: &CacheKey, payload: &CachedDividends) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let key = key.to_string();
        let value: Value = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode cache payload");
                return;
            }
        };
        if let Err(e) = cache.set(&key, &value, self.ttl).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }
}

impl CachedDividends {
    fn matches(&self, key: &CacheKey) -> bool {
        matches!(
            (self, key),
            (CachedDividends::All(_), CacheKey::All)
                | (CachedDividends::Netuid(_), CacheKey::ByNetuid(_))
                | (CachedDividends::Pair(_), CacheKey::ByPair(..))
        )
    }
}
