//! Cache backends and the cached payload format.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashMap, time::Duration};
use taodiv_core::{HotkeyDividend, NetuidGroup};
use thiserror::Error;
use tokio::{sync::RwLock, time::Instant};
use tracing::info;

/// Cache backend failure.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backend could not be reached or rejected the command.
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// A stored value is not valid JSON.
    #[error("Cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// String-keyed JSON store with per-entry TTL.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Value under `key`, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Store `value` under `key` for `ttl`, replacing any previous value.
    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError>;
}

/// Cached dividend payload, tagged with the scope it was fetched for.
///
/// Stored as `{"kind": "...", "results": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "results", rename_all = "snake_case")]
pub enum CachedDividends {
    /// Whole corpus grouped by netuid.
    All(Vec<NetuidGroup>),
    /// Hotkeys of one subnet.
    Netuid(Vec<HotkeyDividend>),
    /// One `(netuid, hotkey)` dividend.
    Pair(f64),
}

/// Redis-backed cache.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to `redis_url`.
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to Redis cache");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value.to_string())
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}

/// Process-local cache. Entries are never returned at or after their expiry instant.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (Value, Instant)>>,
}

impl MemoryCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| Instant::now() < *expires_at)
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires_at)| now < *expires_at);
        entries.insert(key.to_string(), (value.clone(), now + ttl));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taodiv_core::Hotkey;

    #[tokio::test(start_paused = true)]
    async fn test_memory_cache_expires_strictly() {
        let cache = MemoryCache::new();
        cache
            .set("k", &json!({"a": 1}), Duration::from_secs(120))
            .await
            .unwrap();

        assert_eq!(cache.get("k").await.unwrap(), Some(json!({"a": 1})));

        tokio::time::advance(Duration::from_millis(119_999)).await;
        assert!(cache.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_cache_overwrite_resets_ttl() {
        let cache = MemoryCache::new();
        cache.set("k", &json!(1), Duration::from_secs(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("k", &json!(2), Duration::from_secs(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(cache.get("k").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_cache_purges_expired_on_write() {
        let cache = MemoryCache::new();
        cache.set("old", &json!(1), Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        cache.set("new", &json!(2), Duration::from_secs(1)).await.unwrap();

        assert_eq!(cache.len().await, 1);
    }

    #[test]
    fn test_cached_dividends_format() {
        let hotkey = Hotkey::from_account([3; 32]);
        let payload = CachedDividends::Netuid(vec![HotkeyDividend {
            hotkey: hotkey.clone(),
            dividend: 1.5,
        }]);

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({"kind": "netuid", "results": [{"hotkey": hotkey.as_str(), "dividend": 1.5}]})
        );

        let pair: CachedDividends =
            serde_json::from_value(json!({"kind": "pair", "results": 42.0})).unwrap();
        assert_eq!(pair, CachedDividends::Pair(42.0));

        assert!(serde_json::from_value::<CachedDividends>(json!({"results": []})).is_err());
    }
}
