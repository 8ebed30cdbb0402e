//! Built-in [`CacheStore`] backends.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::instrument;

use super::{CacheError, CacheKey, CacheStore};

/// Caching disabled: every lookup misses and writes are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl CacheStore for NoopCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<JsonValue>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &CacheKey, _value: JsonValue) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _key: &CacheKey) -> Result<(), CacheError> {
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Bounded in-process cache with optional time-to-live.
///
/// Holds at most `max_entries` values; once full, the least valuable entries
/// are evicted (moka's TinyLFU policy). Entries older than the TTL read as
/// misses.
#[derive(Clone)]
pub struct MemoryCache {
    entries: moka::future::Cache<String, JsonValue>,
}

impl MemoryCache {
    pub fn new(max_entries: u64, ttl: Option<Duration>) -> Self {
        let mut builder = moka::future::Cache::builder().max_capacity(max_entries);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            entries: builder.build(),
        }
    }
}

impl fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.entries.entry_count())
            .finish()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    #[instrument(level = "trace", skip(self, key), fields(key = %key))]
    async fn get(&self, key: &CacheKey) -> Result<Option<JsonValue>, CacheError> {
        Ok(self.entries.get(key.as_str()).await)
    }

    #[instrument(level = "trace", skip(self, key, value), fields(key = %key))]
    async fn set(&self, key: &CacheKey, value: JsonValue) -> Result<(), CacheError> {
        self.entries.insert(key.as_str().to_owned(), value).await;
        Ok(())
    }

    #[instrument(level = "trace", skip(self, key), fields(key = %key))]
    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.entries.invalidate(key.as_str()).await;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.invalidate_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_noop_always_misses() {
        let cache = NoopCache;
        let key = CacheKey::new("issue", 1);

        cache.set(&key, json!({"id": 1})).await.unwrap();

        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_round_trip_and_delete() {
        let cache = MemoryCache::new(100, None);
        let key = CacheKey::new("issue", 1);

        cache.set(&key, json!({"id": 1})).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(json!({"id": 1})));

        cache.delete(&key).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_clear_removes_everything() {
        let cache = MemoryCache::new(100, None);
        let first = CacheKey::new("issue", 1);
        let second = CacheKey::new("project", 1);
        cache.set(&first, json!(1)).await.unwrap();
        cache.set(&second, json!(2)).await.unwrap();

        cache.clear().await.unwrap();

        assert_eq!(cache.get(&first).await.unwrap(), None);
        assert_eq!(cache.get(&second).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_entries_expire_after_ttl() {
        let cache = MemoryCache::new(100, Some(Duration::from_millis(50)));
        let key = CacheKey::new("issue", 1);
        cache.set(&key, json!(1)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_respects_capacity() {
        let cache = MemoryCache::new(2, None);
        for i in 0..10 {
            cache.set(&CacheKey::new("issue", i), json!(i)).await.unwrap();
        }

        cache.entries.run_pending_tasks().await;

        assert!(cache.entries.entry_count() <= 2);
    }
}
