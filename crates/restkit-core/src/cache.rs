//! Read-through caching for expensive reads.
//!
//! [`CacheManager`] is the typed front door; storage is a [`CacheStore`]
//! chosen when the manager is built ([`NoopCache`] when caching is disabled,
//! [`MemoryCache`] otherwise). Values are stored as JSON so one store can hold
//! every entity type.
//!
//! # Usage
//!
//! Reads go through [`CacheManager::get_or_fetch`]. Mutations must call
//! [`CacheManager::invalidate`] for every affected key after the remote write
//! succeeds and before returning to their own caller, and must surface its
//! error: a failed invalidation leaves a stale entry behind. The cache does
//! not enforce this.
//!
//! ```no_run
//! use restkit_core::{CacheKey, CacheManager, Transport};
//! use serde_json::{Value, json};
//!
//! # async fn example(
//! #     cache: &CacheManager,
//! #     transport: &Transport,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let key = CacheKey::new("issue", "ENG-42");
//! let issue: Value = cache
//!     .get_or_fetch(&key, || transport.get("/issues/ENG-42", &[]))
//!     .await?;
//!
//! let _: Value = transport
//!     .patch("/issues/ENG-42", &json!({"title": "renamed"}))
//!     .await?;
//! cache.invalidate(&[key]).await?;
//! # Ok(())
//! # }
//! ```

use std::{fmt, future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::CacheConfig;

mod key;
mod memory;

pub use key::CacheKey;
pub use memory::{MemoryCache, NoopCache};

/// Errors raised by cache backends.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    /// A value could not be converted to or from JSON.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The storage backend failed.
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Async key-value storage behind a [`CacheManager`].
///
/// Implementations must be thread-safe; batch operations share one store.
/// Concurrent writes to the same key are last-write-wins.
#[async_trait]
pub trait CacheStore: fmt::Debug + Send + Sync {
    /// Returns the stored value, or `None` on a miss.
    async fn get(&self, key: &CacheKey) -> Result<Option<JsonValue>, CacheError>;

    async fn set(&self, key: &CacheKey, value: JsonValue) -> Result<(), CacheError>;

    /// Removes one key. Removing a missing key is not an error.
    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;
}

/// Typed access to a shared [`CacheStore`].
///
/// Cloning is cheap; clones share the store.
#[derive(Debug, Clone)]
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
}

impl CacheManager {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// A manager whose reads always miss.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopCache))
    }

    /// A manager over a bounded, optionally expiring [`MemoryCache`].
    pub fn in_memory(max_entries: u64, ttl: Option<Duration>) -> Self {
        Self::new(Arc::new(MemoryCache::new(max_entries, ttl)))
    }

    /// Picks the backend from the `[cache]` config section.
    pub fn from_config(config: &CacheConfig) -> Self {
        if config.enabled {
            Self::in_memory(
                config.max_entries,
                config.ttl_seconds.map(Duration::from_secs),
            )
        } else {
            Self::disabled()
        }
    }

    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails or the stored value does
    /// not deserialize into `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>, CacheError> {
        match self.store.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// # Errors
    ///
    /// Returns [`CacheError`] if `value` cannot be serialized or the backend
    /// fails.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        value: &T,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value)?;
        self.store.set(key, value).await
    }

    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    pub async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.store.delete(key).await
    }

    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.store.clear().await
    }

    /// Returns the cached value for `key`, or runs `fetch` and caches its
    /// result.
    ///
    /// Cache failures are logged and treated as misses so a broken cache
    /// never fails a read. Fetch errors are returned as-is and not cached.
    ///
    /// # Errors
    ///
    /// Returns the error of `fetch` on a miss.
    pub async fn get_or_fetch<T, E, F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.get::<T>(key).await {
            Ok(Some(value)) => {
                debug!(%key, "cache hit");
                return Ok(value);
            }
            Ok(None) => debug!(%key, "cache miss"),
            Err(e) => warn!(%key, error = %e, "cache read failed, fetching"),
        }

        let value = fetch().await?;
        if let Err(e) = self.set(key, &value).await {
            warn!(%key, error = %e, "cache write failed");
        }
        Ok(value)
    }

    /// Drops every key touched by a successful mutation.
    ///
    /// Every key is attempted even when an earlier delete fails.
    ///
    /// # Errors
    ///
    /// Returns the first backend error; the keys it names may still hold
    /// stale values.
    pub async fn invalidate(&self, keys: &[CacheKey]) -> Result<(), CacheError> {
        let mut first_err = None;
        for key in keys {
            if let Err(e) = self.store.delete(key).await {
                warn!(%key, error = %e, "cache invalidation failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::disabled()
    }
}
