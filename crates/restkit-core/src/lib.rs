//! Resilience and batch-execution core for REST API tool adapters.
//!
//! Every API operation exposed as an agent tool goes through this crate. It
//! decides how many outbound requests run at once, how transient failures are
//! retried, how partial failures across multi-item requests are reported, and
//! how expensive reads are cached.
//!
//! # Key Components
//!
//! - **Transport**: [`Transport`] issues one logical HTTP request and maps
//!   failures into the [`ApiError`] taxonomy
//! - **Retry**: [`RetryCoordinator`] retries transient failures with
//!   exponential backoff; owned by the transport, exactly one per request
//! - **Batch**: [`BatchExecutor`] runs keyed operations under a concurrency
//!   cap and returns an ordered [`BatchResult`]
//! - **Cache**: [`CacheManager`] is a read-through cache over a pluggable
//!   [`CacheStore`]
//! - **Config**: [`Config`] loads the settings for all of the above
//!
//! # Example
//!
//! ```no_run
//! use restkit_core::{BatchExecutor, BatchOperation, Config, RetryStrategy, Transport};
//! use serde_json::Value;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_resolved()?.map(|(c, _)| c).unwrap_or_default();
//!
//! let transport = Transport::builder("https://api.example.com")
//!     .http_config(&config.http)
//!     .retry(RetryStrategy::from_config(&config.retry))
//!     .build()?;
//! let executor = BatchExecutor::from_config(&config.batch)?;
//!
//! let ops = ["1", "2", "3"]
//!     .into_iter()
//!     .map(|id| {
//!         let transport = &transport;
//!         BatchOperation::new(id, move || async move {
//!             transport.get::<Value>(&format!("/items/{id}"), &[]).await
//!         })
//!     })
//!     .collect();
//!
//! let result = executor.execute_parallel(ops, "get_items").await?;
//! for (id, item) in result.fulfilled() {
//!     println!("{id}: {item}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! Everything runs on one tokio runtime. The only explicit bound is the
//! executor's [`ConcurrencyLimiter`]; there is no cancellation at batch
//! level, and transport timeouts surface as retryable network errors.

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod retry;
pub mod transport;

pub use batch::{
    BatchEntry, BatchExecutor, BatchFailure, BatchOperation, BatchReport, BatchResult,
    ConcurrencyLimiter,
};
pub use cache::{CacheError, CacheKey, CacheManager, CacheStore, MemoryCache, NoopCache};
pub use config::{BatchConfig, CacheConfig, Config, ConfigError, HttpConfig, RetryConfig};
pub use error::{ApiError, DEFAULT_RETRY_AFTER_SECS, Retryable};
pub use retry::{RetryCoordinator, RetryStrategy};
pub use transport::{Transport, TransportBuilder};

/// HTTP method type accepted by [`Transport::request`].
pub use reqwest::Method;
