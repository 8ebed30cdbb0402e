//! Bounded-concurrency execution of keyed operations.
//!
//! A caller hands [`BatchExecutor::execute_parallel`] a list of
//! [`BatchOperation`]s and gets back a [`BatchResult`] with one entry per
//! operation, in input order, whatever order they completed in.
//!
//! # Guarantees
//!
//! - No more than `max_concurrent_requests` operations are in flight at once,
//!   counted across every batch running on the same executor.
//! - Operations are dispatched in input order as slots free up.
//! - A failing operation never cancels or affects its siblings.
//! - Oversized batches are rejected before any operation starts.
//! - Operations are never retried here. Retrying belongs to
//!   [`crate::Transport`]; retrying again at this level would multiply the
//!   attempt count.
//!
//! # Example
//!
//! ```no_run
//! use restkit_core::{ApiError, BatchExecutor, BatchOperation, Transport};
//! use serde_json::Value;
//!
//! # async fn example(transport: &Transport) -> Result<(), ApiError> {
//! let executor = BatchExecutor::new(50, 5)?;
//! let ops = ["ENG-1", "ENG-2"]
//!     .into_iter()
//!     .map(|id| {
//!         BatchOperation::new(id, move || async move {
//!             transport.get::<Value>(&format!("/issues/{id}"), &[]).await
//!         })
//!     })
//!     .collect();
//!
//! let result = executor.execute_parallel(ops, "get_issues").await?;
//! println!("{}", serde_json::to_string(&result.report("get_issues")).unwrap());
//! # Ok(())
//! # }
//! ```

use std::{fmt, future::Future};

use futures::{
    FutureExt,
    future::{BoxFuture, join_all},
};
use tracing::{debug, info, instrument};

use crate::{config::BatchConfig, error::ApiError};

mod limiter;
mod report;

pub use limiter::ConcurrencyLimiter;
pub use report::{BatchFailure, BatchReport};

type Thunk<'a, T, E> = Box<dyn FnOnce() -> BoxFuture<'a, Result<T, E>> + Send + 'a>;

/// One keyed unit of work. Runs at most once; consumed by execution.
pub struct BatchOperation<'a, K, T, E = ApiError> {
    key: K,
    thunk: Thunk<'a, T, E>,
}

impl<'a, K, T, E> BatchOperation<'a, K, T, E> {
    /// Wraps `f`, which is not called until the executor dispatches it.
    pub fn new<F, Fut>(key: K, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
    {
        Self {
            key,
            thunk: Box::new(move || f().boxed()),
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: fmt::Debug, T, E> fmt::Debug for BatchOperation<'_, K, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOperation")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Outcome of one operation, tagged with its key and input position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEntry<K, T, E = ApiError> {
    Fulfilled { key: K, index: usize, value: T },
    Rejected { key: K, index: usize, reason: E },
}

impl<K, T, E> BatchEntry<K, T, E> {
    pub fn key(&self) -> &K {
        match self {
            Self::Fulfilled { key, .. } | Self::Rejected { key, .. } => key,
        }
    }

    /// Position of the operation in the submitted list.
    pub fn index(&self) -> usize {
        match self {
            Self::Fulfilled { index, .. } | Self::Rejected { index, .. } => *index,
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Fulfilled { value, .. } => Some(value),
            Self::Rejected { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&E> {
        match self {
            Self::Rejected { reason, .. } => Some(reason),
            Self::Fulfilled { .. } => None,
        }
    }

    /// Drops the key and index.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason for a rejected entry.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Fulfilled { value, .. } => Ok(value),
            Self::Rejected { reason, .. } => Err(reason),
        }
    }
}

/// Ordered outcomes of a batch: `entries[i].index() == i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult<K, T, E = ApiError> {
    entries: Vec<BatchEntry<K, T, E>>,
}

impl<K, T, E> BatchResult<K, T, E> {
    pub(crate) fn from_entries(entries: Vec<BatchEntry<K, T, E>>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BatchEntry<K, T, E>] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BatchEntry<K, T, E>> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> Vec<BatchEntry<K, T, E>> {
        self.entries
    }

    /// Successful entries as `(key, value)` pairs, in input order.
    pub fn fulfilled(&self) -> impl Iterator<Item = (&K, &T)> {
        self.entries.iter().filter_map(|entry| match entry {
            BatchEntry::Fulfilled { key, value, .. } => Some((key, value)),
            BatchEntry::Rejected { .. } => None,
        })
    }

    /// Failed entries as `(key, reason)` pairs, in input order.
    pub fn rejected(&self) -> impl Iterator<Item = (&K, &E)> {
        self.entries.iter().filter_map(|entry| match entry {
            BatchEntry::Rejected { key, reason, .. } => Some((key, reason)),
            BatchEntry::Fulfilled { .. } => None,
        })
    }

    pub fn fulfilled_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_fulfilled()).count()
    }

    pub fn rejected_count(&self) -> usize {
        self.len() - self.fulfilled_count()
    }

    /// True when the batch contains both successes and failures.
    pub fn is_partial(&self) -> bool {
        let fulfilled = self.fulfilled_count();
        fulfilled > 0 && fulfilled < self.len()
    }

    /// One slot per input position; `None` where the operation failed.
    pub fn into_values(self) -> Vec<Option<T>> {
        self.entries
            .into_iter()
            .map(|entry| entry.into_result().ok())
            .collect()
    }
}

impl<K, T, E> IntoIterator for BatchResult<K, T, E> {
    type Item = BatchEntry<K, T, E>;
    type IntoIter = std::vec::IntoIter<BatchEntry<K, T, E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'r, K, T, E> IntoIterator for &'r BatchResult<K, T, E> {
    type Item = &'r BatchEntry<K, T, E>;
    type IntoIter = std::slice::Iter<'r, BatchEntry<K, T, E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Runs batches of operations under a shared concurrency cap.
///
/// Build one per process; clones share the same [`ConcurrencyLimiter`].
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    max_batch_size: usize,
    limiter: ConcurrencyLimiter,
}

impl BatchExecutor {
    /// Creates an executor.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if either limit is zero.
    pub fn new(max_batch_size: usize, max_concurrent_requests: usize) -> Result<Self, ApiError> {
        if max_batch_size == 0 {
            return Err(ApiError::validation("max_batch_size must be at least 1"));
        }
        if max_concurrent_requests == 0 {
            return Err(ApiError::validation(
                "max_concurrent_requests must be at least 1",
            ));
        }
        Ok(Self {
            max_batch_size,
            limiter: ConcurrencyLimiter::new(max_concurrent_requests),
        })
    }

    /// Creates an executor from the `[batch]` config section.
    ///
    /// # Errors
    ///
    /// See [`BatchExecutor::new`].
    pub fn from_config(config: &BatchConfig) -> Result<Self, ApiError> {
        Self::new(config.max_batch_size, config.max_concurrent_requests)
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn max_concurrent_requests(&self) -> usize {
        self.limiter.capacity()
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Runs every operation and records each outcome in input order.
    ///
    /// Per-operation failures become [`BatchEntry::Rejected`] entries; they
    /// never fail the call. `label` names the batch in log output.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] without invoking any operation when
    /// `ops` holds more than `max_batch_size` entries.
    #[instrument(skip(self, ops), fields(total = ops.len()))]
    pub async fn execute_parallel<K, T, E>(
        &self,
        ops: Vec<BatchOperation<'_, K, T, E>>,
        label: &str,
    ) -> Result<BatchResult<K, T, E>, ApiError> {
        if ops.is_empty() {
            return Ok(BatchResult::from_entries(Vec::new()));
        }
        if ops.len() > self.max_batch_size {
            return Err(ApiError::validation(format!(
                "batch '{label}' has {} operations, exceeding the maximum batch size of {}",
                ops.len(),
                self.max_batch_size
            )));
        }

        info!(
            concurrency = self.limiter.capacity(),
            "dispatching batch"
        );

        let limiter = &self.limiter;
        let entries = join_all(ops.into_iter().enumerate().map(|(index, op)| async move {
            let BatchOperation { key, thunk } = op;
            let outcome = {
                let _slot = limiter.acquire().await;
                thunk().await
            };
            match outcome {
                Ok(value) => {
                    debug!(index, "operation fulfilled");
                    BatchEntry::Fulfilled { key, index, value }
                }
                Err(reason) => {
                    debug!(index, "operation rejected");
                    BatchEntry::Rejected { key, index, reason }
                }
            }
        }))
        .await;

        let result = BatchResult::from_entries(entries);
        info!(
            succeeded = result.fulfilled_count(),
            failed = result.rejected_count(),
            "batch completed"
        );
        Ok(result)
    }
}
