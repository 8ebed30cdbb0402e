//! Counting-semaphore bound on in-flight batch operations.

use std::sync::Arc;

use tokio::sync::{Semaphore, SemaphorePermit};

/// Caps how many operations run at once.
///
/// Permits are handed out first-in first-out, so work queued behind a full
/// limiter is dispatched in the order it asked. A permit is returned to the
/// pool when it is dropped, before the next waiter is woken.
///
/// Clones share the same pool.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyLimiter {
    /// Creates a limiter with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }

    /// Waits for a free slot. The slot is held until the permit is dropped.
    ///
    /// # Panics
    ///
    /// Panics if the underlying semaphore was closed, which this type never
    /// does.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.permits
            .acquire()
            .await
            .expect("limiter semaphore is never closed")
    }
}
