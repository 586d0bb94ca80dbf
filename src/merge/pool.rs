//! Bounded admission for heavy merge jobs.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Result, StitchError};

/// Default number of bounded jobs running at once.
pub const DEFAULT_POOL_CAPACITY: usize = 2;

/// Fixed-capacity pool admitting jobs in FIFO order.
///
/// Clones share the same permits and gauges.
#[derive(Debug, Clone)]
pub struct MergePool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    waiting: Arc<AtomicUsize>,
    running: Arc<AtomicUsize>,
}

impl MergePool {
    /// Create a pool. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            waiting: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs queued for a permit.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Jobs holding a permit.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Wait for a slot. Waiters are served in arrival order.
    ///
    /// # Errors
    ///
    /// Returns a job error if the pool was closed.
    pub async fn acquire(&self) -> Result<PoolPermit> {
        let permit = {
            let _waiting = Gauge::enter(&self.waiting);
            Arc::clone(&self.semaphore).acquire_owned().await
        }
        .map_err(|_| StitchError::job_failed("merge pool is closed"))?;

        Ok(PoolPermit {
            _permit: permit,
            _running: Gauge::enter(&self.running),
        })
    }

    /// Stop admitting jobs. Queued and future `acquire` calls fail.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

impl Default for MergePool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

/// A held pool slot, released on drop.
#[derive(Debug)]
pub struct PoolPermit {
    _permit: OwnedSemaphorePermit,
    _running: Gauge,
}

/// Counts itself in a gauge while alive.
#[derive(Debug)]
struct Gauge(Arc<AtomicUsize>);

impl Gauge {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for Gauge {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
