//! Concurrency limiter
//!
//! Caps how many project pipelines run at once. Admission is FIFO (tokio's
//! semaphore is fair) and a slot is released when its permit is dropped,
//! whether the pipeline succeeded, failed or panicked.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default number of pipelines running at once
pub const DEFAULT_PARALLEL_PROJECTS: usize = 4;

#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    bound: usize,
}

impl ConcurrencyLimiter {
    /// Creates a limiter admitting `bound` pipelines (at least one)
    pub fn new(bound: usize) -> Self {
        let bound = bound.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(bound)),
            bound,
        }
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Free slots right now
    #[cfg(test)]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a free slot; the slot is held until the permit is dropped
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .context("Concurrency limiter closed")
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_PARALLEL_PROJECTS)
    }
}
