//! Bounded concurrency gate for in-flight executions.
//!
//! Each dispatcher owns one gate sized to its concurrency cap. A permit is
//! acquired before spawning an execution and travels into the spawned task,
//! so it is released when the task finishes on any path, including panics.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use lens_core::{Error, Result};

/// Counting gate over a fixed number of execution slots.
#[derive(Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One held execution slot. Dropping it returns the slot to the gate.
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<GatePermit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::Internal("concurrency gate closed".into()))?;
        Ok(GatePermit { _permit: permit })
    }

    /// Slots currently free. Dispatchers size their claim batches to this,
    /// so a saturated gate claims nothing rather than parking claimed rows.
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
