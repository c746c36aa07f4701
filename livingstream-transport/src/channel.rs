//! Single-slot hand-off between the receiver and the tick loop.

use crate::detection::Batch;
use log::trace;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Holds the most recent undelivered [`Batch`].
///
/// One writer publishes, one reader takes once per tick. A publish replaces
/// whatever is still waiting; the lock is only held for the swap.
#[derive(Debug, Default)]
pub struct InboundChannel {
    slot: Mutex<Option<Batch>>,
    published: AtomicU64,
    overwritten: AtomicU64,
}

impl InboundChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Batch>> {
        // A panicking holder cannot leave the Option half-written
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `batch`, dropping any batch the reader has not taken yet
    pub fn publish(&self, batch: Batch) {
        let previous = self.lock().replace(batch);
        self.published.fetch_add(1, Ordering::Relaxed);
        if previous.is_some() {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
            trace!("Undelivered batch overwritten");
        }
    }

    /// Non-blocking drain; `None` when nothing arrived since the last take
    pub fn take(&self) -> Option<Batch> {
        self.lock().take()
    }

    pub fn has_pending(&self) -> bool {
        self.lock().is_some()
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Batches that were replaced before anyone took them
    pub fn overwritten_count(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }
}
