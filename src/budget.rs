//! Instrumented ceiling on resident unsorted records.
//!
//! Shared by every [`ShuffleWriter`](crate::shuffle::ShuffleWriter) of a stage.
//! Writers reserve one unit per buffered record and release the whole batch
//! after spilling it. A reservation that would push the total past the ceiling
//! fails instead of silently growing, and the highest total ever observed is
//! kept for inspection.

use crate::error::EngineError;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
pub struct MemoryBudget {
    limit: usize,
    resident: AtomicUsize,
    peak: AtomicUsize,
}

impl MemoryBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            resident: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Reserve room for `n` more records.
    ///
    /// # Errors
    /// [`EngineError::Resource`] if the ceiling would be exceeded; nothing is reserved then.
    pub fn acquire(&self, n: usize) -> Result<(), EngineError> {
        let now = self.resident.fetch_add(n, Ordering::AcqRel) + n;
        if now > self.limit {
            self.resident.fetch_sub(n, Ordering::AcqRel);
            return Err(EngineError::resource(
                "sort batch reservation",
                io::Error::new(
                    io::ErrorKind::OutOfMemory,
                    format!("memory budget of {} records exceeded ({now})", self.limit),
                ),
            ));
        }
        self.peak.fetch_max(now, Ordering::AcqRel);
        Ok(())
    }

    pub fn release(&self, n: usize) {
        self.resident.fetch_sub(n, Ordering::AcqRel);
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Records currently reserved.
    pub fn resident(&self) -> usize {
        self.resident.load(Ordering::Acquire)
    }

    /// Highest reservation total seen so far.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }
}
