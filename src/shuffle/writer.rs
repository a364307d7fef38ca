//! Map-side partitioning and bounded sort-and-spill.

use super::{RunTag, Shuffle};
use crate::datum::Datum;
use crate::error::EngineError;
use crate::record::Record;
use crate::spill::write_run;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Partition of a (sort) key. Deterministic for a given key and partition count.
pub(crate) fn partition_of(key: &Datum, partitions: usize) -> usize {
    let mut h = DefaultHasher::new();
    key.hash(&mut h);
    (h.finish() % partitions.max(1) as u64) as usize
}

/// One worker's handle into a [`Shuffle`].
///
/// Holds at most the shuffle's per-worker batch capacity of unsorted records.
/// When full, every partition buffer is sorted and spilled as a run. Dropping
/// the writer (for example on error) returns its reservation to the budget.
pub struct ShuffleWriter<'a> {
    shuffle: &'a Shuffle,
    ordinal: usize,
    buffers: Vec<Vec<Record>>,
    resident: usize,
    seq: usize,
}

impl<'a> ShuffleWriter<'a> {
    pub(super) fn new(shuffle: &'a Shuffle, ordinal: usize) -> Self {
        Self {
            shuffle,
            ordinal,
            buffers: (0..shuffle.partitions).map(|_| Vec::new()).collect(),
            resident: 0,
            seq: 0,
        }
    }

    /// Buffer one record, spilling when the batch is full.
    ///
    /// # Errors
    /// [`EngineError::Schema`] if the key's shape differs from the shuffle's,
    /// [`EngineError::Resource`] if the budget or the spill storage fails.
    pub fn push(&mut self, rec: Record) -> Result<(), EngineError> {
        self.shuffle.schema.check(&rec.key)?;
        self.shuffle.budget.acquire(1)?;
        let p = partition_of(&rec.key, self.buffers.len());
        self.buffers[p].push(rec);
        self.resident += 1;
        if self.resident >= self.shuffle.capacity {
            self.spill()?;
        }
        Ok(())
    }

    fn spill(&mut self) -> Result<(), EngineError> {
        let mut runs = 0;
        for (p, buf) in self.buffers.iter_mut().enumerate() {
            if buf.is_empty() {
                continue;
            }
            // Stable: equal keys keep their arrival order.
            buf.sort_by(|a, b| a.key.cmp(&b.key));
            let run = write_run(&self.shuffle.area, "map", buf.iter())?;
            self.shuffle.register(
                p,
                RunTag {
                    ordinal: self.ordinal,
                    seq: self.seq,
                },
                run,
            )?;
            buf.clear();
            runs += 1;
        }
        debug!(
            split = self.ordinal,
            seq = self.seq,
            records = self.resident,
            runs,
            "spilled sort batch"
        );
        self.shuffle.budget.release(self.resident);
        self.resident = 0;
        self.seq += 1;
        Ok(())
    }

    /// Spill whatever is still buffered.
    ///
    /// # Errors
    /// [`EngineError::Resource`] if the spill storage fails.
    pub fn finish(mut self) -> Result<(), EngineError> {
        if self.resident > 0 {
            self.spill()?;
        }
        Ok(())
    }
}

impl Drop for ShuffleWriter<'_> {
    fn drop(&mut self) {
        if self.resident > 0 {
            self.shuffle.budget.release(self.resident);
            self.resident = 0;
        }
    }
}
