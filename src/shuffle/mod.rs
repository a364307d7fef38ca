//! Shuffle / sort / group.
//!
//! The shuffle turns an unordered set of records into a stream of [`Group`]s
//! in strictly increasing key order, while holding a bounded number of
//! unsorted records in memory no matter how large the input is.
//!
//! 1. **Partition**: every record is routed by a hash of its key, so all
//!    records sharing a key land in the same partition.
//! 2. **Sort and spill**: each worker buffers records per partition. When it
//!    holds its share of the memory budget, it sorts each buffer and writes it
//!    out as a *run*.
//! 3. **Partition merge**: once all workers are done, the runs of each
//!    partition are merged (`merge_fan_in` at a time, repeatedly) into a
//!    single sorted run. Partitions are merged in parallel.
//! 4. **Global merge**: a k-way merge over the partition runs.
//! 5. **Group**: consecutive equal keys fold into one group.
//!
//! Runs are tagged with `(split ordinal, spill sequence)` and always merged
//! in tag order, so the values of a group arrive in input order regardless of
//! worker or partition count.

mod merge;
mod writer;

pub use writer::ShuffleWriter;

use crate::budget::MemoryBudget;
use crate::config::EngineConfig;
use crate::datum::{Datum, KeyShape};
use crate::error::EngineError;
use crate::pool::{AbortSignal, WorkerPool};
use crate::record::{Group, Record};
use crate::spill::{RunFile, RunReader, SpillArea};
use crate::stream::{RecordStream, Split};
use merge::{Grouped, KMerge};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

/// Key shape every record in one shuffle must share.
#[derive(Debug)]
pub(crate) struct KeySchema {
    declared: Option<KeyShape>,
    observed: OnceLock<KeyShape>,
}

impl KeySchema {
    fn new(declared: Option<KeyShape>) -> Self {
        Self {
            declared,
            observed: OnceLock::new(),
        }
    }

    /// The first key seen fixes the shape unless one was declared.
    pub(crate) fn check(&self, key: &Datum) -> Result<(), EngineError> {
        let expected = match &self.declared {
            Some(shape) => shape,
            None => self.observed.get_or_init(|| key.shape()),
        };
        if expected.matches(key) {
            Ok(())
        } else {
            Err(EngineError::shape_mismatch(expected, &key.shape()))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct RunTag {
    pub(crate) ordinal: usize,
    pub(crate) seq: usize,
}

/// Counters reported once a shuffle is finished.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShuffleStats {
    pub spilled_runs: usize,
    pub merge_passes: usize,
    pub peak_resident: usize,
}

/// State of one shuffle: spill area, budget, and the runs of each partition.
pub struct Shuffle {
    area: Arc<SpillArea>,
    partitions: usize,
    workers: usize,
    capacity: usize,
    fan_in: usize,
    budget: MemoryBudget,
    schema: KeySchema,
    runs: Mutex<Vec<Vec<(RunTag, RunFile)>>>,
    spilled: AtomicUsize,
}

impl Shuffle {
    /// A shuffle fed by the workers of `pool`. Each of them may hold
    /// `memory_budget / pool.workers()` unsorted records.
    ///
    /// # Errors
    /// [`EngineError::Config`] for an invalid config or a budget smaller than
    /// the pool, [`EngineError::Resource`] if the spill area cannot be created.
    pub fn new(
        config: &EngineConfig,
        pool: &WorkerPool,
        key_shape: Option<KeyShape>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let workers = pool.workers();
        if config.memory_budget < workers {
            return Err(EngineError::config(format!(
                "memory_budget ({}) must be at least the pool's {workers} workers",
                config.memory_budget
            )));
        }
        let area = SpillArea::new(config.spill_dir.as_deref(), "shuffle")?;
        debug!(
            area = %area.path().display(),
            partitions = config.partitions,
            workers,
            "shuffle created"
        );
        Ok(Self {
            area,
            partitions: config.partitions,
            workers,
            capacity: config.memory_budget / workers,
            fan_in: config.merge_fan_in,
            budget: MemoryBudget::new(config.memory_budget),
            schema: KeySchema::new(key_shape),
            runs: Mutex::new((0..config.partitions).map(|_| Vec::new()).collect()),
            spilled: AtomicUsize::new(0),
        })
    }

    /// A writer for split `ordinal`. One writer per concurrent worker.
    pub fn writer(&self, ordinal: usize) -> ShuffleWriter<'_> {
        ShuffleWriter::new(self, ordinal)
    }

    pub fn budget(&self) -> &MemoryBudget {
        &self.budget
    }

    fn register(&self, partition: usize, tag: RunTag, run: RunFile) -> Result<(), EngineError> {
        let mut runs = self.runs.lock().map_err(|_| registry_poisoned())?;
        runs[partition].push((tag, run));
        self.spilled.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Feed `splits` through the pool. `f` turns one input record into pushes
    /// on the split's writer and returns how many records it pushed.
    ///
    /// # Errors
    /// [`EngineError::Config`] if `pool` has more workers than the shuffle was
    /// sized for, otherwise the first error of any split.
    pub(crate) fn feed<F>(
        &self,
        splits: Vec<Split>,
        pool: &WorkerPool,
        abort: &AbortSignal,
        f: F,
    ) -> Result<usize, EngineError>
    where
        F: Fn(Record, &mut ShuffleWriter<'_>) -> Result<usize, EngineError> + Sync,
    {
        if pool.workers() > self.workers {
            return Err(EngineError::config(format!(
                "shuffle sized for {} workers fed by a pool of {}",
                self.workers,
                pool.workers()
            )));
        }
        debug!(
            splits = splits.len(),
            records = splits.iter().map(Split::len).sum::<usize>(),
            "feeding shuffle"
        );
        let indexed: Vec<(usize, Split)> = splits.into_iter().enumerate().collect();
        let pushed = pool.run_ordered(indexed, abort, |(ordinal, split)| {
            let mut w = self.writer(ordinal);
            let mut n = 0;
            for rec in split.records() {
                abort.check()?;
                n += f(rec?, &mut w)?;
            }
            w.finish()?;
            Ok(n)
        })?;
        Ok(pushed.into_iter().sum())
    }

    /// Merge every partition down to one run, then open the global merge.
    ///
    /// # Errors
    /// Spill I/O errors, or [`EngineError::Cancelled`] if `abort` trips.
    pub fn finish(
        self,
        pool: &WorkerPool,
        abort: &AbortSignal,
    ) -> Result<GroupStream, EngineError> {
        let per_partition = self.runs.into_inner().map_err(|_| registry_poisoned())?;
        let area = self.area;
        let fan_in = self.fan_in;
        let merged = pool.run_ordered(per_partition, abort, |mut runs| {
            runs.sort_by_key(|(tag, _)| *tag);
            consolidate(&area, runs.into_iter().map(|(_, r)| r).collect(), fan_in, abort)
        })?;

        let mut partition_runs = Vec::new();
        let mut merge_passes = 0;
        for (run, passes) in merged {
            merge_passes = merge_passes.max(passes);
            partition_runs.extend(run);
        }
        let readers = partition_runs
            .iter()
            .map(RunFile::open)
            .collect::<Result<Vec<_>, _>>()?;
        let stats = ShuffleStats {
            spilled_runs: self.spilled.load(Ordering::Relaxed),
            merge_passes,
            peak_resident: self.budget.peak(),
        };
        debug!(
            partitions = partition_runs.len(),
            spilled_runs = stats.spilled_runs,
            merge_passes,
            "shuffle merged"
        );
        Ok(GroupStream {
            groups: Grouped::new(KMerge::new(readers)?),
            _runs: partition_runs,
            stats,
        })
    }
}

fn registry_poisoned() -> EngineError {
    EngineError::resource(
        "shuffle run registry",
        io::Error::other("poisoned by a panicked worker"),
    )
}

/// Merge `runs` (already in tag order) down to a single run.
fn consolidate(
    area: &Arc<SpillArea>,
    mut runs: Vec<RunFile>,
    fan_in: usize,
    abort: &AbortSignal,
) -> Result<(Option<RunFile>, usize), EngineError> {
    let mut passes = 0;
    while runs.len() > 1 {
        abort.check()?;
        let mut next = Vec::with_capacity(runs.len().div_ceil(fan_in));
        let mut rest = runs.into_iter();
        loop {
            let chunk: Vec<RunFile> = rest.by_ref().take(fan_in).collect();
            match chunk.len() {
                0 => break,
                1 => next.extend(chunk),
                _ => next.push(merge_runs(area, chunk)?),
            }
        }
        runs = next;
        passes += 1;
    }
    Ok((runs.pop(), passes))
}

fn merge_runs(area: &Arc<SpillArea>, chunk: Vec<RunFile>) -> Result<RunFile, EngineError> {
    let readers = chunk.iter().map(RunFile::open).collect::<Result<Vec<_>, _>>()?;
    let mut w = area.create_run("merge")?;
    for rec in KMerge::new(readers)? {
        w.write(&rec?)?;
    }
    let merged = w.finish()?;
    for run in chunk {
        run.remove()?;
    }
    Ok(merged)
}

/// Groups of a finished shuffle, in strictly increasing key order.
///
/// Owns the partition runs; the spill area is released when this is dropped.
pub struct GroupStream {
    groups: Grouped<KMerge<RunReader>>,
    _runs: Vec<RunFile>,
    stats: ShuffleStats,
}

impl GroupStream {
    pub fn stats(&self) -> ShuffleStats {
        self.stats
    }
}

impl Iterator for GroupStream {
    type Item = Result<Group, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.groups.next()
    }
}

/// Shuffle an existing stream by its natural key order, on the workers of `pool`.
///
/// The memory budget is shared by the pool's workers, whatever
/// `config.max_workers` says.
///
/// # Errors
/// Any schema, spill or configuration error.
///
/// ```
/// use ironshuffle::{EngineConfig, RecordStream, WorkerPool, shuffle_stream};
///
/// let cfg = EngineConfig::default().with_max_workers(2);
/// let pool = WorkerPool::new(cfg.max_workers).unwrap();
/// let input = RecordStream::from_pairs(vec![("b", 1i64), ("a", 2), ("b", 3)]);
/// let groups: Vec<_> = shuffle_stream(&input, &cfg, &pool)
///     .unwrap()
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(groups.len(), 2);
/// assert_eq!(groups[1].values.len(), 2);
/// ```
pub fn shuffle_stream(
    input: &RecordStream,
    config: &EngineConfig,
    pool: &WorkerPool,
) -> Result<GroupStream, EngineError> {
    let abort = AbortSignal::new();
    let shuffle = Shuffle::new(config, pool, None)?;
    shuffle.feed(input.splits(config.split_size), pool, &abort, |rec, w| {
        w.push(rec)?;
        Ok(1)
    })?;
    shuffle.finish(pool, &abort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spill::write_run;
    use std::thread;

    #[test]
    fn poisoned_run_registry_fails_instead_of_dropping_runs() -> Result<(), EngineError> {
        let config = EngineConfig::default().with_max_workers(1);
        let pool = WorkerPool::new(1)?;
        let shuffle = Shuffle::new(&config, &pool, None)?;
        let joined: thread::Result<()> = thread::scope(|s| {
            s.spawn(|| {
                let _guard = shuffle.runs.lock();
                panic!("worker died holding the registry");
            })
            .join()
        });
        assert!(joined.is_err());

        let run = write_run(&shuffle.area, "map", std::iter::empty())?;
        let tag = RunTag { ordinal: 0, seq: 0 };
        assert!(matches!(
            shuffle.register(0, tag, run),
            Err(EngineError::Resource { .. })
        ));
        assert_eq!(shuffle.spilled.load(Ordering::Relaxed), 0);
        assert!(matches!(
            shuffle.finish(&pool, &AbortSignal::new()),
            Err(EngineError::Resource { .. })
        ));
        Ok(())
    }

    #[test]
    fn capacity_follows_the_pool_not_the_config() -> Result<(), EngineError> {
        let config = EngineConfig::default()
            .with_max_workers(1)
            .with_memory_budget(8);
        let shuffle = Shuffle::new(&config, &WorkerPool::new(4)?, None)?;
        assert_eq!(shuffle.capacity, 2);
        assert!(matches!(
            Shuffle::new(&config, &WorkerPool::new(9)?, None),
            Err(EngineError::Config { .. })
        ));
        Ok(())
    }
}
