//! Bounded worker pool.
//!
//! A dedicated rayon [`ThreadPool`](rayon::ThreadPool) sized by
//! `max_workers`. Work is submitted as a batch of items; results come back in
//! item order no matter which invocation finished first, which is what keeps a
//! stage's output in shuffle key order.
//!
//! Failure handling is cooperative: every invocation first checks the run's
//! [`AbortSignal`]. The first invocation to fail trips the signal so in-flight
//! siblings stop early, and it is that first error, not a follow-up
//! `Cancelled`, that the batch reports.

use crate::error::EngineError;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Shared cancellation flag for one job run.
#[derive(Clone, Debug, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the run stop as soon as possible.
    pub fn abort(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once aborted.
    pub(crate) fn check(&self) -> Result<(), EngineError> {
        if self.is_aborted() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl WorkerPool {
    /// # Errors
    /// [`EngineError::Config`] if `workers` is zero or the threads cannot be spawned.
    pub fn new(workers: usize) -> Result<Self, EngineError> {
        if workers == 0 {
            return Err(EngineError::config("worker pool needs at least one worker"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("ironshuffle-worker-{i}"))
            .build()
            .map_err(|e| EngineError::config(format!("build worker pool: {e}")))?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `f` over every item concurrently and return results in item order.
    ///
    /// # Errors
    /// The first error produced by `f`, or [`EngineError::Cancelled`] if `abort`
    /// was tripped from outside.
    pub fn run_ordered<T, R, F>(
        &self,
        items: Vec<T>,
        abort: &AbortSignal,
        f: F,
    ) -> Result<Vec<R>, EngineError>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> Result<R, EngineError> + Sync,
    {
        let first_err: Mutex<Option<EngineError>> = Mutex::new(None);
        let results: Vec<Option<R>> = self.pool.install(|| {
            items
                .into_par_iter()
                .map(|item| {
                    if abort.is_aborted() {
                        return None;
                    }
                    match f(item) {
                        Ok(r) => Some(r),
                        Err(e) => {
                            abort.abort();
                            // The slot only holds an Option; a poisoned guard is still usable.
                            let mut slot =
                                first_err.lock().unwrap_or_else(PoisonError::into_inner);
                            if slot.is_none() && !matches!(e, EngineError::Cancelled) {
                                *slot = Some(e);
                            }
                            None
                        }
                    }
                })
                .collect()
        });
        if let Some(e) = first_err.into_inner().unwrap_or_else(PoisonError::into_inner) {
            return Err(e);
        }
        results
            .into_iter()
            .collect::<Option<Vec<R>>>()
            .ok_or(EngineError::Cancelled)
    }
}
