//! Job execution.
//!
//! The [`Runner`] owns a config and a worker pool and drives a [`Job`] stage
//! by stage. Each stage moves through
//! `Mapping → Shuffling → Reducing → Done` (a stage without a mapper starts at
//! `Shuffling`; one without a reducer flattens its groups instead of reducing).
//! A stage's output is fully written before the next stage starts, and the
//! previous stage's output is released as soon as it has been consumed.

use crate::codec::KeyCodec;
use crate::config::EngineConfig;
use crate::error::{CallableRole, EngineError, JobError, StagePhase};
use crate::job::{Job, Reducer, Stage};
use crate::pool::{AbortSignal, WorkerPool};
use crate::record::{Emitter, Group, Record};
use crate::shuffle::{GroupStream, Shuffle};
use crate::spill::SpillArea;
use crate::stats::{JobStats, StageStats};
use crate::stream::{RecordStream, StreamWriter};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Final stream of a job run plus the counters of each stage.
#[derive(Debug)]
pub struct JobOutput {
    pub records: RecordStream,
    pub stats: JobStats,
}

pub struct Runner {
    config: EngineConfig,
    pool: WorkerPool,
}

impl Runner {
    /// # Errors
    /// [`EngineError::Config`] if the config is invalid or the pool cannot start.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let pool = WorkerPool::new(config.max_workers)?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Run `job` over `input` to completion.
    ///
    /// # Errors
    /// A [`JobError`] naming the stage and phase that failed. No partial output
    /// is returned.
    pub fn run(&self, job: &Job, input: RecordStream) -> Result<JobOutput, JobError> {
        self.run_with_abort(job, input, &AbortSignal::new())
    }

    /// Like [`Runner::run`], but stops with [`EngineError::Cancelled`] once
    /// `abort` is tripped from another thread.
    ///
    /// # Errors
    /// See [`Runner::run`].
    pub fn run_with_abort(
        &self,
        job: &Job,
        input: RecordStream,
        abort: &AbortSignal,
    ) -> Result<JobOutput, JobError> {
        job.validate()?;
        let started = Instant::now();
        info!(
            stages = job.stages().len(),
            input_records = input.len(),
            workers = self.pool.workers(),
            partitions = self.config.partitions,
            "job started"
        );
        let mut current = input;
        let mut stats = JobStats::default();
        for (i, stage) in job.stages().iter().enumerate() {
            let mut phase = StagePhase::Mapping;
            let (out, stage_stats) = self
                .run_stage(i, stage, &current, abort, &mut phase)
                .map_err(|source| {
                    warn!(stage = i, name = %stage.name, %phase, error = %source, "job aborted");
                    abort.abort();
                    JobError {
                        stage: i,
                        stage_name: stage.name.clone(),
                        phase,
                        source,
                    }
                })?;
            current = out;
            stats.stages.push(stage_stats);
        }
        info!(
            output_records = current.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "job finished"
        );
        Ok(JobOutput {
            records: current,
            stats,
        })
    }

    fn run_stage(
        &self,
        index: usize,
        stage: &Stage,
        input: &RecordStream,
        abort: &AbortSignal,
        phase: &mut StagePhase,
    ) -> Result<(RecordStream, StageStats), EngineError> {
        let started = Instant::now();
        let mut st = StageStats {
            name: stage.name.clone(),
            input_records: input.len(),
            ..Default::default()
        };
        abort.check()?;
        info!(stage = index, name = %stage.name, input_records = input.len(), "stage started");

        let shuffle = Shuffle::new(&self.config, &self.pool, stage.key_shape.clone())?;
        let splits = input.splits(self.config.split_size);
        let codec = stage.codec.as_ref();
        st.mapped_records = match &stage.mapper {
            Some(mapper) => {
                *phase = StagePhase::Mapping;
                shuffle.feed(splits, &self.pool, abort, |rec, w| {
                    let mut out = Emitter::new();
                    mapper
                        .map(&rec.key, &rec.value, &mut out)
                        .map_err(|e| EngineError::callable(CallableRole::Mapper, e))?;
                    let emitted = out.into_records();
                    let n = emitted.len();
                    for r in emitted {
                        w.push(Record {
                            key: codec.encode(&r.key)?,
                            value: r.value,
                        })?;
                    }
                    Ok(n)
                })?
            }
            None => {
                *phase = StagePhase::Shuffling;
                shuffle.feed(splits, &self.pool, abort, |rec, w| {
                    w.push(Record {
                        key: codec.encode(&rec.key)?,
                        value: rec.value,
                    })?;
                    Ok(1)
                })?
            }
        };

        *phase = StagePhase::Shuffling;
        debug!(stage = index, mapped = st.mapped_records, "shuffling");
        let groups = shuffle.finish(&self.pool, abort)?;
        let shuffle_stats = groups.stats();
        st.spilled_runs = shuffle_stats.spilled_runs;
        st.merge_passes = shuffle_stats.merge_passes;
        st.peak_resident = shuffle_stats.peak_resident;

        let area = SpillArea::new(self.config.spill_dir.as_deref(), "output")?;
        let mut writer = StreamWriter::new(area, &format!("stage{index}"), self.config.split_size);
        match &stage.reducer {
            Some(reducer) => {
                *phase = StagePhase::Reducing;
                self.reduce(groups, reducer.as_ref(), codec, &mut writer, abort, &mut st)?;
            }
            None => flatten(groups, codec, &mut writer, abort, &mut st)?,
        }
        let out = writer.finish()?;

        *phase = StagePhase::Done;
        st.elapsed = started.elapsed();
        info!(
            stage = index,
            name = %stage.name,
            groups = st.groups,
            output_records = st.output_records,
            spilled_runs = st.spilled_runs,
            peak_resident = st.peak_resident,
            "stage finished"
        );
        Ok((out, st))
    }

    /// Reduce groups window by window; the pool re-sequences each window so
    /// output stays in key order.
    fn reduce(
        &self,
        mut groups: GroupStream,
        reducer: &dyn Reducer,
        codec: &dyn KeyCodec,
        writer: &mut StreamWriter,
        abort: &AbortSignal,
        st: &mut StageStats,
    ) -> Result<(), EngineError> {
        loop {
            abort.check()?;
            let window: Vec<Group> = groups
                .by_ref()
                .take(self.config.reduce_batch)
                .collect::<Result<_, _>>()?;
            if window.is_empty() {
                return Ok(());
            }
            st.groups += window.len();
            debug!(groups = window.len(), "reduce window");
            let outputs = self.pool.run_ordered(window, abort, |g| {
                let key = codec.decode(&g.key)?;
                let mut out = Emitter::new();
                reducer
                    .reduce(&key, g.values, &mut out)
                    .map_err(|e| EngineError::callable(CallableRole::Reducer, e))?;
                Ok(out.into_records())
            })?;
            for rec in outputs.iter().flatten() {
                writer.push(rec)?;
                st.output_records += 1;
            }
        }
    }
}

/// Stage without a reducer: groups pass through as individual records.
fn flatten(
    groups: GroupStream,
    codec: &dyn KeyCodec,
    writer: &mut StreamWriter,
    abort: &AbortSignal,
    st: &mut StageStats,
) -> Result<(), EngineError> {
    for g in groups {
        abort.check()?;
        let g = g?;
        st.groups += 1;
        let key = codec.decode(&g.key)?;
        for value in g.values {
            writer.push(&Record {
                key: key.clone(),
                value,
            })?;
            st.output_records += 1;
        }
    }
    Ok(())
}
