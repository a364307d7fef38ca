//! Pipeline definitions: [`Stage`]s and the [`Job`] that orders them.
//!
//! ```
//! use ironshuffle::{Datum, Job, RecordStream, Stage};
//!
//! let job = Job::new().stage(
//!     Stage::new("count")
//!         .mapper(|_k, line, out| {
//!             for word in line.as_str().unwrap_or_default().split_whitespace() {
//!                 out.emit(word, 1i64);
//!             }
//!             Ok(())
//!         })
//!         .reducer(|word, ones, out| {
//!             out.emit(word.clone(), ones.len() as i64);
//!             Ok(())
//!         }),
//! );
//! let input = RecordStream::from_pairs(vec![((), "a b a")]);
//! let out = job.run(input).unwrap().records.to_pairs().unwrap();
//! assert_eq!(out[0], (Datum::from("a"), Datum::Int(2)));
//! ```

use crate::codec::{KeyCodec, Natural};
use crate::config::EngineConfig;
use crate::datum::{Datum, KeyShape};
use crate::error::{EngineError, JobError, StagePhase};
use crate::record::Emitter;
use crate::runner::{JobOutput, Runner};
use crate::stream::RecordStream;
use anyhow::Result;
use std::fmt;
use std::sync::Arc;

/// Turns one input record into zero or more output records.
pub trait Mapper: Send + Sync {
    /// # Errors
    /// Any error aborts the job.
    fn map(&self, key: &Datum, value: &Datum, out: &mut Emitter) -> Result<()>;
}

impl<F> Mapper for F
where
    F: Fn(&Datum, &Datum, &mut Emitter) -> Result<()> + Send + Sync,
{
    fn map(&self, key: &Datum, value: &Datum, out: &mut Emitter) -> Result<()> {
        self(key, value, out)
    }
}

/// Turns one group into zero or more output records.
pub trait Reducer: Send + Sync {
    /// # Errors
    /// Any error aborts the job.
    fn reduce(&self, key: &Datum, values: Vec<Datum>, out: &mut Emitter) -> Result<()>;
}

impl<F> Reducer for F
where
    F: Fn(&Datum, Vec<Datum>, &mut Emitter) -> Result<()> + Send + Sync,
{
    fn reduce(&self, key: &Datum, values: Vec<Datum>, out: &mut Emitter) -> Result<()> {
        self(key, values, out)
    }
}

/// One mapper/shuffle/reducer unit.
#[derive(Clone)]
pub struct Stage {
    pub(crate) name: String,
    pub(crate) mapper: Option<Arc<dyn Mapper>>,
    pub(crate) reducer: Option<Arc<dyn Reducer>>,
    pub(crate) codec: Arc<dyn KeyCodec>,
    pub(crate) key_shape: Option<KeyShape>,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("mapper", &self.mapper.is_some())
            .field("reducer", &self.reducer.is_some())
            .field("codec", &self.codec)
            .field("key_shape", &self.key_shape)
            .finish()
    }
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mapper: None,
            reducer: None,
            codec: Arc::new(Natural),
            key_shape: None,
        }
    }

    #[must_use]
    pub fn mapper<F>(self, f: F) -> Self
    where
        F: Fn(&Datum, &Datum, &mut Emitter) -> Result<()> + Send + Sync + 'static,
    {
        self.with_mapper(Arc::new(f))
    }

    #[must_use]
    pub fn reducer<F>(self, f: F) -> Self
    where
        F: Fn(&Datum, Vec<Datum>, &mut Emitter) -> Result<()> + Send + Sync + 'static,
    {
        self.with_reducer(Arc::new(f))
    }

    /// Use a struct implementing [`Mapper`].
    #[must_use]
    pub fn with_mapper(mut self, m: Arc<dyn Mapper>) -> Self {
        self.mapper = Some(m);
        self
    }

    /// Use a struct implementing [`Reducer`].
    #[must_use]
    pub fn with_reducer(mut self, r: Arc<dyn Reducer>) -> Self {
        self.reducer = Some(r);
        self
    }

    /// Sort-key policy for this stage's shuffle. Keys are encoded after the
    /// mapper and decoded before the reducer.
    #[must_use]
    pub fn key_codec(mut self, codec: impl KeyCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Declare the (encoded) key shape up front, so the very first mismatching
    /// key fails instead of the first key fixing the shape.
    ///
    /// Without a declared shape, a mismatch can only be detected once some
    /// worker has already seen a key of the other shape, by which time earlier
    /// batches may have been spilled. The mismatching record is never buffered
    /// and the stage still fails, but declare the shape when the error must
    /// come before any data reaches the spill area.
    #[must_use]
    pub fn key_shape(mut self, shape: KeyShape) -> Self {
        self.key_shape = Some(shape);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_mapper(&self) -> bool {
        self.mapper.is_some()
    }

    pub fn has_reducer(&self) -> bool {
        self.reducer.is_some()
    }
}

/// An ordered, immutable list of stages.
#[derive(Clone, Debug, Default)]
pub struct Job {
    stages: Vec<Stage>,
}

impl Job {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// # Errors
    /// A [`JobError`] with [`EngineError::Config`] for an empty job, or for a
    /// stage with neither mapper nor reducer in a multi-stage job.
    pub fn validate(&self) -> Result<(), JobError> {
        if self.stages.is_empty() {
            return Err(JobError {
                stage: 0,
                stage_name: String::new(),
                phase: StagePhase::Mapping,
                source: EngineError::config("job has no stages"),
            });
        }
        if self.stages.len() > 1
            && let Some((i, s)) = self
                .stages
                .iter()
                .enumerate()
                .find(|(_, s)| !s.has_mapper() && !s.has_reducer())
        {
            return Err(JobError {
                stage: i,
                stage_name: s.name.clone(),
                phase: StagePhase::Mapping,
                source: EngineError::config("stage has neither a mapper nor a reducer"),
            });
        }
        Ok(())
    }

    /// Run with the default [`EngineConfig`].
    ///
    /// # Errors
    /// See [`Runner::run`].
    pub fn run(&self, input: RecordStream) -> Result<JobOutput, JobError> {
        Runner::new(EngineConfig::default())
            .map_err(|source| JobError {
                stage: 0,
                stage_name: String::new(),
                phase: StagePhase::Mapping,
                source,
            })?
            .run(self, input)
    }
}
