//! Error taxonomy for the engine.
//!
//! [`EngineError`] is what individual components return. The runner wraps it in
//! a [`JobError`] that also names the failing stage and the phase it was in, so
//! a caller can tell a reducer bug in stage 2 from a full spill disk in stage 1.
//! Every error is fatal to the run that produced it.

use crate::datum::KeyShape;
use std::fmt;
use std::io;
use thiserror::Error;

/// Which user callable failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallableRole {
    Mapper,
    Reducer,
}

impl fmt::Display for CallableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallableRole::Mapper => write!(f, "mapper"),
            CallableRole::Reducer => write!(f, "reducer"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Keys in one shuffle are not mutually comparable, or a key does not fit the stage codec.
    #[error("schema error: {detail}")]
    Schema { detail: String },

    /// A mapper or reducer returned an error.
    #[error("{role} failed: {source:#}")]
    Callable {
        role: CallableRole,
        #[source]
        source: anyhow::Error,
    },

    /// A value does not fit the configured fixed-width encoding.
    #[error("value {value} does not fit an encoding of width {width}")]
    EncodingOverflow { value: i64, width: usize },

    /// Spill storage failed, or the memory budget ceiling was hit.
    #[error("resource error: {context}: {source}")]
    Resource {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Invalid configuration or job definition.
    #[error("invalid configuration: {detail}")]
    Config { detail: String },

    /// The run was aborted before completion.
    #[error("job cancelled")]
    Cancelled,
}

impl EngineError {
    pub(crate) fn schema(detail: impl Into<String>) -> Self {
        EngineError::Schema {
            detail: detail.into(),
        }
    }

    pub(crate) fn shape_mismatch(expected: &KeyShape, found: &KeyShape) -> Self {
        EngineError::schema(format!(
            "key shape {found} is not comparable with shuffle key shape {expected}"
        ))
    }

    pub(crate) fn config(detail: impl Into<String>) -> Self {
        EngineError::Config {
            detail: detail.into(),
        }
    }

    pub(crate) fn resource(context: impl Into<String>, source: io::Error) -> Self {
        EngineError::Resource {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn callable(role: CallableRole, source: anyhow::Error) -> Self {
        EngineError::Callable { role, source }
    }
}

/// Lifecycle of one stage. Also identifies the component that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StagePhase {
    Mapping,
    Shuffling,
    Reducing,
    Done,
}

impl fmt::Display for StagePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StagePhase::Mapping => "mapping",
            StagePhase::Shuffling => "shuffling",
            StagePhase::Reducing => "reducing",
            StagePhase::Done => "done",
        };
        f.write_str(s)
    }
}

/// A failed job run: which stage, which phase, and why.
#[derive(Debug, Error)]
#[error("stage {stage} ({stage_name}) failed while {phase}: {source}")]
pub struct JobError {
    pub stage: usize,
    pub stage_name: String,
    pub phase: StagePhase,
    #[source]
    pub source: EngineError,
}

impl JobError {
    /// True if the underlying error is a [`EngineError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, EngineError::Cancelled)
    }
}
