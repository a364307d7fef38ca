//! Engine configuration.
//!
//! Every knob is a plain number with a documented default; nothing is read from
//! the environment. Configs can be built in code with the `with_*` setters or
//! deserialized (missing fields take their defaults):
//!
//! ```
//! use ironshuffle::EngineConfig;
//!
//! let cfg =
//!     EngineConfig::from_json_str(r#"{ "memory_budget": 4096, "max_workers": 4 }"#).unwrap();
//! assert_eq!(cfg.memory_budget, 4096);
//! assert_eq!(cfg.merge_fan_in, 64);
//! ```

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ceiling on unsorted records resident in sort batches, summed over all
    /// workers of a stage. Each worker of the shuffling pool gets an equal share.
    pub memory_budget: usize,
    /// Number of shuffle partitions.
    pub partitions: usize,
    /// Worker threads in the pool.
    pub max_workers: usize,
    /// Records per map split, and per output part file.
    pub split_size: usize,
    /// Runs merged together in one merge pass.
    pub merge_fan_in: usize,
    /// Groups handed to the pool per reduce window.
    pub reduce_batch: usize,
    /// Parent directory for spill areas (system temp dir when `None`).
    pub spill_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let cpus = num_cpus::get().max(1);
        Self {
            memory_budget: 1_000_000,
            partitions: 2 * cpus.max(2),
            max_workers: cpus,
            split_size: 64 * 1024,
            merge_fan_in: 64,
            reduce_batch: 1024,
            spill_dir: None,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; absent fields keep their defaults.
    ///
    /// # Errors
    /// [`EngineError::Config`] on malformed JSON or an invalid combination of values.
    pub fn from_json_str(s: &str) -> Result<Self, EngineError> {
        let cfg: EngineConfig =
            serde_json::from_str(s).map_err(|e| EngineError::config(format!("parse config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[must_use]
    pub fn with_memory_budget(mut self, records: usize) -> Self {
        self.memory_budget = records;
        self
    }

    #[must_use]
    pub fn with_partitions(mut self, n: usize) -> Self {
        self.partitions = n;
        self
    }

    #[must_use]
    pub fn with_max_workers(mut self, n: usize) -> Self {
        self.max_workers = n;
        self
    }

    #[must_use]
    pub fn with_split_size(mut self, records: usize) -> Self {
        self.split_size = records;
        self
    }

    #[must_use]
    pub fn with_merge_fan_in(mut self, runs: usize) -> Self {
        self.merge_fan_in = runs;
        self
    }

    #[must_use]
    pub fn with_reduce_batch(mut self, groups: usize) -> Self {
        self.reduce_batch = groups;
        self
    }

    #[must_use]
    pub fn with_spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spill_dir = Some(dir.into());
        self
    }

    /// # Errors
    /// [`EngineError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), EngineError> {
        let positive = [
            ("memory_budget", self.memory_budget),
            ("partitions", self.partitions),
            ("max_workers", self.max_workers),
            ("split_size", self.split_size),
            ("reduce_batch", self.reduce_batch),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(EngineError::config(format!("{name} must be at least 1")));
        }
        if self.merge_fan_in < 2 {
            return Err(EngineError::config("merge_fan_in must be at least 2"));
        }
        if self.memory_budget < self.max_workers {
            return Err(EngineError::config(format!(
                "memory_budget ({}) must be at least max_workers ({})",
                self.memory_budget, self.max_workers
            )));
        }
        Ok(())
    }
}
