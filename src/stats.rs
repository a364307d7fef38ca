//! Per-stage execution counters.
//!
//! Collected by the runner for every stage and returned with the job output.
//! Both types serialize to JSON for reporting:
//!
//! ```no_run
//! # fn demo(out: ironshuffle::JobOutput) -> anyhow::Result<()> {
//! println!("{}", serde_json::to_string_pretty(&out.stats)?);
//! # Ok(())
//! # }
//! ```

use serde::Serialize;
use std::time::Duration;

#[derive(Clone, Debug, Default, Serialize)]
pub struct StageStats {
    pub name: String,
    /// Records read by the stage.
    pub input_records: usize,
    /// Records pushed into the shuffle (after the mapper, if any).
    pub mapped_records: usize,
    /// Sorted runs spilled by map workers.
    pub spilled_runs: usize,
    /// Deepest multi-pass merge over any partition.
    pub merge_passes: usize,
    /// Distinct keys, i.e. reducer invocations.
    pub groups: usize,
    pub output_records: usize,
    /// Highest number of unsorted records resident at once.
    pub peak_resident: usize,
    #[serde(with = "millis")]
    pub elapsed: Duration,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct JobStats {
    pub stages: Vec<StageStats>,
}

impl JobStats {
    /// Highest `peak_resident` across stages.
    pub fn peak_resident(&self) -> usize {
        self.stages.iter().map(|s| s.peak_resident).max().unwrap_or(0)
    }
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}
