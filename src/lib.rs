//! # ironshuffle
//!
//! A single-process, multi-worker **map/reduce engine** whose central concern
//! is producing globally sorted, grouped output over inputs far larger than
//! memory. Sorting happens in the shuffle (bounded sort batches, spilled runs,
//! k-way merges), never inside a reducer holding every record.
//!
//! ## Key Features
//!
//! - **Multi-stage jobs** - one stage's output feeds the next
//! - **Shuffle / sort / group** - every value of a key reaches exactly one reducer call, in key order
//! - **Bounded memory** - an instrumented budget caps resident unsorted records
//! - **Sort-key encodings** - negation, fixed-width zero padding and composite keys express
//!   descending and secondary orders without application-side sorting
//! - **Parallel workers** - mapper, merge and reducer work on a rayon pool, results re-sequenced
//! - **I/O helpers** - CSV input (gzip aware) and tab-separated JSON output
//!
//! ## Quick Start
//!
//! ```
//! use ironshuffle::codec::by_count_descending;
//! use ironshuffle::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! // Count per user, then rank by count descending (ties by user id).
//! let job = Job::new()
//!     .stage(
//!         Stage::new("count")
//!             .mapper(|_k, user, out| {
//!                 out.emit(user.clone(), 1i64);
//!                 Ok(())
//!             })
//!             .reducer(|user, ones, out| {
//!                 out.emit(user.clone(), ones.len() as i64);
//!                 Ok(())
//!             }),
//!     )
//!     .stage(
//!         Stage::new("rank")
//!             .mapper(|user, count, out| {
//!                 out.emit((count.clone(), user.clone()), ());
//!                 Ok(())
//!             })
//!             .reducer(|key, _, out| {
//!                 if let Some([count, user]) = key.as_tuple() {
//!                     out.emit(user.clone(), count.clone());
//!                 }
//!                 Ok(())
//!             })
//!             .key_codec(by_count_descending()),
//!     );
//!
//! let input = RecordStream::from_pairs(vec![((), "1023"), ((), "1023"), ((), "7")]);
//! let runner = Runner::new(EngineConfig::default().with_max_workers(2))?;
//! let out = runner.run(&job, input)?;
//! assert_eq!(
//!     out.records.to_pairs()?,
//!     vec![(Datum::from("1023"), Datum::Int(2)), (Datum::from("7"), Datum::Int(1))]
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Datum and Record
//!
//! Keys and values are dynamic [`Datum`]s (`Null`, `Int`, `Str`, `Tuple`). A
//! [`Record`] is one `(key, value)` pair; a [`Group`] is a key with every value
//! emitted under it.
//!
//! ### Stage and Job
//!
//! A [`Stage`] has an optional mapper, an optional reducer and a
//! [`KeyCodec`](codec::KeyCodec). A [`Job`] is an ordered list of stages. The
//! [`Runner`] drives each stage through `Mapping → Shuffling → Reducing → Done`
//! and reports failures as a [`JobError`] naming the stage and phase.
//!
//! ### Shuffle
//!
//! [`shuffle`] partitions records by key hash, sorts bounded batches and
//! spills them as runs, merges each partition's runs and then all partitions,
//! and folds equal keys into groups. Peak memory is governed by
//! [`EngineConfig::memory_budget`], not by input size.
//!
//! ### Key codecs
//!
//! The shuffle only sorts ascending. A stage that wants "most first" encodes
//! its keys ([`codec::Negate`], [`codec::ZeroPad`]) and the reducer sees them
//! decoded again.
//!
//! ## Feature Flags
//!
//! - `io-csv` (default) - [`io::read_csv`]
//! - `compression-gzip` (default) - transparent gzip input and `.gz` output
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events (job and stage progress at `info`,
//! spills, merges and reduce windows at `debug`). Install a subscriber to see
//! them.

pub mod budget;
pub mod codec;
pub mod config;
pub mod datum;
pub mod error;
pub mod io;
pub mod job;
pub mod jobs;
pub mod pool;
pub mod record;
pub mod runner;
pub mod shuffle;
mod spill;
pub mod stats;
pub mod stream;
pub mod testing;

// General re-exports
pub use budget::MemoryBudget;
pub use codec::{Composite, KeyCodec, Natural, Negate, PadOrder, ZeroPad};
pub use config::EngineConfig;
pub use datum::{Datum, KeyShape};
pub use error::{CallableRole, EngineError, JobError, StagePhase};
pub use job::{Job, Mapper, Reducer, Stage};
pub use pool::{AbortSignal, WorkerPool};
pub use record::{Emitter, Group, Record};
pub use runner::{JobOutput, Runner};
pub use shuffle::{GroupStream, Shuffle, ShuffleStats, ShuffleWriter, shuffle_stream};
pub use stats::{JobStats, StageStats};
pub use stream::{RecordIter, RecordStream};

// Gated re-exports
#[cfg(feature = "io-csv")]
pub use io::read_csv;
pub use io::{write_tsv, write_tsv_file};
