//! Ready-made jobs over MovieLens-style rating rows (`user,movie,rating,timestamp`).
//!
//! The input value of every record is either a tuple of string fields (as
//! produced by [`crate::io::read_csv`]) or one raw comma-separated line.
//!
//! The ranked jobs never sort in a reducer. Their second stage re-keys each
//! `(id, count)` as `(count, id)` under a descending key codec and lets the
//! shuffle produce the order:
//!
//! ```
//! use ironshuffle::jobs::{RankBy, ratings_per_user_ranked};
//! use ironshuffle::{Datum, RecordStream};
//!
//! let input = RecordStream::from_pairs(vec![
//!     ((), "1023,31,2.5,1260759144"),
//!     ((), "7,10,4.0,1260759179"),
//!     ((), "1023,1029,3.0,1260759185"),
//! ]);
//! let out = ratings_per_user_ranked(RankBy::Negation)
//!     .unwrap()
//!     .run(input)
//!     .unwrap()
//!     .records
//!     .to_pairs()
//!     .unwrap();
//! assert_eq!(
//!     out,
//!     vec![(Datum::from("1023"), Datum::Int(2)), (Datum::from("7"), Datum::Int(1))]
//! );
//! ```

use crate::codec::{Composite, KeyCodec, Natural, ZeroPad, by_count_descending};
use crate::datum::Datum;
use crate::error::EngineError;
use crate::job::{Job, Stage};
use crate::record::Emitter;
use anyhow::{Context, Result, bail};
use std::sync::Arc;

/// One parsed rating row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RatingRow {
    pub user: String,
    pub movie: String,
    /// Kept verbatim (`"2.5"`), it is only ever used as a key.
    pub rating: String,
    pub timestamp: i64,
}

impl RatingRow {
    /// Parse a row from a tuple of fields or a comma-separated line.
    ///
    /// # Errors
    /// If the row does not have exactly four fields or the timestamp is not an
    /// integer.
    pub fn from_datum(value: &Datum) -> Result<Self> {
        let fields: Vec<&str> = match value {
            Datum::Str(line) => line.trim_end_matches(['\r', '\n']).split(',').collect(),
            Datum::Tuple(parts) => parts
                .iter()
                .map(|p| p.as_str().context("rating field is not a string"))
                .collect::<Result<_>>()?,
            other => bail!("expected a rating row, got {other}"),
        };
        let [user, movie, rating, timestamp] = fields.as_slice() else {
            bail!("expected 4 rating fields, got {}: {value}", fields.len());
        };
        Ok(Self {
            user: user.trim().to_string(),
            movie: movie.trim().to_string(),
            rating: rating.trim().to_string(),
            timestamp: timestamp
                .trim()
                .parse()
                .with_context(|| format!("bad timestamp {timestamp:?}"))?,
        })
    }
}

/// How the ranking stage orders counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RankBy {
    /// Integer keys, negated.
    Negation,
    /// Fixed-width descending decimal strings; counts must fit in `width` digits.
    ZeroPadded { width: usize },
}

impl RankBy {
    fn codec(self) -> Result<Composite, EngineError> {
        match self {
            RankBy::Negation => Ok(by_count_descending()),
            RankBy::ZeroPadded { width } => {
                let count: Arc<dyn KeyCodec> = Arc::new(ZeroPad::descending(width)?);
                Ok(Composite::new(vec![count, Arc::new(Natural)]))
            }
        }
    }
}

fn sum_counts(key: &Datum, values: Vec<Datum>, out: &mut Emitter) -> Result<()> {
    let mut total: i64 = 0;
    for v in &values {
        let n = v.as_int().with_context(|| format!("count for {key} is not an integer: {v}"))?;
        total = total.checked_add(n).context("count overflow")?;
    }
    out.emit(key.clone(), total);
    Ok(())
}

/// One counting stage keyed by `field` of each row.
fn count_by(name: &str, field: fn(RatingRow) -> String) -> Stage {
    Stage::new(name)
        .mapper(move |_k, value, out| {
            let row = RatingRow::from_datum(value)?;
            out.emit(field(row), 1i64);
            Ok(())
        })
        .reducer(sum_counts)
}

/// Re-key `(id, count)` as `(count, id)` and emit `(id, count)` in sort order.
fn rank_stage(rank: RankBy) -> Result<Stage, EngineError> {
    Ok(Stage::new("rank")
        .mapper(|id, count, out| {
            let n = count.as_int().with_context(|| format!("count for {id} is not an integer"))?;
            out.emit((n, id.clone()), ());
            Ok(())
        })
        .reducer(|key, _values, out| {
            match key.as_tuple() {
                Some([count, id]) => out.emit(id.clone(), count.clone()),
                _ => bail!("unexpected ranking key {key}"),
            }
            Ok(())
        })
        .key_codec(rank.codec()?))
}

/// `(rating, count)` for every rating value, ascending by rating.
pub fn rating_histogram() -> Job {
    Job::new().stage(count_by("histogram", |r| r.rating))
}

/// `(user, count)` of ratings per user, ascending by user id.
pub fn ratings_per_user() -> Job {
    Job::new().stage(count_by("count-per-user", |r| r.user))
}

/// `(user, count)` ordered by count descending, ties by user id.
///
/// # Errors
/// [`EngineError::Config`] for an invalid padding width.
pub fn ratings_per_user_ranked(rank: RankBy) -> Result<Job, EngineError> {
    Ok(Job::new()
        .stage(count_by("count-per-user", |r| r.user))
        .stage(rank_stage(rank)?))
}

/// `(movie, count)` of reviews ordered by count descending, ties by movie id.
///
/// # Errors
/// [`EngineError::Config`] for an invalid padding width.
pub fn most_reviewed_movies(rank: RankBy) -> Result<Job, EngineError> {
    Ok(Job::new()
        .stage(count_by("count-per-movie", |r| r.movie))
        .stage(rank_stage(rank)?))
}
