//! Delimited input as a [`RecordStream`].
//!
//! Each data row becomes one record keyed by its 0-based row number (header
//! excluded) with the raw fields as a tuple of strings. Parsing into typed
//! columns is the mapper's job; see [`crate::jobs::RatingRow`].

use super::compression::open_reader;
use crate::config::EngineConfig;
use crate::datum::Datum;
use crate::record::Record;
use crate::stream::RecordStream;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Read a CSV file into a spill-backed stream.
///
/// Rows are streamed straight to part files of `config.split_size` records,
/// so the file is never held in memory. Rows may have differing field counts.
/// Gzip input is decompressed transparently (feature `compression-gzip`).
///
/// # Errors
/// If the file cannot be opened or decoded, a row is not valid UTF-8, or the
/// spill area cannot be written.
pub fn read_csv(
    path: impl AsRef<Path>,
    has_headers: bool,
    config: &EngineConfig,
) -> Result<RecordStream> {
    let path = path.as_ref();
    let reader = open_reader(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(reader);

    let mut failure = None;
    let rows = rdr.records().enumerate().map_while(|(i, row)| match row {
        Ok(row) => Some(Record {
            key: Datum::Int(i as i64),
            value: Datum::tuple(row.iter().map(Datum::from)),
        }),
        Err(e) => {
            failure = Some(anyhow::Error::new(e).context(format!("parse CSV record #{}", i + 1)));
            None
        }
    });
    let stream = RecordStream::spill_from_iter(rows, config)
        .with_context(|| format!("spill rows of {}", path.display()))?;
    if let Some(e) = failure {
        return Err(e.context(format!("read {}", path.display())));
    }
    debug!(path = %path.display(), rows = stream.len(), "read csv");
    Ok(stream)
}
