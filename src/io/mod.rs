//! Thin input/output collaborators.
//!
//! The engine only ever sees [`RecordStream`]s; these helpers turn files into
//! streams and streams into files.

pub mod compression;

#[cfg_attr(docsrs, doc(cfg(feature = "io-csv")))]
#[cfg(feature = "io-csv")]
pub mod csv;

#[cfg(feature = "io-csv")]
pub use self::csv::read_csv;

use crate::record::Record;
use crate::stream::RecordStream;
use anyhow::{Context, Result};
use compression::OutputFile;
use std::io::Write;
use std::path::Path;

/// Write `json(key) \t json(value)` lines, one per record, in stream order.
///
/// Returns the number of lines written.
///
/// # Errors
/// If a spilled part cannot be read or the writer fails.
///
/// ```
/// use ironshuffle::{RecordStream, io::write_tsv};
///
/// let s = RecordStream::from_pairs(vec![("1023", 2i64), ("7", 1)]);
/// let mut out = Vec::new();
/// write_tsv(&s, &mut out).unwrap();
/// assert_eq!(String::from_utf8(out).unwrap(), "\"1023\"\t2\n\"7\"\t1\n");
/// ```
pub fn write_tsv<W: Write>(stream: &RecordStream, mut writer: W) -> Result<usize> {
    let mut n = 0;
    for rec in stream {
        let Record { key, value } = rec.context("read stream")?;
        writeln!(writer, "{}\t{}", key.to_json(), value.to_json())
            .with_context(|| format!("write line #{}", n + 1))?;
        n += 1;
    }
    writer.flush().context("flush output")?;
    Ok(n)
}

/// [`write_tsv`] to a file, gzip-compressed when the name ends in `.gz`.
///
/// # Errors
/// See [`write_tsv`] and [`OutputFile::create`].
pub fn write_tsv_file(stream: &RecordStream, path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    let mut out = OutputFile::create(path)?;
    let n = write_tsv(stream, &mut out).with_context(|| format!("write {}", path.display()))?;
    out.finish()
        .with_context(|| format!("close {}", path.display()))?;
    Ok(n)
}
