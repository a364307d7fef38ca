//! Spill storage for sorted runs and materialized stage output.
//!
//! A [`SpillArea`] is a temporary directory owned through an `Arc`: every
//! [`RunFile`] written into it holds a clone, so the directory (and anything
//! left in it) is removed once the last run referencing it is dropped. This is
//! also how an aborted job discards its partially spilled runs.
//!
//! Run format: a sequence of frames, each a little-endian `u32` byte length
//! followed by the postcard encoding of one [`Record`].

use crate::error::EngineError;
use crate::record::Record;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::TempDir;

const IO_BUF: usize = 64 * 1024;

#[derive(Debug)]
pub(crate) struct SpillArea {
    dir: TempDir,
    next_id: AtomicU64,
}

impl SpillArea {
    /// Create a fresh area under `parent`, or the system temp dir.
    pub(crate) fn new(parent: Option<&Path>, label: &str) -> Result<Arc<Self>, EngineError> {
        let mut builder = tempfile::Builder::new();
        let prefix = format!("ironshuffle-{label}-");
        builder.prefix(&prefix);
        let dir = match parent {
            Some(p) => {
                fs::create_dir_all(p).map_err(|e| {
                    EngineError::resource(format!("create spill parent {}", p.display()), e)
                })?;
                builder.tempdir_in(p)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| EngineError::resource("create spill area", e))?;
        Ok(Arc::new(Self {
            dir,
            next_id: AtomicU64::new(0),
        }))
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Open a new, empty run for writing.
    pub(crate) fn create_run(self: &Arc<Self>, tag: &str) -> Result<RunWriter, EngineError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.path().join(format!("{tag}-{id:08}.run"));
        let file = File::create(&path)
            .map_err(|e| EngineError::resource(format!("create run {}", path.display()), e))?;
        Ok(RunWriter {
            writer: BufWriter::with_capacity(IO_BUF, file),
            path,
            records: 0,
            area: Arc::clone(self),
        })
    }
}

pub(crate) struct RunWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    records: usize,
    area: Arc<SpillArea>,
}

impl RunWriter {
    pub(crate) fn write(&mut self, rec: &Record) -> Result<(), EngineError> {
        let bytes = postcard::to_allocvec(rec).map_err(|e| {
            EngineError::resource(
                format!("encode frame for {}", self.path.display()),
                io::Error::new(io::ErrorKind::InvalidData, e.to_string()),
            )
        })?;
        let len = u32::try_from(bytes.len()).map_err(|_| {
            EngineError::resource(
                format!("write {}", self.path.display()),
                io::Error::new(io::ErrorKind::InvalidData, "record frame larger than 4 GiB"),
            )
        })?;
        self.writer
            .write_all(&len.to_le_bytes())
            .and_then(|_| self.writer.write_all(&bytes))
            .map_err(|e| EngineError::resource(format!("write {}", self.path.display()), e))?;
        self.records += 1;
        Ok(())
    }

    pub(crate) fn records(&self) -> usize {
        self.records
    }

    /// Flush and seal the run.
    pub(crate) fn finish(mut self) -> Result<RunFile, EngineError> {
        self.writer
            .flush()
            .map_err(|e| EngineError::resource(format!("flush {}", self.path.display()), e))?;
        Ok(RunFile {
            path: self.path,
            records: self.records,
            _area: self.area,
        })
    }
}

/// A sealed, re-readable run.
#[derive(Clone, Debug)]
pub(crate) struct RunFile {
    path: PathBuf,
    records: usize,
    _area: Arc<SpillArea>,
}

impl RunFile {
    pub(crate) fn records(&self) -> usize {
        self.records
    }

    pub(crate) fn open(&self) -> Result<RunReader, EngineError> {
        let file = File::open(&self.path)
            .map_err(|e| EngineError::resource(format!("open run {}", self.path.display()), e))?;
        Ok(RunReader {
            reader: BufReader::with_capacity(IO_BUF, file),
            path: self.path.clone(),
            buf: Vec::new(),
            done: false,
        })
    }

    /// Delete the file now rather than when the area goes away.
    pub(crate) fn remove(self) -> Result<(), EngineError> {
        fs::remove_file(&self.path)
            .map_err(|e| EngineError::resource(format!("remove run {}", self.path.display()), e))
    }
}

pub(crate) struct RunReader {
    reader: BufReader<File>,
    path: PathBuf,
    buf: Vec<u8>,
    done: bool,
}

impl RunReader {
    fn read_frame(&mut self) -> Result<Option<Record>, EngineError> {
        let mut len = [0u8; 4];
        // A clean EOF may only happen on a frame boundary.
        let mut filled = 0;
        while filled < len.len() {
            let n = self
                .reader
                .read(&mut len[filled..])
                .map_err(|e| EngineError::resource(format!("read {}", self.path.display()), e))?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(EngineError::resource(
                    format!("read {}", self.path.display()),
                    io::Error::new(io::ErrorKind::UnexpectedEof, "truncated frame header"),
                ));
            }
            filled += n;
        }
        self.buf.resize(u32::from_le_bytes(len) as usize, 0);
        self.reader
            .read_exact(&mut self.buf)
            .map_err(|e| EngineError::resource(format!("read {}", self.path.display()), e))?;
        postcard::from_bytes(&self.buf).map(Some).map_err(|e| {
            EngineError::resource(
                format!("decode frame in {}", self.path.display()),
                io::Error::new(io::ErrorKind::InvalidData, e.to_string()),
            )
        })
    }
}

impl Iterator for RunReader {
    type Item = Result<Record, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_frame() {
            Ok(Some(rec)) => Some(Ok(rec)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Write a whole sequence of records as one run.
pub(crate) fn write_run<'a>(
    area: &Arc<SpillArea>,
    tag: &str,
    records: impl IntoIterator<Item = &'a Record>,
) -> Result<RunFile, EngineError> {
    let mut w = area.create_run(tag)?;
    for rec in records {
        w.write(rec)?;
    }
    w.finish()
}
