//! Transparent gzip for input and output files.
//!
//! Input is detected by extension (`.gz`, `.gzip`) first and by the gzip magic
//! bytes second, so a compressed file with a plain name still reads correctly.
//! Output is compressed only when the path asks for it.
//!
//! Without the `compression-gzip` feature a gzip input is an error rather than
//! a stream of garbage rows.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const GZIP_EXTENSIONS: [&str; 2] = [".gz", ".gzip"];

/// Compression of a file, as detected from its name or content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
}

impl Compression {
    /// Detect from the file name alone.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let name = path.as_ref().to_string_lossy().to_lowercase();
        if GZIP_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
            Compression::Gzip
        } else {
            Compression::None
        }
    }

    /// Detect from the first bytes of a buffered reader. The reader is not advanced.
    fn from_magic<R: BufRead>(reader: &mut R) -> Self {
        match reader.fill_buf() {
            Ok(buf) if buf.starts_with(&GZIP_MAGIC) => Compression::Gzip,
            _ => Compression::None,
        }
    }
}

/// Open `path` for reading, decompressing if it is gzip.
///
/// # Errors
/// If the file cannot be opened, or it is gzip and the `compression-gzip`
/// feature is disabled.
pub fn open_reader(path: impl AsRef<Path>) -> Result<Box<dyn Read>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(f);
    let detected = match Compression::from_path(path) {
        Compression::None => Compression::from_magic(&mut reader),
        gz => gz,
    };
    match detected {
        Compression::None => Ok(Box::new(reader)),
        Compression::Gzip => gzip_reader(reader, path),
    }
}

#[cfg(feature = "compression-gzip")]
fn gzip_reader(reader: BufReader<File>, _path: &Path) -> Result<Box<dyn Read>> {
    Ok(Box::new(flate2::bufread::MultiGzDecoder::new(reader)))
}

#[cfg(not(feature = "compression-gzip"))]
fn gzip_reader(_reader: BufReader<File>, path: &Path) -> Result<Box<dyn Read>> {
    anyhow::bail!(
        "{} is gzip-compressed; enable the `compression-gzip` feature",
        path.display()
    )
}

/// A file being written, compressed when its name ends in `.gz`.
///
/// Call [`OutputFile::finish`] to flush; dropping it without finishing may
/// leave a truncated gzip trailer.
pub enum OutputFile {
    Plain(BufWriter<File>),
    #[cfg(feature = "compression-gzip")]
    Gzip(flate2::write::GzEncoder<BufWriter<File>>),
}

impl OutputFile {
    /// Create `path` (and its parent directories).
    ///
    /// # Errors
    /// If the file cannot be created, or a `.gz` path is requested without the
    /// `compression-gzip` feature.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let w = BufWriter::new(f);
        match Compression::from_path(path) {
            Compression::None => Ok(OutputFile::Plain(w)),
            #[cfg(feature = "compression-gzip")]
            Compression::Gzip => Ok(OutputFile::Gzip(flate2::write::GzEncoder::new(
                w,
                flate2::Compression::default(),
            ))),
            #[cfg(not(feature = "compression-gzip"))]
            Compression::Gzip => anyhow::bail!(
                "{} asks for gzip; enable the `compression-gzip` feature",
                path.display()
            ),
        }
    }

    /// Flush everything, writing the gzip trailer if compressed.
    ///
    /// # Errors
    /// Any I/O error while flushing.
    pub fn finish(self) -> Result<()> {
        match self {
            OutputFile::Plain(mut w) => w.flush().context("flush output"),
            #[cfg(feature = "compression-gzip")]
            OutputFile::Gzip(gz) => {
                let mut w = gz.finish().context("finish gzip stream")?;
                w.flush().context("flush output")
            }
        }
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            OutputFile::Plain(w) => w.write(buf),
            #[cfg(feature = "compression-gzip")]
            OutputFile::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            OutputFile::Plain(w) => w.flush(),
            #[cfg(feature = "compression-gzip")]
            OutputFile::Gzip(w) => w.flush(),
        }
    }
}
