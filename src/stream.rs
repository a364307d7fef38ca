//! Lazy, restartable record streams.
//!
//! A [`RecordStream`] is an ordered list of segments. A segment is either a
//! slice of a shared in-memory vector or a spilled part file. Cloning a stream
//! is cheap (it clones `Arc`s), and every call to [`RecordStream::iter`] starts
//! from the beginning again, so a stream can be read any number of times.
//!
//! Streams produced by a job are always spill-backed: each stage writes its
//! output as part files of `split_size` records, and the next stage maps those
//! parts as independent splits.

use crate::config::EngineConfig;
use crate::datum::Datum;
use crate::error::EngineError;
use crate::record::Record;
use crate::spill::{RunFile, RunReader, RunWriter, SpillArea};
use std::sync::Arc;

#[derive(Clone, Debug)]
enum Segment {
    Memory {
        data: Arc<Vec<Record>>,
        start: usize,
        end: usize,
    },
    Part(RunFile),
}

impl Segment {
    fn len(&self) -> usize {
        match self {
            Segment::Memory { start, end, .. } => end - start,
            Segment::Part(run) => run.records(),
        }
    }

    fn iter(&self) -> SegmentIter {
        match self {
            Segment::Memory { data, start, end } => SegmentIter::Memory {
                data: Arc::clone(data),
                pos: *start,
                end: *end,
            },
            Segment::Part(run) => match run.open() {
                Ok(reader) => SegmentIter::Part(reader),
                Err(e) => SegmentIter::Failed(Some(e)),
            },
        }
    }
}

enum SegmentIter {
    Memory {
        data: Arc<Vec<Record>>,
        pos: usize,
        end: usize,
    },
    Part(RunReader),
    Failed(Option<EngineError>),
}

impl Iterator for SegmentIter {
    type Item = Result<Record, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            SegmentIter::Memory { data, pos, end } => {
                if *pos >= *end {
                    return None;
                }
                let rec = data[*pos].clone();
                *pos += 1;
                Some(Ok(rec))
            }
            SegmentIter::Part(reader) => reader.next(),
            SegmentIter::Failed(e) => e.take().map(Err),
        }
    }
}

/// An ordered, re-readable sequence of records.
#[derive(Clone, Debug, Default)]
pub struct RecordStream {
    segments: Vec<Segment>,
    len: usize,
}

impl RecordStream {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap an in-memory vector. Splits borrow ranges of it without copying.
    pub fn from_records(records: Vec<Record>) -> Self {
        let len = records.len();
        if len == 0 {
            return Self::empty();
        }
        Self {
            segments: vec![Segment::Memory {
                data: Arc::new(records),
                start: 0,
                end: len,
            }],
            len,
        }
    }

    /// Build from anything convertible to `(key, value)` data.
    ///
    /// ```
    /// use ironshuffle::RecordStream;
    ///
    /// let s = RecordStream::from_pairs(vec![("1023", 1i64), ("7", 1)]);
    /// assert_eq!(s.len(), 2);
    /// ```
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Datum>,
        V: Into<Datum>,
    {
        Self::from_records(pairs.into_iter().map(Record::from).collect())
    }

    /// Drain an iterator to spill storage without holding it in memory.
    ///
    /// Part files of `config.split_size` records are written under
    /// `config.spill_dir`; they are deleted when the stream (and every clone of
    /// it) is dropped.
    ///
    /// # Errors
    /// [`EngineError::Resource`] if the spill area cannot be written.
    pub fn spill_from_iter<I>(records: I, config: &EngineConfig) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = Record>,
    {
        let area = SpillArea::new(config.spill_dir.as_deref(), "input")?;
        let mut w = StreamWriter::new(area, "input", config.split_size);
        for rec in records {
            w.push(&rec)?;
        }
        w.finish()
    }

    fn from_parts(parts: Vec<RunFile>) -> Self {
        let segments: Vec<Segment> = parts
            .into_iter()
            .filter(|p| p.records() > 0)
            .map(Segment::Part)
            .collect();
        let len = segments.iter().map(Segment::len).sum();
        Self { segments, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate from the start. Spilled parts are read lazily.
    pub fn iter(&self) -> RecordIter {
        RecordIter {
            segments: self.segments.clone(),
            next_segment: 0,
            current: None,
        }
    }

    /// Materialize every record.
    ///
    /// # Errors
    /// The first read error from a spilled part.
    pub fn to_vec(&self) -> Result<Vec<Record>, EngineError> {
        self.iter().collect()
    }

    /// Materialize as `(key, value)` tuples.
    ///
    /// # Errors
    /// The first read error from a spilled part.
    pub fn to_pairs(&self) -> Result<Vec<(Datum, Datum)>, EngineError> {
        self.iter().map(|r| r.map(Record::into_pair)).collect()
    }

    /// Cut into independently readable splits of at most `split_size` records
    /// (part files are already at most that size and become one split each).
    pub(crate) fn splits(&self, split_size: usize) -> Vec<Split> {
        let step = split_size.max(1);
        let mut out = Vec::new();
        for seg in &self.segments {
            match seg {
                Segment::Memory { data, start, end } => {
                    let mut s = *start;
                    while s < *end {
                        let e = (s + step).min(*end);
                        out.push(Split(Segment::Memory {
                            data: Arc::clone(data),
                            start: s,
                            end: e,
                        }));
                        s = e;
                    }
                }
                Segment::Part(_) => out.push(Split(seg.clone())),
            }
        }
        out
    }
}

impl<'a> IntoIterator for &'a RecordStream {
    type Item = Result<Record, EngineError>;
    type IntoIter = RecordIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`RecordStream`].
pub struct RecordIter {
    segments: Vec<Segment>,
    next_segment: usize,
    current: Option<SegmentIter>,
}

impl Iterator for RecordIter {
    type Item = Result<Record, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(cur) = self.current.as_mut()
                && let Some(item) = cur.next()
            {
                return Some(item);
            }
            let seg = self.segments.get(self.next_segment)?;
            self.next_segment += 1;
            self.current = Some(seg.iter());
        }
    }
}

/// One unit of map work.
#[derive(Clone, Debug)]
pub(crate) struct Split(Segment);

impl Split {
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = Result<Record, EngineError>> {
        self.0.iter()
    }
}

/// Writes a stream as rotating part files.
pub(crate) struct StreamWriter {
    area: Arc<SpillArea>,
    tag: String,
    part_size: usize,
    current: Option<RunWriter>,
    parts: Vec<RunFile>,
}

impl StreamWriter {
    pub(crate) fn new(area: Arc<SpillArea>, tag: &str, part_size: usize) -> Self {
        Self {
            area,
            tag: tag.to_string(),
            part_size: part_size.max(1),
            current: None,
            parts: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, rec: &Record) -> Result<(), EngineError> {
        let mut w = match self.current.take() {
            Some(w) => w,
            None => self.area.create_run(&self.tag)?,
        };
        w.write(rec)?;
        if w.records() >= self.part_size {
            self.parts.push(w.finish()?);
        } else {
            self.current = Some(w);
        }
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Result<RecordStream, EngineError> {
        if let Some(w) = self.current.take() {
            self.parts.push(w.finish()?);
        }
        Ok(RecordStream::from_parts(self.parts))
    }
}
