//! K-way merge and grouping over key-sorted record sources.

use crate::datum::Datum;
use crate::error::EngineError;
use crate::record::{Group, Record};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Current head of one merge source. Equal keys resolve by source index so
/// that merging never reorders values that arrived in run order.
struct Head {
    record: Record,
    source: usize,
}

impl PartialEq for Head {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Head {}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Head {
    fn cmp(&self, other: &Self) -> Ordering {
        self.record
            .key
            .cmp(&other.record.key)
            .then(self.source.cmp(&other.source))
    }
}

/// Merge of sorted sources into one sorted sequence, O(n log k).
pub(crate) struct KMerge<I> {
    sources: Vec<I>,
    // BinaryHeap is a max-heap; Reverse makes it pop the smallest key.
    heap: BinaryHeap<Reverse<Head>>,
    failed: bool,
}

impl<I> KMerge<I>
where
    I: Iterator<Item = Result<Record, EngineError>>,
{
    pub(crate) fn new(mut sources: Vec<I>) -> Result<Self, EngineError> {
        let mut heap = BinaryHeap::with_capacity(sources.len());
        for (source, it) in sources.iter_mut().enumerate() {
            if let Some(first) = it.next() {
                heap.push(Reverse(Head {
                    record: first?,
                    source,
                }));
            }
        }
        Ok(Self {
            sources,
            heap,
            failed: false,
        })
    }
}

impl<I> Iterator for KMerge<I>
where
    I: Iterator<Item = Result<Record, EngineError>>,
{
    type Item = Result<Record, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let Reverse(min) = self.heap.pop()?;
        match self.sources[min.source].next() {
            Some(Ok(record)) => self.heap.push(Reverse(Head {
                record,
                source: min.source,
            })),
            Some(Err(e)) => {
                self.failed = true;
                return Some(Err(e));
            }
            None => {}
        }
        Some(Ok(min.record))
    }
}

/// Folds runs of equal keys from a sorted source into [`Group`]s.
pub(crate) struct Grouped<I> {
    inner: I,
    pending: Option<Record>,
    done: bool,
}

impl<I> Grouped<I> {
    pub(crate) fn new(inner: I) -> Self {
        Self {
            inner,
            pending: None,
            done: false,
        }
    }
}

impl<I> Iterator for Grouped<I>
where
    I: Iterator<Item = Result<Record, EngineError>>,
{
    type Item = Result<Group, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let first = match self.pending.take() {
            Some(rec) => rec,
            None => match self.inner.next()? {
                Ok(rec) => rec,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            },
        };
        let key: Datum = first.key;
        let mut values = vec![first.value];
        loop {
            match self.inner.next() {
                Some(Ok(rec)) if rec.key == key => values.push(rec.value),
                Some(Ok(rec)) => {
                    self.pending = Some(rec);
                    break;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => break,
            }
        }
        Some(Ok(Group { key, values }))
    }
}
