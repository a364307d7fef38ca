//! Records, groups, and the emitter handed to mapper and reducer callables.

use crate::datum::Datum;
use serde::{Deserialize, Serialize};

/// A single `(key, value)` pair. Immutable once emitted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub key: Datum,
    pub value: Datum,
}

impl Record {
    pub fn new(key: impl Into<Datum>, value: impl Into<Datum>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Split into a plain tuple.
    pub fn into_pair(self) -> (Datum, Datum) {
        (self.key, self.value)
    }
}

impl<K: Into<Datum>, V: Into<Datum>> From<(K, V)> for Record {
    fn from((k, v): (K, V)) -> Self {
        Record::new(k, v)
    }
}

/// All values emitted under one key, delivered to exactly one reducer invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub key: Datum,
    pub values: Vec<Datum>,
}

/// Collects the records a mapper or reducer produces for one invocation.
///
/// A fresh emitter is used for every invocation, so callables never observe
/// each other's output.
#[derive(Debug, Default)]
pub struct Emitter {
    out: Vec<Record>,
}

impl Emitter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Emit one output record.
    pub fn emit(&mut self, key: impl Into<Datum>, value: impl Into<Datum>) {
        self.out.push(Record::new(key, value));
    }

    /// Number of records emitted so far.
    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub(crate) fn into_records(self) -> Vec<Record> {
        self.out
    }
}
