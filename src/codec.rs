//! Sort-key encodings.
//!
//! The shuffle always sorts ascending by key. To get any other application
//! order (most reviewed first, ties by id) a stage attaches a [`KeyCodec`]:
//! emitted keys are encoded before they enter the shuffle and decoded again
//! before the reducer sees them. The ordering work then happens inside the
//! engine's external merge sort instead of in a reducer holding every record.
//!
//! Provided encodings:
//! - [`Natural`]: identity.
//! - [`Negate`]: `c -> -c`, descending by integer.
//! - [`ZeroPad`]: fixed-width decimal strings, for byte-wise comparators.
//!   Ascending or descending (nines' complement).
//! - [`Composite`]: one codec per tuple position, e.g. `(count desc, id asc)`.
//!
//! ```
//! use ironshuffle::codec::{KeyCodec, by_count_descending};
//! use ironshuffle::Datum;
//!
//! let codec = by_count_descending();
//! let hi = codec.encode(&Datum::from((10i64, "a"))).unwrap();
//! let lo = codec.encode(&Datum::from((3i64, "b"))).unwrap();
//! assert!(hi < lo);
//! assert_eq!(codec.decode(&hi).unwrap(), Datum::from((10i64, "a")));
//! ```

use crate::datum::Datum;
use crate::error::EngineError;
use std::fmt::Debug;
use std::sync::Arc;

/// Widest zero-padded encoding; `10^18 - 1` still fits an `i64`.
pub const MAX_PAD_WIDTH: usize = 18;

/// Order-defining bijection between application keys and sort keys.
pub trait KeyCodec: Send + Sync + Debug {
    /// Application key to sort key.
    ///
    /// # Errors
    /// [`EngineError::Schema`] when the key has the wrong shape for this codec,
    /// [`EngineError::EncodingOverflow`] when it is out of the encodable range.
    fn encode(&self, raw: &Datum) -> Result<Datum, EngineError>;

    /// Sort key back to application key.
    ///
    /// # Errors
    /// [`EngineError::Schema`] when `sort_key` was not produced by this codec.
    fn decode(&self, sort_key: &Datum) -> Result<Datum, EngineError>;
}

/// Identity encoding: natural ascending order.
#[derive(Clone, Copy, Debug, Default)]
pub struct Natural;

impl KeyCodec for Natural {
    fn encode(&self, raw: &Datum) -> Result<Datum, EngineError> {
        Ok(raw.clone())
    }

    fn decode(&self, sort_key: &Datum) -> Result<Datum, EngineError> {
        Ok(sort_key.clone())
    }
}

/// Integer negation: ascending engine order becomes descending application order.
#[derive(Clone, Copy, Debug, Default)]
pub struct Negate;

impl Negate {
    fn negate(d: &Datum) -> Result<Datum, EngineError> {
        let v = d.as_int().ok_or_else(|| {
            EngineError::schema(format!("negation needs an int key, got {}", d.shape()))
        })?;
        v.checked_neg()
            .map(Datum::Int)
            .ok_or(EngineError::EncodingOverflow { value: v, width: 0 })
    }
}

impl KeyCodec for Negate {
    fn encode(&self, raw: &Datum) -> Result<Datum, EngineError> {
        Negate::negate(raw)
    }

    fn decode(&self, sort_key: &Datum) -> Result<Datum, EngineError> {
        Negate::negate(sort_key)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadOrder {
    Ascending,
    Descending,
}

/// Fixed-width zero-padded decimal strings.
///
/// Byte-lexicographic order of the padded strings equals numeric order of the
/// counts, provided every count fits `width` digits. That bound is checked:
/// oversized or negative counts fail with [`EngineError::EncodingOverflow`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZeroPad {
    width: usize,
    order: PadOrder,
    max: i64,
}

impl ZeroPad {
    /// # Errors
    /// [`EngineError::Config`] unless `1 <= width <= MAX_PAD_WIDTH`.
    pub fn new(width: usize, order: PadOrder) -> Result<Self, EngineError> {
        if width == 0 || width > MAX_PAD_WIDTH {
            return Err(EngineError::config(format!(
                "zero-pad width must be within 1..={MAX_PAD_WIDTH}, got {width}"
            )));
        }
        // width <= 18, so this cannot overflow
        let max = 10i64.pow(width as u32) - 1;
        Ok(Self { width, order, max })
    }

    pub fn ascending(width: usize) -> Result<Self, EngineError> {
        Self::new(width, PadOrder::Ascending)
    }

    pub fn descending(width: usize) -> Result<Self, EngineError> {
        Self::new(width, PadOrder::Descending)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Largest count this encoding can represent.
    pub fn max_value(&self) -> i64 {
        self.max
    }

    fn flip(&self, v: i64) -> i64 {
        match self.order {
            PadOrder::Ascending => v,
            PadOrder::Descending => self.max - v,
        }
    }
}

impl KeyCodec for ZeroPad {
    fn encode(&self, raw: &Datum) -> Result<Datum, EngineError> {
        let v = raw.as_int().ok_or_else(|| {
            EngineError::schema(format!("zero-pad needs an int key, got {}", raw.shape()))
        })?;
        if !(0..=self.max).contains(&v) {
            return Err(EngineError::EncodingOverflow {
                value: v,
                width: self.width,
            });
        }
        Ok(Datum::Str(format!("{:0width$}", self.flip(v), width = self.width)))
    }

    fn decode(&self, sort_key: &Datum) -> Result<Datum, EngineError> {
        let s = sort_key
            .as_str()
            .filter(|s| s.len() == self.width && s.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| {
                EngineError::schema(format!(
                    "{sort_key} is not a {}-digit zero-padded key",
                    self.width
                ))
            })?;
        let v: i64 = s
            .parse()
            .map_err(|_| EngineError::schema(format!("unparseable padded key {s:?}")))?;
        Ok(Datum::Int(self.flip(v)))
    }
}

/// One codec per position of a tuple key.
#[derive(Clone, Debug)]
pub struct Composite {
    fields: Vec<Arc<dyn KeyCodec>>,
}

impl Composite {
    pub fn new(fields: Vec<Arc<dyn KeyCodec>>) -> Self {
        Self { fields }
    }

    fn apply(
        &self,
        key: &Datum,
        f: impl Fn(&dyn KeyCodec, &Datum) -> Result<Datum, EngineError>,
    ) -> Result<Datum, EngineError> {
        let parts = key
            .as_tuple()
            .filter(|parts| parts.len() == self.fields.len())
            .ok_or_else(|| {
                EngineError::schema(format!(
                    "composite codec expects a {}-tuple key, got {}",
                    self.fields.len(),
                    key.shape()
                ))
            })?;
        parts
            .iter()
            .zip(&self.fields)
            .map(|(part, codec)| f(codec.as_ref(), part))
            .collect::<Result<Vec<_>, _>>()
            .map(Datum::Tuple)
    }
}

impl KeyCodec for Composite {
    fn encode(&self, raw: &Datum) -> Result<Datum, EngineError> {
        self.apply(raw, |c, d| c.encode(d))
    }

    fn decode(&self, sort_key: &Datum) -> Result<Datum, EngineError> {
        self.apply(sort_key, |c, d| c.decode(d))
    }
}

/// `(count, id)` keys ordered by count descending, then id ascending.
pub fn by_count_descending() -> Composite {
    Composite::new(vec![Arc::new(Negate), Arc::new(Natural)])
}
