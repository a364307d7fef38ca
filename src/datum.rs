//! Dynamic payloads for keys and values.
//!
//! The engine treats keys and values as opaque [`Datum`]s. A `Datum` is a small
//! serde-serializable tree: integers, strings, fixed-arity tuples and a null
//! marker. That is enough to express every job in the crate (counts, ids,
//! composite ranking keys such as `(count, id)`) while staying cheap to spill.
//!
//! Ordering is derived: variants compare in declaration order, tuples compare
//! lexicographically by position. Comparing two keys of *different* shape is
//! well-defined but meaningless, which is why the shuffle checks every key's
//! [`KeyShape`] before buffering it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A key or value flowing through a job.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Datum {
    /// Absent value, e.g. the value half of a key-only record.
    Null,
    /// Signed integer scalar.
    Int(i64),
    /// UTF-8 string scalar.
    Str(String),
    /// Fixed-arity ordered tuple of data.
    Tuple(Vec<Datum>),
}

/// Structural type of a [`Datum`]; two keys are comparable iff their shapes match.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyShape {
    Null,
    Int,
    Str,
    Tuple(Vec<KeyShape>),
}

impl KeyShape {
    /// Whether `d` has exactly this shape, without allocating a new shape.
    pub fn matches(&self, d: &Datum) -> bool {
        match (self, d) {
            (KeyShape::Null, Datum::Null)
            | (KeyShape::Int, Datum::Int(_))
            | (KeyShape::Str, Datum::Str(_)) => true,
            (KeyShape::Tuple(shapes), Datum::Tuple(fields)) => {
                shapes.len() == fields.len() && shapes.iter().zip(fields).all(|(s, f)| s.matches(f))
            }
            _ => false,
        }
    }
}

impl fmt::Display for KeyShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyShape::Null => write!(f, "null"),
            KeyShape::Int => write!(f, "int"),
            KeyShape::Str => write!(f, "str"),
            KeyShape::Tuple(fields) => {
                write!(f, "(")?;
                for (i, s) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{s}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl Datum {
    /// Build a tuple datum from anything convertible.
    pub fn tuple<I, D>(fields: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Datum>,
    {
        Datum::Tuple(fields.into_iter().map(Into::into).collect())
    }

    /// Convert an unsigned count, returning `None` above `i64::MAX`.
    pub fn try_from_u64(v: u64) -> Option<Self> {
        i64::try_from(v).ok().map(Datum::Int)
    }

    /// The structural shape of this datum.
    pub fn shape(&self) -> KeyShape {
        match self {
            Datum::Null => KeyShape::Null,
            Datum::Int(_) => KeyShape::Int,
            Datum::Str(_) => KeyShape::Str,
            Datum::Tuple(fields) => KeyShape::Tuple(fields.iter().map(Datum::shape).collect()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Datum::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Datum]> {
        match self {
            Datum::Tuple(fields) => Some(fields),
            _ => None,
        }
    }

    /// Render as plain JSON: `null`, a number, a string or an array.
    pub fn to_json(&self) -> Value {
        match self {
            Datum::Null => Value::Null,
            Datum::Int(v) => Value::from(*v),
            Datum::Str(s) => Value::from(s.as_str()),
            Datum::Tuple(fields) => Value::Array(fields.iter().map(Datum::to_json).collect()),
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<()> for Datum {
    fn from(_: ()) -> Self {
        Datum::Null
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Datum::Str(s.to_string())
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Datum::Str(s)
    }
}

impl From<&String> for Datum {
    fn from(s: &String) -> Self {
        Datum::Str(s.clone())
    }
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Datum::Int(v)
    }
}

impl From<i32> for Datum {
    fn from(v: i32) -> Self {
        Datum::Int(i64::from(v))
    }
}

impl From<u32> for Datum {
    fn from(v: u32) -> Self {
        Datum::Int(i64::from(v))
    }
}

impl<A: Into<Datum>, B: Into<Datum>> From<(A, B)> for Datum {
    fn from((a, b): (A, B)) -> Self {
        Datum::Tuple(vec![a.into(), b.into()])
    }
}

impl<A: Into<Datum>, B: Into<Datum>, C: Into<Datum>> From<(A, B, C)> for Datum {
    fn from((a, b, c): (A, B, C)) -> Self {
        Datum::Tuple(vec![a.into(), b.into(), c.into()])
    }
}
