//! Testing utilities for ironshuffle jobs.
//!
//! Assertions that print both collections in full when they fail, plus small
//! builders for test input.
//!
//! ```
//! use ironshuffle::testing::*;
//! use ironshuffle::{Datum, RecordStream};
//!
//! let input = RecordStream::from_records(records_from_pairs(vec![("b", 1i64), ("a", 2)]));
//! let pairs = input.to_pairs().unwrap();
//! assert_kv_collections_equal(
//!     pairs,
//!     vec![(Datum::from("a"), Datum::Int(2)), (Datum::from("b"), Datum::Int(1))],
//! );
//! ```

use crate::datum::Datum;
use crate::record::{Group, Record};
use std::fmt::Debug;

/// Assert that two collections are equal in order and content.
///
/// # Panics
///
/// Panics if the collections differ in length or content.
///
/// ```
/// use ironshuffle::testing::assert_collections_equal;
///
/// assert_collections_equal(&[1, 2, 3], &[1, 2, 3]);
/// ```
pub fn assert_collections_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a, e,
            "Collection mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}\n  Full expected: {expected:?}\n  Full actual: {actual:?}"
        );
    }
}

/// Assert that two key-value collections are equal after sorting by key.
///
/// The sort is stable, so values under a repeated key must still match in
/// their original relative order.
///
/// # Panics
///
/// Panics if the collections differ after sorting by key.
pub fn assert_kv_collections_equal<K, V>(mut actual: Vec<(K, V)>, mut expected: Vec<(K, V)>)
where
    K: Debug + Ord,
    V: Debug + PartialEq,
{
    actual.sort_by(|a, b| a.0.cmp(&b.0));
    expected.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, ((ak, av), (ek, ev))) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            ak == ek && av == ev,
            "Collection mismatch at index {i} after sorting:\n  Expected: ({ek:?}, {ev:?})\n  Actual: ({ak:?}, {av:?})\n  Full expected: {expected:?}\n  Full actual: {actual:?}"
        );
    }
}

/// Assert that the keys of `groups` are strictly increasing.
///
/// # Panics
///
/// Panics at the first key that is not greater than its predecessor.
pub fn assert_keys_strictly_increasing(groups: &[Group]) {
    for (i, pair) in groups.windows(2).enumerate() {
        assert!(
            pair[0].key < pair[1].key,
            "Keys not strictly increasing at index {}:\n  Previous: {:?}\n  Next: {:?}",
            i + 1,
            pair[0].key,
            pair[1].key
        );
    }
}

/// Build records from anything convertible to `(key, value)` data.
pub fn records_from_pairs<I, K, V>(pairs: I) -> Vec<Record>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<Datum>,
    V: Into<Datum>,
{
    pairs.into_iter().map(Record::from).collect()
}

/// `n` records keyed `key-{i % distinct}` with value `i`, in index order.
///
/// Handy for inputs much larger than a test's memory budget.
pub fn cyclic_records(n: usize, distinct: usize) -> Vec<Record> {
    (0..n)
        .map(|i| Record::new(format!("key-{:06}", i % distinct.max(1)), i as i64))
        .collect()
}
