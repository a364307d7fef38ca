use anyhow::Result;
use ironshuffle::codec::{MAX_PAD_WIDTH, by_count_descending};
use ironshuffle::{Composite, Datum, EngineError, KeyCodec, Natural, Negate, ZeroPad};
use std::sync::Arc;

#[test]
fn negate_round_trip_and_reverses_order() -> Result<()> {
    let counts = [0i64, 1, 2, 17, 9_999, i64::MAX];
    for c in counts {
        let enc = Negate.encode(&Datum::Int(c))?;
        assert_eq!(Negate.decode(&enc)?, Datum::Int(c));
    }
    for pair in counts.windows(2) {
        let a = Negate.encode(&Datum::Int(pair[0]))?;
        let b = Negate.encode(&Datum::Int(pair[1]))?;
        assert!(a > b, "{} should sort after {}", pair[0], pair[1]);
    }
    Ok(())
}

#[test]
fn negate_rejects_min_and_non_int() {
    assert!(matches!(
        Negate.encode(&Datum::Int(i64::MIN)),
        Err(EngineError::EncodingOverflow { value: i64::MIN, .. })
    ));
    assert!(matches!(
        Negate.encode(&Datum::from("3")),
        Err(EngineError::Schema { .. })
    ));
}

#[test]
fn zero_pad_ascending_matches_numeric_order() -> Result<()> {
    let codec = ZeroPad::ascending(5)?;
    assert_eq!(codec.encode(&Datum::Int(42))?, Datum::from("00042"));
    assert_eq!(codec.decode(&Datum::from("00042"))?, Datum::Int(42));

    let mut nums = vec![7i64, 1023, 0, 99_999, 31, 8];
    let mut encoded: Vec<Datum> = nums
        .iter()
        .map(|n| codec.encode(&Datum::Int(*n)))
        .collect::<Result<_, _>>()?;
    encoded.sort();
    nums.sort_unstable();
    let decoded: Vec<Datum> = encoded.iter().map(|d| codec.decode(d)).collect::<Result<_, _>>()?;
    assert_eq!(decoded, nums.into_iter().map(Datum::Int).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn zero_pad_descending_reverses_order() -> Result<()> {
    let codec = ZeroPad::descending(3)?;
    assert_eq!(codec.encode(&Datum::Int(0))?, Datum::from("999"));
    assert_eq!(codec.encode(&Datum::Int(999))?, Datum::from("000"));

    let ten = codec.encode(&Datum::Int(10))?;
    let nine = codec.encode(&Datum::Int(9))?;
    assert!(ten < nine);
    assert_eq!(codec.decode(&ten)?, Datum::Int(10));
    Ok(())
}

#[test]
fn zero_pad_overflow_is_an_error() -> Result<()> {
    let codec = ZeroPad::ascending(2)?;
    assert_eq!(codec.max_value(), 99);
    assert!(matches!(
        codec.encode(&Datum::Int(100)),
        Err(EngineError::EncodingOverflow { value: 100, width: 2 })
    ));
    assert!(matches!(
        codec.encode(&Datum::Int(-1)),
        Err(EngineError::EncodingOverflow { value: -1, width: 2 })
    ));
    Ok(())
}

#[test]
fn zero_pad_width_is_validated() {
    assert!(matches!(ZeroPad::ascending(0), Err(EngineError::Config { .. })));
    assert!(matches!(
        ZeroPad::descending(MAX_PAD_WIDTH + 1),
        Err(EngineError::Config { .. })
    ));
    assert!(ZeroPad::ascending(MAX_PAD_WIDTH).is_ok());
}

#[test]
fn zero_pad_decode_rejects_foreign_keys() -> Result<()> {
    let codec = ZeroPad::ascending(4)?;
    for bad in [Datum::from("042"), Datum::from("00a2"), Datum::Int(42)] {
        assert!(matches!(codec.decode(&bad), Err(EngineError::Schema { .. })));
    }
    Ok(())
}

#[test]
fn composite_breaks_ties_by_secondary_field() -> Result<()> {
    let codec = by_count_descending();
    let mut keys: Vec<Datum> = [(3i64, "b"), (5, "z"), (3, "a"), (1, "c")]
        .into_iter()
        .map(|k| codec.encode(&Datum::from(k)))
        .collect::<Result<_, _>>()?;
    keys.sort();
    let decoded: Vec<Datum> = keys.iter().map(|k| codec.decode(k)).collect::<Result<_, _>>()?;
    assert_eq!(
        decoded,
        vec![
            Datum::from((5i64, "z")),
            Datum::from((3i64, "a")),
            Datum::from((3i64, "b")),
            Datum::from((1i64, "c")),
        ]
    );
    Ok(())
}

#[test]
fn composite_arity_mismatch_is_schema_error() -> Result<()> {
    let codec = Composite::new(vec![Arc::new(ZeroPad::descending(4)?), Arc::new(Natural)]);
    assert!(matches!(
        codec.encode(&Datum::from((1i64, "a", "extra"))),
        Err(EngineError::Schema { .. })
    ));
    assert!(matches!(codec.encode(&Datum::Int(1)), Err(EngineError::Schema { .. })));
    assert_eq!(
        codec.encode(&Datum::from((12i64, "m")))?,
        Datum::from(("9987", "m"))
    );
    Ok(())
}
