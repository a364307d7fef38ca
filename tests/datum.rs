use ironshuffle::{Datum, KeyShape, Record};

#[test]
fn shapes_describe_structure() {
    let key = Datum::from((3i64, "a"));
    assert_eq!(key.shape(), KeyShape::Tuple(vec![KeyShape::Int, KeyShape::Str]));
    assert!(key.shape().matches(&Datum::from((9i64, "zz"))));
    assert!(!key.shape().matches(&Datum::from(("9", "zz"))));
    assert!(!key.shape().matches(&Datum::from((9i64, "zz", ()))));
    assert_eq!(key.shape().to_string(), "(int, str)");
}

#[test]
fn tuples_order_by_position() {
    let mut keys = vec![
        Datum::from((2i64, "a")),
        Datum::from((1i64, "b")),
        Datum::from((1i64, "a")),
    ];
    keys.sort();
    assert_eq!(keys[0], Datum::from((1i64, "a")));
    assert_eq!(keys[2], Datum::from((2i64, "a")));
}

#[test]
fn conversions_and_accessors() {
    assert!(Datum::from(()).is_null());
    assert_eq!(Datum::from(7u32).as_int(), Some(7));
    assert_eq!(Datum::try_from_u64(u64::MAX), None);
    assert_eq!(Datum::try_from_u64(12), Some(Datum::Int(12)));
    assert_eq!(Datum::from("x").as_str(), Some("x"));
    assert_eq!(Datum::Int(1).as_str(), None);
    assert_eq!(Datum::from((1i64, "a")).to_string(), r#"[1,"a"]"#);

    let rec = Record::from(("k", 1i64));
    assert_eq!(rec.into_pair(), (Datum::from("k"), Datum::Int(1)));
}
