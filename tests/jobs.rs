use anyhow::Result;
use ironshuffle::jobs::{
    RankBy, RatingRow, most_reviewed_movies, rating_histogram, ratings_per_user,
    ratings_per_user_ranked,
};
use ironshuffle::testing::assert_collections_equal;
use ironshuffle::{Datum, EngineConfig, EngineError, RecordStream, Runner, read_csv};

const FIXTURE: &[&str] = &[
    "1,31,2.5,1260759144",
    "1,1029,3.0,1260759179",
    "1,1061,3.0,1260759182",
    "2,31,4.0,835355493",
    "2,10,4.0,835355681",
    "3,1029,2.5,1298861675",
    "3,31,3.0,1298922049",
    "4,10,5.0,949810582",
];

fn lines() -> RecordStream {
    RecordStream::from_pairs(FIXTURE.iter().map(|l| ((), *l)))
}

fn runner() -> Result<Runner> {
    Ok(Runner::new(
        EngineConfig::default()
            .with_max_workers(2)
            .with_split_size(3)
            .with_partitions(3),
    )?)
}

fn pairs(v: &[(&str, i64)]) -> Vec<(Datum, Datum)> {
    v.iter()
        .map(|(k, n)| (Datum::from(*k), Datum::Int(*n)))
        .collect()
}

#[test]
fn parses_rating_rows_from_lines_and_tuples() -> Result<()> {
    let expected = RatingRow {
        user: "1".into(),
        movie: "31".into(),
        rating: "2.5".into(),
        timestamp: 1_260_759_144,
    };
    assert_eq!(RatingRow::from_datum(&Datum::from("1,31,2.5,1260759144\n"))?, expected);
    assert_eq!(
        RatingRow::from_datum(&Datum::tuple(["1", "31", "2.5", "1260759144"]))?,
        expected
    );
    assert!(RatingRow::from_datum(&Datum::from("1,31,2.5")).is_err());
    assert!(RatingRow::from_datum(&Datum::from("1,31,2.5,soon")).is_err());
    assert!(RatingRow::from_datum(&Datum::Int(3)).is_err());
    Ok(())
}

#[test]
fn histogram_counts_each_rating() -> Result<()> {
    let out = runner()?.run(&rating_histogram(), lines())?;
    assert_collections_equal(
        &out.records.to_pairs()?,
        &pairs(&[("2.5", 2), ("3.0", 3), ("4.0", 2), ("5.0", 1)]),
    );
    Ok(())
}

#[test]
fn ratings_per_user_in_user_order() -> Result<()> {
    let out = runner()?.run(&ratings_per_user(), lines())?;
    assert_collections_equal(
        &out.records.to_pairs()?,
        &pairs(&[("1", 3), ("2", 2), ("3", 2), ("4", 1)]),
    );
    Ok(())
}

#[test]
fn ranked_users_agree_across_techniques() -> Result<()> {
    let expected = pairs(&[("1", 3), ("2", 2), ("3", 2), ("4", 1)]);
    for rank in [RankBy::Negation, RankBy::ZeroPadded { width: 5 }] {
        let out = runner()?.run(&ratings_per_user_ranked(rank)?, lines())?;
        assert_collections_equal(&out.records.to_pairs()?, &expected);
    }
    Ok(())
}

#[test]
fn most_reviewed_movies_from_csv() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("ratings.csv");
    std::fs::write(&path, FIXTURE.join("\n"))?;
    let cfg = EngineConfig::default().with_max_workers(2).with_split_size(3);
    let input = read_csv(&path, false, &cfg)?;

    let runner = Runner::new(cfg)?;
    let out = runner.run(&most_reviewed_movies(RankBy::ZeroPadded { width: 3 })?, input)?;
    assert_collections_equal(
        &out.records.to_pairs()?,
        &pairs(&[("31", 3), ("10", 2), ("1029", 2), ("1061", 1)]),
    );
    let stats = &out.stats.stages;
    assert_eq!(stats[0].input_records, FIXTURE.len());
    assert_eq!(stats[1].output_records, 4);
    Ok(())
}

#[test]
fn invalid_padding_width_is_rejected() {
    assert!(matches!(
        most_reviewed_movies(RankBy::ZeroPadded { width: 0 }),
        Err(EngineError::Config { .. })
    ));
}
