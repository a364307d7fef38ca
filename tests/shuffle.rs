use anyhow::Result;
use ironshuffle::testing::{assert_keys_strictly_increasing, cyclic_records, records_from_pairs};
use ironshuffle::{
    AbortSignal, Datum, EngineConfig, EngineError, Group, KeyShape, Record, RecordStream, Shuffle,
    WorkerPool, shuffle_stream,
};
use std::collections::HashMap;

fn small_config() -> EngineConfig {
    EngineConfig::default()
        .with_max_workers(4)
        .with_partitions(5)
        .with_split_size(97)
        .with_memory_budget(64)
        .with_merge_fan_in(3)
}

fn collect(cfg: &EngineConfig, input: &RecordStream) -> Result<Vec<Group>> {
    let pool = WorkerPool::new(cfg.max_workers)?;
    Ok(shuffle_stream(input, cfg, &pool)?.collect::<Result<_, _>>()?)
}

#[test]
fn groups_are_strictly_increasing_and_lossless() -> Result<()> {
    let input = RecordStream::from_records(cyclic_records(5_000, 37));
    let groups = collect(&small_config(), &input)?;

    assert_eq!(groups.len(), 37);
    assert_keys_strictly_increasing(&groups);

    let mut seen: HashMap<i64, Datum> = HashMap::new();
    for g in &groups {
        for v in &g.values {
            let i = v.as_int().expect("int value");
            assert!(seen.insert(i, g.key.clone()).is_none(), "value {i} seen twice");
        }
    }
    assert_eq!(seen.len(), 5_000);
    for (i, key) in seen {
        assert_eq!(key, Datum::from(format!("key-{:06}", i % 37)));
    }
    Ok(())
}

#[test]
fn values_keep_input_order_within_a_group() -> Result<()> {
    let input = RecordStream::from_records(cyclic_records(3_000, 4));
    for workers in [1, 3] {
        let cfg = small_config().with_max_workers(workers);
        for g in collect(&cfg, &input)? {
            let values: Vec<i64> = g.values.iter().filter_map(Datum::as_int).collect();
            let mut sorted = values.clone();
            sorted.sort_unstable();
            assert_eq!(values, sorted, "group {} out of input order", g.key);
        }
    }
    Ok(())
}

#[test]
fn memory_stays_within_budget() -> Result<()> {
    let cfg = small_config();
    let pool = WorkerPool::new(cfg.max_workers)?;
    let input = RecordStream::from_records(cyclic_records(20_000, 1_000));
    let groups = shuffle_stream(&input, &cfg, &pool)?;
    let stats = groups.stats();
    assert!(
        stats.peak_resident <= cfg.memory_budget,
        "peak {} over budget {}",
        stats.peak_resident,
        cfg.memory_budget
    );
    assert!(stats.spilled_runs > cfg.partitions, "expected many spilled runs");
    assert!(stats.merge_passes >= 2, "fan-in 3 should need several passes");
    assert_eq!(groups.count(), 1_000);
    Ok(())
}

#[test]
fn budget_is_shared_by_the_pool_actually_used() -> Result<()> {
    let cfg = EngineConfig::default()
        .with_max_workers(1)
        .with_memory_budget(16)
        .with_split_size(50);
    let pool = WorkerPool::new(8)?;
    let input = RecordStream::from_records(cyclic_records(2_000, 100));
    let groups = shuffle_stream(&input, &cfg, &pool)?;
    assert!(groups.stats().peak_resident <= 16);
    assert_eq!(groups.count(), 100);

    let err = shuffle_stream(&input, &cfg.with_memory_budget(4), &pool)
        .err()
        .expect("budget smaller than the pool");
    assert!(matches!(err, EngineError::Config { .. }), "got {err}");
    Ok(())
}

#[test]
fn spilled_input_shuffles_like_memory_input() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let cfg = small_config().with_spill_dir(tmp.path());
    let records = cyclic_records(2_000, 50);
    let in_memory = collect(&cfg, &RecordStream::from_records(records.clone()))?;
    let spilled = collect(&cfg, &RecordStream::spill_from_iter(records, &cfg)?)?;
    assert_eq!(in_memory, spilled);
    Ok(())
}

#[test]
fn empty_input_yields_no_groups() -> Result<()> {
    let groups = collect(&small_config(), &RecordStream::empty())?;
    assert!(groups.is_empty());
    Ok(())
}

#[test]
fn mixed_key_shapes_fail_with_schema_error() -> Result<()> {
    let input = RecordStream::from_records(vec![
        Record::new("a", 1i64),
        Record::new(2i64, 1i64),
        Record::new("b", 1i64),
    ]);
    let cfg = small_config().with_max_workers(1);
    let pool = WorkerPool::new(1)?;
    let err = shuffle_stream(&input, &cfg, &pool).err().expect("schema error");
    assert!(matches!(err, EngineError::Schema { .. }), "got {err}");
    Ok(())
}

#[test]
fn declared_shape_rejects_first_key() -> Result<()> {
    let cfg = small_config().with_max_workers(1);
    let pool = WorkerPool::new(1)?;
    let shape = KeyShape::Tuple(vec![KeyShape::Int, KeyShape::Str]);
    let shuffle = Shuffle::new(&cfg, &pool, Some(shape))?;
    let mut w = shuffle.writer(0);
    let err = w.push(Record::new("plain", 1i64)).err().expect("schema error");
    assert!(matches!(err, EngineError::Schema { .. }));
    w.push(Record::new((1i64, "x"), 1i64))?;
    w.finish()?;
    assert_eq!(shuffle.budget().resident(), 0);

    let groups: Vec<Group> = shuffle
        .finish(&pool, &AbortSignal::new())?
        .collect::<Result<_, _>>()?;
    assert_eq!(groups.len(), 1);
    Ok(())
}

#[test]
fn groups_match_naive_grouping() -> Result<()> {
    let pairs = vec![
        ("1023", 1i64),
        ("7", 1),
        ("1023", 1),
        ("31", 4),
        ("7", 2),
    ];
    let cfg = EngineConfig::default().with_max_workers(2).with_split_size(2);
    let groups = collect(&cfg, &RecordStream::from_records(records_from_pairs(pairs)))?;
    assert_eq!(
        groups,
        vec![
            Group {
                key: Datum::from("1023"),
                values: vec![Datum::Int(1), Datum::Int(1)],
            },
            Group {
                key: Datum::from("31"),
                values: vec![Datum::Int(4)],
            },
            Group {
                key: Datum::from("7"),
                values: vec![Datum::Int(1), Datum::Int(2)],
            },
        ]
    );
    Ok(())
}
