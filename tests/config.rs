use anyhow::Result;
use ironshuffle::{EngineConfig, EngineError, JobStats, StageStats};
use std::time::Duration;

#[test]
fn json_overrides_only_given_fields() -> Result<()> {
    let cfg = EngineConfig::from_json_str(r#"{ "memory_budget": 5000, "max_workers": 2 }"#)?;
    let default = EngineConfig::default();
    assert_eq!(cfg.memory_budget, 5000);
    assert_eq!(cfg.max_workers, 2);
    assert_eq!(cfg.partitions, default.partitions);
    assert_eq!(cfg.merge_fan_in, 64);
    assert_eq!(cfg.spill_dir, None);
    Ok(())
}

#[test]
fn config_round_trips_through_json() -> Result<()> {
    let cfg = EngineConfig::default()
        .with_partitions(7)
        .with_spill_dir("/tmp/ironshuffle-spill");
    let text = serde_json::to_string(&cfg)?;
    assert_eq!(EngineConfig::from_json_str(&text)?, cfg);
    Ok(())
}

#[test]
fn invalid_values_name_the_field() {
    let cases = [
        (r#"{ "partitions": 0 }"#, "partitions"),
        (r#"{ "split_size": 0 }"#, "split_size"),
        (r#"{ "merge_fan_in": 1 }"#, "merge_fan_in"),
        (r#"{ "memory_budget": 1, "max_workers": 2 }"#, "memory_budget"),
    ];
    for (json, field) in cases {
        match EngineConfig::from_json_str(json) {
            Err(EngineError::Config { detail }) => assert!(detail.contains(field), "{detail}"),
            other => panic!("expected config error for {json}, got {other:?}"),
        }
    }
    assert!(matches!(
        EngineConfig::from_json_str("{ not json"),
        Err(EngineError::Config { .. })
    ));
}

#[test]
fn stats_serialize_elapsed_as_millis() -> Result<()> {
    let stats = JobStats {
        stages: vec![StageStats {
            name: "count".into(),
            peak_resident: 12,
            elapsed: Duration::from_millis(1500),
            ..Default::default()
        }],
    };
    let v = serde_json::to_value(&stats)?;
    assert_eq!(v["stages"][0]["elapsed"], 1500);
    assert_eq!(v["stages"][0]["name"], "count");
    assert_eq!(stats.peak_resident(), 12);
    Ok(())
}
