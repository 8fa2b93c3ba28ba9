use std::fs;

use hdx_model::{CellValue, OutputLevel};
use hdx_runner::{FallbackSnapshot, FallbackStore};
use tempfile::TempDir;

#[test]
fn snapshots_are_read_per_level() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(
        dir.path().join("subnational.json"),
        r#"{ "admin_column": "pcode", "rows": [{ "pcode": "AF0101", "idps": 120 }] }"#,
    )
    .expect("write snapshot");

    let store = FallbackStore::from_dir(dir.path()).expect("load store");
    let snapshot = store.snapshot(OutputLevel::Subnational).expect("subnational");
    assert_eq!(snapshot.admin_column, "pcode");
    assert_eq!(snapshot.rows[0].get("idps"), Some(&CellValue::Int(120)));
    assert!(snapshot.sources.is_empty());
    assert!(store.snapshot(OutputLevel::National).is_none());
}

#[test]
fn saved_snapshots_load_back() {
    let dir = TempDir::new().expect("temp dir");
    let snapshot = FallbackSnapshot::new("iso3").with_row([("iso3", "SYR"), ("events", "12")]);
    FallbackStore::new()
        .with_snapshot(OutputLevel::National, snapshot.clone())
        .save_to_dir(dir.path())
        .expect("save");

    assert!(dir.path().join("national.json").is_file());
    let store = FallbackStore::from_dir(dir.path()).expect("load store");
    assert_eq!(store.snapshot(OutputLevel::National), Some(&snapshot));
}

#[test]
fn missing_directory_and_bad_json_fail() {
    let dir = TempDir::new().expect("temp dir");
    assert!(FallbackStore::from_dir(&dir.path().join("absent")).is_err());

    fs::write(dir.path().join("global.json"), "{ not json").expect("write");
    let err = FallbackStore::from_dir(dir.path()).unwrap_err();
    assert!(format!("{err:#}").contains("global.json"));
}
