use std::collections::BTreeMap;

use anyhow::bail;
use chrono::NaiveDate;
use hdx_aggregate::OutputValue;
use hdx_model::{CellValue, OutputLevel};
use hdx_runner::{
    FallbackSnapshot, FallbackStore, OutputShape, RunCoordinator, SourceCitation, SourceOutput,
};

fn shape() -> OutputShape {
    OutputShape::new("iso3", ["events", "fatalities"])
}

fn map(entries: &[(&str, i64)]) -> BTreeMap<String, OutputValue> {
    entries
        .iter()
        .map(|(admin, value)| ((*admin).to_string(), OutputValue::Single(CellValue::Int(*value))))
        .collect()
}

fn live_output() -> SourceOutput {
    SourceOutput {
        headers: vec!["events".to_string(), "fatalities".to_string()],
        values: vec![map(&[("AFG", 12)]), map(&[("AFG", 3)])],
        ..SourceOutput::default()
    }
}

fn store() -> FallbackStore {
    let snapshot = FallbackSnapshot::new("iso3")
        .with_row([("iso3", CellValue::from("SYR")), ("events", CellValue::Int(4))])
        .with_row([
            ("iso3", CellValue::from("AFG")),
            ("events", CellValue::Int(9)),
            ("fatalities", CellValue::Null),
        ])
        .with_source(SourceCitation {
            indicator: "events".to_string(),
            date: NaiveDate::from_ymd_opt(2020, 5, 1),
            source: "ACLED".to_string(),
            url: None,
        })
        .with_source(SourceCitation {
            indicator: "funding".to_string(),
            date: NaiveDate::from_ymd_opt(2021, 1, 1),
            source: "FTS".to_string(),
            url: None,
        });
    FallbackStore::new().with_snapshot(OutputLevel::National, snapshot)
}

#[test]
fn live_results_pass_through() {
    let mut coordinator = RunCoordinator::new(store());
    let output =
        coordinator.run_with_fallback("acled", OutputLevel::National, &shape(), || Ok(live_output()));
    assert_eq!(output, live_output());
    assert!(coordinator.degraded().is_empty());
}

#[test]
fn failure_is_replaced_by_shaped_snapshot() {
    let mut coordinator = RunCoordinator::new(store());
    let output = coordinator.run_with_fallback("acled", OutputLevel::National, &shape(), || {
        bail!("upstream returned 503")
    });

    assert_eq!(output.headers, shape().headers);
    assert_eq!(output.values.len(), 2);
    assert_eq!(
        output.value("events", "AFG"),
        Some(&OutputValue::Single(CellValue::Int(9)))
    );
    assert_eq!(
        output.value("events", "SYR"),
        Some(&OutputValue::Single(CellValue::Int(4)))
    );
    assert!(output.values[1].is_empty());
    assert_eq!(output.sources.len(), 1);
    assert_eq!(output.date, NaiveDate::from_ymd_opt(2020, 5, 1));
    assert_eq!(coordinator.degraded(), ["acled".to_string()]);
}

#[test]
fn panics_are_contained() {
    let mut coordinator = RunCoordinator::new(FallbackStore::new());
    let output = coordinator.run_with_fallback("fts", OutputLevel::Global, &shape(), || {
        panic!("index out of bounds")
    });
    assert_eq!(output, shape().empty());
    assert_eq!(coordinator.degraded(), ["fts".to_string()]);
}

#[test]
fn live_results_are_conformed_to_the_shape() {
    let mut coordinator = RunCoordinator::new(FallbackStore::new());
    let output = coordinator.run_with_fallback("acled", OutputLevel::National, &shape(), || {
        Ok(SourceOutput {
            headers: vec!["extra".to_string(), "events".to_string()],
            values: vec![map(&[("AFG", 1)]), map(&[("AFG", 12)])],
            ..SourceOutput::default()
        })
    });
    assert_eq!(output.headers, ["events", "fatalities"]);
    assert_eq!(output.values, vec![map(&[("AFG", 12)]), BTreeMap::new()]);
}

#[test]
fn failed_and_live_sources_share_one_shape() {
    let mut coordinator = RunCoordinator::new(store());
    let live =
        coordinator.run_with_fallback("a", OutputLevel::National, &shape(), || Ok(live_output()));
    let degraded = coordinator.run_with_fallback("b", OutputLevel::National, &shape(), || {
        bail!("timeout")
    });
    assert_eq!(live.headers, degraded.headers);
    assert_eq!(live.values.len(), degraded.values.len());
}

#[test]
fn run_keeps_siblings_and_honours_only() {
    let mut coordinator = RunCoordinator::new(store()).with_only(["ok", "broken"]);
    coordinator.register("ok", OutputLevel::National, shape(), || Ok(live_output()));
    coordinator.register("broken", OutputLevel::National, shape(), || bail!("bad feed"));
    coordinator.register("skipped", OutputLevel::National, shape(), || Ok(live_output()));

    let report = coordinator.run();
    let names: Vec<&str> = report.outputs.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["ok", "broken"]);
    assert_eq!(report.degraded, ["broken".to_string()]);
    assert!(!report.is_degraded("ok"));
    assert_eq!(
        report.output("ok").and_then(|o| o.value("events", "AFG")),
        Some(&OutputValue::Single(CellValue::Int(12)))
    );
    assert!(report.output("skipped").is_none());
}
