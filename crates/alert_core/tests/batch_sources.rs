use std::path::PathBuf;
use std::sync::Mutex;

use alert_core::batch::{
    analyze_files, process_directory, BatchJob, BatchOptions, JobOutcome, SourceReport,
    TracingObserver,
};
use alert_core::config::AlertConfig;
use alert_core::error::codes;
use alert_core::export::save_report_json;
use alert_core::report::format_batch_summary;
use alert_core::source::source_digest;
use pretty_assertions::assert_eq;
use time::macros::datetime;

const STRICT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../fixtures/alerts/strict_single.txt"
));
const TAGGED: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../fixtures/alerts/tagged_multi.txt"
));
const REFLEX: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../fixtures/alerts/reflex_pair.txt"
));

fn write_sources(dir: &std::path::Path) -> Vec<PathBuf> {
    let strict = dir.join("01_strict.txt");
    let tagged = dir.join("03_tagged.txt");
    std::fs::write(&strict, STRICT).unwrap();
    std::fs::write(&tagged, TAGGED).unwrap();
    vec![strict, dir.join("02_missing.txt"), tagged]
}

fn options(max_workers: usize) -> BatchOptions {
    BatchOptions {
        max_workers,
        ..BatchOptions::default()
    }
}

#[test]
fn missing_second_source_is_one_error_among_three() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_sources(dir.path());

    let report =
        analyze_files(&paths, &AlertConfig::default(), &options(4), &TracingObserver).unwrap();
    assert_eq!(report.total(), 3);
    assert_eq!(report.success_count, 2);
    assert_eq!(report.error_count, 1);

    let missing = report.get(&paths[1].display().to_string()).unwrap();
    assert_eq!(missing.outcome.error_code(), Some(codes::SOURCE_NOT_FOUND));

    let tagged = report
        .get(&paths[2].display().to_string())
        .and_then(|j| j.outcome.payload())
        .unwrap();
    assert_eq!(tagged.alert_count, 3);
    assert_eq!(tagged.encoding, "utf-8");
    assert_eq!(tagged.source_sha256, source_digest(TAGGED));
}

#[test]
fn entry_count_holds_for_any_worker_bound() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_sources(dir.path());
    for k in [1, 2, 3, 8] {
        let report =
            analyze_files(&paths, &AlertConfig::default(), &options(k), &TracingObserver).unwrap();
        assert_eq!(report.total(), paths.len(), "k={k}");
        assert_eq!(report.success_count + report.error_count, paths.len(), "k={k}");
    }
}

#[test]
fn zero_sources_is_empty_without_error() {
    let report = analyze_files(&[], &AlertConfig::default(), &options(4), &TracingObserver).unwrap();
    assert!(report.results.is_empty());
    assert_eq!(report.error_count, 0);
}

#[test]
fn legacy_encoded_source_is_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cp1251.txt");
    let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode(REFLEX);
    std::fs::write(&path, &bytes).unwrap();

    let report = analyze_files(
        std::slice::from_ref(&path),
        &AlertConfig::default(),
        &options(1),
        &TracingObserver,
    )
    .unwrap();
    let payload = report
        .get(&path.display().to_string())
        .and_then(|j| j.outcome.payload())
        .unwrap();
    assert_eq!(payload.encoding, "windows-1251");
    assert_eq!(payload.marker.as_deref(), Some("reflex"));
    assert_eq!(payload.records[0].service, "SmartNLP.SmartApp навыки ЦКР.SmartApp SkillFlow");
}

#[test]
fn directory_processing_reports_progress_and_exports() {
    let dir = tempfile::tempdir().unwrap();
    let alerts = dir.path().join("alerts");
    std::fs::create_dir(&alerts).unwrap();
    std::fs::write(alerts.join("a.txt"), STRICT).unwrap();
    std::fs::write(alerts.join("b.txt"), "no alert in here").unwrap();
    std::fs::write(alerts.join("ignored.md"), STRICT).unwrap();

    let finished = Mutex::new(Vec::new());
    let observer = |job: &BatchJob<SourceReport>| {
        finished.lock().unwrap().push(job.outcome.is_success());
    };
    let report = process_directory(&alerts, &AlertConfig::default(), &observer).unwrap();
    assert_eq!(report.total(), 2);
    assert_eq!(finished.into_inner().unwrap().len(), 2);

    let b = report.get(&alerts.join("b.txt").display().to_string()).unwrap();
    match &b.outcome {
        JobOutcome::Error { code, .. } => assert_eq!(code, codes::SOURCE_NO_ALERTS),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let summary = format_batch_summary(&report);
    assert!(summary.contains("a.txt: 1 alert(s), 0 failed segment(s)"));
    assert!(summary.contains("[SOURCE_NO_ALERTS]"));
    assert!(summary.contains("total=2 success=1 error=1"));

    let out = save_report_json(
        &report,
        None,
        &dir.path().join("results"),
        datetime!(2025-04-21 20:14:05 UTC),
    )
    .unwrap();
    assert!(out.ends_with("alerts_analysis_20250421_201405.json"));
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["success_count"], 1);
    let a_key = alerts.join("a.txt").display().to_string();
    assert_eq!(json["results"][&a_key]["status"], "success");
    assert_eq!(json["results"][&a_key]["payload"]["records"][0]["id"], "100");
}

#[test]
fn missing_directory_is_a_batch_level_failure() {
    let dir = tempfile::tempdir().unwrap();
    let err = process_directory(&dir.path().join("nope"), &AlertConfig::default(), &TracingObserver)
        .unwrap_err();
    assert_eq!(err.code, codes::BATCH_LISTING_FAILED);
}
