use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{run_batch, BatchObserver, BatchOptions, BatchReport};
use crate::assemble::{AlertParser, SegmentFailure};
use crate::config::AlertConfig;
use crate::domain::AlertRecord;
use crate::error::{codes, AppError};
use crate::source::{read_source_text, source_digest};

/// Payload of one successfully analyzed source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceReport {
    pub source_sha256: String,
    pub encoding: String,
    pub marker: Option<String>,
    pub alert_count: usize,
    pub records: Vec<AlertRecord>,
    pub failures: Vec<SegmentFailure>,
}

/// Read, segment and parse one file. A file with no parseable alert is an error.
pub fn analyze_source_file(
    path: &Path,
    parser: &AlertParser,
    now: OffsetDateTime,
) -> Result<SourceReport, AppError> {
    let decoded = read_source_text(path, &parser.config().fallback_encoding)?;
    let parsed = parser.parse_blob(&decoded.text, now);

    if parsed.records.is_empty() {
        let first = parsed
            .failures
            .first()
            .map(|f| f.error.describe())
            .unwrap_or_else(|| "no segments".to_string());
        return Err(AppError::new(codes::SOURCE_NO_ALERTS, "No alerts could be parsed from source")
            .with_details(format!(
                "path={}; segments={}; first={first}",
                path.display(),
                parsed.segment_count()
            )));
    }

    Ok(SourceReport {
        source_sha256: source_digest(&decoded.text),
        encoding: decoded.encoding,
        marker: parsed.marker,
        alert_count: parsed.records.len(),
        records: parsed.records,
        failures: parsed.failures,
    })
}

/// List files in `dir` matching `pattern`, sorted. Failing to enumerate is the only batch-level error.
pub fn discover_sources(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, AppError> {
    if !dir.is_dir() {
        return Err(AppError::new(
            codes::BATCH_LISTING_FAILED,
            "Source directory does not exist or is not a directory",
        )
        .with_details(format!("dir={}", dir.display())));
    }

    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.display().to_string()),
        pattern
    );
    let entries = glob::glob(&full).map_err(|e| {
        AppError::new(codes::BATCH_LISTING_FAILED, "Invalid source pattern")
            .with_details(format!("pattern={pattern}; err={e}"))
    })?;

    let mut found = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            AppError::new(codes::BATCH_LISTING_FAILED, "Failed to list source directory")
                .with_details(e.to_string())
        })?;
        if path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

pub fn analyze_files<O>(
    paths: &[PathBuf],
    config: &AlertConfig,
    options: &BatchOptions,
    observer: &O,
) -> Result<BatchReport<SourceReport>, AppError>
where
    O: BatchObserver<SourceReport> + ?Sized,
{
    let parser = AlertParser::new(config)?;
    Ok(run_batch(
        paths,
        options,
        |path: &Path| analyze_source_file(path, &parser, OffsetDateTime::now_utc()),
        observer,
    ))
}

pub fn process_directory<O>(
    dir: &Path,
    config: &AlertConfig,
    observer: &O,
) -> Result<BatchReport<SourceReport>, AppError>
where
    O: BatchObserver<SourceReport> + ?Sized,
{
    let paths = discover_sources(dir, &config.source_pattern)?;
    if paths.is_empty() {
        tracing::warn!(dir = %dir.display(), pattern = %config.source_pattern, "no alert sources found");
    }
    analyze_files(&paths, config, &BatchOptions::from_config(config), observer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::TracingObserver;
    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    #[test]
    fn discovers_only_matching_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.txt", "a.txt", "notes.md"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.txt")).unwrap();

        let found = discover_sources(dir.path(), "*.txt").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn missing_directory_is_a_listing_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_sources(&dir.path().join("gone"), "*.txt").unwrap_err();
        assert_eq!(err.code, codes::BATCH_LISTING_FAILED);
    }

    #[test]
    fn unparseable_file_is_no_alerts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.txt");
        std::fs::write(&path, "just some words").unwrap();
        let parser = AlertParser::new(&AlertConfig::default()).unwrap();

        let err = analyze_source_file(&path, &parser, datetime!(2025-01-01 0:00 UTC)).unwrap_err();
        assert_eq!(err.code, codes::SOURCE_NO_ALERTS);
        assert!(err.details.unwrap().contains("ALERT_PARSE_FAILED"));
    }

    #[test]
    fn empty_directory_gives_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = process_directory(dir.path(), &AlertConfig::default(), &TracingObserver).unwrap();
        assert_eq!(report.total(), 0);
        assert_eq!(report.error_count, 0);
    }
}
