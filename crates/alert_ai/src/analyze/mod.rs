//! Alert analysis on top of the parsing core.
//!
//! The analyzer is an opaque collaborator: any failure it reports is logged and replaced by
//! [`FALLBACK_ANALYSIS`], never surfaced as a parse or batch error.

use std::path::{Path, PathBuf};

use alert_core::assemble::AlertParser;
use alert_core::batch::{run_batch, BatchObserver, BatchOptions, BatchReport};
use alert_core::config::AlertConfig;
use alert_core::domain::AlertRecord;
use alert_core::error::AppError;
use alert_core::source::read_source_text;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::analyzer::Analyzer;
use crate::config::AnalyzerConfig;

mod prompts;

pub use prompts::{brief_analysis_prompt, full_analysis_prompt};

pub const FALLBACK_ANALYSIS: &str = "Sorry, the analysis assistant could not produce a response because of a technical problem. The alert was parsed; review the structured fields and retry later.";

fn record_context(record: Option<&AlertRecord>) -> Map<String, Value> {
    match record.map(serde_json::to_value) {
        Some(Ok(Value::Object(map))) => map,
        _ => Map::new(),
    }
}

/// Analyze one alert text. Never fails; analyzer errors degrade to [`FALLBACK_ANALYSIS`].
pub fn analyze_alert(
    analyzer: &(impl Analyzer + ?Sized),
    cfg: &AnalyzerConfig,
    alert_text: &str,
    record: Option<&AlertRecord>,
    brief: bool,
) -> String {
    let prompt = if brief {
        brief_analysis_prompt(alert_text)
    } else {
        full_analysis_prompt(alert_text)
    };
    let context = record_context(record);

    match analyzer.analyze(&prompt, cfg.max_tokens(brief), &context) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(code = %e.code, error = %e.describe(), brief, "alert analysis failed; using fallback");
            FALLBACK_ANALYSIS.to_string()
        }
    }
}

/// Which alert of a multi-alert source to analyze. Numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertSelection {
    #[default]
    Auto,
    Number(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceAnalysis {
    pub source: String,
    pub alert_count: usize,
    /// 1-based number of the analyzed alert, `None` when nothing was sent to the analyzer.
    pub analyzed_alert: Option<usize>,
    pub brief: bool,
    pub record: Option<AlertRecord>,
    pub analysis: String,
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Analyze a source file: a chosen alert in full, otherwise the first alert briefly
/// (several alerts) or in full (one alert).
pub fn analyze_source(
    analyzer: &(impl Analyzer + ?Sized),
    cfg: &AnalyzerConfig,
    parser: &AlertParser,
    path: &Path,
    selection: AlertSelection,
    now: OffsetDateTime,
) -> Result<SourceAnalysis, AppError> {
    let decoded = read_source_text(path, &parser.config().fallback_encoding)?;
    let alerts = parser.segments(&decoded.text);
    let source = path.display().to_string();
    let count = alerts.len();
    tracing::info!(source = %source, alerts = count, "analyzing alert source");

    let (index, brief) = match selection {
        AlertSelection::Number(n) if n == 0 || n > count => {
            return Ok(SourceAnalysis {
                source: source.clone(),
                alert_count: count,
                analyzed_alert: None,
                brief: false,
                record: None,
                analysis: format!(
                    "Source {source} contains {count} alert(s). There is no alert number {n}."
                ),
            });
        }
        AlertSelection::Number(n) => (n - 1, false),
        AlertSelection::Auto if count == 0 => {
            return Ok(SourceAnalysis {
                source: source.clone(),
                alert_count: 0,
                analyzed_alert: None,
                brief: false,
                record: None,
                analysis: format!("No alerts found in {source}"),
            });
        }
        AlertSelection::Auto => (0, count > 1),
    };

    let text = alerts[index];
    let record = match parser.parse_alert(text, now) {
        Ok(r) => Some(r),
        Err(e) => {
            tracing::warn!(source = %source, alert = index + 1, error = %e.describe(), "alert not parsed; analyzing raw text");
            None
        }
    };
    let mut analysis = analyze_alert(analyzer, cfg, text, record.as_ref(), brief);
    if brief {
        analysis = format!(
            "Found {count} alerts in {}\n\nBrief analysis of the first alert:\n{analysis}\n\nTo analyze another alert, select it by number, e.g. alert 2.",
            file_label(path)
        );
    }

    Ok(SourceAnalysis {
        source,
        alert_count: count,
        analyzed_alert: Some(index + 1),
        brief,
        record,
        analysis,
    })
}

/// Run [`analyze_source`] across many files with the batch orchestrator.
pub fn analyze_sources_with_ai<A, O>(
    analyzer: &A,
    cfg: &AnalyzerConfig,
    alert_config: &AlertConfig,
    paths: &[PathBuf],
    options: &BatchOptions,
    observer: &O,
) -> Result<BatchReport<SourceAnalysis>, AppError>
where
    A: Analyzer + Sync + ?Sized,
    O: BatchObserver<SourceAnalysis> + ?Sized,
{
    let parser = AlertParser::new(alert_config)?;
    Ok(run_batch(
        paths,
        options,
        |path: &Path| {
            analyze_source(
                analyzer,
                cfg,
                &parser,
                path,
                AlertSelection::Auto,
                OffsetDateTime::now_utc(),
            )
        },
        observer,
    ))
}
