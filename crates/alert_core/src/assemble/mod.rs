use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::AlertConfig;
use crate::domain::{
    AlertRecord, AlertStatus, ParseStage, ValidationWarning, NO_ERROR_INFORMATION,
    UNKNOWN_ID, UNKNOWN_SERVICE,
};
use crate::error::{codes, AppError};
use crate::extract::heuristics::{
    extract_current_value, extract_detail_url, extract_environment, extract_host,
    extract_http_code, extract_metric, extract_metric_event, extract_openshift_projects,
    extract_request, extract_service_name, extract_severity, extract_threshold, ServiceSource,
};
use crate::extract::{extract_fields, ExtractedFields};
use crate::normalize::status::{classify_status, status_mentions};
use crate::normalize::timestamps::{log_check_window, parse_time_phrase, resolve_detected_at};
use crate::segment::Segmenter;

fn pick_service(text: &str, stage_service: Option<String>) -> String {
    let guess = extract_service_name(text);
    if guess.source == ServiceSource::Label {
        return guess.name;
    }
    if let Some(s) = stage_service {
        return s;
    }
    if guess.is_resolved() {
        guess.name
    } else {
        UNKNOWN_SERVICE.to_string()
    }
}

/// Build one canonical record from one alert text.
///
/// Pure apart from `now`, which only matters when no detection time could be resolved.
pub fn assemble_record(
    text: &str,
    config: &AlertConfig,
    now: OffsetDateTime,
) -> Result<AlertRecord, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::new(codes::ALERT_EMPTY_TEXT, "Alert text is empty"));
    }

    let extraction = extract_fields(text)?;
    let stage = extraction.stage;
    let ExtractedFields {
        id,
        status,
        service,
        environment,
        start_phrase,
        end_phrase,
        duration,
        services_impacted,
        error_message,
        http_code,
    } = extraction.fields;

    let mut warnings = Vec::new();
    if stage != ParseStage::Strict {
        warnings.push(
            ValidationWarning::new(
                "ALERT_PARSE_DEGRADED",
                "Alert did not match the strict template; fields are best effort",
            )
            .with_details(format!("stage={stage:?}")),
        );
    }

    let mentions = status_mentions(text);
    if mentions.len() > 1 {
        let seen: Vec<&str> = mentions.iter().map(AlertStatus::as_str).collect();
        warnings.push(
            ValidationWarning::new(
                "ALERT_STATUS_AMBIGUOUS",
                "Several status keywords present; the earliest one was used",
            )
            .with_details(format!("seen={}", seen.join(","))),
        );
    }
    let status = status.unwrap_or_else(|| classify_status(text));

    let timestamp_raw = resolve_detected_at(text).or(start_phrase);
    let detected_start = timestamp_raw
        .as_deref()
        .and_then(|raw| parse_time_phrase("detected_start", raw, &mut warnings));
    let detected_end = end_phrase
        .as_deref()
        .and_then(|raw| parse_time_phrase("detected_end", raw, &mut warnings));

    if let (Some(s), Some(e)) = (detected_start, detected_end) {
        if e < s {
            warnings.push(
                ValidationWarning::new(
                    "ALERT_TS_RANGE_INVERTED",
                    "Detection end precedes start; window bounds were swapped",
                )
                .with_details(format!("start={s}; end={e}")),
            );
        }
    }
    if detected_start.is_none() && detected_end.is_none() {
        warnings.push(ValidationWarning::new(
            "ALERT_WINDOW_DEFAULTED",
            "No detection time resolved; log window defaults to the recent lookback",
        ));
    }
    let window = log_check_window(
        detected_start,
        detected_end,
        config.margin(),
        config.lookback(),
        now,
    );

    let http_code = http_code
        .or_else(|| error_message.as_deref().and_then(extract_http_code))
        .or_else(|| extract_http_code(text));

    Ok(AlertRecord {
        id: id.unwrap_or_else(|| UNKNOWN_ID.to_string()),
        status,
        service: pick_service(text, service),
        environment: environment.or_else(|| extract_environment(text)),
        http_code,
        timestamp_raw,
        timestamp_end_raw: end_phrase,
        detected_start,
        detected_end,
        duration_raw: duration,
        services_impacted: services_impacted.unwrap_or(0),
        error_message: error_message.unwrap_or_else(|| NO_ERROR_INFORMATION.to_string()),
        metric: extract_metric(text),
        metric_event: extract_metric_event(text),
        request: extract_request(text),
        threshold: extract_threshold(text),
        current_value: extract_current_value(text),
        severity: extract_severity(text),
        host: extract_host(text),
        detail_url: extract_detail_url(text),
        openshift_projects: extract_openshift_projects(text),
        log_check_window: window,
        stage,
        confidence: stage.confidence(),
        warnings,
        raw_text: text.to_string(),
    })
}

/// A segment that could not be turned into a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SegmentFailure {
    /// Zero-based position of the segment inside its blob.
    pub index: usize,
    pub error: AppError,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlobParse {
    pub marker: Option<String>,
    pub records: Vec<AlertRecord>,
    pub failures: Vec<SegmentFailure>,
}

impl BlobParse {
    pub fn segment_count(&self) -> usize {
        self.records.len() + self.failures.len()
    }
}

/// Segmenter plus assembler, configured once and reused across blobs.
#[derive(Debug, Clone)]
pub struct AlertParser {
    config: AlertConfig,
    segmenter: Segmenter,
}

impl AlertParser {
    pub fn new(config: &AlertConfig) -> Result<Self, AppError> {
        Ok(Self {
            segmenter: Segmenter::new(&config.boundary_patterns)?,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    pub fn segments<'a>(&self, blob: &'a str) -> Vec<&'a str> {
        self.segmenter.split(blob)
    }

    pub fn parse_alert(&self, text: &str, now: OffsetDateTime) -> Result<AlertRecord, AppError> {
        assemble_record(text, &self.config, now)
    }

    /// Parse every segment; one bad segment never hides the others.
    pub fn parse_blob(&self, blob: &str, now: OffsetDateTime) -> BlobParse {
        let segmentation = self.segmenter.split_with_marker(blob);
        let mut records = Vec::new();
        let mut failures = Vec::new();
        for (index, segment) in segmentation.segments.iter().enumerate() {
            match assemble_record(segment, &self.config, now) {
                Ok(record) => records.push(record),
                Err(error) => failures.push(SegmentFailure {
                    index,
                    error,
                    excerpt: segment.chars().take(100).collect(),
                }),
            }
        }
        BlobParse {
            marker: segmentation.marker,
            records,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Confidence;
    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    const STRICT: &str = "ci01_app: OPEN Custom Alert P-100 in environment Prod Problem detected at: 10:00 (MSK) 01.01.2025 - 10:10 (MSK) 01.01.2025 (was open for 10 min) 1 impacted service Web svc ci01_app Error occurred.";

    fn now() -> OffsetDateTime {
        datetime!(2025-06-01 12:00 UTC)
    }

    #[test]
    fn strict_alert_becomes_full_record() {
        let r = assemble_record(STRICT, &AlertConfig::default(), now()).unwrap();
        assert_eq!(r.id, "100");
        assert_eq!(r.status, AlertStatus::Open);
        assert_eq!(r.service, "Web svc ci01_app");
        assert_eq!(r.environment.as_deref(), Some("Prod"));
        assert_eq!(r.services_impacted, 1);
        assert_eq!(r.duration_raw.as_deref(), Some("10 min"));
        assert_eq!(r.error_message, "Error occurred.");
        assert_eq!(r.timestamp_raw.as_deref(), Some("10:00 (MSK) 01.01.2025"));
        assert_eq!(r.timestamp_end_raw.as_deref(), Some("10:10 (MSK) 01.01.2025"));
        assert_eq!(r.detected_start, Some(datetime!(2025-01-01 10:00 +3)));
        assert_eq!(r.log_check_window.start, datetime!(2025-01-01 09:30 +3));
        assert_eq!(r.log_check_window.end, datetime!(2025-01-01 10:40 +3));
        assert_eq!(r.stage, ParseStage::Strict);
        assert_eq!(r.confidence, Confidence::Full);
        assert_eq!(r.warnings, Vec::new());
    }

    #[test]
    fn unresolved_fields_use_sentinels_and_default_window() {
        let r = assemble_record("payment service is OPEN again", &AlertConfig::default(), now())
            .unwrap();
        assert_eq!(r.id, UNKNOWN_ID);
        assert_eq!(r.status, AlertStatus::Open);
        assert_eq!(r.service, "payment service");
        assert_eq!(r.error_message, NO_ERROR_INFORMATION);
        assert_eq!(r.services_impacted, 0);
        assert_eq!(r.log_check_window.start, datetime!(2025-06-01 10:00 UTC));
        assert_eq!(r.log_check_window.end, now());
        let codes: Vec<&str> = r.warnings.iter().map(|w| w.code.as_str()).collect();
        assert_eq!(codes, vec!["ALERT_PARSE_DEGRADED", "ALERT_WINDOW_DEFAULTED"]);
    }

    #[test]
    fn empty_and_hopeless_text_fail() {
        let cfg = AlertConfig::default();
        assert_eq!(
            assemble_record("  \n", &cfg, now()).unwrap_err().code,
            codes::ALERT_EMPTY_TEXT
        );
        assert_eq!(
            assemble_record("nothing to see", &cfg, now()).unwrap_err().code,
            codes::ALERT_PARSE_FAILED
        );
    }

    #[test]
    fn co_occurring_statuses_are_flagged() {
        let text = "DEV | Cache | RESOLVED P-7 in environment Test, previously OPEN";
        let r = assemble_record(text, &AlertConfig::default(), now()).unwrap();
        assert_eq!(r.status, AlertStatus::Resolved);
        assert!(r.warnings.iter().any(|w| w.code == "ALERT_STATUS_AMBIGUOUS"));
    }

    #[test]
    fn keywords_inside_words_do_not_set_status() {
        let r = assemble_record(
            "OpenShift project billing: incident RESOLVED id: 77",
            &AlertConfig::default(),
            now(),
        )
        .unwrap();
        assert_eq!(r.status, AlertStatus::Resolved);
        assert_eq!(r.id, "77");
        assert!(!r.warnings.iter().any(|w| w.code == "ALERT_STATUS_AMBIGUOUS"));
    }

    #[test]
    fn oversized_window_config_does_not_panic() {
        let cfg: AlertConfig =
            serde_json::from_str(r#"{ "log_window_margin_minutes": 9223372036854775807 }"#).unwrap();
        let text = "DEV | Cache | OPEN P-9 in environment X Problem detected at: 10:00 (MSK) 01.01.2025 - 10:10 (MSK) 01.01.2025";
        let r = assemble_record(text, &cfg, now()).unwrap();
        assert!(r.log_check_window.start <= r.log_check_window.end);
        assert_eq!(
            r.log_check_window.end - r.log_check_window.start,
            time::Duration::minutes(10 + 2 * 10_080)
        );
    }

    #[test]
    fn service_label_outranks_stage_capture() {
        let text = "DEV | Cache | OPEN P-8 in environment Test\nService Name: Redis cluster\n";
        let r = assemble_record(text, &AlertConfig::default(), now()).unwrap();
        assert_eq!(r.service, "Redis cluster");
    }

    #[test]
    fn blob_keeps_good_segments_and_reports_bad_ones() {
        let parser = AlertParser::new(&AlertConfig::default()).unwrap();
        let blob = "ПРОМ | Billing | OPEN P-1 in environment A\nПРОМ | nothing here\nПРОМ | Ledger | CLOSED P-2 in environment B";
        let parsed = parser.parse_blob(blob, now());
        assert_eq!(parsed.marker.as_deref(), Some("standard"));
        assert_eq!(parsed.segment_count(), 3);
        let ids: Vec<&str> = parsed.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(parsed.failures.len(), 1);
        assert_eq!(parsed.failures[0].index, 1);
        assert_eq!(parsed.failures[0].error.code, codes::ALERT_PARSE_FAILED);
    }
}
