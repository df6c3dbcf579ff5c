use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::batch::{BatchReport, JobOutcome, SourceReport};
use crate::domain::AlertRecord;

const RAW_EXCERPT_CHARS: usize = 150;

fn fmt_instant(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_else(|_| t.to_string())
}

fn push_field(out: &mut String, label: &str, value: impl std::fmt::Display) {
    out.push_str(&format!("**{label}:** {value}\n"));
}

/// Markdown view of one record. Field order is fixed so output is snapshot-testable.
pub fn format_alert_report(record: &AlertRecord, include_raw: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Alert {} - {}\n\n", record.id, record.status));

    push_field(&mut out, "Service", &record.service);
    if record.has_resolved_id() {
        push_field(&mut out, "Problem", format!("P-{}", record.id));
    }
    if let Some(env) = &record.environment {
        push_field(&mut out, "Environment", env);
    }
    if let Some(code) = &record.http_code {
        push_field(&mut out, "HTTP code", code);
    }
    if let Some(ts) = &record.timestamp_raw {
        push_field(&mut out, "Time", ts);
    }
    if let Some(v) = &record.metric {
        push_field(&mut out, "Metric", v);
    }
    if let Some(v) = &record.metric_event {
        push_field(&mut out, "Metric Event Name", v);
    }
    if let Some(v) = &record.request {
        push_field(&mut out, "Request", v);
    }
    if let Some(v) = record.threshold {
        push_field(&mut out, "Threshold", v);
    }
    if let Some(v) = record.current_value {
        push_field(&mut out, "Current value", v);
    }
    if let Some(v) = &record.duration_raw {
        push_field(&mut out, "Duration", v);
    }
    if record.services_impacted > 0 {
        push_field(&mut out, "Impacted services", record.services_impacted);
    }
    if record.has_error_information() {
        push_field(&mut out, "Error message", &record.error_message);
    }
    if !record.openshift_projects.is_empty() {
        push_field(&mut out, "OpenShift projects", record.openshift_projects.join(", "));
    }
    push_field(
        &mut out,
        "Log check window",
        format!(
            "{} .. {}",
            fmt_instant(record.log_check_window.start),
            fmt_instant(record.log_check_window.end)
        ),
    );

    if include_raw {
        let excerpt: String = record.raw_text.chars().take(RAW_EXCERPT_CHARS).collect();
        out.push_str("\n**Raw alert text:**\n```\n");
        out.push_str(&excerpt);
        if record.raw_text.chars().count() > RAW_EXCERPT_CHARS {
            out.push_str("...");
        }
        out.push_str("\n```\n");
    }
    out
}

pub fn format_multiple_reports(records: &[AlertRecord], include_raw: bool) -> String {
    if records.is_empty() {
        return "No alerts to display.".to_string();
    }
    records
        .iter()
        .enumerate()
        .map(|(i, r)| format!("### Alert #{}\n\n{}", i + 1, format_alert_report(r, include_raw)))
        .collect::<Vec<_>>()
        .join("\n---\n\n")
}

/// Rebuild alert text in the strict template from a record.
pub fn render_alert_text(record: &AlertRecord) -> String {
    format!(
        "alert: {status} Custom Alert P-{id} in environment {env} Problem detected at: {start} - {end} (was open for {duration}) {count} impacted service\n{service}\n{error}",
        status = record.status,
        id = record.id,
        env = record.environment.as_deref().unwrap_or("unknown"),
        start = record.timestamp_raw.as_deref().unwrap_or_default(),
        end = record.timestamp_end_raw.as_deref().unwrap_or_default(),
        duration = record.duration_raw.as_deref().unwrap_or_default(),
        count = record.services_impacted,
        service = record.service,
        error = record.error_message,
    )
}

/// One line per source, sorted by source path, followed by the totals.
pub fn format_batch_summary(report: &BatchReport<SourceReport>) -> String {
    let mut out = String::new();
    for (source, job) in &report.results {
        match &job.outcome {
            JobOutcome::Success { payload } => out.push_str(&format!(
                "OK    {source}: {} alert(s), {} failed segment(s)\n",
                payload.alert_count,
                payload.failures.len()
            )),
            JobOutcome::Error { code, message, .. } => {
                out.push_str(&format!("ERROR {source}: [{code}] {message}\n"))
            }
        }
    }
    out.push_str(&format!(
        "total={} success={} error={} elapsed_ms={}\n",
        report.total(),
        report.success_count,
        report.error_count,
        report.elapsed_ms
    ));
    out
}
