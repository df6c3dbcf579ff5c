use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::UNKNOWN_SERVICE;

/// Environment tags that open tagged alert templates (`ПРОМ | <service> | ...`).
pub const ENVIRONMENT_TAGS: [&str; 3] = ["ПРОМ", "PROM", "DEV"];

const NOUN_PHRASE_WORDS: [&str; 8] = [
    "app",
    "service",
    "system",
    "application",
    "pod",
    "сервис",
    "система",
    "приложение",
];

/// Where a service name came from. Earlier variants are more trustworthy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServiceSource {
    Label,
    TaggedColumn,
    Column,
    ImpactedService,
    ComponentId,
    NounPhrase,
    Sentinel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceGuess {
    pub name: String,
    pub source: ServiceSource,
}

impl ServiceGuess {
    fn new(name: impl Into<String>, source: ServiceSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.source != ServiceSource::Sentinel
    }
}

/// A labelled fact surfaced alongside the record, e.g. ("Impacted applications", "2 applications").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdditionalInfo {
    pub label: String,
    pub value: String,
}

pub(crate) fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Candidate cells that are really the status or tag column of a template.
fn is_column_noise(candidate: &str) -> bool {
    let lower = candidate.to_lowercase();
    if lower.contains("status") || lower.trim_start().starts_with("problem") {
        return true;
    }
    static_regex!(r"(?i)\b(?:OPEN|ACTIVE|RESOLVED|CLOSED|ПРОМ|PROM|DEV)\b").is_match(candidate)
}

fn service_from_label(text: &str) -> Option<String> {
    let caps = static_regex!(
        r"(?is)Service Name:\s*(.*?)\s*(?:Metric Event Name|MetricName|Request:|threshold:|\n|$)"
    )
    .captures(text)?;
    non_empty(&caps[1])
}

fn service_from_tagged_column(text: &str) -> Option<String> {
    static_regex!(r"(?:ПРОМ|PROM|DEV)\s*\|\s*([^|]+?)\s*\|")
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .find(|cand| !is_column_noise(cand))
        .and_then(|c| non_empty(&c))
}

fn service_from_any_column(text: &str) -> Option<String> {
    let cells: Vec<&str> = text.split('|').collect();
    if cells.len() < 3 {
        return None;
    }
    cells[1..cells.len() - 1]
        .iter()
        .map(|c| c.trim())
        .find(|c| !c.is_empty() && !c.contains('\n') && !is_column_noise(c))
        .map(str::to_string)
}

fn service_after_impacted(text: &str) -> Option<String> {
    let caps = static_regex!(r"(?i)impacted services?[ \t]+([^\n]+)").captures(text)?;
    let rest = caps[1].trim();
    let cut = static_regex!(
        r"(?i)Metric Event|MetricName|Service Name|Request:|threshold:|HTTP ERROR|\bdefault\b"
    )
    .find(rest)
    .map(|m| m.start())
    .unwrap_or(rest.len());
    non_empty(&rest[..cut])
}

fn service_from_component_id(text: &str) -> Option<String> {
    static_regex!(r"CI\d+_([A-Za-z0-9_]+)")
        .captures(text)
        .and_then(|c| non_empty(&c[1]))
}

fn noun_phrase_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        NOUN_PHRASE_WORDS
            .iter()
            .filter_map(|w| Regex::new(&format!(r"(?i)\b(\w+\s+{w})\b")).ok())
            .collect()
    })
}

fn service_from_noun_phrase(text: &str) -> Option<String> {
    noun_phrase_patterns()
        .iter()
        .find_map(|re| re.captures(text).and_then(|c| non_empty(&c[1])))
}

/// Best-effort service name. First plausible non-empty candidate wins:
/// explicit label, tagged column, any column, text after "impacted service",
/// `CI<digits>_<name>` component id, a "<word> service/app/..." phrase, then the sentinel.
pub fn extract_service_name(text: &str) -> ServiceGuess {
    let cascade: [(ServiceSource, fn(&str) -> Option<String>); 6] = [
        (ServiceSource::Label, service_from_label),
        (ServiceSource::TaggedColumn, service_from_tagged_column),
        (ServiceSource::Column, service_from_any_column),
        (ServiceSource::ImpactedService, service_after_impacted),
        (ServiceSource::ComponentId, service_from_component_id),
        (ServiceSource::NounPhrase, service_from_noun_phrase),
    ];
    for (source, find) in cascade {
        if let Some(name) = find(text) {
            return ServiceGuess::new(name, source);
        }
    }
    ServiceGuess::new(UNKNOWN_SERVICE, ServiceSource::Sentinel)
}

/// HTTP status code: `HTTP [ERROR] <ddd>` first, then a standalone 100-599 token right before `POST`.
pub fn extract_http_code(text: &str) -> Option<String> {
    if let Some(c) = static_regex!(r"(?i)\bHTTP\s+(?:ERROR\s+)?(\d{3})\b").captures(text) {
        return Some(c[1].to_string());
    }
    static_regex!(r"(?:^|[^\w.])([1-5]\d{2})\s+POST\b")
        .captures(text)
        .map(|c| c[1].to_string())
}

/// End of the first sentence: a '.' followed by whitespace or end of text, else end of line.
pub fn first_sentence(text: &str) -> &str {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    for (i, ch) in text.char_indices() {
        match ch {
            '.' if bytes.get(i + 1).map_or(true, |b| b.is_ascii_whitespace()) => {
                return &text[..=i];
            }
            '\n' => return text[..i].trim_end(),
            _ => {}
        }
    }
    text.trim_end()
}

pub fn extract_environment(text: &str) -> Option<String> {
    static_regex!(r"(?i)in environment[ \t]+(.+?)\s*(?:Problem detected at:|\n|$)")
        .captures(text)
        .and_then(|c| non_empty(&c[1]))
}

pub fn extract_metric(text: &str) -> Option<String> {
    if let Some(c) = static_regex!(
        r"(?i)MetricName:\s*([^.]+?)\s*(?:[\n.]|Service Name:|Metric Event Name:|Request:|threshold:|$)"
    )
    .captures(text)
    {
        return non_empty(&c[1]);
    }
    static_regex!(r#"(?i)\bmetric:\s*["']?([^"',\n]+)["']?"#)
        .captures(text)
        .and_then(|c| non_empty(&c[1]))
}

pub fn extract_metric_event(text: &str) -> Option<String> {
    static_regex!(r"(?i)Metric Event Name:\s*([^.]+?)\s*(?:[\n.]|Request:|threshold:|$)")
        .captures(text)
        .and_then(|c| non_empty(&c[1]))
}

pub fn extract_request(text: &str) -> Option<String> {
    static_regex!(r"(?i)Request:\s*([^.]+?)\s*(?:[\n.]|threshold:|$)")
        .captures(text)
        .and_then(|c| non_empty(&c[1]))
}

pub fn extract_threshold(text: &str) -> Option<f64> {
    static_regex!(r"(?i)threshold[:\s]+(\d+(?:\.\d+)?)")
        .captures(text)
        .and_then(|c| c[1].parse().ok())
}

pub fn extract_current_value(text: &str) -> Option<f64> {
    static_regex!(r"(?i)\bcurrent(?:\s+value)?[:\s]+(\d+(?:\.\d+)?)")
        .captures(text)
        .or_else(|| static_regex!(r"(?i)\bvalue[:\s]+(\d+(?:\.\d+)?)").captures(text))
        .and_then(|c| c[1].parse().ok())
}

pub fn extract_severity(text: &str) -> Option<String> {
    static_regex!(r"(?i)\b(CRITICAL|WARNING|ERROR|INFO)\b")
        .captures(text)
        .map(|c| c[1].to_ascii_uppercase())
}

pub fn extract_host(text: &str) -> Option<String> {
    static_regex!(r"(?i)\bhost[:\s]+([^\s,]+)")
        .captures(text)
        .and_then(|c| non_empty(&c[1]))
}

pub fn extract_detail_url(text: &str) -> Option<String> {
    static_regex!(r"https?://\S+")
        .find(text)
        .map(|m| m.as_str().to_string())
}

/// OpenShift console hosts, or Kubernetes namespaces when no console link is present.
/// Order of first appearance, duplicates dropped.
pub fn extract_openshift_projects(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for m in static_regex!(r"console\.[a-z0-9-]+\.k8s(?:\.[a-z0-9-]+)+").find_iter(text) {
        let host = m.as_str().to_string();
        if !out.contains(&host) {
            out.push(host);
        }
    }
    if !out.is_empty() {
        return out;
    }
    for c in static_regex!(r"(?i)\bnamespace[:\s]\s*([a-z0-9][a-z0-9-]*)").captures_iter(text) {
        let ns = c[1].to_string();
        if !out.contains(&ns) {
            out.push(ns);
        }
    }
    out
}

fn label_to_line_end(text: &str, re: &Regex) -> Option<String> {
    re.captures(text).and_then(|c| non_empty(&c[1]))
}

/// Secondary facts worth showing next to a record, in a fixed order.
pub fn extract_additional_info(text: &str) -> Vec<AdditionalInfo> {
    let mut out = Vec::new();
    let mut push = |label: &str, value: String| {
        out.push(AdditionalInfo {
            label: label.to_string(),
            value,
        })
    };

    if let Some(c) = static_regex!(r"(\d+) impacted infrastructure component").captures(text) {
        push("Impacted components", format!("{} infrastructure components", &c[1]));
    }
    if let Some(c) = static_regex!(r"(\d+) impacted application").captures(text) {
        push("Impacted applications", format!("{} applications", &c[1]));
    }
    if let Some(c) =
        static_regex!(r"Problem detected at: (.*?) - (.*?) \(was open for (.*?)\)").captures(text)
    {
        push("Problem start", c[1].trim().to_string());
        push("Problem end", c[2].trim().to_string());
        push("Duration", c[3].trim().to_string());
    }
    if let Some(v) = label_to_line_end(text, static_regex!(r"Service Name: (.*?)(?:\n|$)")) {
        push("Service name", v);
    }
    if let Some(v) = label_to_line_end(text, static_regex!(r"MetricName: (.*?)(?:\n|$)")) {
        push("Metric name", v);
    }
    if let Some(v) = label_to_line_end(text, static_regex!(r"Metric Event Name: (.*?)(?:\n|$)")) {
        push("Metric event", v);
    }
    if let Some(v) = label_to_line_end(text, static_regex!(r"threshold: (.*?)(?:\n|$)")) {
        push("Threshold", v);
    }
    if let Some(url) = extract_detail_url(text) {
        push("Details URL", url);
    }
    if let Some(v) =
        label_to_line_end(text, static_regex!(r"Kubernetes workload[ \t]*\n\s*(.*?)(?:\n|$)"))
    {
        push("Kubernetes workload", v);
    }
    out
}
