//! Cascading field extraction for a single alert text.
//!
//! Stages are plain functions tried in order; the first one that yields its required groups wins.
//! Later stages tolerate more template variants at the cost of confidence.

pub mod heuristics;

use crate::domain::{AlertStatus, ParseStage};
use crate::error::{codes, AppError};
use crate::normalize::status::classify_status;

use heuristics::{
    extract_environment, extract_http_code, extract_service_name, first_sentence, non_empty,
};

/// Literal that separates the header from the detail section in the strict template.
pub const STRICT_SEPARATOR: &str = "Problem detected at:";

/// Fields a stage managed to extract. `None` means unresolved, not "failed".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub id: Option<String>,
    pub status: Option<AlertStatus>,
    pub service: Option<String>,
    pub environment: Option<String>,
    pub start_phrase: Option<String>,
    pub end_phrase: Option<String>,
    pub duration: Option<String>,
    pub services_impacted: Option<u32>,
    pub error_message: Option<String>,
    pub http_code: Option<String>,
}

impl ExtractedFields {
    fn is_empty_core(&self) -> bool {
        self.id.is_none() && self.status.is_none() && self.service.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub stage: ParseStage,
    pub fields: ExtractedFields,
}

type Stage = fn(&str) -> Option<ExtractedFields>;

const CASCADE: [(ParseStage, Stage); 3] = [
    (ParseStage::Strict, strict_grammar),
    (ParseStage::Tagged, tagged_grammar),
    (ParseStage::Heuristic, heuristic_minimal),
];

/// Run the cascade. Only fails when id, status and service are all unresolved after the last stage.
pub fn extract_fields(text: &str) -> Result<Extraction, AppError> {
    let text = text.trim();
    for (stage, run) in CASCADE {
        if let Some(fields) = run(text) {
            return Ok(Extraction { stage, fields });
        }
    }
    let excerpt: String = text.chars().take(100).collect();
    Err(AppError::new(
        codes::ALERT_PARSE_FAILED,
        "Unable to parse alert: id, status and service are all unresolved",
    )
    .with_details(format!("excerpt={excerpt}")))
}

const TIME: &str = r"\d{1,2}:\d{2}(?:\s*(?:\([A-Za-z]{2,5}\)|[AaPp][Mm]))?";
const DATE: &str = r"\d{1,2}\.\d{1,2}\.\d{4}";

fn range_regex() -> &'static regex::Regex {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(&format!(
            r"(?P<st>{TIME})\s*(?P<sd>{DATE})\s*-\s*(?P<et>{TIME})\s*(?P<ed>{DATE})"
        ))
        .expect("static regex must compile")
    })
}

fn strict_body_regex() -> &'static regex::Regex {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(&format!(
            r"(?is)^\s*(?P<st>{TIME})\s*(?P<sd>{DATE})\s*-\s*(?P<et>{TIME})\s*(?P<ed>{DATE})\s*\(?\s*was open for\s+(?P<duration>\d+\s*[^\s\d)]+)\s*\)?\s*(?P<services>\d+)\s+impacted services?\b(?P<tail>.*)$"
        ))
        .expect("static regex must compile")
    })
}

fn phrase(time: &str, date: &str) -> String {
    format!("{} {}", time.trim(), date.trim())
}

/// Split the trailing block of a strict alert into (service, error message).
///
/// Order: an `HTTP ERROR` sentence; otherwise, for multi-line tails, the first line is the
/// service and the next sentence the message; for one-line tails the message starts at the
/// last capitalised word that follows a non-capitalised one.
pub fn split_service_and_error(tail: &str) -> Option<(Option<String>, String)> {
    let tail = tail.trim();
    if tail.is_empty() {
        return None;
    }

    if let Some(m) = static_regex!(r"(?i)HTTP ERROR \d{3}").find(tail) {
        let service = tail[..m.start()].split_whitespace().collect::<Vec<_>>().join(" ");
        let message = first_sentence(&tail[m.start()..]).to_string();
        return Some((non_empty(&service), message));
    }

    let lines: Vec<&str> = tail.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if lines.len() >= 2 {
        let rest = lines[1..].join(" ");
        return Some((Some(lines[0].to_string()), first_sentence(&rest).to_string()));
    }

    let sentence = first_sentence(tail);
    let words: Vec<&str> = sentence.split_whitespace().collect();
    let starts_upper = |w: &str| w.chars().next().is_some_and(char::is_uppercase);
    let cut = (1..words.len())
        .rev()
        .find(|&i| starts_upper(words[i]) && !starts_upper(words[i - 1]));
    match cut {
        Some(i) => Some((Some(words[..i].join(" ")), words[i..].join(" "))),
        None => Some((None, words.join(" "))),
    }
}

/// Stage A: the strict two-section template. Any missing group rejects the whole stage.
pub fn strict_grammar(text: &str) -> Option<ExtractedFields> {
    let sections: Vec<&str> = text.split(STRICT_SEPARATOR).collect();
    if sections.len() != 2 {
        return None;
    }

    let head = static_regex!(
        r"(?is)^(?P<prefix>.*?):\s*(?P<status>OPEN|ACTIVE|RESOLVED|CLOSED)\b.*?\bP-(?P<id>\d+)\s+in environment\s+(?P<env>.+?)\s*$"
    )
    .captures(sections[0].trim())?;
    let body = strict_body_regex().captures(sections[1])?;

    let (service, error_message) = split_service_and_error(&body["tail"])?;
    if !error_message.ends_with('.') {
        return None;
    }

    Some(ExtractedFields {
        id: Some(head["id"].to_string()),
        status: AlertStatus::from_keyword(&head["status"]),
        service,
        environment: non_empty(&head["env"]),
        start_phrase: Some(phrase(&body["st"], &body["sd"])),
        end_phrase: Some(phrase(&body["et"], &body["ed"])),
        duration: Some(body["duration"].trim().to_string()),
        services_impacted: Some(body["services"].parse().ok()?),
        http_code: extract_http_code(&error_message),
        error_message: Some(error_message),
    })
}

/// Independent searches shared by the lenient stages; each one may miss on its own.
fn scan_details(text: &str, fields: &mut ExtractedFields) {
    if let Some(c) = range_regex().captures(text) {
        fields.start_phrase = Some(phrase(&c["st"], &c["sd"]));
        fields.end_phrase = Some(phrase(&c["et"], &c["ed"]));
    }
    fields.duration = static_regex!(r"(?i)was open for\s+(\d+\s*[^\s\d)]+)")
        .captures(text)
        .map(|c| c[1].trim().to_string());
    fields.services_impacted = static_regex!(r"(?i)(\d+)\s+impacted services?\b")
        .captures(text)
        .and_then(|c| c[1].parse().ok());
}

/// Stage B: `<TAG> | <service> | <STATUS> ... P-<id> in environment`, plus independent detail scans.
pub fn tagged_grammar(text: &str) -> Option<ExtractedFields> {
    let head = static_regex!(
        r"(?i)(?:ПРОМ|PROM|DEV)\s*\|\s*(?P<service>[^|]+?)\s*\|\s*(?P<status>OPEN|ACTIVE|RESOLVED|CLOSED)\b[^|]*?\bP-(?P<id>\d+)\s+in environment"
    )
    .captures(text)?;

    let mut fields = ExtractedFields {
        id: Some(head["id"].to_string()),
        status: AlertStatus::from_keyword(&head["status"]),
        service: non_empty(&head["service"]),
        environment: extract_environment(text),
        ..ExtractedFields::default()
    };
    scan_details(text, &mut fields);

    if let Some(m) = static_regex!(r"HTTP ERROR (\d{3}) - ").find(text) {
        let message = first_sentence(&text[m.start()..]).to_string();
        fields.http_code = extract_http_code(&message);
        fields.error_message = Some(message);
    }
    Some(fields)
}

/// Stage C: whatever can be found anywhere in the text. `None` only when the core trio is missing.
pub fn heuristic_minimal(text: &str) -> Option<ExtractedFields> {
    let status = Some(classify_status(text)).filter(AlertStatus::is_known);
    let id = static_regex!(r"\bP-(\d+)")
        .captures(text)
        .or_else(|| static_regex!(r"(?i)\bid[:#=]\s*([A-Za-z0-9][A-Za-z0-9_-]*)").captures(text))
        .map(|c| c[1].to_string());
    let guess = extract_service_name(text);
    let service = guess.is_resolved().then_some(guess.name);

    let mut fields = ExtractedFields {
        id,
        status,
        service,
        environment: extract_environment(text),
        ..ExtractedFields::default()
    };
    if fields.is_empty_core() {
        return None;
    }
    scan_details(text, &mut fields);

    if let Some(c) = static_regex!(r"(?i)\bHTTP\s+(?:ERROR\s+)?(\d{3})").captures(text) {
        let code = c[1].to_string();
        let after = c.get(0).map_or(text.len(), |m| m.end());
        let desc = first_sentence(text[after..].trim_start_matches([' ', '-', ':', '\t']));
        fields.error_message = Some(if desc.is_empty() {
            format!("HTTP ERROR {code}")
        } else {
            format!("HTTP ERROR {code} - {desc}")
        });
        fields.http_code = Some(code);
    }
    Some(fields)
}
