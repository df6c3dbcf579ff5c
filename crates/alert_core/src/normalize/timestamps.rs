use std::sync::OnceLock;

use regex::Regex;
use time::{format_description, Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::domain::{LogCheckWindow, ValidationWarning};

/// Time grammars tried in order after the "detected at:" anchor. The first literal match wins.
const DETECTED_AT_GRAMMARS: [(&str, &str); 5] = [
    (
        "time_msk_date",
        r"(?i)detected at:\s*(\d{1,2}:\d{2}\s*\(MSK\)\s*\d{1,2}\.\d{1,2}\.\d{4})",
    ),
    (
        "time_ampm_date",
        r"(?i)detected at:\s*(\d{1,2}:\d{2}\s*(?:AM|PM)\s*\d{1,2}\.\d{1,2}\.\d{4})",
    ),
    (
        "date_dash_time",
        r"(?i)detected at:\s*(\d{1,2}\.\d{1,2}\.\d{4}\s*-\s*\d{1,2}:\d{2})",
    ),
    (
        "date_time",
        r"(?i)detected at:\s*(\d{1,2}\.\d{1,2}\.\d{4}\s+\d{1,2}:\d{2}(?:\s*\([A-Z]+\))?)",
    ),
    (
        "time_any_tz_date",
        r"(?i)detected at:\s*(\d{1,2}:\d{2}(?:\s*\([A-Z]+\))?\s*\d{1,2}\.\d{1,2}\.\d{4})",
    ),
];

/// Allowlisted layouts for a single time phrase once its timezone marker has been removed.
const PHRASE_FORMATS: [&str; 5] = [
    "[hour padding:none]:[minute] [day padding:none].[month padding:none].[year]",
    "[hour repr:12 padding:none]:[minute] [period case_sensitive:false] [day padding:none].[month padding:none].[year]",
    "[day padding:none].[month padding:none].[year] [hour padding:none]:[minute]",
    "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]",
    "[year]-[month]-[day] [hour]:[minute]:[second]",
];

/// Timezone abbreviations seen in monitoring templates, with their fixed UTC offsets in hours.
const KNOWN_ZONES: [(&str, i8); 12] = [
    ("UTC", 0),
    ("GMT", 0),
    ("CET", 1),
    ("CEST", 2),
    ("EET", 2),
    ("EEST", 3),
    ("MSK", 3),
    ("SAMT", 4),
    ("YEKT", 5),
    ("NOVT", 7),
    ("KRAT", 7),
    ("VLAT", 10),
];

pub fn zone_offset(abbrev: &str) -> Option<UtcOffset> {
    let upper = abbrev.trim().to_ascii_uppercase();
    KNOWN_ZONES
        .iter()
        .find(|(name, _)| *name == upper)
        .and_then(|(_, hours)| UtcOffset::from_hms(*hours, 0, 0).ok())
}

fn grammars() -> &'static [(&'static str, Regex)] {
    static GRAMMARS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    GRAMMARS.get_or_init(|| {
        DETECTED_AT_GRAMMARS
            .iter()
            .filter_map(|(name, pattern)| Regex::new(pattern).ok().map(|re| (*name, re)))
            .collect()
    })
}

/// Return the literal "detected at" phrase, trying each grammar in order.
///
/// Falls back to an ISO timestamp in square brackets (`[2023-05-10 14:30:45]`) when no anchored
/// grammar matches. `None` leaves the field unresolved.
pub fn resolve_detected_at(text: &str) -> Option<String> {
    for (_, re) in grammars() {
        if let Some(caps) = re.captures(text) {
            return caps.get(1).map(|m| m.as_str().trim().to_string());
        }
    }

    static_regex!(r"\[(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}(?:\.\d+)?)\]")
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Split a phrase into (phrase without timezone marker, declared offset, declared abbreviation).
fn strip_zone(raw: &str) -> (String, Option<UtcOffset>, Option<String>) {
    let mut offset = None;
    let mut abbrev = None;
    let mut cleaned = raw.to_string();

    if let Some(caps) = static_regex!(r"\(([A-Za-z]{2,5})\)").captures(raw) {
        let name = caps[1].to_string();
        offset = zone_offset(&name);
        abbrev = Some(name);
        cleaned = cleaned.replacen(&caps[0], " ", 1);
    } else {
        // Bare abbreviation token, e.g. "10:00 MSK 01.01.2025".
        for token in raw.split_whitespace() {
            if let Some(o) = zone_offset(token) {
                offset = Some(o);
                abbrev = Some(token.to_string());
                cleaned = cleaned.replacen(token, " ", 1);
                break;
            }
        }
    }

    let mut cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some(caps) =
        static_regex!(r"^(\d{1,2}\.\d{1,2}\.\d{4})\s*-\s*(\d{1,2}:\d{2})$").captures(&cleaned)
    {
        cleaned = format!("{} {}", &caps[1], &caps[2]);
    }
    if let Some(caps) =
        static_regex!(r"^(\d{1,2}:\d{2})\s*([AaPp][Mm])\s*(\d{1,2}\.\d{1,2}\.\d{4})$")
            .captures(&cleaned)
    {
        cleaned = format!("{} {} {}", &caps[1], &caps[2], &caps[3]);
    }
    if let Some(caps) =
        static_regex!(r"^(\d{1,2}:\d{2})(\d{1,2}\.\d{1,2}\.\d{4})$").captures(&cleaned)
    {
        cleaned = format!("{} {}", &caps[1], &caps[2]);
    }

    (cleaned, offset, abbrev)
}

/// Parse a single time phrase into an instant.
///
/// Contract:
/// - A declared, known timezone is kept as the instant's offset.
/// - A missing or unknown timezone is assumed UTC and MUST produce `ALERT_TS_TZ_ASSUMED_UTC`.
/// - An unparseable phrase yields `None` plus `ALERT_TS_UNPARSEABLE`; nothing is guessed.
pub fn parse_time_phrase(
    field: &str,
    raw: &str,
    warnings: &mut Vec<ValidationWarning>,
) -> Option<OffsetDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (cleaned, offset, abbrev) = strip_zone(trimmed);

    let mut parsed = None;
    for fmt in PHRASE_FORMATS {
        let Ok(items) = format_description::parse(fmt) else {
            continue;
        };
        if let Ok(p) = PrimitiveDateTime::parse(&cleaned, &items) {
            parsed = Some(p);
            break;
        }
    }

    let Some(pdt) = parsed else {
        warnings.push(
            ValidationWarning::new(
                "ALERT_TS_UNPARSEABLE",
                format!("Unparseable timestamp for {field}; preserved raw"),
            )
            .with_details(format!("raw={trimmed}")),
        );
        return None;
    };

    match offset {
        Some(o) => Some(pdt.assume_offset(o)),
        None => {
            let details = match abbrev {
                Some(a) => format!("value={trimmed}; unknown_zone={a}"),
                None => format!("value={trimmed}"),
            };
            warnings.push(
                ValidationWarning::new(
                    "ALERT_TS_TZ_ASSUMED_UTC",
                    format!("Assumed UTC timezone for {field}"),
                )
                .with_details(details),
            );
            Some(pdt.assume_utc())
        }
    }
}

/// Derive the log-check window: `[start - margin, end + margin]`, or `[now - lookback, now]`
/// when the detection time is unresolved. A bound that falls outside the representable range
/// also falls back to the lookback window.
pub fn log_check_window(
    start: Option<OffsetDateTime>,
    end: Option<OffsetDateTime>,
    margin: Duration,
    lookback: Duration,
    now: OffsetDateTime,
) -> LogCheckWindow {
    let widened = match (start, end) {
        (Some(s), Some(e)) => Some((s, e)),
        (Some(s), None) => Some((s, s)),
        (None, Some(e)) => Some((e, e)),
        (None, None) => None,
    }
    .and_then(|(s, e)| Some((s.checked_sub(margin)?, e.checked_add(margin)?)));

    match widened {
        Some((a, b)) => LogCheckWindow::new(a, b),
        None => LogCheckWindow::new(now.checked_sub(lookback).unwrap_or(now), now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    #[test]
    fn resolves_each_grammar() {
        let cases = [
            (
                "x Problem detected at: 20:14 (MSK) 21.04.2025 Environment",
                "20:14 (MSK) 21.04.2025",
            ),
            (
                "Problem detected at: 10:15 AM 25.04.2023 - 11:30 AM 25.04.2023",
                "10:15 AM 25.04.2023",
            ),
            ("Problem detected at: 21.04.2025 - 15:30 more", "21.04.2025 - 15:30"),
            ("Problem detected at: 21.04.2025 15:30 (UTC) tail", "21.04.2025 15:30 (UTC)"),
            ("test Problem detected at: 15:30 10.05.2023 - example", "15:30 10.05.2023"),
        ];
        for (text, want) in cases {
            assert_eq!(resolve_detected_at(text).as_deref(), Some(want), "text={text}");
        }
    }

    #[test]
    fn unresolved_without_anchor() {
        assert_eq!(resolve_detected_at("20:14 (MSK) 21.04.2025"), None);
        assert_eq!(resolve_detected_at(""), None);
    }

    #[test]
    fn iso_bracket_fallback() {
        assert_eq!(
            resolve_detected_at("[2023-05-10 14:30:45] CRITICAL: CPU Usage Alert").as_deref(),
            Some("2023-05-10 14:30:45")
        );
    }

    #[test]
    fn parses_declared_zone_without_warning() {
        let mut w = Vec::new();
        let dt = parse_time_phrase("start", "20:14 (MSK) 21.04.2025", &mut w).unwrap();
        assert_eq!(dt, datetime!(2025-04-21 20:14 +3));
        assert_eq!(dt.offset(), offset!(+3));
        assert!(w.is_empty());
    }

    #[test]
    fn parses_am_pm_and_assumes_utc() {
        let mut w = Vec::new();
        let dt = parse_time_phrase("start", "11:30 PM 25.04.2023", &mut w).unwrap();
        assert_eq!(dt, datetime!(2023-04-25 23:30 UTC));
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].code, "ALERT_TS_TZ_ASSUMED_UTC");
    }

    #[test]
    fn parses_date_first_forms() {
        let mut w = Vec::new();
        assert_eq!(
            parse_time_phrase("start", "21.04.2025 - 15:30", &mut w),
            Some(datetime!(2025-04-21 15:30 UTC))
        );
        assert_eq!(
            parse_time_phrase("start", "1.4.2025 9:05 (CET)", &mut w),
            Some(datetime!(2025-04-01 09:05 +1))
        );
    }

    #[test]
    fn parses_bare_zone_token_and_iso() {
        let mut w = Vec::new();
        assert_eq!(
            parse_time_phrase("start", "10:00 MSK 01.01.2025", &mut w),
            Some(datetime!(2025-01-01 10:00 +3))
        );
        assert!(w.is_empty());
        assert_eq!(
            parse_time_phrase("start", "2023-05-10 14:30:45", &mut w),
            Some(datetime!(2023-05-10 14:30:45 UTC))
        );
    }

    #[test]
    fn unparseable_is_warned_not_guessed() {
        let mut w = Vec::new();
        assert_eq!(parse_time_phrase("start", "25:99 40.13.2025", &mut w), None);
        assert_eq!(w[0].code, "ALERT_TS_UNPARSEABLE");
    }

    #[test]
    fn window_margins_and_default() {
        let start = datetime!(2025-01-01 10:00 +3);
        let end = datetime!(2025-01-01 10:10 +3);
        let now = datetime!(2026-01-01 00:00 UTC);
        let w = log_check_window(
            Some(start),
            Some(end),
            Duration::minutes(30),
            Duration::hours(2),
            now,
        );
        assert_eq!(w.start, datetime!(2025-01-01 09:30 +3));
        assert_eq!(w.end, datetime!(2025-01-01 10:40 +3));

        let w = log_check_window(None, None, Duration::minutes(30), Duration::hours(2), now);
        assert_eq!(w.start, datetime!(2025-12-31 22:00 UTC));
        assert_eq!(w.end, now);
    }

    #[test]
    fn window_out_of_range_falls_back_to_lookback() {
        let now = datetime!(2026-01-01 00:00 UTC);
        let w = log_check_window(
            Some(datetime!(2025-01-01 10:00 UTC)),
            None,
            Duration::MAX,
            Duration::hours(2),
            now,
        );
        assert_eq!(w.start, datetime!(2025-12-31 22:00 UTC));
        assert_eq!(w.end, now);
        assert!(w.start <= w.end);

        let w = log_check_window(None, None, Duration::minutes(30), Duration::MAX, now);
        assert_eq!((w.start, w.end), (now, now));
    }
}
