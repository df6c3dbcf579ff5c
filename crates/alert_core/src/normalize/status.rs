use crate::domain::AlertStatus;

/// Status keywords in order of appearance.
///
/// A keyword counts only as a whole run of Latin letters, so `OpenShift`, `unresolved` and
/// `inactive` never match while `ПРОМOPEN` or `STATUS_CLOSED` still do.
fn keyword_hits(text: &str) -> impl Iterator<Item = AlertStatus> + '_ {
    static_regex!(r"[A-Za-z]+")
        .find_iter(text)
        .filter_map(|m| AlertStatus::from_keyword(m.as_str()))
}

/// Classify free text into a canonical status.
///
/// Matching is case-insensitive. When several distinct keywords occur, the one at the earliest
/// byte offset wins. Total: text without any keyword yields `Unknown`.
pub fn classify_status(text: &str) -> AlertStatus {
    keyword_hits(text).next().unwrap_or(AlertStatus::Unknown)
}

/// Every distinct status keyword in order of first appearance. Used to flag ambiguous alerts.
pub fn status_mentions(text: &str) -> Vec<AlertStatus> {
    let mut seen = Vec::new();
    for s in keyword_hits(text) {
        if !seen.contains(&s) {
            seen.push(s);
        }
    }
    seen
}
