pub mod status;
pub mod timestamps;

/// Collapse a multi-line alert into one line: trimmed non-empty lines joined by single spaces.
pub fn to_one_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
