use regex::Regex;

use crate::config::BoundaryPattern;
use crate::error::{codes, AppError};

/// Result of splitting one blob: which boundary pattern was active (if any) and the segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation<'a> {
    pub marker: Option<String>,
    pub segments: Vec<&'a str>,
}

/// Splits a blob of concatenated alerts at line-start boundary markers.
///
/// Patterns are tried in order; the first one with any match becomes the delimiter for the
/// whole blob. Text before the first marker is not an alert and is dropped.
#[derive(Debug, Clone)]
pub struct Segmenter {
    patterns: Vec<(String, Regex)>,
}

impl Segmenter {
    pub fn new(patterns: &[BoundaryPattern]) -> Result<Self, AppError> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for p in patterns {
            let alternatives: Vec<String> = p
                .prefixes
                .iter()
                .map(|prefix| regex::escape(prefix.trim()))
                .collect();
            let re = Regex::new(&format!(r"(?m)^[ \t]*(?:{})", alternatives.join("|"))).map_err(
                |e| {
                    AppError::new(codes::CONFIG_INVALID, "Invalid boundary pattern")
                        .with_details(format!("pattern={}; err={e}", p.name))
                },
            )?;
            compiled.push((p.name.clone(), re));
        }
        Ok(Self { patterns: compiled })
    }

    pub fn split<'a>(&self, blob: &'a str) -> Vec<&'a str> {
        self.split_with_marker(blob).segments
    }

    pub fn split_with_marker<'a>(&self, blob: &'a str) -> Segmentation<'a> {
        for (name, re) in &self.patterns {
            let starts: Vec<usize> = re.find_iter(blob).map(|m| m.start()).collect();
            if starts.is_empty() {
                continue;
            }
            let segments = starts
                .iter()
                .enumerate()
                .map(|(i, &start)| {
                    let end = starts.get(i + 1).copied().unwrap_or(blob.len());
                    blob[start..end].trim()
                })
                .filter(|s| !s.is_empty())
                .collect();
            return Segmentation {
                marker: Some(name.clone()),
                segments,
            };
        }

        let whole = blob.trim();
        Segmentation {
            marker: None,
            segments: if whole.is_empty() { Vec::new() } else { vec![whole] },
        }
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        // Built-in prefixes are literals; escaping them cannot produce an invalid regex.
        Self::new(&BoundaryPattern::defaults()).unwrap_or(Self {
            patterns: Vec::new(),
        })
    }
}
