use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::{codes, AppError};

/// `alerts_analysis_<YYYYMMDD_HHMMSS>.json`
pub fn default_report_name(now: OffsetDateTime) -> Result<String, AppError> {
    let stamp = now
        .format(format_description!("[year][month][day]_[hour][minute][second]"))
        .map_err(|e| {
            AppError::new(codes::EXPORT_ENCODE_FAILED, "Failed to format export timestamp")
                .with_details(e.to_string())
        })?;
    Ok(format!("alerts_analysis_{stamp}.json"))
}

/// Encode as UTF-8 JSON, 4-space indent, non-ASCII left unescaped.
pub fn encode_report_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser).map_err(|e| {
        AppError::new(codes::EXPORT_ENCODE_FAILED, "Failed to encode report JSON")
            .with_details(e.to_string())
    })?;
    buf.push(b'\n');
    Ok(buf)
}

/// Write `value` to `output`, or to a timestamped file under `results_dir` when no path is given.
pub fn save_report_json<T: Serialize + ?Sized>(
    value: &T,
    output: Option<&Path>,
    results_dir: &Path,
    now: OffsetDateTime,
) -> Result<PathBuf, AppError> {
    let path = match output {
        Some(p) => p.to_path_buf(),
        None => results_dir.join(default_report_name(now)?),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::new(codes::EXPORT_WRITE_FAILED, "Failed to create export directory")
                .with_details(format!("path={}: {}", parent.display(), e))
        })?;
    }

    let bytes = encode_report_json(value)?;
    fs::write(&path, &bytes).map_err(|e| {
        AppError::new(codes::EXPORT_WRITE_FAILED, "Failed to write report JSON")
            .with_details(format!("path={}: {}", path.display(), e))
    })?;

    tracing::info!(path = %path.display(), bytes = bytes.len(), "saved analysis report");
    Ok(path)
}
