use std::io::ErrorKind;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{codes, AppError};

/// Text of one source after decoding, with the encoding that succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSource {
    pub text: String,
    pub encoding: String,
}

pub fn source_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Decode raw bytes as UTF-8, falling back to a legacy single-byte encoding.
pub fn decode_bytes(bytes: &[u8], fallback_label: &str) -> Result<DecodedSource, AppError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(DecodedSource {
            text: text.to_string(),
            encoding: "utf-8".to_string(),
        });
    }

    let encoding = encoding_rs::Encoding::for_label(fallback_label.as_bytes()).ok_or_else(|| {
        AppError::new(codes::SOURCE_DECODE_FAILED, "Unknown fallback encoding")
            .with_details(format!("label={fallback_label}"))
    })?;
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(AppError::new(
            codes::SOURCE_DECODE_FAILED,
            "Source is neither UTF-8 nor valid in the fallback encoding",
        )
        .with_details(format!("fallback={}", encoding.name())));
    }
    Ok(DecodedSource {
        text: text.into_owned(),
        encoding: encoding.name().to_ascii_lowercase(),
    })
}

pub fn read_source_text(path: &Path, fallback_label: &str) -> Result<DecodedSource, AppError> {
    let bytes = std::fs::read(path).map_err(|e| {
        let code = if e.kind() == ErrorKind::NotFound {
            codes::SOURCE_NOT_FOUND
        } else {
            codes::SOURCE_READ_FAILED
        };
        AppError::new(code, "Failed to read alert source")
            .with_details(format!("path={}; err={e}", path.display()))
    })?;

    let decoded = decode_bytes(&bytes, fallback_label).map_err(|e| {
        let details = format!("path={}; {}", path.display(), e.details.clone().unwrap_or_default());
        e.with_details(details)
    })?;
    if decoded.encoding != "utf-8" {
        tracing::warn!(
            path = %path.display(),
            encoding = %decoded.encoding,
            "source was not UTF-8; decoded with fallback encoding"
        );
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn utf8_is_preferred() {
        let decoded = decode_bytes("ПРОМ | svc".as_bytes(), "windows-1251").unwrap();
        assert_eq!(decoded.encoding, "utf-8");
        assert_eq!(decoded.text, "ПРОМ | svc");
    }

    #[test]
    fn falls_back_to_windows_1251() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode("ПРОМ | Сервис | OPEN");
        let decoded = decode_bytes(&bytes, "windows-1251").unwrap();
        assert_eq!(decoded.encoding, "windows-1251");
        assert_eq!(decoded.text, "ПРОМ | Сервис | OPEN");
    }

    #[test]
    fn bom_is_stripped() {
        let decoded = decode_bytes(b"\xEF\xBB\xBFhello", "windows-1251").unwrap();
        assert_eq!(decoded.text, "hello");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_source_text(&dir.path().join("nope.txt"), "windows-1251").unwrap_err();
        assert_eq!(err.code, codes::SOURCE_NOT_FOUND);
        assert!(err.details.unwrap().contains("nope.txt"));
    }

    #[test]
    fn digest_is_sha256_hex() {
        assert_eq!(
            source_digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
