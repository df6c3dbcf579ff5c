/// Lazily compiled, process-wide regex for a literal pattern.
macro_rules! static_regex {
    ($pattern:literal) => {{
        static RE: ::std::sync::OnceLock<::regex::Regex> = ::std::sync::OnceLock::new();
        RE.get_or_init(|| ::regex::Regex::new($pattern).expect("static regex must compile"))
    }};
}

pub mod assemble;
pub mod batch;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod extract;
pub mod normalize;
pub mod report;
pub mod segment;
pub mod source;

#[cfg(test)]
mod tests {
    use super::error::AppError;

    #[test]
    fn app_error_is_structured() {
        let err = AppError::new("SOURCE_NOT_FOUND", "missing").with_retryable(false);
        assert_eq!(err.code, "SOURCE_NOT_FOUND");
        assert_eq!(err.message, "missing");
        assert_eq!(err.retryable, false);
        assert_eq!(err.to_string(), "[SOURCE_NOT_FOUND] missing");
    }

    #[test]
    fn app_error_describe_includes_details() {
        let err = AppError::new("X", "failed").with_details("path=/tmp/a");
        assert_eq!(err.describe(), "[X] failed (path=/tmp/a)");
        assert!(err.is("X"));
    }
}
