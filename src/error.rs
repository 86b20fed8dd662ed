use thiserror::Error;
use tracing::{error, warn};

use crate::table::ValidationError;

/// Error severity for surfacing to a management UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
}

/// Errors from editing the replacement table (validation, import).
///
/// The engine's own event handlers never return these: replacement is a
/// convenience feature and every failure inside it is logged and swallowed.
#[derive(Error, Debug)]
pub enum ReplacerError {
    #[error("Invalid replacement entry: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Import rejected: {0}")]
    Import(String),
}

impl ReplacerError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Validation(_) => ErrorSeverity::Info,
            Self::Parse(_) => ErrorSeverity::Error,
            Self::Import(_) => ErrorSeverity::Warning,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Parse(_) => "File is not valid JSON".to_string(),
            Self::Import(msg) => format!("Invalid file format: {}", msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReplacerError>;

/// Extension trait for silent error logging with caller location tracking.
/// Use when the operation is recoverable and the user doesn't need to know.
///
/// # Examples
///
/// ```ignore
/// use text_replacer::error::ResultExt;
///
/// // Keep the previous table if the new settings can't be read
/// let settings = store.load().warn_on_err();
/// ```
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None. Use for expected failures.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_and_user_message() {
        let err = ReplacerError::Import("missing replacements object".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert!(err.user_message().contains("missing replacements object"));

        let err = ReplacerError::from(ValidationError::EmptyKeyword);
        assert_eq!(err.severity(), ErrorSeverity::Info);
        assert_eq!(err.user_message(), "Keyword cannot be empty");
    }

    #[test]
    fn test_result_ext_returns_value_or_none() {
        let ok: std::result::Result<u8, String> = Ok(3);
        assert_eq!(ok.log_err(), Some(3));

        let err: std::result::Result<u8, String> = Err("boom".to_string());
        assert_eq!(err.warn_on_err(), None);
    }
}
