use std::path::PathBuf;
use thiserror::Error;

/// Fatal problems with the structure of a single input export.
///
/// A `ParseError` only aborts the loader invocation that produced it. The
/// caller decides whether the run can continue without that source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// No line contained all of the required header tokens.
    #[error("No header row found: expected a row containing {expected}")]
    HeaderNotFound { expected: String },

    /// The CRM export has no column named exactly `Email`.
    #[error("No 'Email' column found (columns present: {found})")]
    MissingEmailColumn { found: String },

    /// A data row could not be decoded.
    #[error("Malformed row at line {line}: {message}")]
    MalformedRow { line: u64, message: String },
}

/// Precondition violations caught before any computation starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Session duration must be strictly positive and finite.
    #[error("Session duration must be a positive number of minutes, got {0}")]
    NonPositiveDuration(f64),

    /// Timeline sampling interval must be at least one minute.
    #[error("Timeline interval must be at least 1 minute, got {0}")]
    InvalidInterval(u32),

    /// At least one drop-off moment must be requested.
    #[error("Number of drop-off moments must be at least 1, got {0}")]
    InvalidTopK(usize),

    /// Score thresholds live on the 0-100 scale.
    #[error("Score threshold must be within 0..=100, got {0}")]
    InvalidThreshold(f64),

    /// An explicitly requested exclusion file could not be used.
    #[error("Exclusion config {path} is unusable: {message}")]
    ExclusionFile { path: PathBuf, message: String },
}

/// All errors produced by the engagement pipeline.
#[derive(Error, Debug)]
pub enum InsightError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A loader rejected the contents of a specific file.
    #[error("Cannot use {path}: {source}")]
    SourceParse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    /// A loader rejected in-memory text.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Pipeline parameters failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A JSON document could not be parsed or written.
    #[error("Failed to process JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A tabular export could not be written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the insight crates.
pub type Result<T> = std::result::Result<T, InsightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = InsightError::FileRead {
            path: PathBuf::from("/exports/participants.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/exports/participants.csv"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_header_not_found() {
        let err = ParseError::HeaderNotFound {
            expected: "Name, Email and Duration".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No header row found: expected a row containing Name, Email and Duration"
        );
    }

    #[test]
    fn test_error_display_missing_email_column() {
        let err = ParseError::MissingEmailColumn {
            found: "Lead Owner, Industry".to_string(),
        };
        assert!(err.to_string().contains("Lead Owner, Industry"));
    }

    #[test]
    fn test_source_parse_names_the_file() {
        let err = InsightError::SourceParse {
            path: PathBuf::from("crm.csv"),
            source: ParseError::MissingEmailColumn {
                found: "Name".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Cannot use crm.csv"));
        assert!(msg.contains("'Email'"));
    }

    #[test]
    fn test_error_display_non_positive_duration() {
        let err: InsightError = ConfigError::NonPositiveDuration(0.0).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Session duration must be a positive number of minutes, got 0"
        );
    }

    #[test]
    fn test_error_display_invalid_interval() {
        let err = ConfigError::InvalidInterval(0);
        assert_eq!(
            err.to_string(),
            "Timeline interval must be at least 1 minute, got 0"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: InsightError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: InsightError = json_err.into();
        assert!(err.to_string().contains("Failed to process JSON"));
    }
}
