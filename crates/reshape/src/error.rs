//! Error types for the reshape crate.
//!
//! Two channels are kept apart. [`ConfigError`] is returned by setters that
//! reject invalid input; the pipeline also records it as its last error and in
//! the operation log. [`PipelineError`] is returned by terminal operations when
//! execution itself fails, most often because a caller-supplied function did.

use thiserror::Error;

/// Invalid configuration passed to a setter.
///
/// A rejected setter leaves the pipeline configuration unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Field path is empty or has an empty segment.
    #[error("invalid field name: '{0}'")]
    InvalidField(String),

    /// Sort direction other than `asc` or `desc`.
    #[error("invalid sort direction '{0}' (expected 'asc' or 'desc')")]
    InvalidDirection(String),

    #[error("limit must not be negative, got {0}")]
    NegativeLimit(i64),

    #[error("offset must not be negative, got {0}")]
    NegativeOffset(i64),

    /// Output field list that cannot be used (e.g. empty entries).
    #[error("invalid output field list: {0}")]
    InvalidFieldList(String),

    /// Group key that is empty or uses a wildcard.
    #[error("invalid group-by key: '{0}'")]
    InvalidGroupKey(String),

    #[error("invalid regex pattern for '{field}': {message}")]
    InvalidRegex { field: String, message: String },

    /// Filter rule whose value does not fit its operator.
    #[error("invalid filter rule for '{field}': {message}")]
    InvalidFilterRule { field: String, message: String },

    /// Filter logic other than `AND` or `OR`.
    #[error("invalid filter logic '{0}' (expected 'AND' or 'OR')")]
    InvalidLogic(String),

    /// CSV delimiter or enclosure that is not a single ASCII character.
    #[error("invalid CSV {which} '{value}': must be a single ASCII character")]
    InvalidCsvChar { which: &'static str, value: char },
}

/// Failure while executing a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A caller-supplied cast, predicate or transform returned an error.
    #[error("callback failed: {0}")]
    Callback(#[source] anyhow::Error),

    /// Construction input that is not a dataset of records.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A terminal operation was given an invalid argument.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV serialization failed: {0}")]
    Csv(String),
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::Csv(err.to_string())
    }
}

impl From<csv::IntoInnerError<csv::Writer<Vec<u8>>>> for PipelineError {
    fn from(err: csv::IntoInnerError<csv::Writer<Vec<u8>>>) -> Self {
        PipelineError::Csv(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for PipelineError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        PipelineError::Csv(err.to_string())
    }
}

/// Result type for pipeline execution.
pub type Result<T> = std::result::Result<T, PipelineError>;
