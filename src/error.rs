//! Error types for feature-forge operations.
//!
//! Each subsystem reports failures through its own enum:
//! - Schema loading and validation
//! - Document store access
//! - Table, array and object persistence
//! - Feature encoding and scaling
//!
//! Stages never let those escape directly. Everything that crosses a stage
//! boundary is folded into a [`PipelineError`], which records the kind of
//! failure, a message, the source location that raised it and the
//! underlying cause.

use std::fmt;
use std::panic::Location;
use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::config::ConfigError;

/// Boxed cause carried by a [`PipelineError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while loading or checking a schema document.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read schema file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Schema declares no columns")]
    EmptyColumns,

    #[error("Column entry #{index} must map exactly one name to a type")]
    MalformedColumn { index: usize },

    #[error("Column '{column}' has unsupported type '{dtype}'")]
    UnsupportedType { column: String, dtype: String },

    #[error("Column '{0}' is declared more than once")]
    DuplicateColumn(String),

    #[error("Column '{column}' listed in {role} is not declared in columns")]
    UnknownColumn { role: String, column: String },

    #[error("Column '{0}' is listed in both num_features and mm_columns")]
    ConflictingScaling(String),

    #[error("Identifier column '{column}' is scheduled for dropping but is also referenced in {role}")]
    DropColumnReferenced { column: String, role: String },

    #[error("Target column '{0}' cannot be a scaled feature")]
    ScaledTarget(String),

    #[error("Invalid binary mapping for column '{column}': {message}")]
    InvalidBinaryMapping { column: String, message: String },
}

/// Errors that can occur while talking to the document store.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Collection '{collection}' not found in database '{database}'")]
    CollectionNotFound { database: String, collection: String },

    #[error("Collection '{0}' contains no records")]
    EmptyCollection(String),

    #[error("Malformed document in '{collection}' at record {record}: {message}")]
    MalformedDocument {
        collection: String,
        record: usize,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// Errors that can occur while persisting or loading tables, arrays and objects.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Column '{0}' not found in table")]
    MissingColumn(String),

    #[error("Shape mismatch: {0}")]
    Shape(String),
}

impl StorageError {
    /// Attaches a path to an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors that can occur while encoding or scaling feature columns.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Column '{column}' required by {role} is missing from the table")]
    MissingColumn { role: String, column: String },

    #[error("Column '{column}' has non-numeric type {data_type} after normalization")]
    NonNumericColumn { column: String, data_type: String },

    #[error("Column '{column}' contains value '{value}' which has no binary mapping")]
    UnknownCategory { column: String, value: String },

    #[error("Column '{column}' must hold strings for binary mapping, found {data_type}")]
    UnexpectedType { column: String, data_type: String },

    #[error("Indicator column '{0}' collides with an existing column")]
    DuplicateColumn(String),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Broad classification of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed schema, invalid split ratio, missing path or column mapping.
    Configuration,
    /// File read or write failure.
    Io,
    /// Document store connectivity or content failure.
    Source,
    /// Transformation invoked without a passing validation artifact.
    ValidationGate,
    /// Data that cannot be encoded (unknown category, shape mismatch).
    Data,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Io => write!(f, "I/O"),
            ErrorKind::Source => write!(f, "source"),
            ErrorKind::ValidationGate => write!(f, "validation gate"),
            ErrorKind::Data => write!(f, "data"),
        }
    }
}

/// The single error shape returned by every stage.
///
/// Construction logs the failure, so callers only propagate.
#[derive(Debug, Error)]
#[error("{kind} error at {origin}: {message}")]
pub struct PipelineError {
    kind: ErrorKind,
    message: String,
    origin: &'static Location<'static>,
    #[source]
    source: Option<BoxError>,
}

impl PipelineError {
    /// Creates an error without an underlying cause.
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::build(kind, message.into(), None, Location::caller())
    }

    /// Wraps an underlying cause.
    #[track_caller]
    pub fn wrap(kind: ErrorKind, message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::build(kind, message.into(), Some(cause.into()), Location::caller())
    }

    /// Shorthand for a configuration error without a cause.
    #[track_caller]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::build(
            ErrorKind::Configuration,
            message.into(),
            None,
            Location::caller(),
        )
    }

    /// Shorthand for a validation-gate error.
    #[track_caller]
    pub fn validation_gate(message: impl Into<String>) -> Self {
        Self::build(
            ErrorKind::ValidationGate,
            message.into(),
            None,
            Location::caller(),
        )
    }

    fn build(
        kind: ErrorKind,
        message: String,
        source: Option<BoxError>,
        origin: &'static Location<'static>,
    ) -> Self {
        match &source {
            Some(cause) => tracing::error!(
                kind = %kind,
                origin = %origin,
                cause = %cause,
                "{}",
                message
            ),
            None => tracing::error!(kind = %kind, origin = %origin, "{}", message),
        }
        Self {
            kind,
            message,
            origin,
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Source location that raised the error.
    pub fn origin(&self) -> &'static Location<'static> {
        self.origin
    }
}

/// Adds stage context to any fallible result.
pub trait ResultExt<T> {
    /// Converts the error into a [`PipelineError`] of the given kind.
    fn or_fail(self, kind: ErrorKind, message: impl Into<String>) -> Result<T, PipelineError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<BoxError>,
{
    #[track_caller]
    fn or_fail(self, kind: ErrorKind, message: impl Into<String>) -> Result<T, PipelineError> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(PipelineError::build(
                kind,
                message.into(),
                Some(err.into()),
                Location::caller(),
            )),
        }
    }
}

impl From<ConfigError> for PipelineError {
    #[track_caller]
    fn from(err: ConfigError) -> Self {
        let kind = match err {
            ConfigError::Io(_) => ErrorKind::Io,
            _ => ErrorKind::Configuration,
        };
        Self::build(
            kind,
            "invalid pipeline configuration".to_string(),
            Some(Box::new(err)),
            Location::caller(),
        )
    }
}

impl From<SchemaError> for PipelineError {
    #[track_caller]
    fn from(err: SchemaError) -> Self {
        let kind = match err {
            SchemaError::Io { .. } => ErrorKind::Io,
            _ => ErrorKind::Configuration,
        };
        Self::build(
            kind,
            "schema could not be loaded".to_string(),
            Some(Box::new(err)),
            Location::caller(),
        )
    }
}

impl From<SourceError> for PipelineError {
    #[track_caller]
    fn from(err: SourceError) -> Self {
        Self::build(
            ErrorKind::Source,
            "document store request failed".to_string(),
            Some(Box::new(err)),
            Location::caller(),
        )
    }
}

impl From<StorageError> for PipelineError {
    #[track_caller]
    fn from(err: StorageError) -> Self {
        let kind = storage_kind(&err);
        Self::build(
            kind,
            "storage operation failed".to_string(),
            Some(Box::new(err)),
            Location::caller(),
        )
    }
}

impl From<FeatureError> for PipelineError {
    #[track_caller]
    fn from(err: FeatureError) -> Self {
        let kind = match &err {
            FeatureError::MissingColumn { .. }
            | FeatureError::NonNumericColumn { .. }
            | FeatureError::DuplicateColumn(_) => ErrorKind::Configuration,
            FeatureError::UnknownCategory { .. }
            | FeatureError::UnexpectedType { .. }
            | FeatureError::Shape(_) => ErrorKind::Data,
            FeatureError::Storage(inner) => storage_kind(inner),
        };
        Self::build(
            kind,
            "feature transformation failed".to_string(),
            Some(Box::new(err)),
            Location::caller(),
        )
    }
}

fn storage_kind(err: &StorageError) -> ErrorKind {
    match err {
        StorageError::MissingColumn(_) => ErrorKind::Configuration,
        StorageError::Shape(_) => ErrorKind::Data,
        _ => ErrorKind::Io,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_pipeline_error_records_origin() {
        let err = PipelineError::configuration("split ratio out of range");
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.message(), "split ratio out of range");
        assert!(err.origin().file().ends_with("error.rs"));
        assert!(err.source().is_none());
    }

    #[test]
    fn test_pipeline_error_display_includes_kind_and_origin() {
        let err = PipelineError::validation_gate("data validation failed");
        let text = err.to_string();
        assert!(text.starts_with("validation gate error at "));
        assert!(text.contains("error.rs"));
        assert!(text.ends_with("data validation failed"));
    }

    #[test]
    fn test_wrap_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.csv");
        let err = PipelineError::wrap(ErrorKind::Io, "could not read train file", io);
        assert_eq!(err.kind(), ErrorKind::Io);
        let cause = err.source().expect("cause should be attached");
        assert!(cause.to_string().contains("missing.csv"));
    }

    #[test]
    fn test_or_fail_converts_errors() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = result
            .or_fail(ErrorKind::Io, "write failed")
            .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.message(), "write failed");
        assert!(err.origin().file().ends_with("error.rs"));
    }

    #[test]
    fn test_from_conversions_pick_kind() {
        let err: PipelineError = SourceError::EmptyCollection("cars".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Source);

        let err: PipelineError = SchemaError::EmptyColumns.into();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err: PipelineError = StorageError::MissingColumn("Response".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err: PipelineError = FeatureError::UnknownCategory {
            column: "Gender".to_string(),
            value: "Other".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Data);

        let err: PipelineError =
            StorageError::io("x.csv", std::io::Error::other("disk full")).into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_schema_error_display() {
        let err = SchemaError::UnknownColumn {
            role: "num_features".to_string(),
            column: "Speed".to_string(),
        };
        assert!(err.to_string().contains("Speed"));
        assert!(err.to_string().contains("num_features"));
    }
}
