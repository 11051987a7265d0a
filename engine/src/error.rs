//! Error types for the delimit reader and writer engines.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ConfigError`] - structural configuration problems, raised before any row is read
//! - [`ConversionError`] - a raw text could not be converted to its declared type
//! - [`ReaderError`] - fatal read failures (open, I/O, per-field conversion, cancellation)
//! - [`WriterError`] - fatal write failures
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Non-fatal problems are never errors; they travel through
//! [`crate::diagnostics::Diagnostics`].

use std::path::Path;

use thiserror::Error;

use crate::model::DataType;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Structural configuration errors.
///
/// The caller must fix the configuration before opening a file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The qualifier is a carriage return or line feed.
    #[error("The text qualifier can not be a line break character")]
    QualifierIsLineBreak,

    /// The delimiter is a carriage return or line feed.
    #[error("The field delimiter can not be a line break character")]
    DelimiterIsLineBreak,

    /// Qualifier and delimiter are the same character.
    #[error("The text qualifier and the field delimiter can not both be '{0}'")]
    QualifierEqualsDelimiter(char),

    /// The escape prefix collides with another structural character.
    #[error("The escape prefix '{0}' can not be the delimiter, the qualifier or a line break")]
    EscapeConflict(char),

    /// Decimal and group separator are identical.
    #[error("Decimal and group separator can not both be '{0}'")]
    SeparatorConflict(String),

    /// No decimal separator was given.
    #[error("The decimal separator can not be empty")]
    EmptyDecimalSeparator,

    /// Two columns share the same (case-insensitive) name.
    #[error("Column '{0}' is defined more than once")]
    DuplicateColumn(String),

    /// A regex replace format carries an invalid pattern.
    #[error("Invalid regular expression '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    /// Fixed-width reading needs a length for every column.
    #[error("Fixed width reading requires a field length for column '{0}'")]
    MissingFieldLength(String),

    /// Fixed-width reading without any declared column.
    #[error("Fixed width reading requires declared columns")]
    NoFixedWidthColumns,
}

// =============================================================================
// Conversion Errors
// =============================================================================

/// A raw text could not be converted to the column's declared type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("'{value}' is not a valid {data_type}: {message}")]
pub struct ConversionError {
    pub data_type: DataType,
    pub value: String,
    pub message: String,
}

impl ConversionError {
    pub fn new(data_type: DataType, value: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            data_type,
            value: value.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Reader Errors
// =============================================================================

/// Fatal errors of the reader engine.
///
/// Every variant carries enough context to localize the failure.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Invalid dialect or column configuration.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The file could not be opened.
    #[error("Could not open '{file}': {source}")]
    Open {
        file: String,
        #[source]
        source: std::io::Error,
    },

    /// The underlying stream failed.
    #[error("Read error: {0}")]
    Io(#[from] std::io::Error),

    /// A field could not be converted; the row's typed values are not available.
    #[error("Record {record} (line {line}), column '{column}': {source}")]
    Conversion {
        record: u64,
        line: u64,
        column: String,
        #[source]
        source: ConversionError,
    },

    /// The caller cancelled the read.
    #[error("Reading was cancelled after {records} records")]
    Cancelled { records: u64 },
}

impl ReaderError {
    /// Wrap an open failure with the short display name of the file.
    pub fn open(path: &Path, source: std::io::Error) -> Self {
        Self::Open {
            file: display_name(path),
            source,
        }
    }
}

// =============================================================================
// Writer Errors
// =============================================================================

/// Fatal errors of the writer engine.
#[derive(Debug, Error)]
pub enum WriterError {
    /// Invalid dialect or column configuration.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Not a single output column could be resolved.
    #[error("No columns defined to be written")]
    NoColumns,

    /// The destination could not be created.
    #[error("Could not create '{file}': {source}")]
    Open {
        file: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing to the sink failed.
    #[error("Write error: {0}")]
    Io(#[from] std::io::Error),

    /// The source of the rows failed.
    #[error("Source error: {0}")]
    Reader(#[from] ReaderError),

    /// The caller cancelled the write; output written so far is left intact.
    #[error("Writing was cancelled after {records} records")]
    Cancelled { records: u64 },
}

impl WriterError {
    /// Wrap a create failure with the short display name of the file.
    pub fn open(path: &Path, source: std::io::Error) -> Self {
        Self::Open {
            file: display_name(path),
            source,
        }
    }
}

/// Short display name of a file, used in user visible messages.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration checks.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for value conversion.
pub type ConversionResult<T> = Result<T, ConversionError>;

/// Result type for reader operations.
pub type ReaderResult<T> = Result<T, ReaderError>;

/// Result type for writer operations.
pub type WriterResult<T> = Result<T, WriterError>;
