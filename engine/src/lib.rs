//! # Delimit - delimited and structured text interchange
//!
//! Delimit reads CSV-like files (any delimiter, qualifier, escape prefix,
//! comments, placeholders, fixed width) into typed rows and writes typed rows
//! back as delimited, fixed-width, JSON or XML text.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────┐   ┌───────────┐   ┌───────────┐   ┌───────────┐
//! │   Bytes   │──▶│ Tokenizer │──▶│ Formatter │──▶│  Convert  │──▶│  Typed    │
//! │ (decoded) │   │ (dialect) │   │ (per type)│   │ (formats) │   │  rows     │
//! └───────────┘   └───────────┘   └───────────┘   └───────────┘   └─────┬─────┘
//!                                                                       │
//!                        ┌───────────┐   ┌───────────┐                  │
//!                        │   Text    │◀──│  Writer   │◀─────────────────┘
//!                        │ CSV/JSON/ │   │ (columns) │
//!                        │  XML/FW   │   └───────────┘
//!                        └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use delimit::{CancellationToken, ColumnCollection, CsvReader, DialectConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut reader = CsvReader::open("input.csv", DialectConfig::default(), ColumnCollection::new())
//!         .await
//!         .unwrap();
//!     let cancel = CancellationToken::new();
//!     while let Some(record) = reader.read_record(&cancel).await.unwrap() {
//!         let values = reader.convert(&record).await.unwrap();
//!         println!("{:?}", values);
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error hierarchy
//! - [`diagnostics`] - Warnings, progress, cancellation and status
//! - [`model`] - Data types, value formats, columns and dialects
//! - [`convert`] - Text to typed value conversion and back
//! - [`formatter`] - Column formatters
//! - [`reader`] - Tokenizer and typed reader
//! - [`writer`] - Delimited, fixed-width and structured writers
//! - [`source`] - Row source capability and byte decoding

// Core modules
pub mod diagnostics;
pub mod error;
pub mod model;

// Conversion
pub mod convert;
pub mod formatter;

// Engines
pub mod reader;
pub mod source;
pub mod writer;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ConfigResult, ConversionError, ConversionResult, ReaderError, ReaderResult,
    WriterError, WriterResult,
};

// =============================================================================
// Re-exports - Diagnostics
// =============================================================================

pub use diagnostics::{
    CancellationToken, Diagnostic, Diagnostics, DiagnosticsReport, EngineStatus, Progress,
    ProgressReporter, Severity, StatusFlag, WarningKind,
};

// =============================================================================
// Re-exports - Model
// =============================================================================

pub use model::{
    parse_punctuation, Column, ColumnBuilder, ColumnCollection, DataType, DialectConfig,
    QualifierMode, QualifyPolicy, RecordDelimiter, TimeZonePart, TrimmingOption, TypedValue,
    ValueFormat, ValueFormatBuilder,
};

// =============================================================================
// Re-exports - Conversion
// =============================================================================

pub use convert::{
    format, parse, try_format, DateTimeFormatInformation, DateTimePattern, FixedOffsetAdjust,
    TimeZoneAdjust,
};
pub use formatter::{ColumnFormatter, Formatter, RowContext};

// =============================================================================
// Re-exports - Reader
// =============================================================================

pub use reader::{CsvReader, RawRow, Record, RowTokenizer};

// =============================================================================
// Re-exports - Writer
// =============================================================================

pub use writer::{
    get_column_information, FileWriter, OutputKind, WriterColumn, WriterOptions, WriterTimeZone,
};

// =============================================================================
// Re-exports - Sources
// =============================================================================

pub use source::{
    decode_auto, decode_content, detect_encoding, DataReader, InMemoryDataReader, SourceColumn,
};
