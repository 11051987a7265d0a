//! Non-fatal diagnostics shared by the reader and writer.
//!
//! Every [`Diagnostic`] is delivered the moment it is detected:
//!
//! 1. to the registered handler (synchronously, so a caller can log or
//!    cancel in real time),
//! 2. to every broadcast subscriber (see [`Diagnostics::subscribe`]),
//! 3. into the capped [`DiagnosticsReport`] available after the pass.
//!
//! Warnings never unwind the stack.

use std::fmt;

use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

pub mod control;

pub use control::{CancellationToken, EngineStatus, Progress, ProgressReporter, StatusFlag};

/// Default number of diagnostics kept in a report.
pub const DEFAULT_REPORT_CAP: usize = 1000;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// What triggered a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    /// Delimiter found inside a value (unquoted value or merged columns).
    DelimiterInValue,
    /// Qualifier inside an already qualified value.
    QualifierInQualifiedValue,
    /// Qualifier inside an unqualified value.
    QualifierInValue,
    /// Trailing columns empty while others are populated.
    EmptyTailingColumns,
    /// Undecodable or unknown character substituted.
    UnknownCharacter,
    /// Line feed embedded in a field.
    LineFeed,
    /// Non-breaking space found.
    NonBreakingSpace,
    /// Row had fewer fields than expected.
    MissingColumns,
    /// Row had more fields than expected and could not be merged.
    TooManyColumns,
    /// Row was combined with the following line.
    RowCombined,
    /// Text followed a closing qualifier.
    TextAfterQualifier,
    /// The stream ended inside a qualified value.
    UnclosedQualifier,
    /// Value written as text because it did not match its declared type.
    ConversionFallback,
    /// Value cut to the fixed field length.
    Truncated,
    /// Timezone conversion skipped.
    TimeZone,
    /// Time information encoded twice.
    RedundantTimePart,
    /// A companion or declared column does not exist.
    ColumnNotFound,
    /// A column formatter changed or could not process a value.
    Formatter,
    /// Only the first character of a configuration text is used.
    ConfigurationTrimmed,
}

/// A single diagnostic with enough context to localize it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub kind: WarningKind,
    pub severity: Severity,
    pub record_number: u64,
    pub column: Option<String>,
    pub ordinal: Option<usize>,
    pub start_line: u64,
    pub end_line: u64,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(kind: WarningKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Warning, message)
    }

    pub fn error(kind: WarningKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, message)
    }

    fn new(kind: WarningKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            record_number: 0,
            column: None,
            ordinal: None,
            start_line: 0,
            end_line: 0,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, ordinal: usize, name: impl Into<String>) -> Self {
        self.ordinal = Some(ordinal);
        self.column = Some(name.into());
        self
    }

    pub fn at(mut self, record_number: u64, start_line: u64, end_line: u64) -> Self {
        self.record_number = record_number;
        self.start_line = start_line;
        self.end_line = end_line;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_line > 0 {
            if self.end_line > self.start_line {
                write!(f, "Lines {}-{}", self.start_line, self.end_line)?;
            } else {
                write!(f, "Line {}", self.start_line)?;
            }
            if self.record_number > 0 {
                write!(f, ", record {}", self.record_number)?;
            }
            f.write_str(", ")?;
        } else if self.record_number > 0 {
            write!(f, "Record {}, ", self.record_number)?;
        }
        if let Some(column) = &self.column {
            write!(f, "column '{}': ", column)?;
        }
        f.write_str(&self.message)
    }
}

// =============================================================================
// Report
// =============================================================================

/// Diagnostics collected during a pass.
///
/// Keeps at most `cap` entries; the counters keep counting past the cap.
#[derive(Debug, Clone)]
pub struct DiagnosticsReport {
    entries: Vec<Diagnostic>,
    cap: usize,
    warning_count: usize,
    error_count: usize,
}

impl Default for DiagnosticsReport {
    fn default() -> Self {
        Self::with_cap(DEFAULT_REPORT_CAP)
    }
}

impl DiagnosticsReport {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            entries: Vec::new(),
            cap,
            warning_count: 0,
            error_count: 0,
        }
    }

    fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => self.warning_count += 1,
            Severity::Error => self.error_count += 1,
        }
        if self.entries.len() < self.cap {
            self.entries.push(diagnostic);
        }
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn is_empty(&self) -> bool {
        self.warning_count == 0 && self.error_count == 0
    }

    /// Number of kept entries of one kind.
    pub fn count_of(&self, kind: WarningKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} warnings, {} errors{}",
            self.warning_count,
            self.error_count,
            if self.entries.len() < self.warning_count + self.error_count {
                format!(" (first {} kept)", self.entries.len())
            } else {
                String::new()
            }
        )
    }
}

// =============================================================================
// Channel
// =============================================================================

type Handler = Box<dyn FnMut(&Diagnostic) + Send>;

/// Diagnostics channel owned by one reader or writer.
pub struct Diagnostics {
    handler: Option<Handler>,
    sender: broadcast::Sender<Diagnostic>,
    report: DiagnosticsReport,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("handler", &self.handler.is_some())
            .field("report", &self.report)
            .finish()
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            handler: None,
            sender,
            report: DiagnosticsReport::default(),
        }
    }

    /// Register the synchronous handler, replacing any previous one.
    pub fn set_handler(&mut self, handler: impl FnMut(&Diagnostic) + Send + 'static) {
        self.handler = Some(Box::new(handler));
    }

    pub fn set_report_cap(&mut self, cap: usize) {
        self.report.cap = cap;
    }

    /// Deliver a diagnostic to the handler, subscribers and the report.
    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => tracing::warn!(kind = ?diagnostic.kind, "{}", diagnostic),
            Severity::Error => tracing::error!(kind = ?diagnostic.kind, "{}", diagnostic),
        }
        if let Some(handler) = self.handler.as_mut() {
            handler(&diagnostic);
        }
        // No receivers is fine
        let _ = self.sender.send(diagnostic.clone());
        self.report.push(diagnostic);
    }

    /// Receiver for diagnostics emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Diagnostic> {
        self.sender.subscribe()
    }

    /// Diagnostics emitted from now on as a `Stream`.
    ///
    /// A subscriber that falls behind skips what it missed.
    pub fn stream(&self) -> impl Stream<Item = Diagnostic> {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|result| match result {
            Ok(diagnostic) => Some(diagnostic),
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                tracing::debug!(missed, "diagnostics subscriber lagged");
                None
            }
        })
    }

    pub fn report(&self) -> &DiagnosticsReport {
        &self.report
    }

    pub fn take_report(&mut self) -> DiagnosticsReport {
        let cap = self.report.cap;
        std::mem::replace(&mut self.report, DiagnosticsReport::with_cap(cap))
    }
}
