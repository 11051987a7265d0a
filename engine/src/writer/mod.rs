//! Writer engine: typed rows from any [`DataReader`] to delimited,
//! fixed-width, JSON or XML text.
//!
//! Values never fail a write. A value that does not fit its column's format
//! is written in its invariant text form with a warning; only a source
//! without a single writable column is fatal.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::convert::{self, FixedOffsetAdjust, TimeZoneAdjust};
use crate::diagnostics::{
    CancellationToken, Diagnostic, Diagnostics, EngineStatus, ProgressReporter, StatusFlag,
    WarningKind,
};
use crate::error::{display_name, ConfigResult, ReaderError, WriterError, WriterResult};
use crate::formatter::{Formatter, RowContext};
use crate::model::{ColumnCollection, DialectConfig, TypedValue, ValueFormat};
use crate::source::DataReader;

pub mod columns;
pub mod csv;
pub mod structured;

pub use columns::{default_field_length, get_column_information, WriterColumn, WriterTimeZone};
pub use structured::Cell;

/// Shape of the written text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputKind {
    #[default]
    Delimited,
    FixedWidth,
    Json,
    Xml,
}

/// Everything about the output that is not the dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WriterOptions {
    pub output: OutputKind,
    /// Write a line of column names before the data (delimited, fixed width).
    pub column_header: bool,
    /// Text before the data; `{FileName}`, `{CDate}` and `{CDateLong}` are
    /// replaced. For JSON and XML it replaces the document opening.
    pub header: String,
    /// Text after the data; as `header`, plus `{Records}`.
    pub footer: String,
    /// Row template for JSON and XML, generated from the columns when empty.
    pub row_template: String,
    pub file_name: String,
    /// Zone the source date/time values are in.
    pub source_time_zone: String,
    /// Format for source columns without a declared column.
    pub general_format: ValueFormat,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            output: OutputKind::Delimited,
            column_header: true,
            header: String::new(),
            footer: String::new(),
            row_template: String::new(),
            file_name: String::new(),
            source_time_zone: "UTC".to_string(),
            general_format: ValueFormat::default(),
        }
    }
}

// =============================================================================
// File Writer
// =============================================================================

pub struct FileWriter {
    dialect: DialectConfig,
    columns: ColumnCollection,
    options: WriterOptions,
    diagnostics: Diagnostics,
    progress: ProgressReporter,
    status: StatusFlag,
    time_zone: Arc<dyn TimeZoneAdjust>,
}

impl FileWriter {
    pub fn new(
        dialect: DialectConfig,
        columns: ColumnCollection,
        options: WriterOptions,
    ) -> WriterResult<Self> {
        dialect.validate()?;
        Ok(Self {
            dialect,
            columns,
            options,
            diagnostics: Diagnostics::new(),
            progress: ProgressReporter::default(),
            status: StatusFlag::new(),
            time_zone: Arc::new(FixedOffsetAdjust),
        })
    }

    pub fn with_time_zone_adjust(mut self, adjust: Arc<dyn TimeZoneAdjust>) -> Self {
        self.time_zone = adjust;
        self
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn progress_mut(&mut self) -> &mut ProgressReporter {
        &mut self.progress
    }

    pub fn status(&self) -> StatusFlag {
        self.status.clone()
    }

    /// Create `path` and write all rows of `reader` to it.
    pub async fn write_file<R>(
        &mut self,
        reader: &mut R,
        path: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> WriterResult<u64>
    where
        R: DataReader + ?Sized,
    {
        let path = path.as_ref();
        if self.options.file_name.is_empty() {
            self.options.file_name = display_name(path);
        }
        let file = tokio::fs::File::create(path)
            .await
            .map_err(|e| WriterError::open(path, e))?;
        self.write(reader, file, cancel).await
    }

    /// Write all rows of `reader` to `sink`; returns the number of records.
    ///
    /// On cancellation the output written so far is flushed and left as is.
    pub async fn write<R, W>(
        &mut self,
        reader: &mut R,
        sink: W,
        cancel: &CancellationToken,
    ) -> WriterResult<u64>
    where
        R: DataReader + ?Sized,
        W: AsyncWrite + Unpin,
    {
        reader.prepare().await?;
        let columns = get_column_information(
            reader.schema(),
            &self.columns,
            &self.options.general_format,
            &mut self.diagnostics,
        )?;
        let formatters = columns
            .iter()
            .map(|c| Formatter::for_format(&c.value_format))
            .collect::<ConfigResult<Vec<_>>>()?;

        self.status.set(EngineStatus::AwaitingResults);
        tracing::debug!(
            file = %self.options.file_name,
            output = ?self.options.output,
            columns = columns.len(),
            "writing"
        );

        let mut out = BufWriter::new(sink);
        let result = self
            .write_rows(reader, &mut out, &columns, &formatters, cancel)
            .await;
        let flushed = out.flush().await;
        self.status.set(EngineStatus::Idle);
        let records = result?;
        flushed?;

        self.progress.finish(records, records);
        tracing::debug!(file = %self.options.file_name, records, "finished writing");
        Ok(records)
    }

    async fn write_rows<R, W>(
        &mut self,
        reader: &mut R,
        out: &mut W,
        columns: &[WriterColumn],
        formatters: &[Option<Formatter>],
        cancel: &CancellationToken,
    ) -> WriterResult<u64>
    where
        R: DataReader + ?Sized,
        W: AsyncWrite + Unpin,
    {
        let newline = self.dialect.new_line.as_str();
        let kind = self.options.output;

        match kind {
            OutputKind::Delimited | OutputKind::FixedWidth => {
                if !self.options.header.is_empty() {
                    let header = self.expand(&self.options.header, None);
                    out.write_all(header.as_bytes()).await?;
                    out.write_all(newline.as_bytes()).await?;
                }
                if self.options.column_header {
                    let line = self.header_line(columns);
                    out.write_all(line.as_bytes()).await?;
                    out.write_all(newline.as_bytes()).await?;
                }
            }
            OutputKind::Json | OutputKind::Xml => {
                let header = match (kind, self.options.header.is_empty()) {
                    (_, false) => self.expand(&self.options.header, None),
                    (OutputKind::Json, true) => structured::JSON_HEADER.to_string(),
                    _ => structured::XML_HEADER.to_string(),
                };
                out.write_all(header.as_bytes()).await?;
            }
        }

        let template = match (kind, self.options.row_template.is_empty()) {
            (OutputKind::Json, true) => structured::json_template(columns),
            (OutputKind::Xml, true) => structured::xml_template(columns),
            _ => self.options.row_template.clone(),
        };

        let mut records = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Err(WriterError::Cancelled { records });
            }
            match reader.read(cancel).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(ReaderError::Cancelled { .. }) => {
                    return Err(WriterError::Cancelled { records })
                }
                Err(e) => return Err(e.into()),
            }
            records += 1;

            let mut pending = Vec::new();
            let cells = self
                .cells(&*reader, columns, formatters, records, &mut pending)
                .await;
            let line = match kind {
                OutputKind::Delimited => {
                    let mut line = csv::encode_row(
                        cells.iter().map(|c| c.text.as_str()),
                        &self.dialect,
                        &mut |message: String| {
                            pending.push(Diagnostic::warning(WarningKind::DelimiterInValue, message))
                        },
                    );
                    line.push_str(newline);
                    line
                }
                OutputKind::FixedWidth => {
                    let mut line = String::new();
                    for (index, (column, cell)) in columns.iter().zip(&cells).enumerate() {
                        line.push_str(&csv::fit_width(
                            &cell.text,
                            column.field_length,
                            &mut |message: String| {
                                pending.push(
                                    Diagnostic::warning(WarningKind::Truncated, message)
                                        .with_column(index, column.name.as_str()),
                                )
                            },
                        ));
                    }
                    line.push_str(newline);
                    line
                }
                OutputKind::Json => {
                    let separator = if records > 1 { "," } else { "" };
                    let row = structured::fill_row(&template, columns, &cells, |cell, column| {
                        structured::json_value(cell, column.value_format.data_type())
                    });
                    format!("{separator}{newline}{row}")
                }
                OutputKind::Xml => {
                    let row = structured::fill_row(&template, columns, &cells, |cell, _| {
                        structured::xml_escape(&cell.text)
                    });
                    format!("{newline}{row}")
                }
            };
            out.write_all(line.as_bytes()).await?;

            for diagnostic in pending {
                self.diagnostics.emit(diagnostic.at(records, 0, 0));
            }
            self.progress.report(records, records);
        }

        match kind {
            OutputKind::Delimited | OutputKind::FixedWidth => {
                if !self.options.footer.is_empty() {
                    let footer = self.expand(&self.options.footer, Some(records));
                    out.write_all(footer.as_bytes()).await?;
                    out.write_all(newline.as_bytes()).await?;
                }
            }
            OutputKind::Json | OutputKind::Xml => {
                let footer = match (kind, self.options.footer.is_empty()) {
                    (_, false) => self.expand(&self.options.footer, Some(records)),
                    (OutputKind::Json, true) => structured::JSON_FOOTER.to_string(),
                    _ => structured::XML_FOOTER.to_string(),
                };
                out.write_all(newline.as_bytes()).await?;
                out.write_all(footer.as_bytes()).await?;
                out.write_all(newline.as_bytes()).await?;
            }
        }
        Ok(records)
    }

    fn header_line(&self, columns: &[WriterColumn]) -> String {
        match self.options.output {
            OutputKind::FixedWidth => columns
                .iter()
                .map(|c| csv::fit_width(&c.name, c.field_length, &mut |_: String| {}))
                .collect(),
            _ => csv::encode_row(
                columns.iter().map(|c| c.name.as_str()),
                &self.dialect,
                &mut |_: String| {},
            ),
        }
    }

    /// Replace header and footer placeholders.
    fn expand(&self, text: &str, records: Option<u64>) -> String {
        let now = chrono::Local::now();
        structured::fill_template(text, |key| match key.to_ascii_lowercase().as_str() {
            "filename" => Some(self.options.file_name.clone()),
            "cdate" => Some(now.format("%Y-%m-%d").to_string()),
            "cdatelong" => Some(now.format("%A, %d %B %Y").to_string()),
            "records" => records.map(|r| r.to_string()),
            _ => None,
        })
    }

    /// Values and texts of the current row, formatters applied.
    async fn cells<R: DataReader + ?Sized>(
        &self,
        reader: &R,
        columns: &[WriterColumn],
        formatters: &[Option<Formatter>],
        record: u64,
        pending: &mut Vec<Diagnostic>,
    ) -> Vec<Cell> {
        let mut cells = Vec::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            let mut value = reader
                .value(column.source_ordinal)
                .cloned()
                .unwrap_or(TypedValue::Null);

            let naive = match &value {
                TypedValue::DateTime(naive) => Some(*naive),
                _ => None,
            };
            if let (Some(naive), Some(zone)) = (naive, &column.time_zone) {
                let zone = match zone {
                    WriterTimeZone::Constant(zone) => zone.clone(),
                    WriterTimeZone::Column(ordinal) => reader
                        .value(*ordinal)
                        .map(TypedValue::to_invariant_string)
                        .unwrap_or_default(),
                };
                let zone = zone.trim();
                if zone.is_empty() {
                    pending.push(
                        Diagnostic::warning(
                            WarningKind::TimeZone,
                            "No time zone given, the value is not converted",
                        )
                        .with_column(index, column.name.as_str()),
                    );
                } else {
                    match self
                        .time_zone
                        .adjust(naive, &self.options.source_time_zone, zone)
                    {
                        Ok(adjusted) => value = TypedValue::DateTime(adjusted),
                        Err(message) => pending.push(
                            Diagnostic::warning(WarningKind::TimeZone, message)
                                .with_column(index, column.name.as_str()),
                        ),
                    }
                }
            }

            let text = match convert::try_format(&value, &column.value_format) {
                Ok(text) => text,
                Err(e) => {
                    pending.push(
                        Diagnostic::warning(WarningKind::ConversionFallback, e.to_string())
                            .with_column(index, column.name.as_str()),
                    );
                    value.to_invariant_string()
                }
            };
            cells.push(Cell { value, text });
        }

        if formatters.iter().any(Option::is_some) {
            let fields: Vec<(String, String)> = columns
                .iter()
                .zip(&cells)
                .map(|(column, cell)| (column.name.clone(), cell.text.clone()))
                .collect();
            for (index, formatter) in formatters.iter().enumerate() {
                let Some(formatter) = formatter else {
                    continue;
                };
                let name = columns[index].name.as_str();
                let context = RowContext {
                    record_number: record,
                    column_name: name,
                    fields: &fields,
                };
                let text = formatter
                    .format_on_write(&cells[index].text, &context, &mut |m: String| {
                        pending.push(
                            Diagnostic::warning(WarningKind::Formatter, m).with_column(index, name),
                        )
                    })
                    .await;
                cells[index].text = text;
            }
        }
        cells
    }
}
