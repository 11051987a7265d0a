//! Typed reader over delimited and fixed-width text.
//!
//! [`CsvReader`] drives the [`RowTokenizer`], resolves the header against
//! the declared columns, repairs rows with the wrong number of fields and
//! converts raw fields to [`TypedValue`]s.
//!
//! Row shape recovery runs in a fixed order:
//!
//! 1. a row with too many fields loses empty trailing fields,
//! 2. then, with `try_to_solve_more_columns`, the surplus is merged back into
//!    one column (the first text column, else the last column),
//! 3. whatever is still too long is truncated with an error diagnostic,
//! 4. a row with too few fields is combined with the following rows
//!    (`allow_row_combining`) while the result does not exceed the expected
//!    count; a row that would overshoot stays for the next read,
//! 5. a row still too short is padded with empty fields.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::convert::{self, DateTimePattern, FixedOffsetAdjust, TimeZoneAdjust};
use crate::diagnostics::{
    CancellationToken, Diagnostic, Diagnostics, EngineStatus, ProgressReporter, StatusFlag,
    WarningKind,
};
use crate::error::{ConfigError, ConversionError, ReaderError, ReaderResult};
use crate::formatter::Formatter;
use crate::model::column::{collection_identifier, unique_names};
use crate::model::{
    Column, ColumnCollection, DataType, DialectConfig, TimeZonePart, TrimmingOption, TypedValue,
};
use crate::source::{DataReader, SourceColumn};

pub mod tokenizer;

pub use tokenizer::{RawRow, RawWarning, RowTokenizer};

/// A record with its raw fields, aligned to the resolved columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub fields: Vec<String>,
    pub record_number: u64,
    pub start_line: u64,
    pub end_line: u64,
}

impl Record {
    pub fn field(&self, ordinal: usize) -> &str {
        self.fields.get(ordinal).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ZoneSource {
    Constant(String),
    Column(usize),
}

#[derive(Debug, Clone, Default)]
struct Companions {
    time_part: Option<usize>,
    time_zone: Option<ZoneSource>,
}

pub struct CsvReader<R> {
    tokenizer: RowTokenizer<R>,
    dialect: DialectConfig,
    declared: ColumnCollection,
    columns: Vec<Column>,
    formatters: Vec<Option<Formatter>>,
    companions: Vec<Companions>,
    header: Vec<String>,
    pushback: Option<RawRow>,
    prepared: bool,
    finished: bool,
    records: u64,
    empty_run: usize,
    diagnostics: Diagnostics,
    progress: ProgressReporter,
    status: StatusFlag,
    time_zone: Arc<dyn TimeZoneAdjust>,
    destination_time_zone: String,
    schema: Vec<SourceColumn>,
    schema_map: Vec<usize>,
    current: Vec<TypedValue>,
    file_name: String,
}

impl CsvReader<tokio::fs::File> {
    /// Open a file; configuration is checked before the file is touched.
    pub async fn open(
        path: impl AsRef<Path>,
        dialect: DialectConfig,
        columns: ColumnCollection,
    ) -> ReaderResult<Self> {
        let path = path.as_ref();
        check_config(&dialect, &columns)?;
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| ReaderError::open(path, e))?;
        let mut reader = Self::new(file, dialect, columns)?;
        reader.file_name = crate::error::display_name(path);
        Ok(reader)
    }
}

fn check_config(dialect: &DialectConfig, columns: &ColumnCollection) -> Result<(), ConfigError> {
    dialect.validate()?;
    if dialect.fixed_width {
        if columns.is_empty() {
            return Err(ConfigError::NoFixedWidthColumns);
        }
        if let Some(column) = columns.iter().find(|c| c.field_length().is_none()) {
            return Err(ConfigError::MissingFieldLength(column.name().to_string()));
        }
    }
    Ok(())
}

impl<R: AsyncRead + Unpin> CsvReader<R> {
    pub fn new(stream: R, dialect: DialectConfig, columns: ColumnCollection) -> ReaderResult<Self> {
        check_config(&dialect, &columns)?;
        Ok(Self {
            tokenizer: RowTokenizer::new(stream, dialect.clone()),
            dialect,
            declared: columns,
            columns: Vec::new(),
            formatters: Vec::new(),
            companions: Vec::new(),
            header: Vec::new(),
            pushback: None,
            prepared: false,
            finished: false,
            records: 0,
            empty_run: 0,
            diagnostics: Diagnostics::new(),
            progress: ProgressReporter::default(),
            status: StatusFlag::new(),
            time_zone: Arc::new(FixedOffsetAdjust),
            destination_time_zone: "UTC".to_string(),
            schema: Vec::new(),
            schema_map: Vec::new(),
            current: Vec::new(),
            file_name: "stream".to_string(),
        })
    }

    /// Replace the time zone conversion used for `TimeZonePart` columns.
    pub fn with_time_zone_adjust(mut self, adjust: Arc<dyn TimeZoneAdjust>) -> Self {
        self.time_zone = adjust;
        self
    }

    /// Zone values are converted to, `UTC` by default.
    pub fn set_destination_time_zone(&mut self, zone: impl Into<String>) {
        self.destination_time_zone = zone.into();
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

    /// Shared status handle, readable from other threads.
    pub fn status(&self) -> StatusFlag {
        self.status.clone()
    }

    /// Resolved columns; empty until the header was read.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn record_count(&self) -> u64 {
        self.records
    }

    // =========================================================================
    // Header
    // =========================================================================

    /// Skip leading rows and resolve the columns. Called by the first read.
    pub async fn read_header(&mut self) -> ReaderResult<()> {
        if self.prepared {
            return Ok(());
        }
        self.prepared = true;
        self.status.set(EngineStatus::Loading);
        tracing::debug!(file = %self.file_name, "opening");

        for _ in 0..self.dialect.skip_rows {
            if !self.tokenizer.skip_line().await? {
                break;
            }
        }

        let names: Vec<String> = if self.dialect.fixed_width {
            if self.dialect.has_field_header {
                self.tokenizer.skip_line().await?;
            }
            self.declared.iter().map(|c| c.name().to_string()).collect()
        } else {
            match self.next_content_row().await? {
                Some(row) if self.dialect.has_field_header => {
                    self.emit_raw_warnings(&row, 0, 0);
                    self.header = row.fields.clone();
                    row.fields
                }
                Some(row) => {
                    let width = row.fields.len();
                    self.pushback = Some(row);
                    (1..=width).map(|n| format!("Column{n}")).collect()
                }
                None => Vec::new(),
            }
        };

        self.resolve_columns(unique_names(&names))?;
        tracing::debug!(
            file = %self.file_name,
            columns = self.columns.len(),
            "header resolved"
        );
        Ok(())
    }

    async fn next_content_row(&mut self) -> ReaderResult<Option<RawRow>> {
        while let Some(row) = self.next_raw().await? {
            if !row.blank {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn resolve_columns(&mut self, names: Vec<String>) -> ReaderResult<()> {
        let ids: Vec<u64> = names.iter().map(|n| collection_identifier(n)).collect();
        let mut used = Vec::new();

        for (ordinal, name) in names.iter().enumerate() {
            let declared = self.declared.get(name).or_else(|| {
                self.declared
                    .iter()
                    .find(|c| c.ordinal() == Some(ordinal) && !ids.contains(&c.collection_identifier()))
            });
            let column = match declared {
                Some(column) => {
                    used.push(column.collection_identifier());
                    column.at_ordinal(ordinal)
                }
                None => Column::new(name.as_str()).at_ordinal(ordinal),
            };
            self.columns.push(column);
        }

        let missing: Vec<String> = self
            .declared
            .iter()
            .filter(|c| !used.contains(&c.collection_identifier()))
            .map(|c| c.name().to_string())
            .collect();
        for name in missing {
            self.diagnostics.emit(Diagnostic::warning(
                WarningKind::ColumnNotFound,
                format!("Column '{name}' is not present in the file"),
            ));
        }

        let find = |name: &str| ids.iter().position(|id| *id == collection_identifier(name));
        let mut pending = Vec::new();
        for column in &self.columns {
            let mut companions = Companions::default();
            if !column.time_part().is_empty() {
                companions.time_part = find(column.time_part());
                if companions.time_part.is_none() {
                    pending.push(column_not_found(column, column.time_part()));
                }
            }
            match column.time_zone_part() {
                Some(TimeZonePart::Constant(zone)) => {
                    companions.time_zone = Some(ZoneSource::Constant(zone.clone()));
                }
                Some(TimeZonePart::Column(zone_column)) => match find(zone_column) {
                    Some(ordinal) => companions.time_zone = Some(ZoneSource::Column(ordinal)),
                    None => pending.push(column_not_found(column, zone_column)),
                },
                None => {}
            }
            self.companions.push(companions);

            let formatter = if column.convert() {
                Formatter::for_format(column.value_format())?
            } else {
                None
            };
            self.formatters.push(formatter);

            if !column.ignore() {
                let data_type = if column.convert() {
                    column.data_type()
                } else {
                    DataType::String
                };
                self.schema_map.push(column.ordinal().unwrap_or(self.schema.len()));
                self.schema
                    .push(SourceColumn::new(self.schema.len(), column.output_name(), data_type));
            }
        }
        for diagnostic in pending {
            self.diagnostics.emit(diagnostic);
        }
        Ok(())
    }

    // =========================================================================
    // Records
    // =========================================================================

    async fn next_raw(&mut self) -> ReaderResult<Option<RawRow>> {
        if let Some(row) = self.pushback.take() {
            return Ok(Some(row));
        }
        let row = if self.dialect.fixed_width {
            self.tokenizer.next_line().await?
        } else {
            self.tokenizer.next_row().await?
        };
        Ok(row)
    }

    /// Next record with exactly one field per resolved column.
    ///
    /// Cancellation is checked before each row.
    pub async fn read_record(&mut self, cancel: &CancellationToken) -> ReaderResult<Option<Record>> {
        self.read_header().await?;
        if self.finished {
            return Ok(None);
        }
        loop {
            if cancel.is_cancelled() {
                self.status.set(EngineStatus::Idle);
                return Err(ReaderError::Cancelled {
                    records: self.records,
                });
            }
            let Some(mut row) = self.next_raw().await? else {
                self.finish();
                return Ok(None);
            };
            let record_number = self.records + 1;
            self.emit_raw_warnings(&row, record_number, 0);

            if row.blank {
                if self.dialect.skip_empty_lines
                    && self.empty_run < self.dialect.consecutive_empty_rows
                {
                    self.empty_run += 1;
                    continue;
                }
                row.fields = vec![String::new(); self.columns.len().max(1)];
            } else {
                self.empty_run = 0;
            }

            if self.dialect.skip_duplicate_header
                && !self.header.is_empty()
                && row.fields == self.header
            {
                tracing::debug!(line = row.start_line, "duplicate header skipped");
                continue;
            }

            let row = if self.dialect.fixed_width {
                self.split_fixed(row, record_number)
            } else {
                self.fit_row(row, record_number).await?
            };

            self.records = record_number;
            self.progress.report(self.records, row.end_line);
            return Ok(Some(Record {
                fields: row.fields,
                record_number,
                start_line: row.start_line,
                end_line: row.end_line,
            }));
        }
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.status.set(EngineStatus::Idle);
            self.progress.finish(self.records, self.tokenizer.line());
            tracing::debug!(file = %self.file_name, records = self.records, "finished reading");
        }
    }

    async fn fit_row(&mut self, mut row: RawRow, record: u64) -> ReaderResult<RawRow> {
        let expected = self.columns.len();
        if expected == 0 {
            return Ok(row);
        }

        if row.fields.len() > expected {
            let before = row.fields.len();
            while row.fields.len() > expected && row.fields.last().is_some_and(String::is_empty) {
                row.fields.pop();
            }
            if row.fields.len() < before && self.dialect.warn_empty_tailing_columns {
                self.warn_row(
                    &row,
                    record,
                    Diagnostic::warning(
                        WarningKind::EmptyTailingColumns,
                        format!("{} empty columns at the end of the row ignored", before - row.fields.len()),
                    ),
                );
            }
        }

        if row.fields.len() > expected && self.dialect.try_to_solve_more_columns {
            let excess = row.fields.len() - expected;
            let target = self.merge_target();
            let merged: Vec<String> = row.fields.drain(target..=target + excess).collect();
            row.fields
                .insert(target, merged.join(&self.dialect.field_delimiter.to_string()));
            let name = self.columns[target].name().to_string();
            self.warn_row(
                &row,
                record,
                Diagnostic::warning(
                    WarningKind::DelimiterInValue,
                    format!("Delimiter in value, {} fields combined", excess + 1),
                )
                .with_column(target, name),
            );
        }

        if row.fields.len() > expected {
            let found = row.fields.len();
            row.fields.truncate(expected);
            self.warn_row(
                &row,
                record,
                Diagnostic::error(
                    WarningKind::TooManyColumns,
                    format!("Row has {found} columns, {expected} expected; extra columns dropped"),
                ),
            );
        }

        if row.fields.len() < expected && self.dialect.allow_row_combining {
            while row.fields.len() < expected {
                let Some(next) = self.next_raw().await? else {
                    break;
                };
                if next.blank || row.fields.len() + next.fields.len() - 1 > expected {
                    self.pushback = Some(next);
                    break;
                }
                self.emit_raw_warnings(&next, record, row.fields.len() - 1);
                let mut rest = next.fields.into_iter();
                if let (Some(last), Some(first)) = (row.fields.last_mut(), rest.next()) {
                    last.push('\n');
                    last.push_str(&first);
                }
                row.fields.extend(rest);
                row.end_line = next.end_line;
                self.warn_row(
                    &row,
                    record,
                    Diagnostic::warning(WarningKind::RowCombined, "Row combined with the next line"),
                );
            }
        }

        if row.fields.len() < expected {
            self.warn_row(
                &row,
                record,
                Diagnostic::warning(
                    WarningKind::MissingColumns,
                    format!("Row has {} of {} columns", row.fields.len(), expected),
                ),
            );
            row.fields.resize(expected, String::new());
        }
        Ok(row)
    }

    /// Column that receives merged surplus fields.
    fn merge_target(&self) -> usize {
        self.columns
            .iter()
            .position(|c| !c.ignore() && (!c.convert() || c.data_type().is_text()))
            .unwrap_or(self.columns.len() - 1)
    }

    fn split_fixed(&mut self, mut row: RawRow, record: u64) -> RawRow {
        let line: Vec<char> = row.fields.first().map(|l| l.chars().collect()).unwrap_or_default();
        let mut fields = Vec::with_capacity(self.columns.len());
        let mut position = 0;
        for column in &self.columns {
            let length = column.field_length().unwrap_or(0);
            let start = position.min(line.len());
            let end = (position + length).min(line.len());
            let value: String = line[start..end].iter().collect();
            let value = match self.dialect.trimming {
                TrimmingOption::All => value.trim().to_string(),
                _ => value.trim_end().to_string(),
            };
            fields.push(value);
            position += length;
        }
        let last_start = position - self.columns.last().and_then(Column::field_length).unwrap_or(0);
        let short = !row.blank && line.len() <= last_start;
        row.fields = fields;
        if short {
            self.warn_row(
                &row,
                record,
                Diagnostic::warning(
                    WarningKind::MissingColumns,
                    format!("Line has {} characters, {} expected", line.len(), position),
                ),
            );
        }
        row
    }

    fn warn_row(&mut self, row: &RawRow, record: u64, diagnostic: Diagnostic) {
        self.diagnostics
            .emit(diagnostic.at(record, row.start_line, row.end_line));
    }

    fn emit_raw_warnings(&mut self, row: &RawRow, record: u64, offset: usize) {
        for warning in &row.warnings {
            let mut diagnostic = Diagnostic::warning(warning.kind, warning.message.clone())
                .at(record, row.start_line, row.end_line);
            if let Some(field) = warning.field {
                let ordinal = field + offset;
                if let Some(column) = self.columns.get(ordinal) {
                    diagnostic = diagnostic.with_column(ordinal, column.name());
                }
            }
            self.diagnostics.emit(diagnostic);
        }
    }

    // =========================================================================
    // Conversion
    // =========================================================================

    /// Typed values of a record, one per resolved column (`Null` for
    /// ignored columns).
    pub async fn convert(&mut self, record: &Record) -> ReaderResult<Vec<TypedValue>> {
        let mut pending = Vec::new();
        let texts = format_fields(&self.columns, &self.formatters, record, &mut pending).await;
        let result = self.convert_values(record, &texts, &mut pending);
        for diagnostic in pending {
            self.diagnostics
                .emit(diagnostic.at(record.record_number, record.start_line, record.end_line));
        }
        result
    }

    fn convert_values(
        &self,
        record: &Record,
        texts: &[String],
        pending: &mut Vec<Diagnostic>,
    ) -> ReaderResult<Vec<TypedValue>> {
        let mut values = Vec::with_capacity(self.columns.len());
        for (ordinal, column) in self.columns.iter().enumerate() {
            let raw = record.field(ordinal);
            if column.ignore() {
                values.push(TypedValue::Null);
                continue;
            }
            if !column.convert() {
                values.push(if raw.is_empty() {
                    TypedValue::Null
                } else {
                    TypedValue::String(raw.to_string())
                });
                continue;
            }

            let text = texts.get(ordinal).map_or(raw, String::as_str);
            let conversion_error = |source: ConversionError| ReaderError::Conversion {
                record: record.record_number,
                line: record.start_line,
                column: column.name().to_string(),
                source,
            };
            let mut value = convert::parse(&text, column.value_format()).map_err(conversion_error)?;

            if let TypedValue::DateTime(date) = value {
                let combined = self
                    .compose_date_time(record, ordinal, column, date, pending)
                    .map_err(conversion_error)?;
                value = TypedValue::DateTime(combined);
            }
            values.push(value);
        }
        Ok(values)
    }

    /// Add the companion time of day, then convert between time zones.
    fn compose_date_time(
        &self,
        record: &Record,
        ordinal: usize,
        column: &Column,
        mut value: chrono::NaiveDateTime,
        pending: &mut Vec<Diagnostic>,
    ) -> Result<chrono::NaiveDateTime, ConversionError> {
        let companions = &self.companions[ordinal];
        let format = column.value_format();

        if let Some(time_ordinal) = companions.time_part {
            let text = record.field(time_ordinal).trim();
            if !text.is_empty() {
                let time = DateTimePattern::parse(column.time_part_format())
                    .parse_time(text, format.date_separator(), format.time_separator())
                    .map_err(|message| ConversionError::new(DataType::DateTime, text, message))?;
                value = value.date().and_time(time);
            }
        }

        if let Some(source) = &companions.time_zone {
            let zone = match source {
                ZoneSource::Constant(zone) => zone.as_str(),
                ZoneSource::Column(zone_ordinal) => record.field(*zone_ordinal).trim(),
            };
            if zone.is_empty() {
                pending.push(
                    Diagnostic::warning(
                        WarningKind::TimeZone,
                        "No time zone given, the value is not converted",
                    )
                    .with_column(ordinal, column.name()),
                );
            } else {
                match self.time_zone.adjust(value, zone, &self.destination_time_zone) {
                    Ok(adjusted) => value = adjusted,
                    Err(message) => pending.push(
                        Diagnostic::warning(WarningKind::TimeZone, message)
                            .with_column(ordinal, column.name()),
                    ),
                }
            }
        }
        Ok(value)
    }
}

/// Field texts after the column formatters ran.
async fn format_fields(
    columns: &[Column],
    formatters: &[Option<Formatter>],
    record: &Record,
    pending: &mut Vec<Diagnostic>,
) -> Vec<String> {
    let mut texts = Vec::with_capacity(columns.len());
    for (ordinal, (column, formatter)) in columns.iter().zip(formatters).enumerate() {
        let raw = record.field(ordinal);
        let text = match formatter {
            Some(formatter) if !column.ignore() && column.convert() => {
                formatter
                    .format_on_read(raw, &mut |message: String| {
                        pending.push(
                            Diagnostic::warning(WarningKind::Formatter, message)
                                .with_column(ordinal, column.name()),
                        )
                    })
                    .await
            }
            _ => raw.to_string(),
        };
        texts.push(text);
    }
    texts
}

fn column_not_found(column: &Column, missing: &str) -> Diagnostic {
    Diagnostic::warning(
        WarningKind::ColumnNotFound,
        format!("Column '{missing}' used by '{}' is not present", column.name()),
    )
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> DataReader for CsvReader<R> {
    async fn prepare(&mut self) -> ReaderResult<()> {
        self.read_header().await
    }

    fn schema(&self) -> &[SourceColumn] {
        &self.schema
    }

    async fn read(&mut self, cancel: &CancellationToken) -> ReaderResult<bool> {
        match self.read_record(cancel).await? {
            Some(record) => {
                self.current = self.convert(&record).await?;
                Ok(true)
            }
            None => {
                self.current.clear();
                Ok(false)
            }
        }
    }

    fn value(&self, ordinal: usize) -> Option<&TypedValue> {
        self.schema_map
            .get(ordinal)
            .and_then(|&index| self.current.get(index))
    }

    fn record_number(&self) -> u64 {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValueFormat;
    use chrono::NaiveDate;

    fn reader(input: &'static str, dialect: DialectConfig) -> CsvReader<&'static [u8]> {
        reader_with(input, dialect, ColumnCollection::new())
    }

    fn reader_with(
        input: &'static str,
        dialect: DialectConfig,
        columns: ColumnCollection,
    ) -> CsvReader<&'static [u8]> {
        CsvReader::new(input.as_bytes(), dialect, columns).unwrap()
    }

    async fn all_records<R: AsyncRead + Unpin>(reader: &mut CsvReader<R>) -> Vec<Vec<String>> {
        let cancel = CancellationToken::new();
        let mut rows = Vec::new();
        while let Some(record) = reader.read_record(&cancel).await.unwrap() {
            rows.push(record.fields);
        }
        rows
    }

    fn collection(columns: Vec<Column>) -> ColumnCollection {
        ColumnCollection::try_from(columns).unwrap()
    }

    #[tokio::test]
    async fn test_qualified_delimiter() {
        let mut r = reader("x,y,z\na,\"b,c\",d\n", DialectConfig::default());
        assert_eq!(all_records(&mut r).await, vec![vec!["a", "b,c", "d"]]);
    }

    #[tokio::test]
    async fn test_header_names_made_unique() {
        let mut r = reader("a,,a,A\n1,2,3,4\n", DialectConfig::default());
        r.read_header().await.unwrap();
        let names: Vec<&str> = r.columns().iter().map(Column::name).collect();
        assert_eq!(names, ["a", "Column2", "a2", "A3"]);
    }

    #[tokio::test]
    async fn test_without_header() {
        let dialect = DialectConfig {
            has_field_header: false,
            ..Default::default()
        };
        let mut r = reader("1,2\n3,4\n", dialect);
        let rows = all_records(&mut r).await;
        assert_eq!(rows.len(), 2);
        let names: Vec<&str> = r.columns().iter().map(Column::name).collect();
        assert_eq!(names, ["Column1", "Column2"]);
    }

    #[tokio::test]
    async fn test_skip_rows_and_comments() {
        let dialect = DialectConfig {
            skip_rows: 2,
            comment_line: "//".into(),
            ..Default::default()
        };
        let mut r = reader("garbage\nmore garbage\nh1,h2\n// note\nv1,v2\n", dialect);
        assert_eq!(all_records(&mut r).await, vec![vec!["v1", "v2"]]);
    }

    #[tokio::test]
    async fn test_consecutive_empty_rows() {
        let dialect = DialectConfig {
            consecutive_empty_rows: 3,
            ..Default::default()
        };
        let mut r = reader("h\nfirst\n\n\n\n\n\nx\n", dialect);
        let rows = all_records(&mut r).await;
        assert_eq!(rows, vec![vec!["first"], vec![""], vec![""], vec!["x"]]);
    }

    #[tokio::test]
    async fn test_row_combining() {
        let dialect = DialectConfig {
            allow_row_combining: true,
            ..Default::default()
        };
        let mut r = reader("a,b,c\n1,two\nparts,3\n4,5,6\n", dialect);
        let rows = all_records(&mut r).await;
        assert_eq!(rows, vec![vec!["1", "two\nparts", "3"], vec!["4", "5", "6"]]);
        assert_eq!(r.diagnostics().report().count_of(WarningKind::RowCombined), 1);
    }

    #[tokio::test]
    async fn test_combining_stops_before_overshoot() {
        let dialect = DialectConfig {
            allow_row_combining: true,
            ..Default::default()
        };
        let mut r = reader("a,b,c\n1,2\n3,4,5\n", dialect);
        let rows = all_records(&mut r).await;
        assert_eq!(rows, vec![vec!["1", "2", ""], vec!["3", "4", "5"]]);
        let report = r.diagnostics().report();
        assert_eq!(report.count_of(WarningKind::MissingColumns), 1);
        assert_eq!(report.count_of(WarningKind::RowCombined), 0);
    }

    #[tokio::test]
    async fn test_more_columns_merged_into_text_column() {
        let columns = collection(vec![
            Column::with_format("id", ValueFormat::new(DataType::Integer)),
            Column::with_format("name", ValueFormat::new(DataType::String)),
            Column::with_format("amount", ValueFormat::new(DataType::Double)),
        ]);
        let dialect = DialectConfig {
            try_to_solve_more_columns: true,
            ..Default::default()
        };
        let mut r = reader_with("id,name,amount\n1,Smith,John,5\n", dialect, columns);
        let rows = all_records(&mut r).await;
        assert_eq!(rows, vec![vec!["1", "Smith,John", "5"]]);
        let entry = &r.diagnostics().report().entries()[0];
        assert_eq!(entry.kind, WarningKind::DelimiterInValue);
        assert_eq!(entry.column.as_deref(), Some("name"));
    }

    #[tokio::test]
    async fn test_more_columns_truncated_with_error() {
        let mut r = reader("a,b\n1,2,3\n4,5,,\n", DialectConfig::default());
        let rows = all_records(&mut r).await;
        assert_eq!(rows, vec![vec!["1", "2"], vec!["4", "5"]]);
        let report = r.diagnostics().report();
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.count_of(WarningKind::EmptyTailingColumns), 1);
    }

    #[tokio::test]
    async fn test_skip_duplicate_header() {
        let dialect = DialectConfig {
            skip_duplicate_header: true,
            ..Default::default()
        };
        let mut r = reader("a,b\n1,2\na,b\n3,4\n", dialect);
        assert_eq!(all_records(&mut r).await, vec![vec!["1", "2"], vec!["3", "4"]]);
    }

    #[tokio::test]
    async fn test_date_with_time_part() {
        let date = Column::builder("date")
            .value_format(
                ValueFormat::builder(DataType::DateTime)
                    .date_format("dd/MM/yyyy")
                    .build()
                    .unwrap(),
            )
            .time_part("time", "HH:mm")
            .build()
            .unwrap();
        let mut r = reader_with(
            "date,time\n20/01/2010,14:30\n",
            DialectConfig::default(),
            collection(vec![date]),
        );
        let record = r
            .read_record(&CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        let values = r.convert(&record).await.unwrap();
        let expected = NaiveDate::from_ymd_opt(2010, 1, 20)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(values[0], TypedValue::DateTime(expected));
        assert_eq!(values[0].to_invariant_string(), "2010-01-20T14:30:00");
    }

    #[tokio::test]
    async fn test_time_zone_part() {
        let format = ValueFormat::builder(DataType::DateTime)
            .date_format("yyyy-MM-dd HH:mm")
            .build()
            .unwrap();
        let constant = Column::builder("fixed")
            .value_format(format.clone())
            .time_zone_part("\"+02:00\"")
            .build()
            .unwrap();
        let from_column = Column::builder("local")
            .value_format(format)
            .time_zone_part("zone")
            .build()
            .unwrap();
        let mut r = reader_with(
            "fixed,local,zone\n2020-01-01 12:00,2020-01-01 12:00,\n",
            DialectConfig::default(),
            collection(vec![constant, from_column]),
        );
        let record = r
            .read_record(&CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        let values = r.convert(&record).await.unwrap();
        assert_eq!(values[0].to_invariant_string(), "2020-01-01T10:00:00");
        assert_eq!(values[1].to_invariant_string(), "2020-01-01T12:00:00");
        assert_eq!(r.diagnostics().report().count_of(WarningKind::TimeZone), 1);
    }

    #[tokio::test]
    async fn test_unreadable_zone_value_warns() {
        let local = Column::builder("local")
            .value_format(
                ValueFormat::builder(DataType::DateTime)
                    .date_format("yyyy-MM-dd HH:mm")
                    .build()
                    .unwrap(),
            )
            .time_zone_part("zone")
            .build()
            .unwrap();
        let mut r = reader_with(
            "local,zone\n2020-01-01 12:00,+1é1\n2020-01-01 12:00,+01:00\n",
            DialectConfig::default(),
            collection(vec![local]),
        );
        let cancel = CancellationToken::new();
        let mut values = Vec::new();
        while let Some(record) = r.read_record(&cancel).await.unwrap() {
            values.push(r.convert(&record).await.unwrap()[0].to_invariant_string());
        }
        assert_eq!(values, ["2020-01-01T12:00:00", "2020-01-01T11:00:00"]);
        let entries = r.diagnostics().report().entries();
        let zone_warnings: Vec<_> = entries
            .iter()
            .filter(|d| d.kind == WarningKind::TimeZone)
            .collect();
        assert_eq!(zone_warnings.len(), 1);
        assert!(zone_warnings[0].message.contains("+1é1"));
    }

    #[tokio::test]
    async fn test_merge_back_before_combining_forward() {
        let columns = collection(vec![
            Column::with_format("id", ValueFormat::new(DataType::Integer)),
            Column::with_format("name", ValueFormat::new(DataType::String)),
            Column::with_format("amount", ValueFormat::new(DataType::Double)),
        ]);
        let dialect = DialectConfig {
            try_to_solve_more_columns: true,
            allow_row_combining: true,
            ..Default::default()
        };
        let input = "id,name,amount\n\
                     1,Smith,John,5\n\
                     2,Doe\n\
                     Jane,7\n\
                     3,Roe\n\
                     4,Poe,9\n";
        let mut r = reader_with(input, dialect, columns);
        let rows = all_records(&mut r).await;
        assert_eq!(
            rows,
            vec![
                vec!["1", "Smith,John", "5"],
                vec!["2", "Doe\nJane", "7"],
                vec!["3", "Roe", ""],
                vec!["4", "Poe", "9"],
            ]
        );
        let report = r.diagnostics().report();
        assert_eq!(report.count_of(WarningKind::DelimiterInValue), 1);
        assert_eq!(report.count_of(WarningKind::RowCombined), 1);
        assert_eq!(report.count_of(WarningKind::MissingColumns), 1);
        assert_eq!(report.error_count(), 0);
    }

    #[tokio::test]
    async fn test_conversion_error_is_fatal_for_the_row() {
        let columns = collection(vec![Column::with_format(
            "n",
            ValueFormat::new(DataType::Integer),
        )]);
        let mut r = reader_with("n\n12\nabc\n", DialectConfig::default(), columns);
        let cancel = CancellationToken::new();
        let first = r.read_record(&cancel).await.unwrap().unwrap();
        assert_eq!(r.convert(&first).await.unwrap(), vec![TypedValue::Integer(12)]);

        let second = r.read_record(&cancel).await.unwrap().unwrap();
        match r.convert(&second).await {
            Err(ReaderError::Conversion {
                record,
                line,
                column,
                ..
            }) => {
                assert_eq!((record, line), (2, 3));
                assert_eq!(column, "n");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancellation() {
        let mut r = reader("a\n1\n2\n", DialectConfig::default());
        let cancel = CancellationToken::new();
        assert!(r.read_record(&cancel).await.unwrap().is_some());
        cancel.cancel();
        assert!(matches!(
            r.read_record(&cancel).await,
            Err(ReaderError::Cancelled { records: 1 })
        ));
    }

    #[tokio::test]
    async fn test_fixed_width() {
        let columns = collection(vec![
            Column::builder("code").field_length(4).build().unwrap(),
            Column::builder("qty")
                .value_format(ValueFormat::new(DataType::Integer))
                .field_length(3)
                .build()
                .unwrap(),
        ]);
        let dialect = DialectConfig {
            fixed_width: true,
            has_field_header: false,
            ..Default::default()
        };
        let mut r = reader_with("AB  12 \nCDEF345\nX\n", dialect, columns);
        let rows = all_records(&mut r).await;
        assert_eq!(rows, vec![vec!["AB", "12"], vec!["CDEF", "345"], vec!["X", ""]]);
        assert_eq!(r.diagnostics().report().count_of(WarningKind::MissingColumns), 1);
    }

    #[test]
    fn test_fixed_width_needs_lengths() {
        let dialect = DialectConfig {
            fixed_width: true,
            ..Default::default()
        };
        let result = CsvReader::new(&b""[..], dialect.clone(), ColumnCollection::new());
        assert!(matches!(
            result,
            Err(ReaderError::Config(ConfigError::NoFixedWidthColumns))
        ));
        let result = CsvReader::new(&b""[..], dialect, collection(vec![Column::new("a")]));
        assert!(matches!(
            result,
            Err(ReaderError::Config(ConfigError::MissingFieldLength(_)))
        ));
    }

    #[tokio::test]
    async fn test_open_reports_short_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.csv");
        let err = CsvReader::open(&missing, DialectConfig::default(), ColumnCollection::new())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("'missing.csv'"));

        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a;b\r\n1;2\r\n").unwrap();
        let dialect = DialectConfig {
            field_delimiter: ';',
            ..Default::default()
        };
        let mut r = CsvReader::open(&path, dialect, ColumnCollection::new())
            .await
            .unwrap();
        assert_eq!(all_records(&mut r).await, vec![vec!["1", "2"]]);
    }

    #[tokio::test]
    async fn test_data_reader_skips_ignored_columns() {
        let columns = collection(vec![
            Column::builder("skip").ignore(true).build().unwrap(),
            Column::with_format("n", ValueFormat::new(DataType::Integer)),
        ]);
        let mut r = reader_with("skip,n,t\nx,5,y\n", DialectConfig::default(), columns);
        let status = r.status();
        r.prepare().await.unwrap();
        assert_eq!(status.get(), EngineStatus::Loading);

        let names: Vec<&str> = r.schema().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["n", "t"]);
        assert_eq!(r.schema()[0].data_type, DataType::Integer);

        let cancel = CancellationToken::new();
        assert!(r.read(&cancel).await.unwrap());
        assert_eq!(r.value(0), Some(&TypedValue::Integer(5)));
        assert_eq!(r.value(1), Some(&TypedValue::from("y")));
        assert!(!r.read(&cancel).await.unwrap());
        assert_eq!(status.get(), EngineStatus::Idle);
    }
}
