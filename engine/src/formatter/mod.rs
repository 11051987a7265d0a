//! Column formatters: text transforms applied before conversion on read and
//! after conversion on write.
//!
//! A [`ColumnFormatter`] is chosen from the column's [`DataType`]; types
//! without a transform have no formatter.

use std::path::PathBuf;

use regex::Regex;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{DataType, ValueFormat};

pub mod binary;
pub mod html;
mod markdown;
pub mod text;

pub use binary::BinaryFormatter;

/// The row a value belongs to, used to fill file name templates.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub record_number: u64,
    pub column_name: &'a str,
    /// `(column name, text)` pairs of the current row.
    pub fields: &'a [(String, String)],
}

impl RowContext<'_> {
    /// Value for a `{Placeholder}`: a field of the row (case-insensitive),
    /// `RecordNumber` or `ColumnName`.
    pub fn lookup(&self, key: &str) -> Option<String> {
        if let Some((_, value)) = self
            .fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
        {
            return Some(value.clone());
        }
        if key.eq_ignore_ascii_case("RecordNumber") {
            Some(self.record_number.to_string())
        } else if key.eq_ignore_ascii_case("ColumnName") {
            Some(self.column_name.to_string())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub enum ColumnFormatter {
    TextPart {
        splitter: char,
        part: usize,
        to_end: bool,
    },
    Html {
        full: bool,
    },
    Unescape,
    RegexReplace {
        regex: Regex,
        replacement: String,
    },
    Binary(BinaryFormatter),
    Markdown,
}

/// A formatter plus its warning switch.
#[derive(Debug, Clone)]
pub struct Formatter {
    kind: ColumnFormatter,
    raise_warning: bool,
}

impl Formatter {
    /// Formatter for a column format, `None` when its type has no transform.
    pub fn for_format(format: &ValueFormat) -> ConfigResult<Option<Self>> {
        let kind = match format.data_type() {
            DataType::TextPart => ColumnFormatter::TextPart {
                splitter: format.part_splitter(),
                part: format.part(),
                to_end: format.part_to_end(),
            },
            DataType::TextToHtml => ColumnFormatter::Html { full: false },
            DataType::TextToHtmlFull => ColumnFormatter::Html { full: true },
            DataType::TextUnescape => ColumnFormatter::Unescape,
            DataType::RegexReplace => {
                let regex = Regex::new(format.regex_search_pattern()).map_err(|e| {
                    ConfigError::InvalidRegex {
                        pattern: format.regex_search_pattern().to_string(),
                        message: e.to_string(),
                    }
                })?;
                ColumnFormatter::RegexReplace {
                    regex,
                    replacement: format.regex_replacement().to_string(),
                }
            }
            DataType::Binary => ColumnFormatter::Binary(BinaryFormatter {
                read_folder: PathBuf::from(format.read_folder()),
                write_folder: PathBuf::from(format.write_folder()),
                file_output_placeholder: format.file_output_placeholder().to_string(),
                overwrite: format.overwrite(),
                size_limit: format.size_limit(),
            }),
            DataType::Markdown2Html => ColumnFormatter::Markdown,
            _ => return Ok(None),
        };
        Ok(Some(Self {
            kind,
            raise_warning: format.raise_warning(),
        }))
    }

    pub fn kind(&self) -> &ColumnFormatter {
        &self.kind
    }

    /// Transform a raw field before it is converted.
    pub async fn format_on_read(
        &self,
        raw: &str,
        warn: &mut (dyn FnMut(String) + Send),
    ) -> String {
        let mut sink = |message: String| {
            if self.raise_warning {
                warn(message)
            }
        };
        match &self.kind {
            ColumnFormatter::TextPart {
                splitter,
                part,
                to_end,
            } => text::text_part(raw, *splitter, *part, *to_end),
            ColumnFormatter::Html { full } => html::encode(raw, *full),
            ColumnFormatter::Unescape => text::unescape(raw),
            ColumnFormatter::RegexReplace { regex, replacement } => {
                replace(regex, replacement, raw, &mut sink)
            }
            ColumnFormatter::Binary(binary) => binary.read(raw, &mut sink).await,
            ColumnFormatter::Markdown => markdown::to_html(raw, &mut sink),
        }
    }

    /// Transform a formatted value before it is written.
    pub async fn format_on_write(
        &self,
        text: &str,
        row: &RowContext<'_>,
        warn: &mut (dyn FnMut(String) + Send),
    ) -> String {
        let mut sink = |message: String| {
            if self.raise_warning {
                warn(message)
            }
        };
        match &self.kind {
            ColumnFormatter::TextPart { .. } | ColumnFormatter::Markdown => text.to_string(),
            ColumnFormatter::Html { .. } => html::decode(text),
            ColumnFormatter::Unescape => text::escape(text),
            ColumnFormatter::RegexReplace { regex, replacement } => {
                replace(regex, replacement, text, &mut sink)
            }
            ColumnFormatter::Binary(binary) => binary.write(text, row, &mut sink).await,
        }
    }
}

fn replace(regex: &Regex, replacement: &str, text: &str, warn: &mut dyn FnMut(String)) -> String {
    if !regex.is_match(text) {
        return text.to_string();
    }
    let result = regex.replace_all(text, replacement).into_owned();
    if result != text {
        warn(format!("'{text}' changed to '{result}'"));
    }
    result
}
