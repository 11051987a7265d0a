//! Conversion parameters of a column.

use serde::{Deserialize, Serialize};

use super::DataType;
use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_DATE_FORMAT: &str = "MM/dd/yyyy";
pub const DEFAULT_NUMBER_FORMAT: &str = "0.#####";
pub const DEFAULT_TRUE: &str = "True";
pub const DEFAULT_FALSE: &str = "False";
pub const DEFAULT_FILE_PLACEHOLDER: &str = "{ColumnName}_{RecordNumber}.bin";
pub const DEFAULT_SIZE_LIMIT: u64 = 1_048_576;

/// Immutable text <-> value conversion parameters.
///
/// Built through [`ValueFormatBuilder`]; construction fails when the decimal
/// separator equals the group separator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ValueFormatBuilder", into = "ValueFormatBuilder")]
pub struct ValueFormat {
    data_type: DataType,
    date_format: String,
    date_separator: String,
    time_separator: String,
    number_format: String,
    group_separator: String,
    decimal_separator: String,
    true_format: String,
    false_format: String,
    ignore_case: bool,
    display_null_as: String,
    part: usize,
    part_splitter: char,
    part_to_end: bool,
    regex_search_pattern: String,
    regex_replacement: String,
    read_folder: String,
    write_folder: String,
    file_output_placeholder: String,
    overwrite: bool,
    size_limit: u64,
    raise_warning: bool,
}

impl Default for ValueFormat {
    fn default() -> Self {
        Self::new(DataType::String)
    }
}

impl ValueFormat {
    /// Format with default parameters, always valid.
    pub fn new(data_type: DataType) -> Self {
        let builder = ValueFormatBuilder::new(data_type);
        Self::from_parts(builder)
    }

    pub fn builder(data_type: DataType) -> ValueFormatBuilder {
        ValueFormatBuilder::new(data_type)
    }

    /// Builder pre-filled with this format, to derive a changed copy.
    pub fn to_builder(&self) -> ValueFormatBuilder {
        self.clone().into()
    }

    /// Same parameters with another data type.
    pub fn with_data_type(&self, data_type: DataType) -> Self {
        let mut copy = self.clone();
        copy.data_type = data_type;
        copy
    }

    fn from_parts(b: ValueFormatBuilder) -> Self {
        Self {
            data_type: b.data_type,
            date_format: b.date_format,
            date_separator: b.date_separator,
            time_separator: b.time_separator,
            number_format: b.number_format,
            group_separator: b.group_separator,
            decimal_separator: b.decimal_separator,
            true_format: b.true_format,
            false_format: b.false_format,
            ignore_case: b.ignore_case,
            display_null_as: b.display_null_as,
            part: b.part,
            part_splitter: b.part_splitter,
            part_to_end: b.part_to_end,
            regex_search_pattern: b.regex_search_pattern,
            regex_replacement: b.regex_replacement,
            read_folder: b.read_folder,
            write_folder: b.write_folder,
            file_output_placeholder: b.file_output_placeholder,
            overwrite: b.overwrite,
            size_limit: b.size_limit,
            raise_warning: b.raise_warning,
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    pub fn date_separator(&self) -> &str {
        &self.date_separator
    }

    pub fn time_separator(&self) -> &str {
        &self.time_separator
    }

    pub fn number_format(&self) -> &str {
        &self.number_format
    }

    pub fn group_separator(&self) -> &str {
        &self.group_separator
    }

    pub fn decimal_separator(&self) -> &str {
        &self.decimal_separator
    }

    pub fn true_format(&self) -> &str {
        &self.true_format
    }

    pub fn false_format(&self) -> &str {
        &self.false_format
    }

    /// Boolean literals are matched ignoring case.
    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn display_null_as(&self) -> &str {
        &self.display_null_as
    }

    /// 1-based part number for `TextPart`.
    pub fn part(&self) -> usize {
        self.part
    }

    pub fn part_splitter(&self) -> char {
        self.part_splitter
    }

    pub fn part_to_end(&self) -> bool {
        self.part_to_end
    }

    pub fn regex_search_pattern(&self) -> &str {
        &self.regex_search_pattern
    }

    pub fn regex_replacement(&self) -> &str {
        &self.regex_replacement
    }

    pub fn read_folder(&self) -> &str {
        &self.read_folder
    }

    pub fn write_folder(&self) -> &str {
        &self.write_folder
    }

    pub fn file_output_placeholder(&self) -> &str {
        &self.file_output_placeholder
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn size_limit(&self) -> u64 {
        self.size_limit
    }

    pub fn raise_warning(&self) -> bool {
        self.raise_warning
    }
}

/// Mutable form of a [`ValueFormat`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValueFormatBuilder {
    pub data_type: DataType,
    pub date_format: String,
    pub date_separator: String,
    pub time_separator: String,
    pub number_format: String,
    pub group_separator: String,
    pub decimal_separator: String,
    pub true_format: String,
    pub false_format: String,
    pub ignore_case: bool,
    pub display_null_as: String,
    pub part: usize,
    pub part_splitter: char,
    pub part_to_end: bool,
    pub regex_search_pattern: String,
    pub regex_replacement: String,
    pub read_folder: String,
    pub write_folder: String,
    pub file_output_placeholder: String,
    pub overwrite: bool,
    pub size_limit: u64,
    pub raise_warning: bool,
}

impl Default for ValueFormatBuilder {
    fn default() -> Self {
        Self::new(DataType::String)
    }
}

impl ValueFormatBuilder {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            date_separator: "/".to_string(),
            time_separator: ":".to_string(),
            number_format: DEFAULT_NUMBER_FORMAT.to_string(),
            group_separator: String::new(),
            decimal_separator: ".".to_string(),
            true_format: DEFAULT_TRUE.to_string(),
            false_format: DEFAULT_FALSE.to_string(),
            ignore_case: false,
            display_null_as: String::new(),
            part: 1,
            part_splitter: ':',
            part_to_end: false,
            regex_search_pattern: String::new(),
            regex_replacement: String::new(),
            read_folder: String::new(),
            write_folder: String::new(),
            file_output_placeholder: DEFAULT_FILE_PLACEHOLDER.to_string(),
            overwrite: true,
            size_limit: DEFAULT_SIZE_LIMIT,
            raise_warning: true,
        }
    }

    pub fn date_format(mut self, value: impl Into<String>) -> Self {
        self.date_format = value.into();
        self
    }

    pub fn date_separator(mut self, value: impl Into<String>) -> Self {
        self.date_separator = value.into();
        self
    }

    pub fn time_separator(mut self, value: impl Into<String>) -> Self {
        self.time_separator = value.into();
        self
    }

    pub fn number_format(mut self, value: impl Into<String>) -> Self {
        self.number_format = value.into();
        self
    }

    pub fn group_separator(mut self, value: impl Into<String>) -> Self {
        self.group_separator = value.into();
        self
    }

    pub fn decimal_separator(mut self, value: impl Into<String>) -> Self {
        self.decimal_separator = value.into();
        self
    }

    pub fn true_format(mut self, value: impl Into<String>) -> Self {
        self.true_format = value.into();
        self
    }

    pub fn false_format(mut self, value: impl Into<String>) -> Self {
        self.false_format = value.into();
        self
    }

    pub fn ignore_case(mut self, value: bool) -> Self {
        self.ignore_case = value;
        self
    }

    pub fn display_null_as(mut self, value: impl Into<String>) -> Self {
        self.display_null_as = value.into();
        self
    }

    pub fn part(mut self, part: usize, splitter: char, to_end: bool) -> Self {
        self.part = part;
        self.part_splitter = splitter;
        self.part_to_end = to_end;
        self
    }

    pub fn regex(mut self, pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.regex_search_pattern = pattern.into();
        self.regex_replacement = replacement.into();
        self
    }

    pub fn read_folder(mut self, value: impl Into<String>) -> Self {
        self.read_folder = value.into();
        self
    }

    pub fn write_folder(mut self, value: impl Into<String>) -> Self {
        self.write_folder = value.into();
        self
    }

    pub fn file_output_placeholder(mut self, value: impl Into<String>) -> Self {
        self.file_output_placeholder = value.into();
        self
    }

    pub fn overwrite(mut self, value: bool) -> Self {
        self.overwrite = value;
        self
    }

    pub fn size_limit(mut self, value: u64) -> Self {
        self.size_limit = value;
        self
    }

    pub fn raise_warning(mut self, value: bool) -> Self {
        self.raise_warning = value;
        self
    }

    /// Freeze into an immutable [`ValueFormat`].
    pub fn build(self) -> ConfigResult<ValueFormat> {
        if self.decimal_separator.is_empty() {
            return Err(ConfigError::EmptyDecimalSeparator);
        }
        if self.decimal_separator == self.group_separator {
            return Err(ConfigError::SeparatorConflict(self.decimal_separator));
        }
        if self.data_type == DataType::RegexReplace {
            regex::Regex::new(&self.regex_search_pattern).map_err(|e| {
                ConfigError::InvalidRegex {
                    pattern: self.regex_search_pattern.clone(),
                    message: e.to_string(),
                }
            })?;
        }
        Ok(ValueFormat::from_parts(self))
    }
}

impl TryFrom<ValueFormatBuilder> for ValueFormat {
    type Error = ConfigError;

    fn try_from(builder: ValueFormatBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

impl From<ValueFormat> for ValueFormatBuilder {
    fn from(f: ValueFormat) -> Self {
        Self {
            data_type: f.data_type,
            date_format: f.date_format,
            date_separator: f.date_separator,
            time_separator: f.time_separator,
            number_format: f.number_format,
            group_separator: f.group_separator,
            decimal_separator: f.decimal_separator,
            true_format: f.true_format,
            false_format: f.false_format,
            ignore_case: f.ignore_case,
            display_null_as: f.display_null_as,
            part: f.part,
            part_splitter: f.part_splitter,
            part_to_end: f.part_to_end,
            regex_search_pattern: f.regex_search_pattern,
            regex_replacement: f.regex_replacement,
            read_folder: f.read_folder,
            write_folder: f.write_folder,
            file_output_placeholder: f.file_output_placeholder,
            overwrite: f.overwrite,
            size_limit: f.size_limit,
            raise_warning: f.raise_warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator_rejection() {
        let result = ValueFormat::builder(DataType::Double)
            .decimal_separator(",")
            .group_separator(",")
            .build();
        assert_eq!(result, Err(ConfigError::SeparatorConflict(",".into())));
    }

    #[test]
    fn test_empty_decimal_rejected() {
        let result = ValueFormat::builder(DataType::Double)
            .decimal_separator("")
            .build();
        assert_eq!(result, Err(ConfigError::EmptyDecimalSeparator));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let result = ValueFormat::builder(DataType::RegexReplace)
            .regex("([a-z", "x")
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidRegex { .. })));
    }

    #[test]
    fn test_deserialize_enforces_invariant() {
        let ok: ValueFormat =
            serde_json::from_str(r#"{"dataType":"Integer","groupSeparator":","}"#).unwrap();
        assert_eq!(ok.data_type(), DataType::Integer);
        assert_eq!(ok.group_separator(), ",");
        assert_eq!(ok.date_format(), DEFAULT_DATE_FORMAT);

        let bad = serde_json::from_str::<ValueFormat>(
            r#"{"dataType":"Double","groupSeparator":".","decimalSeparator":"."}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_with_data_type_keeps_parameters() {
        let format = ValueFormat::builder(DataType::String)
            .date_format("dd.MM.yyyy")
            .build()
            .unwrap();
        let changed = format.with_data_type(DataType::DateTime);
        assert_eq!(changed.data_type(), DataType::DateTime);
        assert_eq!(changed.date_format(), "dd.MM.yyyy");
    }
}
