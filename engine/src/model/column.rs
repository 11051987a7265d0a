//! Column definitions.
//!
//! A [`Column`] is immutable once built; [`ColumnBuilder`] is the editable
//! form. Columns are identified inside a [`ColumnCollection`] by a
//! case-insensitive hash of their name.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::{DataType, ValueFormat};
use crate::error::{ConfigError, ConfigResult};

/// Where the timezone of a split date/time value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeZonePart {
    /// A fixed timezone id, written as `"UTC"` (in double quotes) in settings.
    Constant(String),
    /// Name of a companion column holding the timezone id.
    Column(String),
}

impl TimeZonePart {
    /// Interpret a settings text; empty text means no timezone part.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            return Some(TimeZonePart::Constant(text[1..text.len() - 1].to_string()));
        }
        Some(TimeZonePart::Column(text.to_string()))
    }
}

/// Case-insensitive identifier of a column name inside a collection.
pub fn collection_identifier(name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.to_lowercase().hash(&mut hasher);
    hasher.finish()
}

/// Immutable column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColumnBuilder", into = "ColumnBuilder")]
pub struct Column {
    name: String,
    ordinal: Option<usize>,
    value_format: ValueFormat,
    ignore: bool,
    convert: bool,
    destination_name: String,
    time_part: String,
    time_part_format: String,
    time_zone_part: Option<TimeZonePart>,
    field_length: Option<usize>,
}

impl Column {
    /// A text column with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_format(name, ValueFormat::default())
    }

    pub fn with_format(name: impl Into<String>, value_format: ValueFormat) -> Self {
        let convert = value_format.data_type() != DataType::String;
        Self {
            name: name.into(),
            ordinal: None,
            value_format,
            ignore: false,
            convert,
            destination_name: String::new(),
            time_part: String::new(),
            time_part_format: String::new(),
            time_zone_part: None,
            field_length: None,
        }
    }

    pub fn builder(name: impl Into<String>) -> ColumnBuilder {
        ColumnBuilder::new(name)
    }

    /// Editable copy.
    pub fn to_builder(&self) -> ColumnBuilder {
        self.clone().into()
    }

    /// Copy of this column placed at another ordinal.
    pub fn at_ordinal(&self, ordinal: usize) -> Self {
        let mut copy = self.clone();
        copy.ordinal = Some(ordinal);
        copy
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ordinal(&self) -> Option<usize> {
        self.ordinal
    }

    pub fn value_format(&self) -> &ValueFormat {
        &self.value_format
    }

    pub fn data_type(&self) -> DataType {
        self.value_format.data_type()
    }

    pub fn ignore(&self) -> bool {
        self.ignore
    }

    pub fn convert(&self) -> bool {
        self.convert
    }

    pub fn destination_name(&self) -> &str {
        &self.destination_name
    }

    /// Name written to the output: the destination name if set.
    pub fn output_name(&self) -> &str {
        if self.destination_name.is_empty() {
            &self.name
        } else {
            &self.destination_name
        }
    }

    pub fn time_part(&self) -> &str {
        &self.time_part
    }

    pub fn time_part_format(&self) -> &str {
        &self.time_part_format
    }

    pub fn time_zone_part(&self) -> Option<&TimeZonePart> {
        self.time_zone_part.as_ref()
    }

    pub fn field_length(&self) -> Option<usize> {
        self.field_length
    }

    pub fn collection_identifier(&self) -> u64 {
        collection_identifier(&self.name)
    }
}

/// Editable column, frozen with [`ColumnBuilder::build`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnBuilder {
    pub name: String,
    pub ordinal: Option<usize>,
    pub value_format: ValueFormat,
    pub ignore: bool,
    /// `None` means "convert unless the type is String".
    pub convert: Option<bool>,
    pub destination_name: String,
    pub time_part: String,
    pub time_part_format: String,
    /// Column name or a quoted constant such as `"UTC"`.
    pub time_zone_part: String,
    pub field_length: Option<usize>,
}

impl Default for ColumnBuilder {
    fn default() -> Self {
        Self::new("")
    }
}

impl ColumnBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ordinal: None,
            value_format: ValueFormat::default(),
            ignore: false,
            convert: None,
            destination_name: String::new(),
            time_part: String::new(),
            time_part_format: "HH:mm:ss".to_string(),
            time_zone_part: String::new(),
            field_length: None,
        }
    }

    pub fn value_format(mut self, value_format: ValueFormat) -> Self {
        self.value_format = value_format;
        self
    }

    pub fn ordinal(mut self, ordinal: usize) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    pub fn ignore(mut self, ignore: bool) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn convert(mut self, convert: bool) -> Self {
        self.convert = Some(convert);
        self
    }

    pub fn destination_name(mut self, name: impl Into<String>) -> Self {
        self.destination_name = name.into();
        self
    }

    pub fn time_part(mut self, column: impl Into<String>, format: impl Into<String>) -> Self {
        self.time_part = column.into();
        self.time_part_format = format.into();
        self
    }

    pub fn time_zone_part(mut self, part: impl Into<String>) -> Self {
        self.time_zone_part = part.into();
        self
    }

    pub fn field_length(mut self, length: usize) -> Self {
        self.field_length = Some(length);
        self
    }

    pub fn build(self) -> ConfigResult<Column> {
        Ok(self.into_column())
    }

    fn into_column(self) -> Column {
        let convert = self
            .convert
            .unwrap_or(self.value_format.data_type() != DataType::String);
        Column {
            name: self.name.trim().to_string(),
            ordinal: self.ordinal,
            value_format: self.value_format,
            ignore: self.ignore,
            convert,
            destination_name: self.destination_name,
            time_part: self.time_part,
            time_part_format: self.time_part_format,
            time_zone_part: TimeZonePart::parse(&self.time_zone_part),
            field_length: self.field_length,
        }
    }
}

impl TryFrom<ColumnBuilder> for Column {
    type Error = ConfigError;

    fn try_from(builder: ColumnBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

impl From<Column> for ColumnBuilder {
    fn from(c: Column) -> Self {
        Self {
            name: c.name,
            ordinal: c.ordinal,
            value_format: c.value_format,
            ignore: c.ignore,
            convert: Some(c.convert),
            destination_name: c.destination_name,
            time_part: c.time_part,
            time_part_format: c.time_part_format,
            time_zone_part: match c.time_zone_part {
                Some(TimeZonePart::Constant(id)) => format!("\"{id}\""),
                Some(TimeZonePart::Column(name)) => name,
                None => String::new(),
            },
            field_length: c.field_length,
        }
    }
}

/// Blank names become `Column{N}`, repeated names get a numeric suffix.
pub fn unique_names(names: &[String]) -> Vec<String> {
    let mut seen: Vec<u64> = Vec::with_capacity(names.len());
    let mut result = Vec::with_capacity(names.len());
    for (index, name) in names.iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("Column{}", index + 1)
        } else {
            name.trim().to_string()
        };
        let mut candidate = base.clone();
        let mut suffix = 2;
        while seen.contains(&collection_identifier(&candidate)) {
            candidate = format!("{base}{suffix}");
            suffix += 1;
        }
        seen.push(collection_identifier(&candidate));
        result.push(candidate);
    }
    result
}

// =============================================================================
// Column Collection
// =============================================================================

/// Ordered set of columns with unique, case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Column>", into = "Vec<Column>")]
pub struct ColumnCollection {
    columns: Vec<Column>,
    index: HashMap<u64, usize>,
}

impl ColumnCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column; fails if the name is already present.
    pub fn add(&mut self, column: Column) -> ConfigResult<()> {
        let id = column.collection_identifier();
        if self.index.contains_key(&id) {
            return Err(ConfigError::DuplicateColumn(column.name().to_string()));
        }
        self.index.insert(id, self.columns.len());
        self.columns.push(column);
        Ok(())
    }

    /// Append or replace the column with the same name.
    pub fn set(&mut self, column: Column) {
        let id = column.collection_identifier();
        match self.index.get(&id) {
            Some(&pos) => self.columns[pos] = column,
            None => {
                self.index.insert(id, self.columns.len());
                self.columns.push(column);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.index
            .get(&collection_identifier(name))
            .map(|&pos| &self.columns[pos])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&collection_identifier(name))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl TryFrom<Vec<Column>> for ColumnCollection {
    type Error = ConfigError;

    fn try_from(columns: Vec<Column>) -> Result<Self, Self::Error> {
        let mut collection = ColumnCollection::new();
        for column in columns {
            collection.add(column)?;
        }
        Ok(collection)
    }
}

impl From<ColumnCollection> for Vec<Column> {
    fn from(collection: ColumnCollection) -> Self {
        collection.columns
    }
}

impl<'a> IntoIterator for &'a ColumnCollection {
    type Item = &'a Column;
    type IntoIter = std::slice::Iter<'a, Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_defaults_by_type() {
        assert!(!Column::new("a").convert());
        let int = Column::with_format("b", ValueFormat::new(DataType::Integer));
        assert!(int.convert());
        let forced = Column::builder("c")
            .value_format(ValueFormat::new(DataType::Integer))
            .convert(false)
            .build()
            .unwrap();
        assert!(!forced.convert());
    }

    #[test]
    fn test_collection_is_case_insensitive() {
        let mut columns = ColumnCollection::new();
        columns.add(Column::new("Name")).unwrap();
        assert!(columns.get("NAME").is_some());
        assert_eq!(
            columns.add(Column::new("name")),
            Err(ConfigError::DuplicateColumn("name".into()))
        );
        assert_eq!(columns.len(), 1);
    }

    #[test]
    fn test_time_zone_part_parsing() {
        assert_eq!(TimeZonePart::parse(""), None);
        assert_eq!(
            TimeZonePart::parse("\"UTC\""),
            Some(TimeZonePart::Constant("UTC".into()))
        );
        assert_eq!(
            TimeZonePart::parse("zone"),
            Some(TimeZonePart::Column("zone".into()))
        );
    }

    #[test]
    fn test_builder_round_trip_keeps_time_zone_constant() {
        let column = Column::builder("stamp")
            .time_zone_part("\"+02:00\"")
            .build()
            .unwrap();
        let again = column.to_builder().build().unwrap();
        assert_eq!(column, again);
    }

    #[test]
    fn test_collection_deserialize_rejects_duplicates() {
        let json = r#"[{"name":"a"},{"name":"A"}]"#;
        assert!(serde_json::from_str::<ColumnCollection>(json).is_err());
        let json = r#"[{"name":"a"},{"name":"b","valueFormat":{"dataType":"Integer"}}]"#;
        let columns: ColumnCollection = serde_json::from_str(json).unwrap();
        assert_eq!(columns.get("b").unwrap().data_type(), DataType::Integer);
        assert!(columns.get("b").unwrap().convert());
    }
}
