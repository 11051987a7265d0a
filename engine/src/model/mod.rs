//! Domain model shared by the reader and writer engines.
//!
//! - [`DataType`] - the closed set of column types
//! - [`TypedValue`] - a converted field value
//! - [`ValueFormat`] - text <-> value conversion parameters
//! - [`Column`] / [`ColumnCollection`] - per column configuration
//! - [`DialectConfig`] - how a file is laid out (delimiter, qualifier, ...)

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

pub mod column;
pub mod dialect;
pub mod value_format;

pub use column::{Column, ColumnBuilder, ColumnCollection, TimeZonePart};
pub use dialect::{
    parse_punctuation, DialectConfig, QualifierMode, QualifyPolicy, RecordDelimiter,
    TrimmingOption,
};
pub use value_format::{ValueFormat, ValueFormatBuilder};

// =============================================================================
// Data Type
// =============================================================================

/// Type of a column.
///
/// The text variants (`TextToHtml`, `TextPart`, ...) hold strings; they differ
/// in the column formatter applied around conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Numeric,
    Double,
    DateTime,
    Boolean,
    Guid,
    #[default]
    String,
    TextToHtml,
    TextToHtmlFull,
    TextPart,
    TextUnescape,
    Binary,
    Markdown2Html,
    RegexReplace,
}

impl DataType {
    /// `true` for every type whose converted value is text.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            DataType::String
                | DataType::TextToHtml
                | DataType::TextToHtmlFull
                | DataType::TextPart
                | DataType::TextUnescape
                | DataType::Markdown2Html
                | DataType::RegexReplace
        )
    }

    /// Human readable name used in messages.
    pub fn display_name(self) -> &'static str {
        match self {
            DataType::Integer => "Integer",
            DataType::Numeric => "Money (High Precision)",
            DataType::Double => "Decimal (Double)",
            DataType::DateTime => "Date Time",
            DataType::Boolean => "Boolean",
            DataType::Guid => "Guid",
            DataType::String => "Text",
            DataType::TextToHtml => "Encode HTML (Linefeed and CData Tags)",
            DataType::TextToHtmlFull => "Encode HTML ('<' -> '&lt;')",
            DataType::TextPart => "Text Part",
            DataType::TextUnescape => "Unescape Text",
            DataType::Binary => "Binary (File Reference)",
            DataType::Markdown2Html => "Markdown to HTML",
            DataType::RegexReplace => "Regex Replace",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// =============================================================================
// Typed Value
// =============================================================================

/// A converted field value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    Integer(i64),
    Numeric(f64),
    Double(f64),
    DateTime(NaiveDateTime),
    Boolean(bool),
    Guid(Uuid),
    String(String),
    Binary(Vec<u8>),
}

impl TypedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    /// The type a value of this variant naturally maps to.
    pub fn data_type(&self) -> DataType {
        match self {
            TypedValue::Null | TypedValue::String(_) => DataType::String,
            TypedValue::Integer(_) => DataType::Integer,
            TypedValue::Numeric(_) => DataType::Numeric,
            TypedValue::Double(_) => DataType::Double,
            TypedValue::DateTime(_) => DataType::DateTime,
            TypedValue::Boolean(_) => DataType::Boolean,
            TypedValue::Guid(_) => DataType::Guid,
            TypedValue::Binary(_) => DataType::Binary,
        }
    }

    /// Invariant text form, independent of any [`ValueFormat`].
    pub fn to_invariant_string(&self) -> String {
        match self {
            TypedValue::Null => String::new(),
            TypedValue::Integer(i) => i.to_string(),
            TypedValue::Numeric(n) | TypedValue::Double(n) => n.to_string(),
            TypedValue::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            TypedValue::Boolean(b) => b.to_string(),
            TypedValue::Guid(g) => g.hyphenated().to_string(),
            TypedValue::String(s) => s.clone(),
            TypedValue::Binary(bytes) => {
                use base64::Engine as _;
                base64::engine::general_purpose::STANDARD.encode(bytes)
            }
        }
    }

    /// JSON representation used by the structured writer and the CLI.
    pub fn to_json(&self) -> Value {
        match self {
            TypedValue::Null => Value::Null,
            TypedValue::Integer(i) => json!(i),
            TypedValue::Numeric(n) | TypedValue::Double(n) => json!(n),
            TypedValue::Boolean(b) => json!(b),
            other => Value::String(other.to_invariant_string()),
        }
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        TypedValue::String(value.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        TypedValue::String(value)
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        TypedValue::Integer(value)
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        TypedValue::Boolean(value)
    }
}

impl From<NaiveDateTime> for TypedValue {
    fn from(value: NaiveDateTime) -> Self {
        TypedValue::DateTime(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_text_types() {
        assert!(DataType::String.is_text());
        assert!(DataType::TextPart.is_text());
        assert!(!DataType::Binary.is_text());
        assert!(!DataType::Integer.is_text());
    }

    #[test]
    fn test_json_representation() {
        assert_eq!(TypedValue::Integer(5).to_json(), json!(5));
        assert_eq!(TypedValue::Null.to_json(), Value::Null);
        let dt = NaiveDate::from_ymd_opt(2010, 1, 20)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(TypedValue::DateTime(dt).to_json(), json!("2010-01-20T14:30:00"));
        assert_eq!(TypedValue::Binary(b"hi".to_vec()).to_json(), json!("aGk="));
    }
}
