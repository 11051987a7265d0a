//! Templated structured output: JSON and XML.
//!
//! A row is written by filling a template whose `{ColumnName}` placeholders
//! are replaced with the encoded values of the row.

use serde_json::Value;

use super::WriterColumn;
use crate::model::{DataType, TypedValue};

/// A value ready to be written, with its formatted text.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: TypedValue,
    pub text: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Replace `{key}` placeholders; unknown keys are left in place.
pub fn fill_template(template: &str, mut lookup: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if !after[..close].contains('{') => {
                let key = &after[..close];
                match lookup(key) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Default JSON row: one object with a member per column.
pub fn json_template(columns: &[WriterColumn]) -> String {
    let members: Vec<String> = columns
        .iter()
        .map(|c| format!("{}:{{{}}}", Value::String(c.name.clone()), c.name))
        .collect();
    format!("{{{}}}", members.join(","))
}

/// Default XML row: a `<row>` with an element per column.
pub fn xml_template(columns: &[WriterColumn]) -> String {
    let mut template = String::from("  <row>");
    for column in columns {
        let element = xml_name(&column.name);
        template.push_str(&format!("<{element}>{{{}}}</{element}>", column.name));
    }
    template.push_str("</row>");
    template
}

pub const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<rowset>";
pub const XML_FOOTER: &str = "</rowset>";
pub const JSON_HEADER: &str = "[";
pub const JSON_FOOTER: &str = "]";

// =============================================================================
// Encoding
// =============================================================================

/// JSON literal of a cell; numbers, booleans and null stay unquoted.
pub fn json_value(cell: &Cell, data_type: DataType) -> String {
    let value = match (&cell.value, data_type) {
        (TypedValue::Null, _) => Value::Null,
        (
            TypedValue::Integer(_) | TypedValue::Numeric(_) | TypedValue::Double(_),
            DataType::Integer | DataType::Numeric | DataType::Double,
        )
        | (TypedValue::Boolean(_), DataType::Boolean) => cell.value.to_json(),
        _ => Value::String(cell.text.clone()),
    };
    value.to_string()
}

/// Escape text for XML element content and attributes.
pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {
                out.push_str(&format!("&#x{:X};", c as u32))
            }
            c => out.push(c),
        }
    }
    out
}

/// A valid XML element name for a column name.
pub fn xml_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let starts_well = out
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    if !starts_well {
        out.insert(0, '_');
    }
    out
}

/// Encode a row through a template.
pub fn fill_row(
    template: &str,
    columns: &[WriterColumn],
    cells: &[Cell],
    encode: impl Fn(&Cell, &WriterColumn) -> String,
) -> String {
    fill_template(template, |key| {
        columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(key))
            .and_then(|index| cells.get(index).map(|cell| encode(cell, &columns[index])))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValueFormat;

    fn column(name: &str, data_type: DataType) -> WriterColumn {
        WriterColumn {
            name: name.to_string(),
            source_ordinal: 0,
            value_format: ValueFormat::new(data_type),
            field_length: 0,
            time_zone: None,
        }
    }

    fn cell(value: TypedValue, text: &str) -> Cell {
        Cell {
            value,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_fill_template() {
        let filled = fill_template("{a}-{b}-{c", |key| (key == "a").then(|| "1".to_string()));
        assert_eq!(filled, "1-{b}-{c");
    }

    #[test]
    fn test_json_row() {
        let columns = vec![
            column("id", DataType::Integer),
            column("name", DataType::String),
            column("ok", DataType::Boolean),
            column("none", DataType::String),
        ];
        let cells = vec![
            cell(TypedValue::Integer(7), "7"),
            cell(TypedValue::from("a \"b\""), "a \"b\""),
            cell(TypedValue::Boolean(true), "True"),
            cell(TypedValue::Null, ""),
        ];
        let row = fill_row(&json_template(&columns), &columns, &cells, |cell, column| {
            json_value(cell, column.value_format.data_type())
        });
        assert_eq!(row, r#"{"id":7,"name":"a \"b\"","ok":true,"none":null}"#);
        let parsed: Value = serde_json::from_str(&row).unwrap();
        assert_eq!(parsed["name"], "a \"b\"");
    }

    #[test]
    fn test_xml_row() {
        let columns = vec![column("1st name", DataType::String)];
        let cells = vec![cell(TypedValue::from("<Tom & Jerry>"), "<Tom & Jerry>")];
        let row = fill_row(&xml_template(&columns), &columns, &cells, |cell, _| {
            xml_escape(&cell.text)
        });
        assert_eq!(row, "  <row><_1st_name>&lt;Tom &amp; Jerry&gt;</_1st_name></row>");
    }
}
