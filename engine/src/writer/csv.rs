//! Field encoding for delimited and fixed-width output.
//!
//! Encoding is the mirror of the tokenizer: whatever is written here reads
//! back as the same text with the same [`DialectConfig`].

use crate::model::{DialectConfig, QualifierMode, QualifyPolicy, TrimmingOption};

fn replace_line_breaks(text: &str, placeholder: &str) -> String {
    text.replace("\r\n", placeholder)
        .replace(['\r', '\n'], placeholder)
}

/// Substitute configured placeholders for the characters they stand for.
pub fn apply_placeholders(text: &str, dialect: &DialectConfig) -> String {
    let mut value = text.to_string();
    if !dialect.delimiter_placeholder.is_empty() {
        value = value.replace(dialect.field_delimiter, &dialect.delimiter_placeholder);
    }
    if let Some(qualifier) = dialect.field_qualifier {
        if !dialect.qualifier_placeholder.is_empty() {
            value = value.replace(qualifier, &dialect.qualifier_placeholder);
        }
    }
    if !dialect.newline_placeholder.is_empty() {
        value = replace_line_breaks(&value, &dialect.newline_placeholder);
    }
    value
}

/// Whether a field, after placeholder substitution, is written qualified.
///
/// A field containing the qualifier is qualified as well whenever the
/// qualifier can be escaped, so it is never mistaken for an opening quote.
pub fn needs_qualifier(text: &str, dialect: &DialectConfig) -> bool {
    let Some(qualifier) = dialect.field_qualifier else {
        return false;
    };
    if dialect.qualify == QualifyPolicy::Always || text.contains(dialect.field_delimiter) {
        return true;
    }
    if dialect.newline_placeholder.is_empty() && text.contains(['\r', '\n']) {
        return true;
    }
    if dialect.qualify == QualifyPolicy::OnlyIfNeeded {
        if let Some(first) = text.chars().next() {
            if first == qualifier || first == ' ' {
                return true;
            }
        }
        // Unquoted values lose surrounding whitespace on read
        if dialect.trimming != TrimmingOption::None
            && (text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace))
        {
            return true;
        }
    }
    text.contains(qualifier)
        && (dialect.escape_prefix.is_some()
            || dialect.qualifier_mode == QualifierMode::DuplicateToEscape)
}

/// Encode one field of a delimited row.
///
/// `warn` receives a message when the text can not be written unambiguously.
pub fn encode_field(text: &str, dialect: &DialectConfig, warn: &mut dyn FnMut(String)) -> String {
    let value = apply_placeholders(text, dialect);
    let escape = dialect.escape_prefix;

    if needs_qualifier(&value, dialect) {
        let Some(qualifier) = dialect.field_qualifier else {
            return value;
        };
        let mut out = String::with_capacity(value.len() + 2);
        out.push(qualifier);
        for c in value.chars() {
            match escape {
                Some(e) if c == qualifier || c == e => out.push(e),
                None if c == qualifier
                    && dialect.qualifier_mode == QualifierMode::DuplicateToEscape =>
                {
                    out.push(qualifier)
                }
                _ => {}
            }
            out.push(c);
        }
        out.push(qualifier);
        return out;
    }

    if let Some(e) = escape {
        let special = |c: char| {
            c == e
                || c == dialect.field_delimiter
                || c == '\r'
                || c == '\n'
                || Some(c) == dialect.field_qualifier
        };
        if value.contains(special) {
            let mut out = String::with_capacity(value.len() + 4);
            for c in value.chars() {
                if special(c) {
                    out.push(e);
                }
                out.push(c);
            }
            return out;
        }
        return value;
    }

    if value.contains(dialect.field_delimiter) || value.contains(['\r', '\n']) {
        warn(format!(
            "Value '{}' contains the delimiter or a line break and can not be qualified",
            value
        ));
    }
    value
}

/// Pad a value with spaces to `length` characters, or truncate it.
///
/// A length of 0 leaves the value as it is.
pub fn fit_width(text: &str, length: usize, warn: &mut dyn FnMut(String)) -> String {
    if length == 0 {
        return text.to_string();
    }
    let count = text.chars().count();
    if count > length {
        warn(format!(
            "Value of {count} characters truncated to {length}"
        ));
        return text.chars().take(length).collect();
    }
    let mut out = String::with_capacity(length);
    out.push_str(text);
    out.extend(std::iter::repeat(' ').take(length - count));
    out
}

/// A complete delimited line, without the record delimiter.
pub fn encode_row<'a>(
    fields: impl IntoIterator<Item = &'a str>,
    dialect: &DialectConfig,
    warn: &mut dyn FnMut(String),
) -> String {
    let mut line = String::new();
    for (index, field) in fields.into_iter().enumerate() {
        if index > 0 {
            line.push(dialect.field_delimiter);
        }
        line.push_str(&encode_field(field, dialect, warn));
    }
    line
}
