//! Text <-> typed value conversion.
//!
//! [`parse`] turns a raw field into a [`TypedValue`] according to a
//! [`ValueFormat`]; [`format`] is its inverse. [`try_format`] reports values
//! that do not fit the declared type so writers can fall back to text.

use base64::Engine as _;
use uuid::Uuid;

use crate::error::{ConversionError, ConversionResult};
use crate::model::{DataType, TypedValue, ValueFormat};

pub mod datetime;
pub mod number;
pub mod timezone;

pub use datetime::{DateTimeFormatInformation, DateTimePattern};
pub use timezone::{FixedOffsetAdjust, TimeZoneAdjust};

/// Parse a raw field.
///
/// An empty text, or the format's `display_null_as` text, is `Null`.
pub fn parse(raw: &str, format: &ValueFormat) -> ConversionResult<TypedValue> {
    let data_type = format.data_type();
    if raw.is_empty() || (!format.display_null_as().is_empty() && raw == format.display_null_as())
    {
        return Ok(TypedValue::Null);
    }
    if data_type.is_text() {
        return Ok(TypedValue::String(raw.to_string()));
    }

    let fail = |message: String| ConversionError::new(data_type, raw, message);
    let text = raw.trim();
    if text.is_empty() {
        return Ok(TypedValue::Null);
    }

    match data_type {
        DataType::Integer => number::parse_integer(text, format)
            .map(TypedValue::Integer)
            .map_err(fail),
        DataType::Numeric => number::parse_decimal(text, format)
            .map(TypedValue::Numeric)
            .map_err(fail),
        DataType::Double => number::parse_decimal(text, format)
            .map(TypedValue::Double)
            .map_err(fail),
        DataType::DateTime => DateTimePattern::parse(format.date_format())
            .parse_value(text, format.date_separator(), format.time_separator())
            .map(TypedValue::DateTime)
            .map_err(fail),
        DataType::Boolean => parse_boolean(text, format)
            .map(TypedValue::Boolean)
            .ok_or_else(|| {
                fail(format!(
                    "expected '{}' or '{}'",
                    format.true_format(),
                    format.false_format()
                ))
            }),
        DataType::Guid => Uuid::parse_str(text)
            .map(TypedValue::Guid)
            .map_err(|e| fail(e.to_string())),
        DataType::Binary => base64::engine::general_purpose::STANDARD
            .decode(text)
            .map(TypedValue::Binary)
            .map_err(|e| fail(e.to_string())),
        _ => Ok(TypedValue::String(raw.to_string())),
    }
}

fn parse_boolean(text: &str, format: &ValueFormat) -> Option<bool> {
    let matches = |literal: &str| {
        if format.ignore_case() {
            text.eq_ignore_ascii_case(literal) || text.to_lowercase() == literal.to_lowercase()
        } else {
            text == literal
        }
    };
    if matches(format.true_format()) {
        Some(true)
    } else if matches(format.false_format()) {
        Some(false)
    } else {
        None
    }
}

/// Format a value; values that do not fit the format are written in their
/// invariant text form.
pub fn format(value: &TypedValue, format: &ValueFormat) -> String {
    try_format(value, format).unwrap_or_else(|_| value.to_invariant_string())
}

/// Format a value, failing if it can not be expressed in the format's type.
///
/// Text values for a non-text format are parsed with the same format first.
pub fn try_format(value: &TypedValue, format: &ValueFormat) -> ConversionResult<String> {
    let data_type = format.data_type();
    let text = match (value, data_type) {
        (TypedValue::Null, _) => format.display_null_as().to_string(),
        (TypedValue::String(s), t) if t.is_text() => s.clone(),
        (TypedValue::String(s), _) => {
            let parsed = parse(s, format)?;
            return try_format(&parsed, format);
        }
        (other, t) if t.is_text() => other.to_invariant_string(),
        (TypedValue::Integer(i), DataType::Integer) => number::format_integer(*i, format),
        (TypedValue::Integer(i), DataType::Numeric | DataType::Double) => {
            number::format_decimal(*i as f64, format)
        }
        (TypedValue::Numeric(n) | TypedValue::Double(n), DataType::Numeric | DataType::Double) => {
            number::format_decimal(*n, format)
        }
        (TypedValue::Numeric(n) | TypedValue::Double(n), DataType::Integer)
            if n.fract() == 0.0 && n.abs() < i64::MAX as f64 =>
        {
            number::format_integer(*n as i64, format)
        }
        (TypedValue::DateTime(dt), DataType::DateTime) => DateTimePattern::parse(format.date_format())
            .format(dt, format.date_separator(), format.time_separator()),
        (TypedValue::Boolean(true), DataType::Boolean) => format.true_format().to_string(),
        (TypedValue::Boolean(false), DataType::Boolean) => format.false_format().to_string(),
        (TypedValue::Guid(g), DataType::Guid) => g.hyphenated().to_string(),
        (TypedValue::Binary(bytes), DataType::Binary) => {
            base64::engine::general_purpose::STANDARD.encode(bytes)
        }
        (other, _) => {
            return Err(ConversionError::new(
                data_type,
                other.to_invariant_string(),
                format!("a {} value can not be written", other.data_type()),
            ))
        }
    };
    Ok(text)
}
