//! Numbers with configurable group and decimal separators.
//!
//! Parsing is two-phase: every group separator occurrence is removed, then
//! the remainder is parsed with the decimal separator.

use crate::model::ValueFormat;

/// Layout derived from a `#,##0.00`-style number pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberPattern {
    pub grouping: bool,
    pub min_decimals: usize,
    pub max_decimals: usize,
    pub percent: bool,
}

impl NumberPattern {
    pub fn parse(pattern: &str) -> Self {
        let percent = pattern.contains('%');
        let (integer, fraction) = match pattern.find('.') {
            Some(pos) => (&pattern[..pos], &pattern[pos + 1..]),
            None => (pattern, ""),
        };
        let min_decimals = fraction.chars().filter(|c| *c == '0').count();
        let optional = fraction.chars().filter(|c| *c == '#').count();
        Self {
            grouping: integer.contains(','),
            min_decimals,
            max_decimals: min_decimals + optional,
            percent,
        }
    }
}

fn strip_groups<'a>(text: &'a str, format: &ValueFormat) -> std::borrow::Cow<'a, str> {
    let group = format.group_separator();
    if group.is_empty() || !text.contains(group) {
        std::borrow::Cow::Borrowed(text)
    } else {
        std::borrow::Cow::Owned(text.replace(group, ""))
    }
}

/// Parse an integer, honouring the group separator.
pub fn parse_integer(text: &str, format: &ValueFormat) -> Result<i64, String> {
    let text = text.trim();
    let stripped = strip_groups(text, format);
    let mut digits = stripped.trim().to_string();

    // "12.00" is still an integer
    let decimal = format.decimal_separator();
    if let Some(pos) = digits.find(decimal) {
        let (whole, rest) = digits.split_at(pos);
        if rest[decimal.len()..].chars().all(|c| c == '0') {
            digits = whole.to_string();
        }
    }
    digits
        .parse::<i64>()
        .map_err(|e| format!("not an integer ({e})"))
}

/// Parse a decimal number; a trailing `%` or `‰` scales the value.
pub fn parse_decimal(text: &str, format: &ValueFormat) -> Result<f64, String> {
    let mut text = text.trim();
    let mut divisor = 1.0;
    if let Some(rest) = text.strip_suffix('%') {
        text = rest.trim_end();
        divisor = 100.0;
    } else if let Some(rest) = text.strip_suffix('‰') {
        text = rest.trim_end();
        divisor = 1000.0;
    }

    let stripped = strip_groups(text, format);
    let decimal = format.decimal_separator();
    let normalized = if decimal == "." {
        stripped.into_owned()
    } else {
        if stripped.contains('.') {
            return Err(format!("unexpected '.', decimal separator is '{decimal}'"));
        }
        stripped.replace(decimal, ".")
    };
    let normalized = normalized.trim();
    if normalized.is_empty() || normalized.eq_ignore_ascii_case("nan") {
        return Err("not a number".to_string());
    }
    normalized
        .parse::<f64>()
        .map(|v| v / divisor)
        .map_err(|e| format!("not a number ({e})"))
}

/// Insert the group separator every three digits of an integer text.
fn group_digits(integer: &str, separator: &str) -> String {
    let (sign, digits) = match integer.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", integer),
    };
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 * separator.len() + 1);
    out.push_str(sign);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(c);
    }
    out
}

pub fn format_integer(value: i64, format: &ValueFormat) -> String {
    let pattern = NumberPattern::parse(format.number_format());
    let text = value.to_string();
    if pattern.grouping && !format.group_separator().is_empty() {
        group_digits(&text, format.group_separator())
    } else {
        text
    }
}

pub fn format_decimal(value: f64, format: &ValueFormat) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let pattern = NumberPattern::parse(format.number_format());
    let value = if pattern.percent { value * 100.0 } else { value };

    let text = format!("{:.*}", pattern.max_decimals, value);
    let (integer, fraction) = match text.find('.') {
        Some(pos) => (&text[..pos], &text[pos + 1..]),
        None => (text.as_str(), ""),
    };
    let mut fraction = fraction.to_string();
    while fraction.len() > pattern.min_decimals && fraction.ends_with('0') {
        fraction.pop();
    }
    let integer = if integer == "-0" && fraction.is_empty() {
        "0"
    } else {
        integer
    };

    let mut out = if pattern.grouping && !format.group_separator().is_empty() {
        group_digits(integer, format.group_separator())
    } else {
        integer.to_string()
    };
    if !fraction.is_empty() {
        out.push_str(format.decimal_separator());
        out.push_str(&fraction);
    }
    if pattern.percent {
        out.push('%');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataType;

    fn german() -> ValueFormat {
        ValueFormat::builder(DataType::Double)
            .decimal_separator(",")
            .group_separator(".")
            .number_format("#,##0.00")
            .build()
            .unwrap()
    }

    #[test]
    fn test_integer_with_group_separator() {
        let format = ValueFormat::builder(DataType::Integer)
            .group_separator(",")
            .decimal_separator(".")
            .build()
            .unwrap();
        assert_eq!(parse_integer("1,234", &format), Ok(1234));
        assert_eq!(parse_integer(" -1,234,567 ", &format), Ok(-1234567));
        assert_eq!(parse_integer("12.00", &format), Ok(12));
        assert!(parse_integer("12.5", &format).is_err());
        assert!(parse_integer("abc", &format).is_err());
    }

    #[test]
    fn test_single_sign_only() {
        let format = ValueFormat::new(DataType::Integer);
        assert_eq!(parse_integer("+5", &format), Ok(5));
        assert!(parse_integer("++5", &format).is_err());
        assert!(parse_integer("+-5", &format).is_err());
        assert_eq!(parse_decimal("+2.5", &format), Ok(2.5));
        assert!(parse_decimal("++2.5", &format).is_err());
    }

    #[test]
    fn test_decimal_with_local_separators() {
        let format = german();
        assert_eq!(parse_decimal("1.234,5", &format), Ok(1234.5));
        assert_eq!(parse_decimal("-0,25", &format), Ok(-0.25));
        assert!(parse_decimal("1,2,3", &format).is_err());
    }

    #[test]
    fn test_percent_suffix() {
        let format = ValueFormat::new(DataType::Double);
        assert_eq!(parse_decimal("50%", &format), Ok(0.5));
        assert_eq!(parse_decimal("5 ‰", &format), Ok(0.005));
    }

    #[test]
    fn test_format_decimal_pattern() {
        let format = german();
        assert_eq!(format_decimal(1234.5, &format), "1.234,50");
        assert_eq!(format_decimal(-1234567.0, &format), "-1.234.567,00");

        let plain = ValueFormat::new(DataType::Double);
        assert_eq!(format_decimal(2.5, &plain), "2.5");
        assert_eq!(format_decimal(3.0, &plain), "3");
        assert_eq!(format_decimal(0.123456789, &plain), "0.12346");
    }

    #[test]
    fn test_format_integer_grouping() {
        let format = ValueFormat::builder(DataType::Integer)
            .group_separator(",")
            .number_format("#,##0")
            .build()
            .unwrap();
        assert_eq!(format_integer(1234567, &format), "1,234,567");
        assert_eq!(format_integer(-999, &format), "-999");
        assert_eq!(format_integer(-1000, &format), "-1,000");
    }

    #[test]
    fn test_pattern_parse() {
        let p = NumberPattern::parse("#,##0.00##");
        assert!(p.grouping);
        assert_eq!((p.min_decimals, p.max_decimals), (2, 4));
        assert!(!NumberPattern::parse("0").grouping);
    }
}
