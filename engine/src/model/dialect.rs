//! Layout of a delimited or fixed-width text file.

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, Diagnostics, WarningKind};
use crate::error::{ConfigError, ConfigResult};

/// Record separator written between rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordDelimiter {
    Lf,
    #[default]
    CrLf,
    Cr,
    LfCr,
    /// ASCII record separator (0x1E)
    Rs,
    /// ASCII unit separator (0x1F)
    Us,
}

impl RecordDelimiter {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordDelimiter::Lf => "\n",
            RecordDelimiter::CrLf => "\r\n",
            RecordDelimiter::Cr => "\r",
            RecordDelimiter::LfCr => "\n\r",
            RecordDelimiter::Rs => "\u{1e}",
            RecordDelimiter::Us => "\u{1f}",
        }
    }

    /// Extra record-ending character besides CR and LF, if any.
    pub fn special_char(self) -> Option<char> {
        match self {
            RecordDelimiter::Rs => Some('\u{1e}'),
            RecordDelimiter::Us => Some('\u{1f}'),
            _ => None,
        }
    }
}

/// Which values get leading and trailing whitespace removed on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrimmingOption {
    None,
    #[default]
    Unquoted,
    All,
}

/// When the writer wraps a field in qualifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualifyPolicy {
    /// Only fields containing the delimiter or a line break.
    Minimal,
    /// Every field.
    Always,
    /// As `Minimal`, plus fields starting with the qualifier or a space.
    #[default]
    OnlyIfNeeded,
}

/// How a qualifier inside a qualified field is treated.
///
/// "Duplicate qualifier to escape" and "context sensitive qualifier" exclude
/// each other, so they are one setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualifierMode {
    /// `""` inside a qualified field stands for one `"`.
    #[default]
    DuplicateToEscape,
    /// A qualifier only opens at the start and only closes before a
    /// delimiter or line end; anywhere else it is text.
    ContextSensitive,
    /// Neither; qualifiers may be escaped with the escape prefix only.
    Plain,
}

/// Dialect of a delimited file, read-only for the duration of a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DialectConfig {
    pub field_delimiter: char,
    pub field_qualifier: Option<char>,
    pub escape_prefix: Option<char>,
    pub new_line: RecordDelimiter,
    pub comment_line: String,
    pub skip_rows: usize,
    pub has_field_header: bool,
    pub skip_duplicate_header: bool,
    pub skip_empty_lines: bool,
    pub consecutive_empty_rows: usize,
    pub trimming: TrimmingOption,
    pub treat_nbsp_as_space: bool,
    pub treat_lf_as_space: bool,
    pub treat_unknown_character_as_space: bool,
    pub treat_text_as_null: String,
    pub delimiter_placeholder: String,
    pub qualifier_placeholder: String,
    pub newline_placeholder: String,
    pub qualify: QualifyPolicy,
    pub qualifier_mode: QualifierMode,
    pub allow_row_combining: bool,
    pub try_to_solve_more_columns: bool,
    /// Split lines by the columns' field lengths instead of the delimiter.
    pub fixed_width: bool,
    pub warn_delimiter_in_value: bool,
    pub warn_quotes: bool,
    pub warn_quotes_in_quotes: bool,
    pub warn_empty_tailing_columns: bool,
    pub warn_line_feed: bool,
    pub warn_nbsp: bool,
    pub warn_unknown_character: bool,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self {
            field_delimiter: ',',
            field_qualifier: Some('"'),
            escape_prefix: None,
            new_line: RecordDelimiter::CrLf,
            comment_line: String::new(),
            skip_rows: 0,
            has_field_header: true,
            skip_duplicate_header: false,
            skip_empty_lines: true,
            consecutive_empty_rows: 5,
            trimming: TrimmingOption::Unquoted,
            treat_nbsp_as_space: false,
            treat_lf_as_space: false,
            treat_unknown_character_as_space: false,
            treat_text_as_null: "NULL".to_string(),
            delimiter_placeholder: String::new(),
            qualifier_placeholder: String::new(),
            newline_placeholder: String::new(),
            qualify: QualifyPolicy::OnlyIfNeeded,
            qualifier_mode: QualifierMode::DuplicateToEscape,
            allow_row_combining: false,
            try_to_solve_more_columns: false,
            fixed_width: false,
            warn_delimiter_in_value: true,
            warn_quotes: false,
            warn_quotes_in_quotes: true,
            warn_empty_tailing_columns: true,
            warn_line_feed: false,
            warn_nbsp: true,
            warn_unknown_character: true,
        }
    }
}

impl DialectConfig {
    /// Construction-time checks; engines call this before touching the stream.
    pub fn validate(&self) -> ConfigResult<()> {
        let is_break = |c: char| c == '\r' || c == '\n';

        if let Some(q) = self.field_qualifier {
            if is_break(q) {
                return Err(ConfigError::QualifierIsLineBreak);
            }
        }
        if !self.fixed_width {
            if is_break(self.field_delimiter) {
                return Err(ConfigError::DelimiterIsLineBreak);
            }
            if self.field_qualifier == Some(self.field_delimiter) {
                return Err(ConfigError::QualifierEqualsDelimiter(self.field_delimiter));
            }
        }
        if let Some(esc) = self.escape_prefix {
            let clash = is_break(esc)
                || (!self.fixed_width && esc == self.field_delimiter)
                || self.field_qualifier == Some(esc);
            if clash {
                return Err(ConfigError::EscapeConflict(esc));
            }
        }
        Ok(())
    }

    pub fn context_sensitive_qualifier(&self) -> bool {
        self.qualifier_mode == QualifierMode::ContextSensitive
    }

    pub fn duplicate_qualifier_to_escape(&self) -> bool {
        self.qualifier_mode == QualifierMode::DuplicateToEscape
    }

    /// Enabling turns duplicate-qualifier escaping off.
    pub fn set_context_sensitive_qualifier(&mut self, enabled: bool) {
        if enabled {
            self.qualifier_mode = QualifierMode::ContextSensitive;
        } else if self.qualifier_mode == QualifierMode::ContextSensitive {
            self.qualifier_mode = QualifierMode::Plain;
        }
    }

    /// Enabling turns the context sensitive qualifier off.
    pub fn set_duplicate_qualifier_to_escape(&mut self, enabled: bool) {
        if enabled {
            self.qualifier_mode = QualifierMode::DuplicateToEscape;
        } else if self.qualifier_mode == QualifierMode::DuplicateToEscape {
            self.qualifier_mode = QualifierMode::Plain;
        }
    }
}

/// Interpret a settings text as a single punctuation character.
///
/// Written names (`Tab`, `Semicolon`, ...) are recognised; other text longer
/// than one character only contributes its first character and raises a
/// warning.
pub fn parse_punctuation(text: &str, diagnostics: &mut Diagnostics) -> Option<char> {
    let trimmed = if text.chars().all(char::is_whitespace) {
        text
    } else {
        text.trim()
    };
    let named = match trimmed.to_lowercase().as_str() {
        "" | "none" => return None,
        "tab" | "tabulator" | "\\t" | "horizontal tab" => Some('\t'),
        "comma" => Some(','),
        "semicolon" => Some(';'),
        "colon" => Some(':'),
        "pipe" | "vertical bar" => Some('|'),
        "space" => Some(' '),
        "hash" | "number sign" => Some('#'),
        "quote" | "quotation marks" | "doublequote" => Some('"'),
        "apostrophe" | "singlequote" => Some('\''),
        "backslash" | "\\\\" => Some('\\'),
        "slash" => Some('/'),
        "recordseparator" | "rs" => Some('\u{1e}'),
        "unitseparator" | "us" => Some('\u{1f}'),
        _ => None,
    };
    if named.is_some() {
        return named;
    }
    let mut chars = trimmed.chars();
    let first = chars.next()?;
    if chars.next().is_some() {
        diagnostics.emit(Diagnostic::warning(
            WarningKind::ConfigurationTrimmed,
            format!("Only the first character of '{trimmed}' is used"),
        ));
    }
    Some(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(DialectConfig::default().validate().is_ok());
    }

    #[test]
    fn test_line_break_qualifier_rejected() {
        let dialect = DialectConfig {
            field_qualifier: Some('\n'),
            ..Default::default()
        };
        assert_eq!(dialect.validate(), Err(ConfigError::QualifierIsLineBreak));

        let dialect = DialectConfig {
            field_delimiter: '\r',
            ..Default::default()
        };
        assert_eq!(dialect.validate(), Err(ConfigError::DelimiterIsLineBreak));
    }

    #[test]
    fn test_equal_qualifier_and_delimiter_rejected() {
        let dialect = DialectConfig {
            field_delimiter: '"',
            ..Default::default()
        };
        assert_eq!(
            dialect.validate(),
            Err(ConfigError::QualifierEqualsDelimiter('"'))
        );
    }

    #[test]
    fn test_escape_conflict_rejected() {
        let dialect = DialectConfig {
            escape_prefix: Some(','),
            ..Default::default()
        };
        assert_eq!(dialect.validate(), Err(ConfigError::EscapeConflict(',')));
    }

    #[test]
    fn test_qualifier_flags_exclude_each_other() {
        let mut dialect = DialectConfig::default();
        assert!(dialect.duplicate_qualifier_to_escape());
        dialect.set_context_sensitive_qualifier(true);
        assert!(dialect.context_sensitive_qualifier());
        assert!(!dialect.duplicate_qualifier_to_escape());
        dialect.set_duplicate_qualifier_to_escape(true);
        assert!(!dialect.context_sensitive_qualifier());
        dialect.set_duplicate_qualifier_to_escape(false);
        assert_eq!(dialect.qualifier_mode, QualifierMode::Plain);
    }

    #[test]
    fn test_parse_punctuation() {
        let mut diagnostics = Diagnostics::new();
        assert_eq!(parse_punctuation("Tab", &mut diagnostics), Some('\t'));
        assert_eq!(parse_punctuation(";", &mut diagnostics), Some(';'));
        assert_eq!(parse_punctuation(" ", &mut diagnostics), Some(' '));
        assert_eq!(parse_punctuation("", &mut diagnostics), None);
        assert_eq!(diagnostics.report().warning_count(), 0);

        assert_eq!(parse_punctuation("||", &mut diagnostics), Some('|'));
        assert_eq!(diagnostics.report().warning_count(), 1);
    }
}
