//! Character state machine splitting a text stream into rows of raw fields.
//!
//! The tokenizer knows nothing about columns; warnings it detects are
//! attached to the row with the index of the field and reported by the
//! reader, which can name the column.

use std::collections::VecDeque;
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::diagnostics::WarningKind;
use crate::model::{DialectConfig, QualifierMode, RecordDelimiter, TrimmingOption};

const CHUNK_SIZE: usize = 64 * 1024;

// =============================================================================
// Character Stream
// =============================================================================

/// Incremental UTF-8 decoder over an async byte stream.
///
/// Invalid sequences become U+FFFD; a leading byte order mark is dropped.
pub struct CharStream<R> {
    inner: R,
    buffer: Vec<u8>,
    pending: Vec<u8>,
    chars: VecDeque<char>,
    eof: bool,
    started: bool,
}

impl<R: AsyncRead + Unpin> CharStream<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: vec![0; CHUNK_SIZE],
            pending: Vec::new(),
            chars: VecDeque::new(),
            eof: false,
            started: false,
        }
    }

    async fn fill(&mut self, wanted: usize) -> io::Result<()> {
        while self.chars.len() < wanted && !self.eof {
            let read = self.inner.read(&mut self.buffer).await?;
            if read == 0 {
                self.eof = true;
                if !self.pending.is_empty() {
                    // incomplete sequence at the end
                    self.pending.clear();
                    self.chars.push_back(char::REPLACEMENT_CHARACTER);
                }
            } else {
                self.pending.extend_from_slice(&self.buffer[..read]);
                self.decode();
            }
            if !self.started && !self.chars.is_empty() {
                self.started = true;
                if self.chars.front() == Some(&'\u{feff}') {
                    self.chars.pop_front();
                }
            }
        }
        Ok(())
    }

    fn decode(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.chars.extend(text.chars());
                    self.pending.clear();
                    return;
                }
                Err(error) => {
                    let valid = error.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.pending[..valid]) {
                        self.chars.extend(text.chars());
                    }
                    match error.error_len() {
                        Some(len) => {
                            self.chars.push_back(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                    }
                }
            }
        }
    }

    pub async fn next(&mut self) -> io::Result<Option<char>> {
        self.fill(1).await?;
        Ok(self.chars.pop_front())
    }

    pub async fn peek(&mut self) -> io::Result<Option<char>> {
        self.peek_at(0).await
    }

    pub async fn peek_at(&mut self, index: usize) -> io::Result<Option<char>> {
        self.fill(index + 1).await?;
        Ok(self.chars.get(index).copied())
    }

    pub async fn starts_with(&mut self, text: &str) -> io::Result<bool> {
        for (i, expected) in text.chars().enumerate() {
            if self.peek_at(i).await? != Some(expected) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

// =============================================================================
// Raw Rows
// =============================================================================

/// A problem found while splitting, `field` is the index inside the row.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWarning {
    pub kind: WarningKind,
    pub field: Option<usize>,
    pub message: String,
}

/// One record as found in the stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub fields: Vec<String>,
    pub start_line: u64,
    pub end_line: u64,
    pub warnings: Vec<RawWarning>,
    /// The physical line held nothing but whitespace.
    pub blank: bool,
}

#[derive(Default)]
struct Field {
    text: String,
    quoted: bool,
    in_quotes: bool,
    closed: bool,
    warned: Vec<WarningKind>,
}

impl Field {
    fn note(&mut self, row: &mut RawRow, kind: WarningKind, message: &str) {
        if !self.warned.contains(&kind) {
            self.warned.push(kind);
            row.warnings.push(RawWarning {
                kind,
                field: Some(row.fields.len()),
                message: message.to_string(),
            });
        }
    }
}

// =============================================================================
// Tokenizer
// =============================================================================

pub struct RowTokenizer<R> {
    chars: CharStream<R>,
    dialect: DialectConfig,
    line: u64,
}

impl<R: AsyncRead + Unpin> RowTokenizer<R> {
    pub fn new(reader: R, dialect: DialectConfig) -> Self {
        Self {
            chars: CharStream::new(reader),
            dialect,
            line: 1,
        }
    }

    /// Physical line the next character belongs to.
    pub fn line(&self) -> u64 {
        self.line
    }

    fn is_break(&self, c: char) -> bool {
        c == '\r' || c == '\n' || self.dialect.new_line.special_char() == Some(c)
    }

    /// Consume the second half of a two character line break.
    async fn take_break_pair(&mut self, first: char) -> io::Result<Option<char>> {
        let second = match first {
            '\r' => '\n',
            '\n' if self.dialect.new_line == RecordDelimiter::LfCr => '\r',
            _ => return Ok(None),
        };
        if self.chars.peek().await? == Some(second) {
            self.chars.next().await?;
            return Ok(Some(second));
        }
        Ok(None)
    }

    /// Skip one physical line; `false` at the end of the stream.
    pub async fn skip_line(&mut self) -> io::Result<bool> {
        if self.chars.peek().await?.is_none() {
            return Ok(false);
        }
        while let Some(c) = self.chars.next().await? {
            if self.is_break(c) {
                self.take_break_pair(c).await?;
                break;
            }
        }
        self.line += 1;
        Ok(true)
    }

    async fn at_comment(&mut self) -> io::Result<bool> {
        let prefix = &self.dialect.comment_line;
        if prefix.is_empty() {
            return Ok(false);
        }
        let prefix = prefix.clone();
        self.chars.starts_with(&prefix).await
    }

    /// Next physical line as a single untrimmed field, for fixed-width files.
    pub async fn next_line(&mut self) -> io::Result<Option<RawRow>> {
        loop {
            if self.chars.peek().await?.is_none() {
                return Ok(None);
            }
            if self.at_comment().await? {
                self.skip_line().await?;
                continue;
            }
            let mut row = RawRow {
                start_line: self.line,
                end_line: self.line,
                ..Default::default()
            };
            let mut field = Field::default();
            while let Some(c) = self.chars.next().await? {
                if self.is_break(c) {
                    self.take_break_pair(c).await?;
                    break;
                }
                self.push_char(&mut field, &mut row, c);
            }
            self.line += 1;
            row.blank = field.text.trim().is_empty();
            row.fields.push(field.text);
            return Ok(Some(row));
        }
    }

    /// Next record, `None` at the end of the stream. Comment lines are skipped.
    pub async fn next_row(&mut self) -> io::Result<Option<RawRow>> {
        loop {
            if self.chars.peek().await?.is_none() {
                return Ok(None);
            }
            if self.at_comment().await? {
                self.skip_line().await?;
                continue;
            }
            return self.read_delimited().await.map(Some);
        }
    }

    async fn read_delimited(&mut self) -> io::Result<RawRow> {
        let delimiter = self.dialect.field_delimiter;
        let qualifier = self.dialect.field_qualifier;
        let escape = self.dialect.escape_prefix;

        let mut row = RawRow {
            start_line: self.line,
            ..Default::default()
        };
        let mut field = Field::default();
        let mut line_ended = false;

        while let Some(c) = self.chars.next().await? {
            if field.in_quotes {
                if escape == Some(c) {
                    match self.chars.peek().await? {
                        Some(next) if Some(next) == qualifier || Some(next) == escape => {
                            self.chars.next().await?;
                            field.text.push(next);
                        }
                        _ => field.text.push(c),
                    }
                    continue;
                }
                if qualifier == Some(c) {
                    match self.dialect.qualifier_mode {
                        QualifierMode::DuplicateToEscape => {
                            if self.chars.peek().await? == Some(c) {
                                self.chars.next().await?;
                                field.text.push(c);
                            } else {
                                field.in_quotes = false;
                                field.closed = true;
                            }
                        }
                        QualifierMode::ContextSensitive => {
                            if self.closes_here().await? {
                                field.in_quotes = false;
                                field.closed = true;
                            } else {
                                field.text.push(c);
                                if self.dialect.warn_quotes_in_quotes {
                                    field.note(
                                        &mut row,
                                        WarningKind::QualifierInQualifiedValue,
                                        "Text qualifier found inside a qualified value",
                                    );
                                }
                            }
                        }
                        QualifierMode::Plain => {
                            field.in_quotes = false;
                            field.closed = true;
                        }
                    }
                    continue;
                }
                if c == '\r' || c == '\n' {
                    let second = self.take_break_pair(c).await?;
                    self.line += 1;
                    if self.dialect.treat_lf_as_space {
                        field.text.push(' ');
                    } else {
                        field.text.push(c);
                        field.text.extend(second);
                    }
                    if self.dialect.warn_line_feed {
                        field.note(&mut row, WarningKind::LineFeed, "Line feed in value");
                    }
                    continue;
                }
                self.push_char(&mut field, &mut row, c);
                continue;
            }

            if escape == Some(c) {
                match self.chars.next().await? {
                    Some(next) if next == '\r' || next == '\n' => {
                        let second = self.take_break_pair(next).await?;
                        self.line += 1;
                        field.text.push(next);
                        field.text.extend(second);
                    }
                    Some(next) => field.text.push(next),
                    None => field.text.push(c),
                }
                continue;
            }
            if c == delimiter {
                let done = std::mem::take(&mut field);
                let value = self.finish(done, &mut row);
                row.fields.push(value);
                continue;
            }
            if self.is_break(c) {
                self.take_break_pair(c).await?;
                row.end_line = self.line;
                self.line += 1;
                line_ended = true;
                break;
            }
            if qualifier == Some(c) {
                let only_space = field.text.is_empty()
                    || (self.dialect.trimming != TrimmingOption::None
                        && field.text.chars().all(char::is_whitespace));
                if !field.quoted && only_space {
                    field.text.clear();
                    field.quoted = true;
                    field.in_quotes = true;
                } else if field.closed {
                    field.text.push(c);
                    field.note(
                        &mut row,
                        WarningKind::TextAfterQualifier,
                        "Text found after the closing qualifier",
                    );
                } else {
                    field.text.push(c);
                    if self.dialect.warn_quotes {
                        field.note(
                            &mut row,
                            WarningKind::QualifierInValue,
                            "Text qualifier found in an unqualified value",
                        );
                    }
                }
                continue;
            }
            if field.closed {
                if c.is_whitespace() {
                    continue;
                }
                field.note(
                    &mut row,
                    WarningKind::TextAfterQualifier,
                    "Text found after the closing qualifier",
                );
            }
            self.push_char(&mut field, &mut row, c);
        }

        if !line_ended {
            row.end_line = self.line;
        }
        if field.in_quotes {
            field.note(
                &mut row,
                WarningKind::UnclosedQualifier,
                "Closing qualifier not found before the end of the file",
            );
        }
        row.blank = row.fields.is_empty() && !field.quoted && field.text.trim().is_empty();
        let value = self.finish(field, &mut row);
        row.fields.push(value);
        Ok(row)
    }

    /// Context sensitive mode: a qualifier only closes a field when nothing
    /// but whitespace separates it from the delimiter or the line end.
    async fn closes_here(&mut self) -> io::Result<bool> {
        let mut index = 0;
        loop {
            match self.chars.peek_at(index).await? {
                None => return Ok(true),
                Some(c) if c == self.dialect.field_delimiter || self.is_break(c) => return Ok(true),
                Some(' ') | Some('\t') => index += 1,
                Some(_) => return Ok(false),
            }
        }
    }

    fn push_char(&self, field: &mut Field, row: &mut RawRow, c: char) {
        match c {
            '\u{a0}' => {
                if self.dialect.warn_nbsp {
                    field.note(row, WarningKind::NonBreakingSpace, "Non-breaking space in value");
                }
                field
                    .text
                    .push(if self.dialect.treat_nbsp_as_space { ' ' } else { c });
            }
            char::REPLACEMENT_CHARACTER => {
                if self.dialect.warn_unknown_character {
                    field.note(
                        row,
                        WarningKind::UnknownCharacter,
                        "Unknown character in value",
                    );
                }
                field.text.push(if self.dialect.treat_unknown_character_as_space {
                    ' '
                } else {
                    c
                });
            }
            _ => field.text.push(c),
        }
    }

    fn finish(&self, mut field: Field, row: &mut RawRow) -> String {
        let trim = match self.dialect.trimming {
            TrimmingOption::None => false,
            TrimmingOption::Unquoted => !field.quoted,
            TrimmingOption::All => true,
        };
        let mut value = std::mem::take(&mut field.text);
        if trim {
            let trimmed = value.trim();
            if trimmed.len() != value.len() {
                value = trimmed.to_string();
            }
        }
        let null_text = &self.dialect.treat_text_as_null;
        if !field.quoted && !null_text.is_empty() && value.eq_ignore_ascii_case(null_text) {
            value.clear();
        }

        let dialect = &self.dialect;
        if !dialect.delimiter_placeholder.is_empty() {
            value = value.replace(
                &dialect.delimiter_placeholder,
                &dialect.field_delimiter.to_string(),
            );
        }
        if let Some(qualifier) = dialect.field_qualifier {
            if !dialect.qualifier_placeholder.is_empty() {
                value = value.replace(&dialect.qualifier_placeholder, &qualifier.to_string());
            }
        }
        if !dialect.newline_placeholder.is_empty() {
            value = value.replace(&dialect.newline_placeholder, "\n");
        }

        if dialect.warn_delimiter_in_value && value.contains(dialect.field_delimiter) {
            field.note(
                row,
                WarningKind::DelimiterInValue,
                "Field delimiter found in value",
            );
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn rows(input: &[u8], dialect: DialectConfig) -> Vec<RawRow> {
        let mut tokenizer = RowTokenizer::new(input, dialect);
        let mut rows = Vec::new();
        while let Some(row) = tokenizer.next_row().await.unwrap() {
            rows.push(row);
        }
        rows
    }

    fn fields(rows: &[RawRow]) -> Vec<Vec<&str>> {
        rows.iter()
            .map(|r| r.fields.iter().map(String::as_str).collect())
            .collect()
    }

    #[tokio::test]
    async fn test_qualified_field_with_delimiter() {
        let rows = rows(b"a,\"b,c\",d\n", DialectConfig::default()).await;
        assert_eq!(fields(&rows), vec![vec!["a", "b,c", "d"]]);
        assert_eq!(rows[0].warnings[0].kind, WarningKind::DelimiterInValue);
        assert_eq!(rows[0].warnings[0].field, Some(1));
    }

    #[tokio::test]
    async fn test_duplicate_qualifier_and_embedded_newline() {
        let rows = rows(
            b"\"He said \"\"hi\"\"\",x\r\n\"two\r\nlines\",y\r\nlast,z",
            DialectConfig::default(),
        )
        .await;
        assert_eq!(
            fields(&rows),
            vec![
                vec!["He said \"hi\"", "x"],
                vec!["two\r\nlines", "y"],
                vec!["last", "z"]
            ]
        );
        assert_eq!((rows[1].start_line, rows[1].end_line), (2, 3));
        assert_eq!((rows[2].start_line, rows[2].end_line), (4, 4));
    }

    #[tokio::test]
    async fn test_unclosed_qualifier_at_end_of_file() {
        let rows = rows(b"a,b\r\nc,\"open\r\nrest,of\r\nfile", DialectConfig::default()).await;
        assert_eq!(
            fields(&rows),
            vec![vec!["a", "b"], vec!["c", "open\r\nrest,of\r\nfile"]]
        );
        assert!(rows[0].warnings.is_empty());
        let unclosed: Vec<_> = rows[1]
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::UnclosedQualifier)
            .collect();
        assert_eq!(unclosed.len(), 1);
        assert_eq!(unclosed[0].field, Some(1));
    }

    #[tokio::test]
    async fn test_escape_prefix() {
        let dialect = DialectConfig {
            escape_prefix: Some('\\'),
            qualifier_mode: QualifierMode::Plain,
            ..Default::default()
        };
        let rows = rows(b"a\\,b,\"q\\\"x\"\n", dialect).await;
        assert_eq!(fields(&rows), vec![vec!["a,b", "q\"x"]]);
    }

    #[tokio::test]
    async fn test_context_sensitive_qualifier() {
        let mut dialect = DialectConfig::default();
        dialect.set_context_sensitive_qualifier(true);
        let rows = rows(b"\"a \"quoted\" word\",b\nx\"y,z\n", dialect).await;
        assert_eq!(
            fields(&rows),
            vec![vec!["a \"quoted\" word", "b"], vec!["x\"y", "z"]]
        );
        assert!(rows[0]
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::QualifierInQualifiedValue));
    }

    #[tokio::test]
    async fn test_comments_and_blank_lines() {
        let dialect = DialectConfig {
            comment_line: "#".into(),
            ..Default::default()
        };
        let rows = rows(b"# header comment\na,b\n\n  \n#x\nc,d", dialect).await;
        assert_eq!(
            fields(&rows),
            vec![vec!["a", "b"], vec![""], vec![""], vec!["c", "d"]]
        );
        assert!(rows[1].blank && rows[2].blank);
        assert!(!rows[0].blank);
        assert_eq!(rows[3].start_line, 6);
    }

    #[tokio::test]
    async fn test_placeholders_and_null_text() {
        let dialect = DialectConfig {
            delimiter_placeholder: "{d}".into(),
            newline_placeholder: "{n}".into(),
            ..Default::default()
        };
        let rows = rows(b"a{d}b,NULL,x{n}y,\"NULL\"\n", dialect).await;
        assert_eq!(fields(&rows), vec![vec!["a,b", "", "x\ny", "NULL"]]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_and_bom() {
        let rows = rows(b"\xEF\xBB\xBFa\xFFb,c\n", DialectConfig::default()).await;
        assert_eq!(fields(&rows), vec![vec!["a\u{fffd}b", "c"]]);
        assert_eq!(rows[0].warnings[0].kind, WarningKind::UnknownCharacter);
    }

    #[test]
    fn test_utf8_split_across_reads() {
        let mut stream = CharStream::new(&b""[..]);
        for byte in "é,ü".as_bytes() {
            stream.pending.push(*byte);
            stream.decode();
        }
        assert_eq!(stream.chars.iter().collect::<String>(), "é,ü");
        assert!(stream.pending.is_empty());
    }

    #[tokio::test]
    async fn test_nbsp_and_trimming() {
        let dialect = DialectConfig {
            treat_nbsp_as_space: true,
            trimming: TrimmingOption::All,
            ..Default::default()
        };
        let rows = rows(" a\u{a0}b , \" q \" \n".as_bytes(), dialect).await;
        assert_eq!(fields(&rows), vec![vec!["a b", "q"]]);
        assert_eq!(rows[0].warnings[0].kind, WarningKind::NonBreakingSpace);
    }

    #[tokio::test]
    async fn test_skip_and_fixed_lines() {
        let mut tokenizer = RowTokenizer::new(&b"junk\r\nAB  12\r\n"[..], DialectConfig::default());
        assert!(tokenizer.skip_line().await.unwrap());
        let row = tokenizer.next_line().await.unwrap().unwrap();
        assert_eq!(row.fields, vec!["AB  12"]);
        assert_eq!(row.start_line, 2);
        assert!(tokenizer.next_line().await.unwrap().is_none());
        assert!(!tokenizer.skip_line().await.unwrap());
    }
}
