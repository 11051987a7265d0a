//! Date/time patterns in the .NET custom format notation.
//!
//! Supported tokens: `yyyy yy y`, `MMMM MMM MM M`, `dddd ddd dd d`,
//! `HH H hh h mm m ss s`, `f..fffffff F..FFFFFFF`, `tt t`, `zzz zz z K`,
//! `/` (date separator), `:` (time separator), quoted literals and
//! `\`-escaped characters. Names are English.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Digits written: 1 (`y`, no padding), 2 or 4.
    Year(u8),
    Month(u8),
    MonthAbbr,
    MonthName,
    Day(u8),
    DayAbbr,
    DayName,
    Hour24(u8),
    Hour12(u8),
    Minute(u8),
    Second(u8),
    Fraction { digits: u8, optional: bool },
    AmPm { full: bool },
    /// 1 = `z`, 2 = `zz`, 3 = `zzz`, 0 = `K`
    Offset(u8),
    DateSeparator,
    TimeSeparator,
    Literal(String),
}

/// A tokenised date/time pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTimePattern {
    tokens: Vec<Token>,
}

impl DateTimePattern {
    pub fn parse(pattern: &str) -> Self {
        let chars: Vec<char> = pattern.chars().collect();
        let mut tokens: Vec<Token> = Vec::new();
        let mut i = 0;

        let push_literal = |tokens: &mut Vec<Token>, c: char| {
            if let Some(Token::Literal(text)) = tokens.last_mut() {
                text.push(c);
            } else {
                tokens.push(Token::Literal(c.to_string()));
            }
        };

        while i < chars.len() {
            let c = chars[i];
            let mut run = 1;
            while i + run < chars.len() && chars[i + run] == c {
                run += 1;
            }
            let width = |max: usize| run.min(max) as u8;
            let token = match c {
                'y' => Some(Token::Year(match run {
                    1 => 1,
                    2 => 2,
                    _ => 4,
                })),
                'M' => Some(match run {
                    1 | 2 => Token::Month(width(2)),
                    3 => Token::MonthAbbr,
                    _ => Token::MonthName,
                }),
                'd' => Some(match run {
                    1 | 2 => Token::Day(width(2)),
                    3 => Token::DayAbbr,
                    _ => Token::DayName,
                }),
                'H' => Some(Token::Hour24(width(2))),
                'h' => Some(Token::Hour12(width(2))),
                'm' => Some(Token::Minute(width(2))),
                's' => Some(Token::Second(width(2))),
                'f' | 'F' => Some(Token::Fraction {
                    digits: width(7),
                    optional: c == 'F',
                }),
                't' => Some(Token::AmPm { full: run > 1 }),
                'z' => Some(Token::Offset(width(3))),
                'K' => Some(Token::Offset(0)),
                _ => None,
            };
            if let Some(token) = token {
                tokens.push(token);
                i += run;
                continue;
            }

            match c {
                '/' => tokens.push(Token::DateSeparator),
                ':' => tokens.push(Token::TimeSeparator),
                '\'' | '"' => {
                    i += 1;
                    while i < chars.len() && chars[i] != c {
                        push_literal(&mut tokens, chars[i]);
                        i += 1;
                    }
                }
                '\\' => {
                    i += 1;
                    if i < chars.len() {
                        push_literal(&mut tokens, chars[i]);
                    }
                }
                other => push_literal(&mut tokens, other),
            }
            i += 1;
        }
        Self { tokens }
    }

    /// `true` if the pattern writes any time of day component.
    pub fn has_time(&self) -> bool {
        self.tokens.iter().any(|t| {
            matches!(
                t,
                Token::Hour24(_)
                    | Token::Hour12(_)
                    | Token::Minute(_)
                    | Token::Second(_)
                    | Token::Fraction { .. }
            )
        })
    }

    /// `true` if the pattern writes any date component.
    pub fn has_date(&self) -> bool {
        self.tokens.iter().any(|t| {
            matches!(
                t,
                Token::Year(_) | Token::Month(_) | Token::MonthAbbr | Token::MonthName | Token::Day(_)
            )
        })
    }

    pub fn format(&self, value: &NaiveDateTime, date_sep: &str, time_sep: &str) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Year(1) => out.push_str(&(value.year() % 100).to_string()),
                Token::Year(2) => out.push_str(&format!("{:02}", value.year().rem_euclid(100))),
                Token::Year(_) => out.push_str(&format!("{:04}", value.year())),
                Token::Month(w) => pad(&mut out, value.month(), *w),
                Token::MonthAbbr => out.push_str(&MONTH_NAMES[value.month0() as usize][..3]),
                Token::MonthName => out.push_str(MONTH_NAMES[value.month0() as usize]),
                Token::Day(w) => pad(&mut out, value.day(), *w),
                Token::DayAbbr => out.push_str(
                    &DAY_NAMES[value.weekday().num_days_from_monday() as usize][..3],
                ),
                Token::DayName => {
                    out.push_str(DAY_NAMES[value.weekday().num_days_from_monday() as usize])
                }
                Token::Hour24(w) => pad(&mut out, value.hour(), *w),
                Token::Hour12(w) => {
                    let h = value.hour() % 12;
                    pad(&mut out, if h == 0 { 12 } else { h }, *w)
                }
                Token::Minute(w) => pad(&mut out, value.minute(), *w),
                Token::Second(w) => pad(&mut out, value.second(), *w),
                Token::Fraction { digits, optional } => {
                    let nanos = value.nanosecond() % 1_000_000_000;
                    let scaled = nanos / 10u32.pow(9 - u32::from(*digits));
                    let mut text = format!("{:0width$}", scaled, width = usize::from(*digits));
                    if *optional {
                        while text.ends_with('0') {
                            text.pop();
                        }
                        if text.is_empty() && out.ends_with('.') {
                            out.pop();
                        }
                    }
                    out.push_str(&text);
                }
                Token::AmPm { full } => {
                    let text = if value.hour() < 12 { "AM" } else { "PM" };
                    out.push_str(if *full { text } else { &text[..1] });
                }
                Token::Offset(1) => out.push_str("+0"),
                Token::Offset(2) => out.push_str("+00"),
                Token::Offset(3) => out.push_str("+00:00"),
                Token::Offset(_) => {}
                Token::DateSeparator => out.push_str(date_sep),
                Token::TimeSeparator => out.push_str(time_sep),
                Token::Literal(text) => out.push_str(text),
            }
        }
        out
    }

    /// Parse a text; missing date parts default to 0001-01-01, a parsed
    /// offset normalises the result to UTC.
    pub fn parse_value(
        &self,
        text: &str,
        date_sep: &str,
        time_sep: &str,
    ) -> Result<NaiveDateTime, String> {
        let mut cursor = Cursor::new(text.trim());
        let mut parts = Parts::default();

        let mut index = 0;
        while index < self.tokens.len() {
            let token = &self.tokens[index];
            match token {
                Token::Year(w) => {
                    let (value, len) = cursor.number(if *w == 4 { 4 } else { 2 })?;
                    parts.year = Some(if *w == 4 && len > 2 {
                        value as i32
                    } else if value < 50 {
                        2000 + value as i32
                    } else if value < 100 {
                        1900 + value as i32
                    } else {
                        value as i32
                    });
                }
                Token::Month(_) => parts.month = Some(cursor.number(2)?.0),
                Token::MonthAbbr | Token::MonthName => {
                    parts.month = Some(cursor.month_name()?);
                }
                Token::Day(_) => parts.day = Some(cursor.number(2)?.0),
                Token::DayAbbr | Token::DayName => cursor.day_name()?,
                Token::Hour24(_) => parts.hour = cursor.number(2)?.0,
                Token::Hour12(_) => {
                    parts.hour = cursor.number(2)?.0;
                    parts.twelve_hour = true;
                }
                Token::Minute(_) => parts.minute = cursor.number(2)?.0,
                Token::Second(_) => parts.second = cursor.number(2)?.0,
                Token::Fraction { digits, optional } => {
                    let (value, len) = if *optional {
                        cursor.optional_number(usize::from(*digits))
                    } else {
                        cursor.number(usize::from(*digits))?
                    };
                    if len > 0 {
                        parts.nanos = value * 10u32.pow(9 - len as u32);
                    }
                }
                Token::AmPm { .. } => parts.pm = Some(cursor.am_pm()?),
                Token::Offset(_) => parts.offset_minutes = cursor.offset()?,
                Token::DateSeparator => cursor.separator(date_sep)?,
                Token::TimeSeparator => cursor.separator(time_sep)?,
                Token::Literal(lit) => {
                    if !cursor.literal(lit) {
                        // "ss.FFF" accepts a value without the fraction
                        let skip_fraction = matches!(
                            self.tokens.get(index + 1),
                            Some(Token::Fraction { optional: true, .. })
                        );
                        if skip_fraction {
                            index += 2;
                            continue;
                        }
                        return Err(format!("expected '{}' at position {}", lit, cursor.pos + 1));
                    }
                }
            }
            index += 1;
        }
        if !cursor.at_end() {
            return Err(format!("unexpected text '{}'", cursor.rest()));
        }
        parts.build()
    }

    /// Parse a time of day.
    pub fn parse_time(&self, text: &str, date_sep: &str, time_sep: &str) -> Result<NaiveTime, String> {
        self.parse_value(text, date_sep, time_sep).map(|dt| dt.time())
    }

    /// Length information for fixed-width sizing.
    pub fn information(&self, date_sep: &str, time_sep: &str) -> DateTimeFormatInformation {
        let name_range = |names: &[&str]| {
            let lens = names.iter().map(|n| n.chars().count());
            (lens.clone().min().unwrap_or(0), lens.max().unwrap_or(0))
        };
        let mut min = 0;
        let mut max = 0;
        for token in &self.tokens {
            let (lo, hi) = match token {
                Token::Year(1) => (1, 2),
                Token::Year(2) => (2, 2),
                Token::Year(_) => (4, 4),
                Token::Month(1) | Token::Day(1) => (1, 2),
                Token::Hour24(1) | Token::Hour12(1) | Token::Minute(1) | Token::Second(1) => (1, 2),
                Token::Month(_) | Token::Day(_) => (2, 2),
                Token::Hour24(_) | Token::Hour12(_) | Token::Minute(_) | Token::Second(_) => (2, 2),
                Token::MonthAbbr | Token::DayAbbr => (3, 3),
                Token::MonthName => name_range(&MONTH_NAMES),
                Token::DayName => name_range(&DAY_NAMES),
                Token::Fraction { digits, optional } => {
                    let d = usize::from(*digits);
                    (if *optional { 0 } else { d }, d)
                }
                Token::AmPm { full } => {
                    let n = if *full { 2 } else { 1 };
                    (n, n)
                }
                Token::Offset(1) => (2, 3),
                Token::Offset(2) => (3, 3),
                Token::Offset(3) => (6, 6),
                Token::Offset(_) => (0, 6),
                Token::DateSeparator => {
                    let n = date_sep.chars().count();
                    (n, n)
                }
                Token::TimeSeparator => {
                    let n = time_sep.chars().count();
                    (n, n)
                }
                Token::Literal(text) => {
                    let n = text.chars().count();
                    (n, n)
                }
            };
            min += lo;
            max += hi;
        }
        DateTimeFormatInformation {
            min_length: min,
            max_length: max,
        }
    }
}

/// The shortest and longest text a date/time pattern can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeFormatInformation {
    pub min_length: usize,
    pub max_length: usize,
}

impl DateTimeFormatInformation {
    pub fn new(pattern: &str, date_sep: &str, time_sep: &str) -> Self {
        DateTimePattern::parse(pattern).information(date_sep, time_sep)
    }

    /// `true` if a text of this length could have been produced.
    pub fn accepts_length(&self, length: usize) -> bool {
        (self.min_length..=self.max_length).contains(&length)
    }
}

fn pad(out: &mut String, value: u32, width: u8) {
    if width >= 2 {
        out.push_str(&format!("{:02}", value));
    } else {
        out.push_str(&value.to_string());
    }
}

#[derive(Default)]
struct Parts {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
    hour: u32,
    minute: u32,
    second: u32,
    nanos: u32,
    twelve_hour: bool,
    pm: Option<bool>,
    offset_minutes: Option<i32>,
}

impl Parts {
    fn build(self) -> Result<NaiveDateTime, String> {
        let year = self.year.unwrap_or(1);
        let month = self.month.unwrap_or(1);
        let day = self.day.unwrap_or(1);
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| format!("{year:04}-{month:02}-{day:02} is not a valid date"))?;

        let mut hour = self.hour;
        if self.twelve_hour || self.pm.is_some() {
            if hour > 12 && self.twelve_hour {
                return Err(format!("hour {hour} is out of range"));
            }
            hour %= 12;
            if self.pm == Some(true) {
                hour += 12;
            }
        }
        let time = NaiveTime::from_hms_nano_opt(hour, self.minute, self.second, self.nanos)
            .ok_or_else(|| format!("{}:{}:{} is not a valid time", hour, self.minute, self.second))?;

        let value = NaiveDateTime::new(date, time);
        Ok(match self.offset_minutes {
            Some(offset) => value - Duration::minutes(i64::from(offset)),
            None => value,
        })
    }
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn rest(&self) -> String {
        self.chars[self.pos..].iter().collect()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn optional_number(&mut self, max: usize) -> (u32, usize) {
        let mut value = 0u32;
        let mut len = 0;
        while len < max {
            match self.peek().and_then(|c| c.to_digit(10)) {
                Some(d) => {
                    value = value * 10 + d;
                    self.pos += 1;
                    len += 1;
                }
                None => break,
            }
        }
        (value, len)
    }

    fn number(&mut self, max: usize) -> Result<(u32, usize), String> {
        let (value, len) = self.optional_number(max);
        if len == 0 {
            return Err(format!("expected a number at position {}", self.pos + 1));
        }
        Ok((value, len))
    }

    fn starts_with_ignore_case(&self, text: &str) -> bool {
        let mut pos = self.pos;
        for expected in text.chars() {
            match self.chars.get(pos) {
                Some(c) if c.to_lowercase().eq(expected.to_lowercase()) => pos += 1,
                _ => return false,
            }
        }
        true
    }

    fn month_name(&mut self) -> Result<u32, String> {
        for (i, name) in MONTH_NAMES.iter().enumerate() {
            for candidate in [*name, &name[..3]] {
                if self.starts_with_ignore_case(candidate) {
                    self.pos += candidate.chars().count();
                    return Ok(i as u32 + 1);
                }
            }
        }
        Err(format!("expected a month name at position {}", self.pos + 1))
    }

    fn day_name(&mut self) -> Result<(), String> {
        for name in DAY_NAMES {
            for candidate in [name, &name[..3]] {
                if self.starts_with_ignore_case(candidate) {
                    self.pos += candidate.chars().count();
                    return Ok(());
                }
            }
        }
        Err(format!("expected a day name at position {}", self.pos + 1))
    }

    fn am_pm(&mut self) -> Result<bool, String> {
        for (text, pm) in [("AM", false), ("PM", true), ("A", false), ("P", true)] {
            if self.starts_with_ignore_case(text) {
                self.pos += text.len();
                return Ok(pm);
            }
        }
        Err(format!("expected AM or PM at position {}", self.pos + 1))
    }

    fn offset(&mut self) -> Result<Option<i32>, String> {
        match self.peek() {
            Some('Z') | Some('z') => {
                self.pos += 1;
                Ok(Some(0))
            }
            Some(sign @ ('+' | '-')) => {
                self.pos += 1;
                let (hours, _) = self.number(2)?;
                let mut minutes = 0;
                if self.peek() == Some(':') {
                    self.pos += 1;
                    minutes = self.number(2)?.0;
                } else if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    minutes = self.number(2)?.0;
                }
                let total = (hours * 60 + minutes) as i32;
                Ok(Some(if sign == '-' { -total } else { total }))
            }
            _ => Ok(None),
        }
    }

    fn separator(&mut self, sep: &str) -> Result<(), String> {
        if self.literal(sep) {
            Ok(())
        } else {
            Err(format!("expected '{}' at position {}", sep, self.pos + 1))
        }
    }

    /// Whitespace literals accept any run of whitespace.
    fn literal(&mut self, text: &str) -> bool {
        if !text.is_empty() && text.chars().all(char::is_whitespace) {
            let start = self.pos;
            while self.peek().is_some_and(char::is_whitespace) {
                self.pos += 1;
            }
            return self.pos > start;
        }
        if self.starts_with_ignore_case(text) {
            self.pos += text.chars().count();
            true
        } else {
            false
        }
    }
}
