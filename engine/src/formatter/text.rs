//! Text part extraction and C-style escaping.

/// Select the 1-based `part` of `text` split on `splitter`; with `to_end`
/// the remaining parts are kept, joined by the splitter.
pub fn text_part(text: &str, splitter: char, part: usize, to_end: bool) -> String {
    if part == 0 {
        return String::new();
    }
    let mut pieces = text.split(splitter).skip(part - 1);
    if to_end {
        let rest: Vec<&str> = pieces.collect();
        rest.join(&splitter.to_string())
    } else {
        pieces.next().unwrap_or_default().to_string()
    }
}

/// Resolve `\n \r \t \\ \" \' \0 \a \b \f \v \xHH \uHHHH`; unknown escapes
/// stay as they are.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(&next) = chars.peek() else {
            out.push('\\');
            break;
        };
        let simple = match next {
            'n' => Some('\n'),
            'r' => Some('\r'),
            't' => Some('\t'),
            '\\' => Some('\\'),
            '"' => Some('"'),
            '\'' => Some('\''),
            '0' => Some('\0'),
            'a' => Some('\u{7}'),
            'b' => Some('\u{8}'),
            'f' => Some('\u{c}'),
            'v' => Some('\u{b}'),
            _ => None,
        };
        if let Some(resolved) = simple {
            chars.next();
            out.push(resolved);
            continue;
        }

        let digits = match next {
            'x' => 2,
            'u' => 4,
            _ => 0,
        };
        let hex: String = chars.clone().skip(1).take(digits).collect();
        let code = (digits > 0 && hex.len() == digits)
            .then(|| u32::from_str_radix(&hex, 16).ok())
            .flatten()
            .and_then(char::from_u32);
        match code {
            Some(resolved) => {
                for _ in 0..=digits {
                    chars.next();
                }
                out.push(resolved);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Inverse of [`unescape`] for control characters and backslashes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out
}
