//! Time zone conversion seam.

use chrono::{Duration, NaiveDateTime};

/// Converts a timestamp between two named time zones.
///
/// The reader and writer only talk to this trait; callers with a real time
/// zone database plug in their own implementation.
pub trait TimeZoneAdjust: Send + Sync {
    fn adjust(&self, value: NaiveDateTime, from: &str, to: &str) -> Result<NaiveDateTime, String>;
}

/// Handles `UTC`, `GMT`, `Z` and fixed offsets such as `+02:00`, `-0530`,
/// `UTC+1` or `GMT-03:30`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedOffsetAdjust;

impl FixedOffsetAdjust {
    /// Offset east of UTC in minutes.
    pub fn offset_minutes(zone: &str) -> Option<i32> {
        let zone = zone.trim();
        let upper = zone.to_ascii_uppercase();
        if matches!(upper.as_str(), "UTC" | "GMT" | "Z" | "UCT" | "ZULU") {
            return Some(0);
        }
        let rest = upper
            .strip_prefix("UTC")
            .or_else(|| upper.strip_prefix("GMT"))
            .unwrap_or(&upper)
            .trim();

        let (sign, digits) = match rest.chars().next()? {
            '+' => (1, &rest[1..]),
            '-' => (-1, &rest[1..]),
            _ => return None,
        };
        let number = |text: &str| -> Option<i32> {
            if text.is_empty() || text.len() > 2 || !text.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            text.parse().ok()
        };
        let (hours, minutes) = if let Some((h, m)) = digits.split_once(':') {
            (number(h)?, number(m)?)
        } else if digits.len() == 4 {
            (number(digits.get(..2)?)?, number(digits.get(2..)?)?)
        } else {
            (number(digits)?, 0)
        };
        if hours > 14 || minutes >= 60 || minutes < 0 {
            return None;
        }
        Some(sign * (hours * 60 + minutes))
    }
}

impl TimeZoneAdjust for FixedOffsetAdjust {
    fn adjust(&self, value: NaiveDateTime, from: &str, to: &str) -> Result<NaiveDateTime, String> {
        let from_offset =
            Self::offset_minutes(from).ok_or_else(|| format!("unknown time zone '{from}'"))?;
        let to_offset =
            Self::offset_minutes(to).ok_or_else(|| format!("unknown time zone '{to}'"))?;
        value
            .checked_add_signed(Duration::minutes(i64::from(to_offset - from_offset)))
            .ok_or_else(|| format!("'{value}' is out of range in time zone '{to}'"))
    }
}
