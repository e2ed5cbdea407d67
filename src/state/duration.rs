//! Duration fields and raw input normalization

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upper bound for the hours field
pub const MAX_HOURS: u8 = 99;
/// Upper bound for the minutes and seconds fields
pub const MAX_MINUTES: u8 = 59;
pub const MAX_SECONDS: u8 = 59;

/// A countdown length split into the three fields the user edits.
///
/// Every constructor clamps, so a `TimerDuration` always holds
/// hours in `0..=99` and minutes/seconds in `0..=59`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimerDuration {
    hours: u8,
    minutes: u8,
    seconds: u8,
}

impl TimerDuration {
    /// The empty duration
    pub const ZERO: Self = Self { hours: 0, minutes: 0, seconds: 0 };

    /// Build a duration from already-parsed field values, clamping each field
    /// independently to its bound. Negative values become 0.
    pub fn clamped(hours: i64, minutes: i64, seconds: i64) -> Self {
        Self {
            hours: clamp_field(hours, MAX_HOURS),
            minutes: clamp_field(minutes, MAX_MINUTES),
            seconds: clamp_field(seconds, MAX_SECONDS),
        }
    }

    /// Build a duration from the raw values of the three input fields
    pub fn from_raw(hours: &Value, minutes: &Value, seconds: &Value) -> Self {
        Self::clamped(parse_field(hours), parse_field(minutes), parse_field(seconds))
    }

    /// Split a total number of seconds back into fields.
    /// Totals beyond the largest representable duration saturate.
    pub fn from_total(total_seconds: u64) -> Self {
        let hours = total_seconds / 3600;
        if hours > u64::from(MAX_HOURS) {
            return Self::clamped(i64::from(MAX_HOURS), i64::from(MAX_MINUTES), i64::from(MAX_SECONDS));
        }
        Self {
            hours: hours as u8,
            minutes: ((total_seconds % 3600) / 60) as u8,
            seconds: (total_seconds % 60) as u8,
        }
    }

    pub fn hours(&self) -> u8 {
        self.hours
    }

    pub fn minutes(&self) -> u8 {
        self.minutes
    }

    pub fn seconds(&self) -> u8 {
        self.seconds
    }

    /// Total length in seconds
    pub fn total_seconds(&self) -> u64 {
        u64::from(self.hours) * 3600 + u64::from(self.minutes) * 60 + u64::from(self.seconds)
    }

    pub fn is_zero(&self) -> bool {
        self.total_seconds() == 0
    }

    /// Zero-padded two-digit rendering of each field: `["01", "30", "00"]`
    pub fn padded_fields(&self) -> [String; 3] {
        [
            format!("{:02}", self.hours),
            format!("{:02}", self.minutes),
            format!("{:02}", self.seconds),
        ]
    }
}

impl fmt::Display for TimerDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

fn clamp_field(value: i64, max: u8) -> u8 {
    value.clamp(0, i64::from(max)) as u8
}

/// Interpret a raw field value the way a browser number input reads back.
///
/// Numbers are truncated toward zero, strings are read as a leading integer
/// (`"12abc"` is 12), and anything else is 0.
pub fn parse_field(raw: &Value) -> i64 {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => parse_leading_int(s),
        _ => 0,
    }
}

/// Leading-integer parse: optional whitespace, optional sign, then digits.
/// Returns 0 when no digits follow. Saturates instead of overflowing.
pub fn parse_leading_int(input: &str) -> i64 {
    let trimmed = input.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d - b'0')));

    if negative { -value } else { value }
}
