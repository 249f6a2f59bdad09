//! Duration strings: `"100ms"`, `"1.5s"`, `"2m"`, `"1h"`, `"1d"`; bare numbers are ms.

use serde_json::Value;

pub const DEFAULT_HZ: u64 = 30;

fn unit_factor(unit: &str) -> Option<f64> {
    Some(match unit {
        "" | "ms" | "msec" | "msecs" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => 1_000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000.0,
        "d" | "day" | "days" => 86_400_000.0,
        _ => return None,
    })
}

fn parse_ms_f64(input: &str) -> Option<f64> {
    let text = input.trim().to_ascii_lowercase();
    let split = text.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    if number.is_empty() {
        return None;
    }
    let value: f64 = number.parse().ok()?;
    let ms = value * unit_factor(unit.trim())?;
    (ms.is_finite() && ms >= 0.0).then_some(ms)
}

/// Parses a duration string to whole milliseconds (fractions truncate).
///
/// Returns `None` for negative, empty or non-numeric input and unknown units.
#[must_use]
pub fn parse_ms(input: &str) -> Option<u64> {
    parse_ms_f64(input).map(|ms| ms.trunc() as u64)
}

/// Parses a duration string to seconds.
#[must_use]
pub fn parse_secs(input: &str) -> Option<f64> {
    parse_ms_f64(input).map(|ms| ms / 1_000.0)
}

/// Duration in ms from a YAML scalar (number or string).
#[must_use]
pub fn value_to_ms(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                Some(v)
            } else {
                n.as_f64().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v.trunc() as u64)
            }
        },
        Value::String(s) => parse_ms(s),
        _ => None,
    }
}

/// Duration in seconds from a YAML scalar.
///
/// Bare numbers are seconds here, unlike [`value_to_ms`]; strings follow [`parse_secs`]
/// with one exception: a unitless string is also read as seconds.
#[must_use]
pub fn value_to_secs(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite() && *v >= 0.0),
        Value::String(s) => {
            let trimmed = s.trim();
            if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit() || c == '.') {
                trimmed.parse::<f64>().ok()
            } else {
                parse_secs(trimmed)
            }
        },
        _ => None,
    }
}

/// Converts milliseconds to ticks at `hz`, rounding down.
#[must_use]
pub const fn ms_to_ticks(ms: u64, hz: u64) -> u64 {
    ms.saturating_mul(hz) / 1_000
}

/// Length of one tick in ms, at least 1.
#[must_use]
pub const fn tick_ms(hz: u64) -> u64 {
    if hz == 0 || hz > 1_000 { 1 } else { 1_000 / hz }
}
