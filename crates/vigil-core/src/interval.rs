//! Duration strings for probe intervals.
//!
//! Intervals are written as a sequence of `<number><unit>` pairs, e.g.
//! `"30s"`, `"1h30m10s"` or `"1.5h"`. Supported units are `ns`, `us`
//! (or `µs`), `ms`, `s`, `m` and `h`. Signs are rejected and the total
//! must be strictly positive and at most [`MAX_INTERVAL`].

use crate::error::{Result, VigilError};
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Longest accepted interval, `i64::MAX` nanoseconds (about 292 years)
pub const MAX_INTERVAL: Duration = Duration::new(9_223_372_036, 854_775_807);

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3_600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Parse an interval string into a strictly positive [`Duration`]
pub fn parse_interval(s: &str) -> Result<Duration> {
    let input = s.trim();
    if input.is_empty() {
        return Err(VigilError::invalid_interval(s, "interval is empty"));
    }
    if input.starts_with('-') || input.starts_with('+') {
        return Err(VigilError::invalid_interval(s, "signed intervals are not allowed"));
    }

    let mut total: u128 = 0;
    let mut rest = input;

    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return Err(VigilError::invalid_interval(s, "expected a number"));
        }
        let (number, tail) = rest.split_at(num_len);

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        if unit_len == 0 {
            return Err(VigilError::invalid_interval(
                s,
                format!("missing unit after '{}'", number),
            ));
        }
        let (unit, tail) = tail.split_at(unit_len);

        let scale = unit_nanos(unit)
            .ok_or_else(|| VigilError::invalid_interval(s, format!("unknown unit '{}'", unit)))?;

        total = total
            .checked_add(component_nanos(s, number, scale)?)
            .ok_or_else(|| VigilError::invalid_interval(s, "interval overflows"))?;
        rest = tail;
    }

    if total == 0 {
        return Err(VigilError::invalid_interval(s, "interval must be positive"));
    }

    if total > MAX_INTERVAL.as_nanos() {
        return Err(VigilError::invalid_interval(s, "interval overflows"));
    }

    let secs = u64::try_from(total / NANOS_PER_SEC)
        .map_err(|_| VigilError::invalid_interval(s, "interval overflows"))?;
    Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}

/// Nanoseconds contributed by one `<number><unit>` pair
fn component_nanos(input: &str, number: &str, scale: u128) -> Result<u128> {
    let (whole, frac) = number.split_once('.').unwrap_or((number, ""));

    if whole.is_empty() && frac.is_empty() {
        return Err(VigilError::invalid_interval(input, "expected a number"));
    }
    if frac.contains('.') {
        return Err(VigilError::invalid_interval(
            input,
            format!("malformed number '{}'", number),
        ));
    }

    let whole_value: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| {
            VigilError::invalid_interval(input, format!("malformed number '{}'", number))
        })?
    };

    let mut nanos = whole_value
        .checked_mul(scale)
        .ok_or_else(|| VigilError::invalid_interval(input, "interval overflows"))?;

    // Digits beyond nanosecond precision are dropped
    let mut place = scale;
    for digit in frac.bytes() {
        place /= 10;
        if place == 0 {
            break;
        }
        nanos = nanos
            .checked_add(u128::from(digit - b'0') * place)
            .ok_or_else(|| VigilError::invalid_interval(input, "interval overflows"))?;
    }

    Ok(nanos)
}

/// Render a duration in the same notation accepted by [`parse_interval`]
pub fn format_interval(d: Duration) -> String {
    if d.is_zero() {
        return "0s".to_string();
    }

    let secs = d.as_secs();
    let nanos = d.subsec_nanos();

    if secs == 0 {
        return if nanos % 1_000_000 == 0 {
            format!("{}ms", nanos / 1_000_000)
        } else if nanos % 1_000 == 0 {
            format!("{}us", nanos / 1_000)
        } else {
            format!("{}ns", nanos)
        };
    }

    let mut out = String::new();
    let hours = secs / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    if seconds > 0 || nanos > 0 {
        if nanos > 0 {
            let frac = format!("{:09}", nanos);
            out.push_str(&format!("{}.{}s", seconds, frac.trim_end_matches('0')));
        } else {
            out.push_str(&format!("{}s", seconds));
        }
    }

    out
}
