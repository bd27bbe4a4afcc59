//! Property value readers (RFC 5545 §3.3).
//!
//! The `icalendar` parser hands out raw value strings. Value errors are not
//! fatal to a document: callers decide whether a bad value drops the
//! property or the whole event, so these return `Option`.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Parses a DATE value: `YYYYMMDD`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = s[0..4].parse().ok()?;
    let month = s[4..6].parse().ok()?;
    let day = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parses a DATE-TIME value: `YYYYMMDDTHHMMSS[Z]`.
///
/// Returns the wall-clock time and whether it carried the UTC designator.
pub fn parse_date_time(s: &str) -> Option<(NaiveDateTime, bool)> {
    let s = s.trim();
    let (body, is_utc) = match s.strip_suffix(['Z', 'z']) {
        Some(stripped) => (stripped, true),
        None => (s, false),
    };

    let (date, time) = body.split_once(['T', 't'])?;
    let date = parse_date(date)?;
    let time = parse_time(time)?;
    Some((date.and_time(time), is_utc))
}

/// Parses `HHMMSS`. A leap second (`60`) is folded onto `59`.
fn parse_time(s: &str) -> Option<NaiveTime> {
    if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour = s[0..2].parse().ok()?;
    let minute = s[2..4].parse().ok()?;
    let second: u32 = s[4..6].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, second.min(59))
}

/// Parses a DURATION value: `[+-]P[n]W` or `[+-]P[n]D[T[n]H[n]M[n]S]`.
///
/// A value too large for [`Duration`] is rejected like a malformed one.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (negative, rest) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    let rest = rest.strip_prefix(['P', 'p'])?;
    if rest.is_empty() {
        return None;
    }

    let mut total = Duration::zero();
    let mut number = String::new();
    let mut in_time = false;
    let mut seen_component = false;

    for c in rest.chars() {
        match c.to_ascii_uppercase() {
            '0'..='9' => number.push(c),
            'T' if !in_time && number.is_empty() => in_time = true,
            unit => {
                let n: i64 = number.parse().ok()?;
                number.clear();
                let part = match (unit, in_time) {
                    ('W', false) => Duration::try_weeks(n),
                    ('D', false) => Duration::try_days(n),
                    ('H', true) => Duration::try_hours(n),
                    ('M', true) => Duration::try_minutes(n),
                    ('S', true) => Duration::try_seconds(n),
                    _ => return None,
                }?;
                total = total.checked_add(&part)?;
                seen_component = true;
            }
        }
    }

    if !number.is_empty() || !seen_component {
        return None;
    }
    Some(if negative { -total } else { total })
}

/// Unescapes a TEXT value (RFC 5545 §3.3.11).
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}
