//! Time types for calendar occurrences.
//!
//! This module provides [`LocalZone`], the caller's local timezone used for
//! wall-clock interpretation and day bucketing, and [`TimeWindow`], an
//! inclusive range of instants used for expansion bounds and date queries.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Duration, Local, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Interprets a naive wall-clock time in `zone` and returns the absolute instant.
///
/// - An ambiguous time (clocks falling back) resolves to the earliest instant.
/// - A time inside a gap (clocks springing forward) is shifted forward by the
///   gap length, so 01:30 in a 01:00 to 02:00 gap resolves as 02:30.
pub fn resolve_wall_clock<Z: TimeZone>(zone: &Z, naive: NaiveDateTime) -> DateTime<Utc> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let offset = offset_before_gap(zone, naive);
            Utc.from_utc_datetime(&(naive - Duration::seconds(i64::from(offset))))
        }
    }
}

/// Finds the UTC offset (in seconds) that was in effect just before a gap.
fn offset_before_gap<Z: TimeZone>(zone: &Z, naive: NaiveDateTime) -> i32 {
    (1..=24)
        .map(|hours| naive - Duration::hours(hours))
        .find_map(|earlier| zone.from_local_datetime(&earlier).earliest())
        .map(|dt| dt.offset().fix().local_minus_utc())
        .unwrap_or(0)
}

/// The caller's local timezone.
///
/// Occurrences are stored as UTC instants; the local zone decides how
/// floating times are interpreted and where calendar days begin and end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LocalZone {
    /// The operating system's timezone.
    #[default]
    System,
    /// A fixed IANA timezone.
    Named(Tz),
}

impl LocalZone {
    /// Parses a zone name. `local`, `system` and the empty string select
    /// the system zone; anything else must be an IANA identifier.
    pub fn parse(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("local")
            || trimmed.eq_ignore_ascii_case("system")
        {
            return Some(Self::System);
        }
        Tz::from_str(trimmed).ok().map(Self::Named)
    }

    /// Converts a wall-clock time in this zone to an absolute instant.
    pub fn instant_from_wall_clock(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        match self {
            Self::System => resolve_wall_clock(&Local, naive),
            Self::Named(tz) => resolve_wall_clock(tz, naive),
        }
    }

    /// Returns the wall-clock time of `instant` in this zone.
    pub fn wall_clock(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::System => instant.with_timezone(&Local).naive_local(),
            Self::Named(tz) => instant.with_timezone(tz).naive_local(),
        }
    }

    /// Returns the calendar date of `instant` in this zone.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.wall_clock(instant).date()
    }

    /// Returns today's date in this zone.
    pub fn today(&self) -> NaiveDate {
        self.date_of(Utc::now())
    }

    /// Local midnight (00:00:00.000) at the start of `date`.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        self.instant_from_wall_clock(date.and_time(NaiveTime::MIN))
    }

    /// The last local millisecond (23:59:59.999) of `date`.
    pub fn end_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let last = date.and_time(NaiveTime::MIN) + Duration::days(1) - Duration::milliseconds(1);
        self.instant_from_wall_clock(last)
    }
}

impl fmt::Display for LocalZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "local"),
            Self::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}

/// An inclusive range of instants `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (inclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// # Panics
    ///
    /// Panics if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start <= end, "TimeWindow start must be <= end");
        Self { start, end }
    }

    /// The local calendar day `date`, from 00:00:00.000 to 23:59:59.999.
    pub fn for_date(date: NaiveDate, zone: &LocalZone) -> Self {
        Self::new(zone.start_of_day(date), zone.end_of_day(date))
    }

    /// The recurrence expansion window around `today`: from the start of the
    /// day one calendar month earlier to the end of the day two calendar
    /// months later. Month arithmetic clamps to the last day of short months.
    pub fn expansion(today: NaiveDate, zone: &LocalZone) -> Self {
        let first = today.checked_sub_months(Months::new(1)).unwrap_or(today);
        let last = today.checked_add_months(Months::new(2)).unwrap_or(today);
        Self::new(zone.start_of_day(first), zone.end_of_day(last))
    }

    /// Returns the duration of this time window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Checks if an instant falls within this window (both ends inclusive).
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.start <= dt && dt <= self.end
    }

    /// Checks if the closed interval `[start, end]` shares at least one
    /// instant with this window.
    pub fn intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start <= self.end && end >= self.start
    }
}
