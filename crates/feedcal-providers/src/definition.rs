//! Parsed, not yet expanded, event definitions.
//!
//! An [`EventDefinition`] is what the feed parser extracts from one
//! `VEVENT`: a single event, a recurring master, or a recurrence override.
//! Times are still naive wall-clock values tagged with an optional TZID.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// A DATE or DATE-TIME property value before timezone resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTimeValue {
    /// Wall-clock value. Midnight for DATE values.
    pub naive: NaiveDateTime,
    /// The TZID parameter, or `"UTC"` for values ending in `Z`.
    /// `None` means floating (caller's local time).
    pub tzid: Option<String>,
    /// Whether the value is a DATE (all-day) rather than a DATE-TIME.
    pub is_date: bool,
}

impl DateTimeValue {
    /// A DATE-TIME value.
    pub fn date_time(naive: NaiveDateTime, tzid: Option<String>) -> Self {
        Self {
            naive,
            tzid,
            is_date: false,
        }
    }

    /// A DATE value.
    pub fn date(date: NaiveDate) -> Self {
        Self {
            naive: date.and_time(NaiveTime::MIN),
            tzid: None,
            is_date: true,
        }
    }

    /// The calendar date of the wall-clock value.
    pub fn naive_date(&self) -> NaiveDate {
        self.naive.date()
    }

    /// Whether the value is an absolute UTC time.
    pub fn is_utc(&self) -> bool {
        self.tzid.as_deref() == Some("UTC")
    }
}

/// STATUS of a `VEVENT`. Anything other than CANCELLED counts as normal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventStatus {
    #[default]
    Normal,
    Cancelled,
}

impl EventStatus {
    /// Parses a STATUS value.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("CANCELLED") {
            Self::Cancelled
        } else {
            Self::Normal
        }
    }
}

/// One `VEVENT` as extracted from a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDefinition {
    /// UID, unique within the feed (shared by a master and its overrides).
    pub uid: String,
    /// SUMMARY.
    pub summary: Option<String>,
    /// DESCRIPTION.
    pub description: Option<String>,
    /// LOCATION.
    pub location: Option<String>,
    /// DTSTART.
    pub start: DateTimeValue,
    /// DTEND, if present.
    pub end: Option<DateTimeValue>,
    /// DURATION, used when DTEND is absent.
    pub duration: Option<Duration>,
    /// STATUS.
    pub status: EventStatus,
    /// Raw RRULE value (`FREQ=...;...`).
    pub rrule: Option<String>,
    /// RECURRENCE-ID; marks this definition as an override.
    pub recurrence_id: Option<DateTimeValue>,
    /// EXDATE values, from every EXDATE line.
    pub exdates: Vec<DateTimeValue>,
}

impl EventDefinition {
    /// Creates a definition with only the required fields.
    pub fn new(uid: impl Into<String>, start: DateTimeValue) -> Self {
        Self {
            uid: uid.into(),
            summary: None,
            description: None,
            location: None,
            start,
            end: None,
            duration: None,
            status: EventStatus::Normal,
            rrule: None,
            recurrence_id: None,
            exdates: Vec::new(),
        }
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to set DTEND.
    pub fn with_end(mut self, end: DateTimeValue) -> Self {
        self.end = Some(end);
        self
    }

    /// Builder method to set the status.
    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder method to set the recurrence rule.
    pub fn with_rrule(mut self, rrule: impl Into<String>) -> Self {
        self.rrule = Some(rrule.into());
        self
    }

    /// Builder method to mark the definition as an override.
    pub fn with_recurrence_id(mut self, recurrence_id: DateTimeValue) -> Self {
        self.recurrence_id = Some(recurrence_id);
        self
    }

    /// Builder method to add an exclusion.
    pub fn with_exdate(mut self, exdate: DateTimeValue) -> Self {
        self.exdates.push(exdate);
        self
    }

    /// Whether this definition overrides one occurrence of a series.
    pub fn is_override(&self) -> bool {
        self.recurrence_id.is_some()
    }

    /// Whether STATUS is CANCELLED.
    pub fn is_cancelled(&self) -> bool {
        self.status == EventStatus::Cancelled
    }

    /// Whether this definition carries a recurrence rule.
    pub fn is_recurring(&self) -> bool {
        self.rrule.is_some()
    }

    /// Whether DTSTART is a DATE value.
    pub fn is_all_day(&self) -> bool {
        self.start.is_date
    }

    /// Number of days an all-day event covers; at least one.
    pub fn all_day_length(&self) -> i64 {
        let days = match (&self.end, self.duration) {
            (Some(end), _) => (end.naive_date() - self.start.naive_date()).num_days(),
            (None, Some(duration)) => duration.num_days(),
            (None, None) => 1,
        };
        days.max(1)
    }
}
