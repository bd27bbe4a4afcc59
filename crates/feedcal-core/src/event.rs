//! Event types shared by the ingestion pipeline and its consumers.
//!
//! - [`ResolvedOccurrence`]: one concrete, time-bounded calendar occurrence
//! - [`CalendarSource`]: a configured feed (URL or path) with a display name

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::time::{LocalZone, TimeWindow};

/// A configured iCalendar feed.
///
/// Only `url`, `name` and `enabled` drive ingestion; `color` is copied onto
/// occurrences and `note_settings` is carried through untouched for the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSource {
    /// Remote URL, absolute path, `file://` URL, or vault-relative path.
    /// Also used as the source's stable key.
    pub url: String,
    /// Display name.
    pub name: String,
    /// Whether the source participates in ingestion.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Optional display color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Per-source note settings owned by the host application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_settings: Option<serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

impl CalendarSource {
    /// Creates an enabled source.
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            enabled: true,
            color: None,
            note_settings: None,
        }
    }

    /// Builder method to set the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder method to set the color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// A concrete calendar occurrence, ready for date-range queries.
///
/// Start and end are absolute instants; they serialize as RFC 3339 strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOccurrence {
    /// Unique per occurrence: the UID for single events, UID plus start
    /// timestamp for recurring ones.
    pub id: String,
    /// The event title.
    pub title: String,
    /// When the occurrence starts.
    pub start: DateTime<Utc>,
    /// When the occurrence ends.
    pub end: DateTime<Utc>,
    /// The event description.
    #[serde(default)]
    pub description: Option<String>,
    /// The event location.
    #[serde(default)]
    pub location: Option<String>,
    /// Display name of the feed this occurrence came from.
    #[serde(default)]
    pub source: String,
    /// Stable key of the feed (its configured URL or path).
    #[serde(default)]
    pub source_id: String,
    /// Display color inherited from the feed.
    #[serde(default)]
    pub color: Option<String>,
    /// Whether the occurrence spans whole days.
    #[serde(default)]
    pub is_all_day: bool,
}

impl ResolvedOccurrence {
    /// Creates an occurrence with the required fields.
    ///
    /// If `end` precedes `start` it is clamped to `start`.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start,
            end: end.max(start),
            description: None,
            location: None,
            source: String::new(),
            source_id: String::new(),
            color: None,
            is_all_day: false,
        }
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    /// Builder method to mark the occurrence as all-day.
    pub fn with_all_day(mut self, is_all_day: bool) -> Self {
        self.is_all_day = is_all_day;
        self
    }

    /// Tags the occurrence with the feed it came from.
    pub fn with_source(mut self, source: &CalendarSource) -> Self {
        self.source = source.name.clone();
        self.source_id = source.url.clone();
        self.color = source.color.clone();
        self
    }

    /// Checks whether the occurrence shares any instant with `[start, end]`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start <= end && self.end >= start
    }

    /// Checks whether the occurrence belongs on local calendar day `date`.
    ///
    /// True when it starts that day, or when its interval crosses into the
    /// day: `start < end_of_day && end > start_of_day`. An occurrence ending
    /// exactly at midnight does not spill onto the next day.
    pub fn falls_on(&self, date: NaiveDate, zone: &LocalZone) -> bool {
        let day = TimeWindow::for_date(date, zone);
        day.contains(self.start) || (self.start < day.end && self.end > day.start)
    }
}

/// Sorts occurrences ascending by start, then end, then id.
pub fn sort_by_start(occurrences: &mut [ResolvedOccurrence]) {
    occurrences.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| a.end.cmp(&b.end))
            .then_with(|| a.id.cmp(&b.id))
    });
}
