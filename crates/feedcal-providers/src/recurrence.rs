//! Recurrence expansion.
//!
//! A recurring definition is expanded into concrete occurrences inside a
//! bounded [`TimeWindow`]. Each generated candidate is keyed by its UID and
//! the calendar date of its wall-clock start; that key is looked up in the
//! definition's EXDATE set and in the feed's [`ExceptionMap`]:
//!
//! - an excluded date or a suppressed key drops the candidate,
//! - a replaced key emits the override instead of the candidate,
//! - otherwise the candidate itself is emitted.
//!
//! Candidates are produced by the `rrule` crate on naive wall-clock values
//! (the rule is anchored at DTSTART read as UTC), then each one is resolved
//! in the definition's zone. Keeping the generator in wall-clock space makes
//! `FREQ=DAILY` at 09:00 stay at 09:00 across DST changes.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use feedcal_core::{ResolvedOccurrence, TimeWindow};
use rrule::{RRule, Unvalidated};
use tracing::{debug, trace, warn};

use crate::definition::{DateTimeValue, EventDefinition};
use crate::error::{ProviderError, ProviderResult};
use crate::timezone::TimezoneResolver;
use crate::values;

/// Title used when a definition has no SUMMARY.
pub const UNTITLED: &str = "Untitled event";

/// Identifies one occurrence slot of a series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OverrideKey {
    /// UID shared by the series and its overrides.
    pub uid: String,
    /// Calendar date of the slot's original wall-clock start.
    pub date: NaiveDate,
}

impl OverrideKey {
    pub fn new(uid: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            uid: uid.into(),
            date,
        }
    }
}

impl fmt::Display for OverrideKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.uid, self.date.format("%Y-%m-%d"))
    }
}

/// What happens to an occurrence slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceException {
    /// The slot shows this definition instead of the generated occurrence.
    Replaced(EventDefinition),
    /// The slot is cancelled.
    Suppressed,
}

/// Overrides of a feed, keyed by [`OverrideKey`].
#[derive(Debug, Clone, Default)]
pub struct ExceptionMap {
    entries: HashMap<OverrideKey, RecurrenceException>,
}

impl ExceptionMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an override definition. Definitions without a
    /// RECURRENCE-ID are ignored.
    ///
    /// A CANCELLED override suppresses its slot; once suppressed, a slot
    /// stays suppressed. Otherwise the last override for a slot wins.
    pub fn insert(&mut self, definition: EventDefinition, resolver: &TimezoneResolver) {
        let Some(key) = override_key(&definition, resolver) else {
            return;
        };

        let exception = if definition.is_cancelled() {
            RecurrenceException::Suppressed
        } else {
            RecurrenceException::Replaced(definition)
        };

        match self.entries.get(&key) {
            Some(RecurrenceException::Suppressed) => {
                trace!(key = %key, "slot already suppressed");
            }
            _ => {
                trace!(key = %key, suppressed = matches!(exception, RecurrenceException::Suppressed), "registered override");
                self.entries.insert(key, exception);
            }
        }
    }

    /// Looks up the exception for a slot.
    pub fn get(&self, uid: &str, date: NaiveDate) -> Option<&RecurrenceException> {
        self.entries.get(&OverrideKey::new(uid, date))
    }

    /// Number of registered slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no slot is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Computes the slot an override applies to.
///
/// A UTC RECURRENCE-ID is converted to the wall clock of the override's own
/// start zone before its date is taken.
fn override_key(definition: &EventDefinition, resolver: &TimezoneResolver) -> Option<OverrideKey> {
    let recurrence_id = definition.recurrence_id.as_ref()?;
    let zone = definition.start.tzid.as_deref();
    Some(OverrideKey::new(
        definition.uid.clone(),
        slot_date(recurrence_id, zone, resolver),
    ))
}

/// The wall-clock date of a value in the series zone.
fn slot_date(value: &DateTimeValue, series_tzid: Option<&str>, resolver: &TimezoneResolver) -> NaiveDate {
    if value.is_utc() && !value.is_date && series_tzid != Some("UTC") {
        let instant = value.naive.and_utc();
        return resolver.wall_clock(instant, series_tzid).date();
    }
    value.naive_date()
}

/// Expands recurring definitions within a fixed window.
#[derive(Debug, Clone, Copy)]
pub struct RecurrenceExpander<'a> {
    resolver: &'a TimezoneResolver,
    window: TimeWindow,
}

impl<'a> RecurrenceExpander<'a> {
    /// Creates an expander emitting occurrences that intersect `window`.
    pub fn new(resolver: &'a TimezoneResolver, window: TimeWindow) -> Self {
        Self { resolver, window }
    }

    /// The expansion window.
    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// Expands one recurring definition.
    ///
    /// Occurrences are returned in generator (chronological) order.
    /// Generated occurrences get id `<uid>-<unix seconds of start>`, and
    /// overrides get the same form built from their own start.
    ///
    /// # Errors
    ///
    /// Returns a recurrence error if the definition has no RRULE or the rule
    /// cannot be parsed.
    pub fn expand(
        &self,
        definition: &EventDefinition,
        exceptions: &ExceptionMap,
    ) -> ProviderResult<Vec<ResolvedOccurrence>> {
        let rule_text = definition
            .rrule
            .as_deref()
            .ok_or_else(|| ProviderError::recurrence("definition has no RRULE"))?;

        let tzid = if definition.is_all_day() {
            None
        } else {
            definition.start.tzid.as_deref()
        };

        let span = self.span(definition);
        let candidates = self.candidates(definition, rule_text, tzid, span)?;
        let excluded: HashSet<NaiveDate> = definition
            .exdates
            .iter()
            .map(|exdate| slot_date(exdate, tzid, self.resolver))
            .collect();

        let mut occurrences = Vec::new();
        for naive in candidates {
            let (start, end) = span.place(naive, tzid, self.resolver);
            if start > self.window.end {
                break;
            }

            let date = naive.date();
            if excluded.contains(&date) {
                trace!(uid = %definition.uid, %date, "excluded by EXDATE");
                continue;
            }

            match exceptions.get(&definition.uid, date) {
                Some(RecurrenceException::Suppressed) => {
                    trace!(uid = %definition.uid, %date, "suppressed by cancelled override");
                }
                Some(RecurrenceException::Replaced(replacement)) => {
                    let (start, end) = self.resolver.resolve_span(replacement, tzid);
                    if self.window.intersects(start, end) {
                        occurrences.push(build_occurrence(replacement, Some(definition), start, end));
                    }
                }
                None => {
                    if self.window.intersects(start, end) {
                        occurrences.push(build_occurrence(definition, None, start, end));
                    }
                }
            }
        }

        debug!(uid = %definition.uid, count = occurrences.len(), "expanded series");
        Ok(occurrences)
    }

    /// Runs the rule generator over the window widened by a day and the
    /// series span, in wall-clock time.
    ///
    /// The lower bound keeps the result limit from being spent on
    /// candidates that end before the window.
    fn candidates(
        &self,
        definition: &EventDefinition,
        rule_text: &str,
        tzid: Option<&str>,
        span: SeriesSpan,
    ) -> ProviderResult<Vec<NaiveDateTime>> {
        let rule_text = normalize_until(rule_text, tzid, self.resolver);
        let rule = rule_text
            .parse::<RRule<Unvalidated>>()
            .map_err(|e| ProviderError::recurrence(format!("invalid RRULE '{}': {}", rule_text, e)))?;

        let dt_start = definition.start.naive.and_utc().with_timezone(&rrule::Tz::UTC);
        let horizon = self.resolver.wall_clock(self.window.end, tzid) + Duration::days(1);
        let lead = span.length().checked_add(&Duration::days(1)).unwrap_or(Duration::MAX);
        let earliest = self
            .resolver
            .wall_clock(self.window.start, tzid)
            .checked_sub_signed(lead)
            .unwrap_or(NaiveDateTime::MIN);

        let mut rule_set = rule
            .build(dt_start)
            .map_err(|e| ProviderError::recurrence(format!("invalid RRULE '{}': {}", rule_text, e)))?
            .before(horizon.and_utc().with_timezone(&rrule::Tz::UTC));
        if earliest > definition.start.naive {
            rule_set = rule_set.after(earliest.and_utc().with_timezone(&rrule::Tz::UTC));
        }

        let result = rule_set.all(u16::MAX);
        if result.limited {
            warn!(uid = %definition.uid, count = result.dates.len(), "recurrence expansion hit its limit");
        }

        Ok(result.dates.iter().map(|dt| dt.naive_utc()).collect())
    }

    fn span(&self, definition: &EventDefinition) -> SeriesSpan {
        if definition.is_all_day() {
            SeriesSpan::Days(definition.all_day_length())
        } else {
            let (start, end) = self.resolver.resolve_span(definition, None);
            SeriesSpan::Fixed(end - start)
        }
    }
}

/// Length of every generated occurrence of a series.
#[derive(Debug, Clone, Copy)]
enum SeriesSpan {
    /// All-day series: whole local days.
    Days(i64),
    /// Timed series: fixed absolute duration.
    Fixed(Duration),
}

impl SeriesSpan {
    fn length(self) -> Duration {
        match self {
            Self::Days(days) => Duration::try_days(days).unwrap_or(Duration::MAX),
            Self::Fixed(duration) => duration,
        }
    }

    fn place(
        self,
        naive: NaiveDateTime,
        tzid: Option<&str>,
        resolver: &TimezoneResolver,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            Self::Days(days) => {
                let local = resolver.local();
                let first = naive.date();
                let last = Duration::try_days(days)
                    .and_then(|length| first.checked_add_signed(length))
                    .unwrap_or(first);
                (local.start_of_day(first), local.start_of_day(last))
            }
            Self::Fixed(duration) => {
                let start = resolver.resolve(naive, tzid);
                (start, start.checked_add_signed(duration).unwrap_or(start))
            }
        }
    }
}

/// Rewrites UNTIL into the UTC-anchored wall-clock space of the generator.
///
/// DATE values become the last second of that day. A true UTC value is
/// converted to the series zone first.
fn normalize_until(rule: &str, tzid: Option<&str>, resolver: &TimezoneResolver) -> String {
    rule.trim()
        .trim_start_matches("RRULE:")
        .split(';')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((name, value)) if name.trim().eq_ignore_ascii_case("UNTIL") => {
                format!("UNTIL={}", until_wall_clock(value, tzid, resolver))
            }
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn until_wall_clock(value: &str, tzid: Option<&str>, resolver: &TimezoneResolver) -> String {
    if let Some(date) = values::parse_date(value) {
        return format!("{}T235959Z", date.format("%Y%m%d"));
    }
    let wall = match values::parse_date_time(value) {
        Some((naive, true)) => resolver.wall_clock(naive.and_utc(), tzid),
        Some((naive, false)) => naive,
        None => return value.to_string(),
    };
    format!("{}Z", wall.format("%Y%m%dT%H%M%S"))
}

/// Builds an occurrence. Override fields fall back to the master's title.
fn build_occurrence(
    definition: &EventDefinition,
    master: Option<&EventDefinition>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> ResolvedOccurrence {
    let title = definition
        .summary
        .clone()
        .or_else(|| master.and_then(|m| m.summary.clone()))
        .unwrap_or_else(|| UNTITLED.to_string());

    ResolvedOccurrence::new(occurrence_id(&definition.uid, start), title, start, end)
        .with_description(definition.description.clone())
        .with_location(definition.location.clone())
        .with_all_day(definition.is_all_day())
}

/// Id of a recurring occurrence.
pub fn occurrence_id(uid: &str, start: DateTime<Utc>) -> String {
    format!("{}-{}", uid, start.timestamp())
}
