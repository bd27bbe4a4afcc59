//! Feed text to [`ResolvedOccurrence`] pipeline.
//!
//! The pipeline for one source:
//! 1. Parse the feed into definitions ([`parse_feed`])
//! 2. Route overrides into an [`ExceptionMap`]
//! 3. Expand recurring definitions, resolve single ones
//! 4. Tag every occurrence with its source
//!
//! Nothing here fails: a bad feed yields an empty list and a warning.

use std::collections::HashSet;

use feedcal_core::{CalendarSource, LocalZone, ResolvedOccurrence, TimeWindow};
use tracing::{debug, warn};

use crate::definition::EventDefinition;
use crate::feed::parse_feed;
use crate::recurrence::{ExceptionMap, RecurrenceExpander, UNTITLED};
use crate::timezone::TimezoneResolver;

/// Inputs shared by every source of one ingestion cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Zone for floating times and all-day boundaries.
    pub local_zone: LocalZone,
    /// Recurring occurrences outside this window are not emitted.
    pub window: TimeWindow,
}

impl NormalizeOptions {
    /// Options with an explicit window.
    pub fn new(local_zone: LocalZone, window: TimeWindow) -> Self {
        Self { local_zone, window }
    }

    /// Options with the standard expansion window around today.
    pub fn for_today(local_zone: LocalZone) -> Self {
        let window = TimeWindow::expansion(local_zone.today(), &local_zone);
        Self::new(local_zone, window)
    }
}

/// Turns one source's raw feed text into occurrences.
///
/// A feed that does not parse contributes no occurrences.
#[tracing::instrument(skip_all, fields(source = %source.name))]
pub fn normalize_feed(
    raw: &str,
    source: &CalendarSource,
    options: &NormalizeOptions,
) -> Vec<ResolvedOccurrence> {
    match parse_feed(raw) {
        Ok(definitions) => normalize_definitions(definitions, source, options),
        Err(e) => {
            warn!(error = %e, url = %source.url, "failed to parse feed");
            Vec::new()
        }
    }
}

/// Turns parsed definitions into occurrences tagged with `source`.
///
/// Single events get their UID as id. An occurrence id appears at most
/// once in the result; later duplicates are dropped.
pub fn normalize_definitions(
    definitions: Vec<EventDefinition>,
    source: &CalendarSource,
    options: &NormalizeOptions,
) -> Vec<ResolvedOccurrence> {
    let resolver = TimezoneResolver::new(options.local_zone);

    let (overrides, primaries): (Vec<_>, Vec<_>) =
        definitions.into_iter().partition(EventDefinition::is_override);

    let mut exceptions = ExceptionMap::new();
    for definition in overrides {
        exceptions.insert(definition, &resolver);
    }

    let expander = RecurrenceExpander::new(&resolver, options.window);
    let mut occurrences = Vec::new();

    for definition in primaries.iter().filter(|d| !d.is_cancelled()) {
        if definition.is_recurring() {
            match expander.expand(definition, &exceptions) {
                Ok(expanded) => {
                    occurrences.extend(expanded);
                    continue;
                }
                Err(e) => {
                    warn!(uid = %definition.uid, error = %e, "treating event as non-recurring");
                }
            }
        }
        occurrences.push(single_occurrence(definition, &resolver));
    }

    let mut seen = HashSet::new();
    let before = occurrences.len();
    let tagged: Vec<_> = occurrences
        .into_iter()
        .filter(|o| seen.insert(o.id.clone()))
        .map(|o| o.with_source(source))
        .collect();

    debug!(
        definitions = primaries.len(),
        overrides = exceptions.len(),
        occurrences = tagged.len(),
        duplicates = before - tagged.len(),
        "normalized feed"
    );
    tagged
}

/// Resolves a definition as one occurrence with its UID as id.
pub(crate) fn single_occurrence(
    definition: &EventDefinition,
    resolver: &TimezoneResolver,
) -> ResolvedOccurrence {
    let (start, end) = resolver.resolve_span(definition, None);
    let title = definition.summary.as_deref().unwrap_or(UNTITLED);

    ResolvedOccurrence::new(definition.uid.clone(), title, start, end)
        .with_description(definition.description.clone())
        .with_location(definition.location.clone())
        .with_all_day(definition.is_all_day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn source() -> CalendarSource {
        CalendarSource::new("https://example.com/team.ics", "Team").with_color("#3366ff")
    }

    fn options(zone: LocalZone) -> NormalizeOptions {
        NormalizeOptions::new(
            zone,
            TimeWindow::new(utc(2025, 1, 1, 0, 0), Utc.with_ymd_and_hms(2025, 3, 31, 23, 59, 59).unwrap()),
        )
    }

    fn calendar(events: &str) -> String {
        format!("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n{events}END:VCALENDAR\r\n")
    }

    #[test]
    fn tags_source_and_color() {
        let feed = calendar(
            "BEGIN:VEVENT\r\nUID:one\r\nSUMMARY:Lunch\r\nDTSTART:20250205T120000Z\r\n\
DTEND:20250205T130000Z\r\nEND:VEVENT\r\n",
        );
        let occ = normalize_feed(&feed, &source(), &options(LocalZone::Named(chrono_tz::UTC)));
        assert_eq!(occ.len(), 1);
        assert_eq!(occ[0].id, "one");
        assert_eq!(occ[0].title, "Lunch");
        assert_eq!(occ[0].source, "Team");
        assert_eq!(occ[0].source_id, "https://example.com/team.ics");
        assert_eq!(occ[0].color.as_deref(), Some("#3366ff"));
    }

    #[test]
    fn parse_error_yields_nothing() {
        let occ = normalize_feed("<html>502 Bad Gateway</html>", &source(), &options(LocalZone::System));
        assert!(occ.is_empty());
    }

    #[test]
    fn missing_summary_gets_placeholder_title() {
        let feed = calendar("BEGIN:VEVENT\r\nUID:x\r\nDTSTART:20250205T120000Z\r\nEND:VEVENT\r\n");
        let occ = normalize_feed(&feed, &source(), &options(LocalZone::Named(chrono_tz::UTC)));
        assert_eq!(occ[0].title, UNTITLED);
    }

    #[test]
    fn single_events_are_not_window_filtered() {
        let feed = calendar("BEGIN:VEVENT\r\nUID:old\r\nDTSTART:20200101T120000Z\r\nEND:VEVENT\r\n");
        let occ = normalize_feed(&feed, &source(), &options(LocalZone::Named(chrono_tz::UTC)));
        assert_eq!(occ.len(), 1);
    }

    #[test]
    fn duplicate_uids_are_collapsed() {
        let feed = calendar(
            "BEGIN:VEVENT\r\nUID:dup\r\nSUMMARY:First\r\nDTSTART:20250205T120000Z\r\nEND:VEVENT\r\n\
BEGIN:VEVENT\r\nUID:dup\r\nSUMMARY:Second\r\nDTSTART:20250206T120000Z\r\nEND:VEVENT\r\n",
        );
        let occ = normalize_feed(&feed, &source(), &options(LocalZone::Named(chrono_tz::UTC)));
        assert_eq!(occ.len(), 1);
        assert_eq!(occ[0].title, "First");
    }

    #[test]
    fn oversized_durations_do_not_sink_the_feed() {
        let feed = calendar(
            "BEGIN:VEVENT\r\nUID:weeks\r\nDTSTART:20250205T120000Z\r\nDURATION:P99999999999999W\r\nEND:VEVENT\r\n\
BEGIN:VEVENT\r\nUID:days\r\nDTSTART:20250205T120000Z\r\nDURATION:P1000000000D\r\nEND:VEVENT\r\n\
BEGIN:VEVENT\r\nUID:daily\r\nDTSTART:20250205T120000Z\r\nDURATION:P1000000000D\r\n\
RRULE:FREQ=DAILY;COUNT=2\r\nEND:VEVENT\r\n\
BEGIN:VEVENT\r\nUID:fine\r\nDTSTART:20250205T120000Z\r\nDURATION:PT30M\r\nEND:VEVENT\r\n",
        );
        let occ = normalize_feed(&feed, &source(), &options(LocalZone::Named(chrono_tz::UTC)));

        let ids: Vec<_> = occ.iter().map(|o| o.id.as_str()).collect();
        assert!(ids.contains(&"weeks"));
        assert!(ids.contains(&"days"));
        assert!(ids.contains(&"fine"));
        assert_eq!(ids.iter().filter(|id| id.starts_with("daily-")).count(), 2);

        let days = occ.iter().find(|o| o.id == "days").unwrap();
        assert_eq!(days.end, days.start);
        let fine = occ.iter().find(|o| o.id == "fine").unwrap();
        assert_eq!(fine.end, utc(2025, 2, 5, 12, 30));
    }

    #[test]
    fn bad_rule_falls_back_to_single_occurrence() {
        let feed = calendar(
            "BEGIN:VEVENT\r\nUID:odd\r\nDTSTART:20250205T120000Z\r\nRRULE:FREQ=FORTNIGHTLY\r\nEND:VEVENT\r\n",
        );
        let occ = normalize_feed(&feed, &source(), &options(LocalZone::Named(chrono_tz::UTC)));
        assert_eq!(occ.len(), 1);
        assert_eq!(occ[0].id, "odd");
    }

    #[test]
    fn all_day_event_in_local_zone() {
        let feed = calendar(
            "BEGIN:VEVENT\r\nUID:holiday\r\nDTSTART;VALUE=DATE:20250217\r\n\
DTEND;VALUE=DATE:20250218\r\nEND:VEVENT\r\n",
        );
        let zone = LocalZone::Named(chrono_tz::America::Los_Angeles);
        let occ = normalize_feed(&feed, &source(), &options(zone));
        assert!(occ[0].is_all_day);
        assert_eq!(occ[0].start, utc(2025, 2, 17, 8, 0));
        assert_eq!(occ[0].end, utc(2025, 2, 18, 8, 0));
        assert!(occ[0].falls_on(date(2025, 2, 17), &zone));
        assert!(!occ[0].falls_on(date(2025, 2, 18), &zone));
    }

    #[test]
    fn gmt_standard_time_before_uk_clock_change() {
        let feed = calendar(
            "BEGIN:VEVENT\r\nUID:clock\r\nSUMMARY:Early call\r\n\
DTSTART;TZID=GMT Standard Time:20250330T013000\r\n\
DTEND;TZID=GMT Standard Time:20250330T023000\r\nEND:VEVENT\r\n",
        );
        let zone = LocalZone::Named(chrono_tz::Europe::London);
        let occ = normalize_feed(&feed, &source(), &options(zone));
        assert_eq!(occ.len(), 1);
        assert_eq!(occ[0].start, utc(2025, 3, 30, 1, 30));
        assert!(occ[0].falls_on(date(2025, 3, 30), &zone));
    }

    /// Weekly Monday series with one EXDATE and one moved occurrence.
    #[test]
    fn weekly_series_with_exdate_and_override() {
        let feed = calendar(
            "BEGIN:VEVENT\r\n\
UID:weekly@example.com\r\n\
SUMMARY:Planning\r\n\
LOCATION:Room 1\r\n\
DTSTART;TZID=Europe/Berlin:20250106T100000\r\n\
DTEND;TZID=Europe/Berlin:20250106T110000\r\n\
RRULE:FREQ=WEEKLY;BYDAY=MO\r\n\
EXDATE;TZID=Europe/Berlin:20250120T100000\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:weekly@example.com\r\n\
RECURRENCE-ID;TZID=Europe/Berlin:20250203T100000\r\n\
SUMMARY:Planning\r\n\
LOCATION:Room 7\r\n\
DTSTART;TZID=Europe/Berlin:20250203T100000\r\n\
DTEND;TZID=Europe/Berlin:20250203T110000\r\n\
END:VEVENT\r\n",
        );
        let zone = LocalZone::Named(chrono_tz::Europe::Berlin);
        let occ = normalize_feed(&feed, &source(), &options(zone));

        // 13 Mondays between Jan 6 and Mar 31, minus the excluded Jan 20.
        assert_eq!(occ.len(), 12);
        assert!(occ.iter().all(|o| !o.falls_on(date(2025, 1, 20), &zone)));

        let moved: Vec<_> = occ.iter().filter(|o| o.falls_on(date(2025, 2, 3), &zone)).collect();
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].location.as_deref(), Some("Room 7"));

        let regular = occ.iter().find(|o| o.falls_on(date(2025, 2, 10), &zone)).unwrap();
        assert_eq!(regular.location.as_deref(), Some("Room 1"));
        assert!(occ.iter().all(|o| o.source == "Team"));
    }

    #[test]
    fn cancelled_override_removes_occurrence() {
        let feed = calendar(
            "BEGIN:VEVENT\r\nUID:s\r\nDTSTART:20250106T100000Z\r\nRRULE:FREQ=DAILY;COUNT=5\r\nEND:VEVENT\r\n\
BEGIN:VEVENT\r\nUID:s\r\nRECURRENCE-ID:20250108T100000Z\r\nDTSTART:20250108T100000Z\r\n\
STATUS:CANCELLED\r\nEND:VEVENT\r\n",
        );
        let occ = normalize_feed(&feed, &source(), &options(LocalZone::Named(chrono_tz::UTC)));
        assert_eq!(occ.len(), 4);
        assert!(occ.iter().all(|o| o.start.date_naive() != date(2025, 1, 8)));
    }

    #[test]
    fn for_today_window_contains_now() {
        let options = NormalizeOptions::for_today(LocalZone::Named(chrono_tz::UTC));
        assert!(options.window.contains(Utc::now()));
    }
}
