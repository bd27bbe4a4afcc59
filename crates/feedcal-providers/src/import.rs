//! Explicit import of a single-event file.
//!
//! Unlike feed ingestion, this path reports failures to the caller: a file
//! with no event or with several events is rejected.

use feedcal_core::{LocalZone, ResolvedOccurrence};
use thiserror::Error;
use tracing::debug;

use crate::feed::{ParseError, parse_feed};
use crate::normalize::single_occurrence;
use crate::timezone::TimezoneResolver;

/// Why an import was rejected.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The file holds no event.
    #[error("no events found in file")]
    NoEvents,

    /// The file holds more than one event.
    #[error("file contains {0} events, expected exactly one")]
    MultipleEvents(usize),

    /// The file is not iCalendar data.
    #[error("invalid calendar file: {0}")]
    Parse(#[from] ParseError),
}

/// Reads exactly one event from `raw`.
///
/// Overrides of the event (RECURRENCE-ID) are not counted. A recurring
/// event is returned as its first occurrence.
///
/// # Errors
///
/// Returns [`ImportError::NoEvents`] or [`ImportError::MultipleEvents`]
/// when the file does not hold exactly one event, and
/// [`ImportError::Parse`] when it is not valid iCalendar data.
pub fn import_single_event(raw: &str, zone: LocalZone) -> Result<ResolvedOccurrence, ImportError> {
    let mut events: Vec<_> = parse_feed(raw)?
        .into_iter()
        .filter(|d| !d.is_override())
        .collect();

    match events.len() {
        0 => Err(ImportError::NoEvents),
        1 => {
            let definition = events.remove(0);
            debug!(uid = %definition.uid, "importing event");
            let resolver = TimezoneResolver::new(zone);
            Ok(single_occurrence(&definition, &resolver))
        }
        n => Err(ImportError::MultipleEvents(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn calendar(events: &str) -> String {
        format!("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n{events}END:VCALENDAR\r\n")
    }

    const EVENT: &str = "BEGIN:VEVENT\r\nUID:imp-1\r\nSUMMARY:Dentist\r\n\
DTSTART;TZID=Pacific Standard Time:20250310T083000\r\nDURATION:PT1H\r\nEND:VEVENT\r\n";

    #[test]
    fn imports_one_event() {
        let occ = import_single_event(&calendar(EVENT), LocalZone::Named(chrono_tz::UTC)).unwrap();
        assert_eq!(occ.id, "imp-1");
        assert_eq!(occ.title, "Dentist");
        // PDT started on 2025-03-09.
        assert_eq!(occ.start, Utc.with_ymd_and_hms(2025, 3, 10, 15, 30, 0).unwrap());
        assert_eq!(occ.end, Utc.with_ymd_and_hms(2025, 3, 10, 16, 30, 0).unwrap());
    }

    #[test]
    fn rejects_empty_calendar() {
        let err = import_single_event(&calendar(""), LocalZone::System).unwrap_err();
        assert!(matches!(err, ImportError::NoEvents));
        assert_eq!(err.to_string(), "no events found in file");
    }

    #[test]
    fn rejects_multiple_events() {
        let second = EVENT.replace("imp-1", "imp-2");
        let err = import_single_event(&calendar(&format!("{EVENT}{second}")), LocalZone::System)
            .unwrap_err();
        assert!(matches!(err, ImportError::MultipleEvents(2)));
    }

    #[test]
    fn overrides_are_not_counted() {
        let moved = "BEGIN:VEVENT\r\nUID:imp-1\r\nRECURRENCE-ID:20250317T153000Z\r\n\
DTSTART:20250317T160000Z\r\nEND:VEVENT\r\n";
        let feed = calendar(&format!("{EVENT}{moved}"));
        assert!(import_single_event(&feed, LocalZone::System).is_ok());
    }

    #[test]
    fn rejects_garbage() {
        let err = import_single_event("hello", LocalZone::System).unwrap_err();
        assert!(matches!(err, ImportError::Parse(_)));
    }
}
