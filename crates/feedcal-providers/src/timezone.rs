//! Timezone identifier resolution.
//!
//! Feeds name zones by IANA identifier, by Windows display name (Outlook,
//! Exchange) or by vendor-prefixed paths (`/mozilla.org/.../Europe/Berlin`).
//! [`TimezoneResolver`] maps all of these to a [`Tz`] and converts naive
//! wall-clock values to absolute instants. Unknown zones never fail the
//! feed: the value is read as local time and a warning is logged.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;
use feedcal_core::{LocalZone, resolve_wall_clock};
use tracing::warn;

use crate::definition::{DateTimeValue, EventDefinition};
use crate::error::{ProviderError, ProviderResult};

/// Windows zone display names and their IANA equivalents.
const LEGACY_ZONES: &[(&str, &str)] = &[
    ("Pacific Standard Time", "America/Los_Angeles"),
    ("Mountain Standard Time", "America/Denver"),
    ("US Mountain Standard Time", "America/Phoenix"),
    ("Central Standard Time", "America/Chicago"),
    ("Eastern Standard Time", "America/New_York"),
    ("Alaskan Standard Time", "America/Anchorage"),
    ("Hawaiian Standard Time", "Pacific/Honolulu"),
    ("Atlantic Standard Time", "America/Halifax"),
    ("GMT Standard Time", "Europe/London"),
    ("Greenwich Standard Time", "Atlantic/Reykjavik"),
    ("W. Europe Standard Time", "Europe/Berlin"),
    ("Romance Standard Time", "Europe/Paris"),
    ("Central Europe Standard Time", "Europe/Budapest"),
    ("Central European Standard Time", "Europe/Warsaw"),
    ("FLE Standard Time", "Europe/Helsinki"),
    ("Russian Standard Time", "Europe/Moscow"),
    ("India Standard Time", "Asia/Kolkata"),
    ("China Standard Time", "Asia/Shanghai"),
    ("Tokyo Standard Time", "Asia/Tokyo"),
    ("Singapore Standard Time", "Asia/Singapore"),
    ("AUS Eastern Standard Time", "Australia/Sydney"),
    ("New Zealand Standard Time", "Pacific/Auckland"),
    ("UTC", "UTC"),
    ("Coordinated Universal Time", "UTC"),
];

/// Looks up a TZID, returning `None` if no zone matches.
///
/// Order: legacy table (case-insensitive), IANA identifier, then each
/// `/`-separated suffix of a vendor-prefixed path.
pub fn lookup_zone(tzid: &str) -> Option<Tz> {
    let cleaned = tzid.trim().trim_matches('"').trim();
    if cleaned.is_empty() {
        return None;
    }

    if let Some((_, iana)) = LEGACY_ZONES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(cleaned))
    {
        return Tz::from_str(iana).ok();
    }

    if let Ok(tz) = Tz::from_str(cleaned) {
        return Some(tz);
    }

    cleaned
        .match_indices('/')
        .map(|(i, _)| &cleaned[i + 1..])
        .filter(|suffix| !suffix.is_empty())
        .find_map(|suffix| Tz::from_str(suffix).ok())
}

/// Converts feed date-time values to instants for one caller.
///
/// Resolution itself is pure. The only state is the set of unknown TZIDs
/// already warned about, so each one is logged once per resolver. The
/// normalizer builds a fresh resolver for every feed, which scopes the
/// warnings to one fetch of one source.
#[derive(Debug)]
pub struct TimezoneResolver {
    local: LocalZone,
    reported: Mutex<HashSet<String>>,
}

impl TimezoneResolver {
    /// Creates a resolver for the caller's local zone.
    pub fn new(local: LocalZone) -> Self {
        Self {
            local,
            reported: Mutex::new(HashSet::new()),
        }
    }

    /// The caller's local zone.
    pub fn local(&self) -> &LocalZone {
        &self.local
    }

    /// Resolves `naive` in `tzid`, failing on an unknown zone.
    ///
    /// # Errors
    ///
    /// Returns a timezone resolution error if `tzid` matches no zone.
    pub fn try_resolve(&self, naive: NaiveDateTime, tzid: Option<&str>) -> ProviderResult<DateTime<Utc>> {
        match tzid {
            None => Ok(self.local.instant_from_wall_clock(naive)),
            Some(id) => lookup_zone(id)
                .map(|tz| resolve_wall_clock(&tz, naive))
                .ok_or_else(|| ProviderError::timezone(id)),
        }
    }

    /// Resolves `naive` in `tzid`, reading it as local time if the zone is
    /// unknown.
    pub fn resolve(&self, naive: NaiveDateTime, tzid: Option<&str>) -> DateTime<Utc> {
        self.try_resolve(naive, tzid).unwrap_or_else(|err| {
            self.report(tzid.unwrap_or_default(), &err);
            self.local.instant_from_wall_clock(naive)
        })
    }

    /// Resolves a property value. DATE values are local midnight;
    /// floating DATE-TIME values use `fallback_tzid`.
    pub fn resolve_value(&self, value: &DateTimeValue, fallback_tzid: Option<&str>) -> DateTime<Utc> {
        if value.is_date {
            return self.local.start_of_day(value.naive_date());
        }
        self.resolve(value.naive, value.tzid.as_deref().or(fallback_tzid))
    }

    /// Resolves the start and end of a definition.
    ///
    /// All-day events run from local midnight of the start date to local
    /// midnight after their last day. Timed events end at DTEND, at
    /// start + DURATION, or at start when neither is given or the sum
    /// overflows. A floating start uses `fallback_tzid`; a floating end
    /// uses the start's zone.
    pub fn resolve_span(
        &self,
        definition: &EventDefinition,
        fallback_tzid: Option<&str>,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        if definition.is_all_day() {
            let first = definition.start.naive_date();
            let last = Duration::try_days(definition.all_day_length())
                .and_then(|length| first.checked_add_signed(length))
                .unwrap_or(first);
            return (self.local.start_of_day(first), self.local.start_of_day(last));
        }

        let tzid = definition.start.tzid.as_deref().or(fallback_tzid);
        let start = self.resolve(definition.start.naive, tzid);
        let end = match (&definition.end, definition.duration) {
            (Some(end), _) => self.resolve_value(end, tzid),
            (None, Some(duration)) => start.checked_add_signed(duration).unwrap_or(start),
            (None, None) => start,
        };
        (start, end.max(start))
    }

    /// The wall-clock time of `instant` in `tzid` (local time if absent or unknown).
    pub fn wall_clock(&self, instant: DateTime<Utc>, tzid: Option<&str>) -> NaiveDateTime {
        match tzid.and_then(lookup_zone) {
            Some(tz) => instant.with_timezone(&tz).naive_local(),
            None => self.local.wall_clock(instant),
        }
    }

    fn report(&self, tzid: &str, err: &ProviderError) {
        let first = self
            .reported
            .lock()
            .map(|mut seen| seen.insert(tzid.to_string()))
            .unwrap_or(true);
        if first {
            warn!(tzid, error = %err, local = %self.local, "falling back to local time");
        }
    }
}
