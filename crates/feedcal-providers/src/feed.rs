//! Feed parsing: raw iCalendar text to [`EventDefinition`]s.
//!
//! The text is read with the `icalendar` parser, which keeps every property
//! line with its parameters. Only `VEVENT` components are read. A cancelled
//! event that is not an override never reaches expansion and is dropped
//! here; cancelled overrides are kept so they can suppress their occurrence.

use icalendar::parser::{self, Component, Property};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::definition::{DateTimeValue, EventDefinition, EventStatus};
use crate::values;

/// Result type for feed parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// The feed text is not iCalendar data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The parser rejected the text.
    #[error("invalid iCalendar data: {0}")]
    Syntax(String),

    /// The text holds no calendar component.
    #[error("no calendar components found")]
    Empty,
}

/// Parses a feed into event definitions.
///
/// Several concatenated `VCALENDAR` blocks are accepted. Events missing UID
/// or DTSTART (or with an unreadable DTSTART) are skipped with a warning;
/// they do not fail the feed.
///
/// # Errors
///
/// Returns a [`ParseError`] when the text is not structurally valid
/// iCalendar data.
pub fn parse_feed(raw: &str) -> ParseResult<Vec<EventDefinition>> {
    let unfolded = parser::unfold(raw.trim_start_matches('\u{feff}'));
    let calendar =
        parser::read_calendar(&unfolded).map_err(|e| ParseError::Syntax(e.to_string()))?;
    if calendar.components.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut events = Vec::new();
    collect_events(&calendar.components, &mut events);

    let mut definitions = Vec::new();
    for component in events {
        let Some(definition) = extract_event(component) else {
            continue;
        };
        if definition.is_cancelled() && !definition.is_override() {
            debug!(uid = %definition.uid, "dropping cancelled event");
            continue;
        }
        definitions.push(definition);
    }

    debug!(count = definitions.len(), "parsed feed");
    Ok(definitions)
}

/// Gathers `VEVENT`s, descending through `VCALENDAR` wrappers.
fn collect_events<'c, 'a>(components: &'c [Component<'a>], events: &mut Vec<&'c Component<'a>>) {
    for component in components {
        let name = component.name.as_str();
        if name.eq_ignore_ascii_case("VEVENT") {
            events.push(component);
        } else if name.eq_ignore_ascii_case("VCALENDAR") {
            collect_events(&component.components, events);
        }
    }
}

fn extract_event(component: &Component<'_>) -> Option<EventDefinition> {
    let uid = match property(component, "UID").map(|p| p.val.as_str().trim()) {
        Some(uid) if !uid.is_empty() => uid.to_string(),
        _ => {
            warn!("skipping VEVENT without UID");
            return None;
        }
    };

    let Some(start) = property(component, "DTSTART").and_then(single_value) else {
        warn!(uid = %uid, "skipping VEVENT without a usable DTSTART");
        return None;
    };

    let mut definition = EventDefinition::new(uid, start);
    definition.summary = text(component, "SUMMARY");
    definition.description = text(component, "DESCRIPTION");
    definition.location = text(component, "LOCATION");
    definition.end = property(component, "DTEND").and_then(single_value);
    definition.duration = property(component, "DURATION").and_then(|p| {
        let parsed = values::parse_duration(p.val.as_str());
        if parsed.is_none() {
            warn!(uid = %definition.uid, value = p.val.as_str(), "ignoring unreadable DURATION");
        }
        parsed
    });
    definition.status = property(component, "STATUS")
        .map(|p| EventStatus::parse(p.val.as_str()))
        .unwrap_or_default();
    definition.rrule = property(component, "RRULE")
        .map(|p| p.val.as_str().trim().to_string())
        .filter(|rule| !rule.is_empty());
    definition.recurrence_id = property(component, "RECURRENCE-ID").and_then(single_value);
    definition.exdates = properties(component, "EXDATE")
        .flat_map(value_list)
        .collect();

    trace!(
        uid = %definition.uid,
        recurring = definition.is_recurring(),
        is_override = definition.is_override(),
        exdates = definition.exdates.len(),
        "extracted VEVENT"
    );
    Some(definition)
}

fn properties<'c, 'a>(
    component: &'c Component<'a>,
    name: &'c str,
) -> impl Iterator<Item = &'c Property<'a>> {
    component
        .properties
        .iter()
        .filter(move |p| p.name.as_str().eq_ignore_ascii_case(name))
}

/// First property named `name`.
fn property<'c, 'a>(component: &'c Component<'a>, name: &'c str) -> Option<&'c Property<'a>> {
    properties(component, name).next()
}

/// Value of the parameter `name`; blank values count as absent.
fn param<'p>(property: &'p Property<'_>, name: &str) -> Option<&'p str> {
    property
        .params
        .iter()
        .find(|p| p.key.as_str().eq_ignore_ascii_case(name))
        .and_then(|p| p.val.as_ref())
        .map(|v| v.as_str().trim().trim_matches('"').trim())
        .filter(|v| !v.is_empty())
}

/// Reads an unescaped TEXT property; blank values count as absent.
fn text(component: &Component<'_>, name: &str) -> Option<String> {
    property(component, name)
        .map(|p| values::unescape_text(p.val.as_str()).trim().to_string())
        .filter(|s| !s.is_empty())
}

fn single_value(property: &Property<'_>) -> Option<DateTimeValue> {
    date_time_value(property, property.val.as_str())
}

/// Reads every comma-separated value of a list property such as EXDATE.
fn value_list(property: &Property<'_>) -> Vec<DateTimeValue> {
    property
        .val
        .as_str()
        .split(',')
        .filter(|raw| !raw.trim().is_empty())
        .filter_map(|raw| {
            let parsed = date_time_value(property, raw);
            if parsed.is_none() {
                warn!(value = raw, "ignoring unreadable {} value", property.name.as_str());
            }
            parsed
        })
        .collect()
}

fn date_time_value(property: &Property<'_>, raw: &str) -> Option<DateTimeValue> {
    let raw = raw.trim();
    let is_date = param(property, "VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
        || raw.len() == 8;
    if is_date {
        return values::parse_date(raw).map(DateTimeValue::date);
    }

    let (naive, is_utc) = values::parse_date_time(raw)?;
    let tzid = if is_utc {
        Some("UTC".to_string())
    } else {
        param(property, "TZID").map(str::to_string)
    };
    Some(DateTimeValue::date_time(naive, tzid))
}
