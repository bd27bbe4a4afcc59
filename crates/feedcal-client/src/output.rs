//! Terminal and JSON rendering of occurrences.

use feedcal_core::{LocalZone, ResolvedOccurrence};

use crate::error::ClientResult;

/// Formats one occurrence as a single line in `zone`.
///
/// `2025-03-10 09:00-10:00  Standup  [Work] @ Room 1`
pub fn format_occurrence(occurrence: &ResolvedOccurrence, zone: &LocalZone) -> String {
    let start = zone.wall_clock(occurrence.start);
    let span = if occurrence.is_all_day {
        "all-day".to_string()
    } else {
        let end = zone.wall_clock(occurrence.end);
        format!("{}-{}", start.format("%H:%M"), end.format("%H:%M"))
    };

    let mut line = format!("{} {:<11}  {}", start.format("%Y-%m-%d"), span, occurrence.title);
    if !occurrence.source.is_empty() {
        line.push_str(&format!("  [{}]", occurrence.source));
    }
    if let Some(location) = occurrence.location.as_deref().filter(|l| !l.is_empty()) {
        line.push_str(&format!(" @ {}", location));
    }
    line
}

/// Renders a list as text lines, or as a JSON array.
pub fn render(
    occurrences: &[ResolvedOccurrence],
    zone: &LocalZone,
    json: bool,
    empty_text: &str,
) -> ClientResult<String> {
    if json {
        return Ok(serde_json::to_string_pretty(occurrences)?);
    }
    if occurrences.is_empty() {
        return Ok(empty_text.to_string());
    }
    Ok(occurrences
        .iter()
        .map(|o| format_occurrence(o, zone))
        .collect::<Vec<_>>()
        .join("\n"))
}
