//! Single-event import.

use std::path::Path;

use feedcal_core::{LocalZone, ResolvedOccurrence};
use feedcal_providers::import_single_event;
use tracing::info;

use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::output;

/// Reads the one event held by the file at `path`.
pub async fn load(path: &Path, zone: LocalZone) -> ClientResult<ResolvedOccurrence> {
    let raw = tokio::fs::read_to_string(path).await?;
    let occurrence = import_single_event(&raw, zone)?;
    info!(path = %path.display(), id = %occurrence.id, "imported event");
    Ok(occurrence)
}

/// Prints the event held by the file at `path`.
pub async fn run(config: &ClientConfig, path: &Path, json: bool) -> ClientResult<()> {
    let zone = config.local_zone()?;
    let occurrence = load(path, zone).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&occurrence)?);
    } else {
        println!("{}", output::format_occurrence(&occurrence, &zone));
    }
    Ok(())
}
