//! Persisted copy of the last successful ingestion.
//!
//! The file is a single JSON object:
//!
//! ```json
//! {"timestamp": 1741597200000, "sources": [{"url": "...", "name": "..."}], "events": [...]}
//! ```
//!
//! `timestamp` is epoch milliseconds, read from an integer or a float;
//! event instants are RFC 3339 strings.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use feedcal_core::{CalendarSource, ResolvedOccurrence};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::{IngestError, IngestResult};

/// A source as recorded in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSource {
    pub url: String,
    pub name: String,
}

impl From<&CalendarSource> for SnapshotSource {
    fn from(source: &CalendarSource) -> Self {
        Self {
            url: source.url.clone(),
            name: source.name.clone(),
        }
    }
}

/// The merged occurrence list of one ingestion cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// When the cycle completed, in epoch milliseconds.
    #[serde(deserialize_with = "epoch_millis")]
    pub timestamp: i64,
    /// The enabled sources the cycle fetched.
    #[serde(default)]
    pub sources: Vec<SnapshotSource>,
    /// Every occurrence the cycle produced.
    pub events: Vec<ResolvedOccurrence>,
}

impl CacheSnapshot {
    /// Records a completed cycle.
    pub fn new(
        fetched_at: DateTime<Utc>,
        sources: &[CalendarSource],
        events: Vec<ResolvedOccurrence>,
    ) -> Self {
        Self {
            timestamp: fetched_at.timestamp_millis(),
            sources: sources.iter().map(SnapshotSource::from).collect(),
            events,
        }
    }

    /// The completion instant, if the timestamp is representable.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// Whether the snapshot was taken from exactly these sources.
    pub fn matches_sources(&self, enabled: &[CalendarSource]) -> bool {
        let recorded: HashSet<&str> = self.sources.iter().map(|s| s.url.as_str()).collect();
        let wanted: HashSet<&str> = enabled.iter().map(|s| s.url.as_str()).collect();
        recorded == wanted
    }
}

/// Reads epoch milliseconds written as an integer or as a float.
///
/// Fractions are truncated. Floats beyond `i64` saturate and are then
/// rejected as out of range on load.
fn epoch_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Millis {
        Integer(i64),
        Float(f64),
    }

    Ok(match Millis::deserialize(deserializer)? {
        Millis::Integer(ms) => ms,
        Millis::Float(ms) => ms as i64,
    })
}

/// Reads and writes the snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Creates a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot. A missing file is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not a snapshot, or
    /// carries an unusable timestamp.
    pub async fn load(&self) -> IngestResult<Option<CacheSnapshot>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot: CacheSnapshot = serde_json::from_str(&text)?;
        if snapshot.fetched_at().is_none() {
            return Err(IngestError::invalid_snapshot(format!(
                "timestamp {} out of range",
                snapshot.timestamp
            )));
        }

        debug!(
            path = %self.path.display(),
            events = snapshot.events.len(),
            "loaded snapshot"
        );
        Ok(Some(snapshot))
    }

    /// Writes the snapshot, replacing any previous one.
    ///
    /// The file is written next to its final location and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or any file operation fails.
    pub async fn save(&self, snapshot: &CacheSnapshot) -> IngestResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(
            path = %self.path.display(),
            events = snapshot.events.len(),
            "saved snapshot"
        );
        Ok(())
    }
}
