//! Command implementations.

pub mod config;
pub mod day;
pub mod fetch;
pub mod import;
pub mod watch;

use std::sync::Arc;

use feedcal_core::{CalendarSource, LocalZone};
use feedcal_ingest::{FetchOutcome, IngestionCache};

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// A cache wired to the configured sources.
#[derive(Debug, Clone)]
pub struct Session {
    pub cache: IngestionCache,
    pub sources: Vec<CalendarSource>,
    pub zone: LocalZone,
}

impl Session {
    /// Builds the cache described by `config`.
    pub fn open(config: &ClientConfig) -> ClientResult<Self> {
        let ingest = config.ingest_config()?;
        let zone = ingest.local_zone;
        let fetcher = Arc::new(ingest.build_fetcher()?);
        Ok(Self {
            cache: IngestionCache::new(ingest, fetcher),
            sources: config.sources.clone(),
            zone,
        })
    }

    /// Refreshes the cache, telling the user when a forced refresh failed.
    pub async fn refresh(&self, force: bool) -> FetchOutcome {
        let outcome = self.cache.refresh(&self.sources, force).await;
        match &outcome {
            FetchOutcome::Fetched { failed_sources, .. } if force && !failed_sources.is_empty() => {
                eprintln!(
                    "warning: could not refresh {}; run with --debug for details",
                    failed_sources.join(", ")
                );
            }
            FetchOutcome::NoSources => eprintln!("warning: no enabled sources configured"),
            _ => {}
        }
        outcome
    }

    /// Lets a pending background refresh complete before exit.
    pub async fn finish(&self) {
        self.cache.wait_background().await;
    }
}

/// One-line summary of a refresh.
pub fn describe(outcome: &FetchOutcome) -> String {
    match outcome {
        FetchOutcome::Fetched {
            events,
            failed_sources,
        } if failed_sources.is_empty() => format!("refreshed: {} events", events),
        FetchOutcome::Fetched {
            events,
            failed_sources,
        } => format!(
            "refreshed: {} events ({} failed: {})",
            events,
            failed_sources.len(),
            failed_sources.join(", ")
        ),
        FetchOutcome::Fresh => "up to date".to_string(),
        FetchOutcome::Snapshot { events } => format!("loaded {} events from snapshot", events),
        FetchOutcome::InFlight => "refresh already running".to_string(),
        FetchOutcome::NoSources => "no enabled sources".to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_outcomes() {
        assert_eq!(
            describe(&FetchOutcome::Fetched {
                events: 3,
                failed_sources: vec![]
            }),
            "refreshed: 3 events"
        );
        assert_eq!(
            describe(&FetchOutcome::Fetched {
                events: 1,
                failed_sources: vec!["Home".to_string()]
            }),
            "refreshed: 1 events (1 failed: Home)"
        );
        assert_eq!(describe(&FetchOutcome::Fresh), "up to date");
    }

    #[tokio::test]
    async fn session_reads_local_source() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::open(&testing::config_in(dir.path())).unwrap();

        let outcome = session.refresh(false).await;
        assert_eq!(
            outcome,
            FetchOutcome::Fetched {
                events: 1,
                failed_sources: vec![]
            }
        );
        assert!(dir.path().join("snapshot.json").exists());
    }
}
