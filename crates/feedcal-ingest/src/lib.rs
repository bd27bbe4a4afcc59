//! Ingestion cache: snapshot persistence, staleness policy, refresh scheduling.
//!
//! This crate owns the merged occurrence list of every enabled source:
//! - Cache-first startup from a persisted snapshot
//! - Staleness and source-set checks deciding when to refetch
//! - A single in-flight fetch cycle with atomic list replacement
//! - Periodic refresh on a timer
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use feedcal_core::CalendarSource;
//! use feedcal_ingest::{IngestConfig, IngestionCache};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IngestConfig::new(30)?.with_snapshot_path("/tmp/feedcal.json");
//!     let fetcher = Arc::new(config.build_fetcher()?);
//!     let cache = IngestionCache::new(config, fetcher);
//!
//!     let sources = [CalendarSource::new("https://example.com/cal.ics", "Work")];
//!     let events = cache.fetch_all(&sources, false).await;
//!     println!("{} events", events.len());
//!     Ok(())
//! }
//! ```

mod cache;
mod config;
mod error;
mod scheduler;
mod snapshot;

pub use cache::{FetchOutcome, IngestionCache};
pub use config::{DEFAULT_REFRESH_MINUTES, IngestConfig};
pub use error::{IngestError, IngestResult};
pub use scheduler::{
    RefreshCommand, RefreshHandle, RefreshScheduler, RefreshState, SharedRefreshState,
};
pub use snapshot::{CacheSnapshot, SnapshotSource, SnapshotStore};
