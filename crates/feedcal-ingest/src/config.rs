//! Ingestion configuration.

use std::path::PathBuf;
use std::time::Duration;

use feedcal_core::LocalZone;
use feedcal_providers::fetch::DEFAULT_TIMEOUT;
use feedcal_providers::{DEFAULT_USER_AGENT, HttpFetcher, LocalFetcher, SourceFetcher};

use crate::error::{IngestError, IngestResult};

/// Default refresh interval in minutes.
pub const DEFAULT_REFRESH_MINUTES: u32 = 30;

/// Ingestion configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Minimum age of the in-memory list before a non-forced call refetches.
    pub refresh_interval: Duration,

    /// Where the snapshot is persisted. `None` disables persistence.
    pub snapshot_path: Option<PathBuf>,

    /// Delay before the background refresh that follows a snapshot load.
    pub background_refresh_delay: Duration,

    /// Zone for floating times, all-day events and day queries.
    pub local_zone: LocalZone,

    /// Root for vault-relative local sources.
    pub vault_root: Option<PathBuf>,

    /// User agent for remote fetches.
    pub user_agent: String,

    /// Timeout for a single remote fetch.
    pub request_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            refresh_interval: minutes(DEFAULT_REFRESH_MINUTES),
            snapshot_path: None,
            background_refresh_delay: Duration::from_secs(2),
            local_zone: LocalZone::System,
            vault_root: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl IngestConfig {
    /// Creates a configuration refreshing every `refresh_interval_minutes`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the interval is zero.
    pub fn new(refresh_interval_minutes: u32) -> IngestResult<Self> {
        Self::default().with_refresh_interval_minutes(refresh_interval_minutes)
    }

    /// Builder: set the refresh interval in minutes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the interval is zero.
    pub fn with_refresh_interval_minutes(mut self, value: u32) -> IngestResult<Self> {
        if value == 0 {
            return Err(IngestError::config(
                "refresh interval must be at least one minute",
            ));
        }
        self.refresh_interval = minutes(value);
        Ok(self)
    }

    /// Builder: set the refresh interval directly.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Builder: set the snapshot path.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Builder: set the background refresh delay.
    pub fn with_background_refresh_delay(mut self, delay: Duration) -> Self {
        self.background_refresh_delay = delay;
        self
    }

    /// Builder: set the local zone.
    pub fn with_local_zone(mut self, zone: LocalZone) -> Self {
        self.local_zone = zone;
        self
    }

    /// Builder: set the vault root.
    pub fn with_vault_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.vault_root = Some(root.into());
        self
    }

    /// Builder: set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Builder: set the remote request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builds the fetcher this configuration describes.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn build_fetcher(&self) -> IngestResult<SourceFetcher> {
        let http = HttpFetcher::new(&self.user_agent, self.request_timeout)?;
        let local = LocalFetcher::new(self.vault_root.clone());
        Ok(SourceFetcher::new(http, local))
    }
}

fn minutes(value: u32) -> Duration {
    Duration::from_secs(u64::from(value) * 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = IngestConfig::default();
        assert_eq!(config.refresh_interval, Duration::from_secs(30 * 60));
        assert_eq!(config.background_refresh_delay, Duration::from_secs(2));
        assert!(config.snapshot_path.is_none());
        assert_eq!(config.local_zone, LocalZone::System);
        assert!(config.user_agent.starts_with("feedcal/"));
    }

    #[test]
    fn custom_config() {
        let config = IngestConfig::new(5)
            .unwrap()
            .with_snapshot_path("/tmp/snapshot.json")
            .with_background_refresh_delay(Duration::from_millis(10))
            .with_local_zone(LocalZone::Named(chrono_tz::Europe::Berlin))
            .with_vault_root("/vault")
            .with_user_agent("test/1.0");

        assert_eq!(config.refresh_interval, Duration::from_secs(300));
        assert_eq!(config.snapshot_path, Some(PathBuf::from("/tmp/snapshot.json")));
        assert_eq!(config.background_refresh_delay, Duration::from_millis(10));
        assert_eq!(config.vault_root, Some(PathBuf::from("/vault")));
        assert_eq!(config.user_agent, "test/1.0");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = IngestConfig::new(0).unwrap_err();
        assert!(matches!(err, IngestError::Config { .. }));
    }

    #[test]
    fn builds_fetcher() {
        assert!(IngestConfig::default().build_fetcher().is_ok());
    }
}
