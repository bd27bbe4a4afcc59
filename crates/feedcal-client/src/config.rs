//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/feedcal/config.toml` by default:
//!
//! ```toml
//! refresh_interval_minutes = 30
//! timezone = "Europe/Berlin"
//! vault_root = "/home/me/notes"
//!
//! [[sources]]
//! url = "https://example.com/work.ics"
//! name = "Work"
//! color = "#3b82f6"
//!
//! [[sources]]
//! url = "calendars/family.ics"
//! name = "Family"
//! enabled = false
//! ```

use std::path::{Path, PathBuf};

use feedcal_core::{CalendarSource, LocalZone};
use feedcal_ingest::{DEFAULT_REFRESH_MINUTES, IngestConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Configuration for the feedcal client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Minutes between refreshes.
    pub refresh_interval_minutes: u32,

    /// IANA zone for day boundaries and floating times. Unset means the
    /// system zone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// Root for relative source paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_root: Option<PathBuf>,

    /// Snapshot file. Unset means `$XDG_DATA_HOME/feedcal/snapshot.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,

    /// Calendar feeds.
    pub sources: Vec<CalendarSource>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            refresh_interval_minutes: DEFAULT_REFRESH_MINUTES,
            timezone: None,
            vault_root: None,
            snapshot_path: None,
            sources: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if the file
    /// does not exist.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> ClientResult<Self> {
        toml::from_str(content)
            .map_err(|e| ClientError::Config(format!("failed to parse config: {}", e)))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("feedcal")
    }

    /// Returns the default data directory path.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("feedcal")
    }

    /// The snapshot file in use.
    pub fn snapshot_path(&self) -> PathBuf {
        self.snapshot_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join("snapshot.json"))
    }

    /// The configured zone.
    pub fn local_zone(&self) -> ClientResult<LocalZone> {
        match self.timezone.as_deref() {
            None => Ok(LocalZone::System),
            Some(name) => LocalZone::parse(name)
                .ok_or_else(|| ClientError::Config(format!("unknown timezone: {}", name))),
        }
    }

    /// Sources taking part in ingestion.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &CalendarSource> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Checks the settings the cache depends on.
    pub fn validate(&self) -> ClientResult<()> {
        if self.refresh_interval_minutes == 0 {
            return Err(ClientError::Config(
                "refresh_interval_minutes must be greater than zero".to_string(),
            ));
        }
        self.local_zone()?;
        if let Some(index) = self.sources.iter().position(|s| s.url.trim().is_empty()) {
            return Err(ClientError::Config(format!(
                "source #{} has an empty url",
                index + 1
            )));
        }
        Ok(())
    }

    /// Builds the cache configuration.
    pub fn ingest_config(&self) -> ClientResult<IngestConfig> {
        self.validate()?;
        let mut config = IngestConfig::new(self.refresh_interval_minutes)?
            .with_local_zone(self.local_zone()?)
            .with_snapshot_path(self.snapshot_path());
        if let Some(root) = &self.vault_root {
            config = config.with_vault_root(root);
        }
        Ok(config)
    }
}
