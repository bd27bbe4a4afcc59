//! Configuration commands.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);

    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    config.validate()?;

    let enabled = config.enabled_sources().count();
    if enabled == 0 {
        println!("warning: no enabled sources");
    }
    println!(
        "Configuration is valid ({} sources, {} enabled).",
        config.sources.len(),
        enabled
    );
    Ok(())
}

/// Show the configuration and snapshot file paths.
pub fn path(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    println!("config: {}", path.display());
    println!("snapshot: {}", config.snapshot_path().display());
    Ok(())
}
