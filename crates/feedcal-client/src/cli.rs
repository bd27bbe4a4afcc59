//! Command-line interface definition.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// feedcal - iCalendar feeds at a glance
#[derive(Debug, Parser)]
#[command(name = "feedcal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "FEEDCAL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch every enabled source and list upcoming events
    Fetch {
        /// Refetch even if the cached events are fresh
        #[arg(long, short)]
        force: bool,
    },

    /// List the events of one day (today by default)
    Day {
        /// Day to show, as YYYY-MM-DD
        date: Option<NaiveDate>,

        /// Refetch even if the cached events are fresh
        #[arg(long, short)]
        force: bool,
    },

    /// Read a single-event .ics file
    Import {
        /// The file to import
        path: PathBuf,
    },

    /// Refresh on a timer until interrupted
    Watch,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
