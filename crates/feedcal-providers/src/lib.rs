//! Feed ingestion pipeline.
//!
//! This crate turns raw iCalendar feeds into [`ResolvedOccurrence`]s:
//!
//! - [`parse_feed`] - `VEVENT` extraction into [`EventDefinition`]s via the `icalendar` parser
//! - [`TimezoneResolver`] - TZID lookup (IANA and Windows names) and DST-aware resolution
//! - [`RecurrenceExpander`] - Bounded RRULE expansion with EXDATE and override handling
//! - [`normalize_feed`] - The per-source pipeline
//! - [`FeedFetcher`] - Remote and local retrieval of feed text
//!
//! # Architecture
//!
//! ```text
//!   FeedFetcher ──► raw text
//!                      │
//!                      ▼ parse_feed()
//!              ┌──────────────────┐
//!              │ EventDefinition  │──── overrides ───► ExceptionMap
//!              └────────┬─────────┘                        │
//!                       │ RecurrenceExpander ◄─────────────┘
//!                       │ TimezoneResolver
//!                       ▼
//!              ┌──────────────────┐
//!              │ResolvedOccurrence│  (tagged with source)
//!              └──────────────────┘
//! ```
//!
//! [`ResolvedOccurrence`]: feedcal_core::ResolvedOccurrence

pub mod definition;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod import;
pub mod normalize;
pub mod recurrence;
pub mod timezone;
pub mod values;

pub use definition::{DateTimeValue, EventDefinition, EventStatus};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use feed::{ParseError, ParseResult, parse_feed};
pub use fetch::{
    BoxFuture, DEFAULT_USER_AGENT, FeedFetcher, FeedResponse, HttpFetcher, LocalFetcher,
    SourceFetcher, SourceKind, fetch_source, log_fetch_failure,
};
pub use import::{ImportError, import_single_event};
pub use normalize::{NormalizeOptions, normalize_definitions, normalize_feed};
pub use recurrence::{ExceptionMap, OverrideKey, RecurrenceException, RecurrenceExpander};
pub use timezone::{TimezoneResolver, lookup_zone};
