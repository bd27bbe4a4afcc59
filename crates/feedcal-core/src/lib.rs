//! Core types: occurrences, sources, local time arithmetic, tracing

pub mod event;
pub mod time;
pub mod tracing;

pub use event::{CalendarSource, ResolvedOccurrence, sort_by_start};
pub use time::{LocalZone, TimeWindow, resolve_wall_clock};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
