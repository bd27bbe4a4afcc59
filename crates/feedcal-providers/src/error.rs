//! Error types for feed ingestion.
//!
//! Every error in this module is scoped to a single feed: the ingestion
//! layer logs it and carries on with the remaining sources.

use std::fmt;
use thiserror::Error;

/// The category of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// The feed text is not valid iCalendar data.
    ParseError,
    /// The feed could not be retrieved (connection failure, unreadable file).
    FetchError,
    /// The remote server answered with a non-200 status.
    HttpStatus,
    /// A local feed file does not exist.
    NotFound,
    /// A timezone identifier could not be resolved.
    TimezoneResolution,
    /// A recurrence rule could not be interpreted.
    RecurrenceRule,
    /// The caller supplied unusable input (bad source url, bad import file).
    InvalidInput,
    /// Unexpected internal state.
    InternalError,
}

impl ProviderErrorCode {
    /// Returns true if the failure is transient and a later refresh may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchError | Self::HttpStatus)
    }

    /// Returns a stable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParseError => "parse_error",
            Self::FetchError => "fetch_error",
            Self::HttpStatus => "http_status",
            Self::NotFound => "not_found",
            Self::TimezoneResolution => "timezone_resolution",
            Self::RecurrenceRule => "recurrence_rule",
            Self::InvalidInput => "invalid_input",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised while fetching or interpreting one feed.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// Display name of the feed involved, if known.
    feed: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates a new provider error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            feed: None,
            source: None,
        }
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ParseError, message)
    }

    /// Creates a fetch error.
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::FetchError, message)
    }

    /// Creates an error for a non-200 HTTP answer.
    pub fn http_status(status: u16) -> Self {
        Self::new(
            ProviderErrorCode::HttpStatus,
            format!("unexpected HTTP status {}", status),
        )
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NotFound, message)
    }

    /// Creates a timezone resolution error.
    pub fn timezone(tzid: &str) -> Self {
        Self::new(
            ProviderErrorCode::TimezoneResolution,
            format!("unknown timezone '{}'", tzid),
        )
    }

    /// Creates a recurrence rule error.
    pub fn recurrence(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RecurrenceRule, message)
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidInput, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Sets the feed name for this error.
    pub fn with_feed(mut self, feed: impl Into<String>) -> Self {
        self.feed = Some(feed.into());
        self
    }

    /// Sets the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the feed name, if set.
    pub fn feed(&self) -> Option<&str> {
        self.feed.as_deref()
    }

    /// Returns true if a later refresh may succeed.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref feed) = self.feed {
            write!(f, "[{}] ", feed)?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<crate::feed::ParseError> for ProviderError {
    fn from(err: crate::feed::ParseError) -> Self {
        Self::parse(err.to_string()).with_source(err)
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
