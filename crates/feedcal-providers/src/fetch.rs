//! Retrieval of raw feed text.
//!
//! A [`FeedFetcher`] turns a source location into a [`FeedResponse`]
//! (status + text). [`SourceFetcher`] routes by the shape of the location:
//! `http(s)://` and `webcal://` go to [`HttpFetcher`], everything else
//! (absolute path, `file://` URL, vault-relative path) to [`LocalFetcher`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use feedcal_core::CalendarSource;
use reqwest::Client;
use reqwest::header::ACCEPT;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{ProviderError, ProviderResult};

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// User agent sent with every remote request.
pub const DEFAULT_USER_AGENT: &str = concat!("feedcal/", env!("CARGO_PKG_VERSION"));

/// Default timeout for remote requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw result of reading one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedResponse {
    /// HTTP status, or 200 for a successful local read.
    pub status: u16,
    /// Body text.
    pub text: String,
}

impl FeedResponse {
    /// A successful response.
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            status: 200,
            text: text.into(),
        }
    }

    /// Whether the response carries usable feed text.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Reads feed text from a location.
pub trait FeedFetcher: Send + Sync {
    /// Fetches the feed at `location`.
    ///
    /// Transport failures are errors; a non-200 answer is returned as a
    /// response so the caller can report its status.
    fn fetch<'a>(&'a self, location: &'a str) -> BoxFuture<'a, ProviderResult<FeedResponse>>;
}

/// Where a source location points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `http://`, `https://` or `webcal://`.
    Remote,
    /// A filesystem path or `file://` URL.
    Local,
}

impl SourceKind {
    /// Classifies a source location.
    pub fn of(location: &str) -> Self {
        let lower = location.trim().to_ascii_lowercase();
        if ["http://", "https://", "webcal://", "webcals://"]
            .iter()
            .any(|scheme| lower.starts_with(scheme))
        {
            Self::Remote
        } else {
            Self::Local
        }
    }
}

/// Rewrites `webcal://` to `https://`; other locations are returned as-is.
pub fn http_url(location: &str) -> String {
    let trimmed = location.trim();
    for scheme in ["webcal://", "webcals://"] {
        if trimmed.len() >= scheme.len() && trimmed[..scheme.len()].eq_ignore_ascii_case(scheme) {
            return format!("https://{}", &trimmed[scheme.len()..]);
        }
    }
    trimmed.to_string()
}

/// Fetches remote feeds over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher sending `user_agent` and giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the HTTP client cannot be built.
    pub fn new(user_agent: &str, timeout: Duration) -> ProviderResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::internal(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Creates a fetcher with [`DEFAULT_USER_AGENT`] and [`DEFAULT_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns an internal error if the HTTP client cannot be built.
    pub fn with_defaults() -> ProviderResult<Self> {
        Self::new(DEFAULT_USER_AGENT, DEFAULT_TIMEOUT)
    }

    async fn get(&self, location: &str) -> ProviderResult<FeedResponse> {
        let url = http_url(location);
        trace!(url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "text/calendar")
            .send()
            .await
            .map_err(|e| ProviderError::fetch(format!("request to {} failed: {}", url, e)).with_source(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::fetch(format!("failed to read response: {}", e)).with_source(e))?;

        debug!(url = %url, status = %status, bytes = text.len(), "fetched remote feed");
        Ok(FeedResponse {
            status: status.as_u16(),
            text,
        })
    }
}

impl FeedFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, location: &'a str) -> BoxFuture<'a, ProviderResult<FeedResponse>> {
        Box::pin(self.get(location))
    }
}

/// Reads feeds from the local filesystem.
///
/// Relative paths are resolved against the vault root, or against the
/// working directory when no vault root is set.
#[derive(Debug, Clone, Default)]
pub struct LocalFetcher {
    vault_root: Option<PathBuf>,
}

impl LocalFetcher {
    /// Creates a fetcher resolving relative paths against `vault_root`.
    pub fn new(vault_root: Option<PathBuf>) -> Self {
        Self { vault_root }
    }

    /// Maps a location to a filesystem path.
    ///
    /// # Errors
    ///
    /// Returns an invalid input error for a malformed `file://` URL.
    pub fn resolve_path(&self, location: &str) -> ProviderResult<PathBuf> {
        let location = location.trim();
        if location.len() >= 7 && location[..7].eq_ignore_ascii_case("file://") {
            let url = Url::parse(location)
                .map_err(|e| ProviderError::invalid_input(format!("invalid file URL '{}': {}", location, e)))?;
            return url
                .to_file_path()
                .map_err(|()| ProviderError::invalid_input(format!("not a local file URL: {}", location)));
        }

        let path = Path::new(location);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        Ok(match &self.vault_root {
            Some(root) => root.join(path),
            None => path.to_path_buf(),
        })
    }

    async fn read(&self, location: &str) -> ProviderResult<FeedResponse> {
        let path = self.resolve_path(location)?;
        trace!(path = %path.display(), "reading local feed");

        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                debug!(path = %path.display(), bytes = text.len(), "read local feed");
                Ok(FeedResponse::ok(text))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ProviderError::not_found(format!("{} does not exist", path.display())).with_source(e))
            }
            Err(e) => Err(
                ProviderError::fetch(format!("failed to read {}: {}", path.display(), e)).with_source(e),
            ),
        }
    }
}

impl FeedFetcher for LocalFetcher {
    fn fetch<'a>(&'a self, location: &'a str) -> BoxFuture<'a, ProviderResult<FeedResponse>> {
        Box::pin(self.read(location))
    }
}

/// Routes each location to the remote or local fetcher.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    http: HttpFetcher,
    local: LocalFetcher,
}

impl SourceFetcher {
    /// Creates a router over the given fetchers.
    pub fn new(http: HttpFetcher, local: LocalFetcher) -> Self {
        Self { http, local }
    }
}

impl FeedFetcher for SourceFetcher {
    fn fetch<'a>(&'a self, location: &'a str) -> BoxFuture<'a, ProviderResult<FeedResponse>> {
        match SourceKind::of(location) {
            SourceKind::Remote => self.http.fetch(location),
            SourceKind::Local => self.local.fetch(location),
        }
    }
}

/// Fetches a source's feed text, treating any non-200 status as an error.
///
/// # Errors
///
/// Returns the fetcher's error, or an HTTP status error, tagged with the
/// source name.
pub async fn fetch_source(fetcher: &dyn FeedFetcher, source: &CalendarSource) -> ProviderResult<String> {
    let response = fetcher
        .fetch(&source.url)
        .await
        .map_err(|e| e.with_feed(source.name.clone()))?;

    if !response.is_success() {
        return Err(ProviderError::http_status(response.status).with_feed(source.name.clone()));
    }
    Ok(response.text)
}

/// Logs a failed fetch. Remote failures include a platform snapshot.
pub fn log_fetch_failure(source: &CalendarSource, error: &ProviderError) {
    match SourceKind::of(&source.url) {
        SourceKind::Remote => warn!(
            source = %source.name,
            url = %source.url,
            error = %error,
            retryable = error.is_retryable(),
            os = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            family = std::env::consts::FAMILY,
            "failed to fetch remote feed"
        ),
        SourceKind::Local => warn!(
            source = %source.name,
            path = %source.url,
            error = %error,
            "failed to read local feed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use std::io::Write;

    struct FixedFetcher(FeedResponse);

    impl FeedFetcher for FixedFetcher {
        fn fetch<'a>(&'a self, _location: &'a str) -> BoxFuture<'a, ProviderResult<FeedResponse>> {
            Box::pin(async move { Ok(self.0.clone()) })
        }
    }

    #[test]
    fn classifies_locations() {
        assert_eq!(SourceKind::of("https://example.com/a.ics"), SourceKind::Remote);
        assert_eq!(SourceKind::of("HTTP://example.com/a.ics"), SourceKind::Remote);
        assert_eq!(SourceKind::of("webcal://example.com/a.ics"), SourceKind::Remote);
        assert_eq!(SourceKind::of("/home/me/cal.ics"), SourceKind::Local);
        assert_eq!(SourceKind::of("file:///home/me/cal.ics"), SourceKind::Local);
        assert_eq!(SourceKind::of("calendars/work.ics"), SourceKind::Local);
    }

    #[test]
    fn webcal_is_rewritten() {
        assert_eq!(http_url("webcal://example.com/a.ics"), "https://example.com/a.ics");
        assert_eq!(http_url("https://example.com/a.ics"), "https://example.com/a.ics");
    }

    #[test]
    fn user_agent_names_the_crate() {
        assert!(DEFAULT_USER_AGENT.starts_with("feedcal/"));
        assert!(HttpFetcher::with_defaults().is_ok());
    }

    #[test]
    fn resolves_local_paths() {
        let fetcher = LocalFetcher::new(Some(PathBuf::from("/vault")));
        assert_eq!(
            fetcher.resolve_path("calendars/work.ics").unwrap(),
            PathBuf::from("/vault/calendars/work.ics")
        );
        assert_eq!(fetcher.resolve_path("/abs/cal.ics").unwrap(), PathBuf::from("/abs/cal.ics"));
        assert_eq!(
            fetcher.resolve_path("file:///abs/cal.ics").unwrap(),
            PathBuf::from("/abs/cal.ics")
        );
    }

    #[tokio::test]
    async fn reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("team.ics")).unwrap();
        file.write_all(b"BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n").unwrap();

        let fetcher = LocalFetcher::new(Some(dir.path().to_path_buf()));
        let response = fetcher.fetch("team.ics").await.unwrap();
        assert!(response.is_success());
        assert!(response.text.starts_with("BEGIN:VCALENDAR"));
    }

    #[tokio::test]
    async fn missing_local_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = LocalFetcher::new(Some(dir.path().to_path_buf()));
        let err = fetcher.fetch("missing.ics").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NotFound);
    }

    #[tokio::test]
    async fn non_200_is_an_error() {
        let fetcher = FixedFetcher(FeedResponse {
            status: 503,
            text: "maintenance".to_string(),
        });
        let source = CalendarSource::new("https://example.com/a.ics", "Work");
        let err = fetch_source(&fetcher, &source).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::HttpStatus);
        assert_eq!(err.feed(), Some("Work"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn success_returns_text() {
        let fetcher = FixedFetcher(FeedResponse::ok("BEGIN:VCALENDAR"));
        let source = CalendarSource::new("https://example.com/a.ics", "Work");
        assert_eq!(fetch_source(&fetcher, &source).await.unwrap(), "BEGIN:VCALENDAR");
    }
}
