//! The ingestion cache.
//!
//! [`IngestionCache`] owns the merged occurrence list of all enabled sources
//! and decides when it must be rebuilt. One fetch cycle runs at a time; the
//! list is swapped whole once every source has finished, so readers see
//! either the previous list or the new one.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, NaiveDate, Utc};
use feedcal_core::{CalendarSource, ResolvedOccurrence, TimeWindow, sort_by_start};
use feedcal_providers::{
    FeedFetcher, NormalizeOptions, fetch_source, log_fetch_failure, normalize_feed,
};
use futures_util::future::join_all;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::snapshot::{CacheSnapshot, SnapshotStore};

/// What a call to [`IngestionCache::refresh`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Every enabled source was fetched.
    Fetched {
        /// Occurrences in the new list.
        events: usize,
        /// Names of sources that failed and contributed nothing.
        failed_sources: Vec<String>,
    },
    /// The in-memory list was still fresh.
    Fresh,
    /// A persisted snapshot was adopted; a background refresh is pending.
    Snapshot {
        /// Occurrences in the adopted list.
        events: usize,
    },
    /// Another cycle was running; nothing changed.
    InFlight,
    /// No source is enabled; the list was cleared.
    NoSources,
}

impl FetchOutcome {
    /// Whether every source failed in a cycle that fetched at least one.
    pub fn all_failed(&self, enabled: usize) -> bool {
        matches!(self, Self::Fetched { failed_sources, .. } if enabled > 0 && failed_sources.len() == enabled)
    }
}

#[derive(Debug, Default)]
struct CacheState {
    events: Arc<Vec<ResolvedOccurrence>>,
    /// Keys of the sources the current list was built from.
    sources: HashSet<String>,
    last_fetch: Option<DateTime<Utc>>,
    snapshot_checked: bool,
}

struct Inner {
    config: IngestConfig,
    fetcher: Arc<dyn FeedFetcher>,
    store: Option<SnapshotStore>,
    state: RwLock<CacheState>,
    in_flight: AtomicBool,
    background: Mutex<Option<JoinHandle<()>>>,
}

/// Clears the in-flight flag when a cycle ends, including on cancellation.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Shared handle to the cached occurrence list.
///
/// Cloning is cheap; every clone sees the same state.
#[derive(Clone)]
pub struct IngestionCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for IngestionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionCache")
            .field("config", &self.inner.config)
            .field("fetching", &self.is_fetching())
            .finish_non_exhaustive()
    }
}

impl IngestionCache {
    /// Creates an empty cache.
    pub fn new(config: IngestConfig, fetcher: Arc<dyn FeedFetcher>) -> Self {
        let store = config.snapshot_path.clone().map(SnapshotStore::new);
        Self {
            inner: Arc::new(Inner {
                config,
                fetcher,
                store,
                state: RwLock::new(CacheState::default()),
                in_flight: AtomicBool::new(false),
                background: Mutex::new(None),
            }),
        }
    }

    /// The configuration the cache was built with.
    pub fn config(&self) -> &IngestConfig {
        &self.inner.config
    }

    /// Whether a fetch cycle is running.
    pub fn is_fetching(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// When the current list was fetched.
    pub async fn last_fetch(&self) -> Option<DateTime<Utc>> {
        self.inner.state.read().await.last_fetch
    }

    /// The current list, sorted by start.
    pub async fn events(&self) -> Arc<Vec<ResolvedOccurrence>> {
        Arc::clone(&self.inner.state.read().await.events)
    }

    /// Returns the occurrences of all enabled `sources`, refreshing first
    /// when required.
    ///
    /// Never fails: sources that cannot be fetched or parsed contribute
    /// nothing and are logged.
    pub async fn fetch_all(
        &self,
        sources: &[CalendarSource],
        force: bool,
    ) -> Vec<ResolvedOccurrence> {
        self.refresh(sources, force).await;
        self.events().await.as_ref().clone()
    }

    /// Brings the list up to date and reports what happened.
    pub async fn refresh(&self, sources: &[CalendarSource], force: bool) -> FetchOutcome {
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(force, "fetch already in flight");
            return FetchOutcome::InFlight;
        }
        let _guard = InFlightGuard(&self.inner.in_flight);

        let enabled: Vec<CalendarSource> = sources.iter().filter(|s| s.enabled).cloned().collect();
        if enabled.is_empty() {
            let mut state = self.inner.state.write().await;
            state.events = Arc::new(Vec::new());
            state.sources.clear();
            info!("no enabled sources, cleared events");
            return FetchOutcome::NoSources;
        }

        if !force && let Some(events) = self.adopt_snapshot(&enabled).await {
            self.schedule_background_refresh(enabled);
            return FetchOutcome::Snapshot { events };
        }

        if !force && !self.refresh_required(&enabled).await {
            debug!("events are fresh");
            return FetchOutcome::Fresh;
        }

        self.fetch_sources(&enabled).await
    }

    /// Occurrences belonging on local calendar day `date`, ascending by start.
    pub async fn events_on_date(&self, date: NaiveDate) -> Vec<ResolvedOccurrence> {
        let zone = self.inner.config.local_zone;
        let day = TimeWindow::for_date(date, &zone);
        self.events_between(day.start, day.end)
            .await
            .into_iter()
            .filter(|e| e.falls_on(date, &zone))
            .collect()
    }

    /// Occurrences sharing any instant with `[start, end]`, ascending by start.
    pub async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<ResolvedOccurrence> {
        let events = self.events().await;
        events
            .iter()
            .filter(|e| e.overlaps(start, end))
            .cloned()
            .collect()
    }

    /// Waits for a pending background refresh to finish.
    pub async fn wait_background(&self) {
        let Some(handle) = self.take_background() else {
            return;
        };
        if let Err(e) = handle.await
            && !e.is_cancelled()
        {
            warn!(error = %e, "background refresh task failed");
        }
    }

    /// Cancels a pending background refresh.
    pub fn shutdown(&self) {
        if let Some(handle) = self.take_background() {
            handle.abort();
            debug!("background refresh cancelled");
        }
    }

    /// Loads the snapshot on the first call with an empty list.
    async fn adopt_snapshot(&self, enabled: &[CalendarSource]) -> Option<usize> {
        let store = self.inner.store.as_ref()?;
        {
            let mut state = self.inner.state.write().await;
            if state.snapshot_checked || !state.events.is_empty() {
                return None;
            }
            state.snapshot_checked = true;
        }

        let snapshot = match store.load().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!(path = %store.path().display(), "no snapshot");
                return None;
            }
            Err(e) => {
                warn!(path = %store.path().display(), error = %e, "ignoring unreadable snapshot");
                return None;
            }
        };

        if !snapshot.matches_sources(enabled) {
            info!("snapshot was taken from other sources, ignoring it");
            return None;
        }

        let count = snapshot.events.len();
        let mut events = snapshot.events;
        sort_by_start(&mut events);

        let mut state = self.inner.state.write().await;
        state.last_fetch = DateTime::from_timestamp_millis(snapshot.timestamp);
        state.sources = snapshot.sources.into_iter().map(|s| s.url).collect();
        state.events = Arc::new(events);
        info!(events = count, "adopted snapshot");
        Some(count)
    }

    async fn refresh_required(&self, enabled: &[CalendarSource]) -> bool {
        let state = self.inner.state.read().await;

        if state.events.is_empty() {
            debug!("no events in memory");
            return true;
        }

        let Some(last_fetch) = state.last_fetch else {
            return true;
        };
        let age = Utc::now().signed_duration_since(last_fetch);
        if age
            .to_std()
            .is_ok_and(|age| age >= self.inner.config.refresh_interval)
        {
            debug!(age_secs = age.num_seconds(), "events are stale");
            return true;
        }

        if sources_mismatch(&state, enabled) {
            info!("enabled sources changed");
            return true;
        }

        false
    }

    async fn fetch_sources(&self, enabled: &[CalendarSource]) -> FetchOutcome {
        let options = NormalizeOptions::for_today(self.inner.config.local_zone);
        info!(sources = enabled.len(), "fetching feeds");

        let results = join_all(enabled.iter().map(|source| self.fetch_one(source, &options))).await;

        let mut failed_sources = Vec::new();
        let mut events = Vec::new();
        for (source, result) in enabled.iter().zip(results) {
            match result {
                Some(occurrences) => events.extend(occurrences),
                None => failed_sources.push(source.name.clone()),
            }
        }
        sort_by_start(&mut events);

        let now = Utc::now();
        let snapshot = CacheSnapshot::new(now, enabled, events.clone());
        let count = events.len();
        {
            let mut state = self.inner.state.write().await;
            state.events = Arc::new(events);
            state.sources = enabled.iter().map(|s| s.url.clone()).collect();
            state.last_fetch = Some(now);
            state.snapshot_checked = true;
        }
        info!(events = count, failed = failed_sources.len(), "fetch complete");

        if let Some(store) = &self.inner.store
            && let Err(e) = store.save(&snapshot).await
        {
            warn!(path = %store.path().display(), error = %e, "failed to persist snapshot");
        }

        FetchOutcome::Fetched {
            events: count,
            failed_sources,
        }
    }

    /// `None` when the source could not be fetched.
    async fn fetch_one(
        &self,
        source: &CalendarSource,
        options: &NormalizeOptions,
    ) -> Option<Vec<ResolvedOccurrence>> {
        match fetch_source(self.inner.fetcher.as_ref(), source).await {
            Ok(text) => {
                let occurrences = normalize_feed(&text, source, options);
                debug!(source = %source.name, count = occurrences.len(), "normalized feed");
                Some(occurrences)
            }
            Err(e) => {
                log_fetch_failure(source, &e);
                None
            }
        }
    }

    fn schedule_background_refresh(&self, sources: Vec<CalendarSource>) {
        let delay = self.inner.config.background_refresh_delay;
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let cache = IngestionCache { inner };
            match cache.refresh(&sources, false).await {
                FetchOutcome::Fetched { failed_sources, .. } if !failed_sources.is_empty() => {
                    warn!(failed = ?failed_sources, "background refresh incomplete");
                }
                outcome => debug!(?outcome, "background refresh done"),
            }
        });

        if let Some(previous) = self.replace_background(handle) {
            previous.abort();
        }
    }

    fn replace_background(&self, handle: JoinHandle<()>) -> Option<JoinHandle<()>> {
        match self.inner.background.lock() {
            Ok(mut slot) => slot.replace(handle),
            Err(poisoned) => poisoned.into_inner().replace(handle),
        }
    }

    fn take_background(&self) -> Option<JoinHandle<()>> {
        match self.inner.background.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = match self.background.get_mut() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

/// True when an event's source is no longer enabled, or an enabled source
/// was not part of the cycle that built the list.
fn sources_mismatch(state: &CacheState, enabled: &[CalendarSource]) -> bool {
    let wanted: HashSet<&str> = enabled.iter().map(|s| s.url.as_str()).collect();

    let stray = state
        .events
        .iter()
        .any(|e| !wanted.contains(e.source_id.as_str()));
    let missing = wanted.iter().any(|url| {
        !state.sources.contains(*url) && !state.events.iter().any(|e| e.source_id == *url)
    });
    stray || missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use chrono::TimeZone;
    use feedcal_core::LocalZone;
    use feedcal_providers::{BoxFuture, FeedResponse, ProviderError, ProviderResult};
    use tokio::sync::Notify;

    /// Serves canned feeds, counts calls, and can hold every call until
    /// released.
    #[derive(Default)]
    struct FakeFetcher {
        feeds: Mutex<HashMap<String, String>>,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
        entered: Arc<Notify>,
    }

    impl FakeFetcher {
        fn with_feed(self, url: &str, body: String) -> Self {
            self.feeds.lock().unwrap().insert(url.to_string(), body);
            self
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FeedFetcher for FakeFetcher {
        fn fetch<'a>(&'a self, location: &'a str) -> BoxFuture<'a, ProviderResult<FeedResponse>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.entered.notify_one();
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
                let body = self.feeds.lock().unwrap().get(location).cloned();
                match body {
                    Some(text) => Ok(FeedResponse::ok(text)),
                    None => Err(ProviderError::not_found(location)),
                }
            })
        }
    }

    const WORK: &str = "https://example.com/work.ics";
    const HOME: &str = "https://example.com/home.ics";

    /// A feed with one timed event tomorrow, so it stays inside the window.
    fn feed(uid: &str, summary: &str) -> String {
        let start = Utc::now().date_naive() + chrono::Days::new(1);
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:{uid}\r\nSUMMARY:{summary}\r\n\
DTSTART:{d}T090000Z\r\nDTEND:{d}T100000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
            d = start.format("%Y%m%d")
        )
    }

    fn config() -> IngestConfig {
        IngestConfig::default()
            .with_local_zone(LocalZone::Named(chrono_tz::UTC))
            .with_background_refresh_delay(Duration::from_millis(20))
    }

    fn cache(fetcher: Arc<FakeFetcher>, config: IngestConfig) -> IngestionCache {
        IngestionCache::new(config, fetcher)
    }

    fn work() -> CalendarSource {
        CalendarSource::new(WORK, "Work")
    }

    fn home() -> CalendarSource {
        CalendarSource::new(HOME, "Home")
    }

    fn two_feeds() -> FakeFetcher {
        FakeFetcher::default()
            .with_feed(WORK, feed("w-1", "Standup"))
            .with_feed(HOME, feed("h-1", "Groceries"))
    }

    #[tokio::test]
    async fn second_call_is_served_from_memory() {
        let fetcher = Arc::new(two_feeds());
        let cache = cache(fetcher.clone(), config());

        let first = cache.fetch_all(&[work(), home()], false).await;
        let second = cache.fetch_all(&[work(), home()], false).await;

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), 2);
        assert!(cache.last_fetch().await.is_some());
    }

    #[tokio::test]
    async fn forced_refresh_refetches() {
        let fetcher = Arc::new(two_feeds());
        let cache = cache(fetcher.clone(), config());

        cache.fetch_all(&[work()], false).await;
        let outcome = cache.refresh(&[work()], true).await;

        assert_eq!(
            outcome,
            FetchOutcome::Fetched {
                events: 1,
                failed_sources: vec![]
            }
        );
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn elapsed_interval_refetches() {
        let fetcher = Arc::new(two_feeds());
        let cache = cache(fetcher.clone(), config().with_refresh_interval(Duration::ZERO));

        cache.fetch_all(&[work()], false).await;
        cache.fetch_all(&[work()], false).await;
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn source_change_refetches_within_interval() {
        let fetcher = Arc::new(two_feeds());
        let cache = cache(fetcher.clone(), config());

        let before = cache.fetch_all(&[work(), home().with_enabled(false)], false).await;
        assert!(before.iter().all(|e| e.source_id == WORK));

        let after = cache.fetch_all(&[work().with_enabled(false), home()], false).await;
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].source, "Home");
        assert_eq!(after[0].title, "Groceries");
    }

    #[tokio::test]
    async fn empty_source_does_not_force_refetch() {
        let fetcher = Arc::new(
            FakeFetcher::default()
                .with_feed(WORK, feed("w-1", "Standup"))
                .with_feed(HOME, "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n".to_string()),
        );
        let cache = cache(fetcher.clone(), config());

        cache.fetch_all(&[work(), home()], false).await;
        cache.fetch_all(&[work(), home()], false).await;
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn failing_source_does_not_blank_others() {
        let fetcher = Arc::new(FakeFetcher::default().with_feed(WORK, feed("w-1", "Standup")));
        let cache = cache(fetcher, config());

        let outcome = cache.refresh(&[work(), home()], false).await;
        assert_eq!(
            outcome,
            FetchOutcome::Fetched {
                events: 1,
                failed_sources: vec!["Home".to_string()]
            }
        );
        assert!(!outcome.all_failed(2));
        assert_eq!(cache.events().await.len(), 1);
    }

    #[tokio::test]
    async fn call_during_fetch_returns_current_list() {
        let gate = Arc::new(Notify::new());
        let fetcher = Arc::new(two_feeds().gated(gate.clone()));
        let cache = cache(fetcher.clone(), config());

        let running = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.fetch_all(&[work()], false).await })
        };
        fetcher.entered.notified().await;
        assert!(cache.is_fetching());

        assert_eq!(cache.refresh(&[work()], true).await, FetchOutcome::InFlight);
        assert!(cache.fetch_all(&[work()], true).await.is_empty());

        gate.notify_one();
        let events = running.await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(!cache.is_fetching());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn cancelled_fetch_releases_guard() {
        let gate = Arc::new(Notify::new());
        let fetcher = Arc::new(two_feeds().gated(gate));
        let cache = cache(fetcher.clone(), config());

        let running = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.fetch_all(&[work()], false).await })
        };
        fetcher.entered.notified().await;
        running.abort();
        let _ = running.await;

        assert!(!cache.is_fetching());
    }

    #[tokio::test]
    async fn no_enabled_sources_clears_events() {
        let fetcher = Arc::new(two_feeds());
        let cache = cache(fetcher.clone(), config());

        cache.fetch_all(&[work()], false).await;
        assert_eq!(cache.events().await.len(), 1);

        let outcome = cache.refresh(&[work().with_enabled(false)], false).await;
        assert_eq!(outcome, FetchOutcome::NoSources);
        assert!(cache.events().await.is_empty());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn persists_snapshot_after_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let cache = cache(Arc::new(two_feeds()), config().with_snapshot_path(&path));

        cache.fetch_all(&[work(), home()], false).await;

        let saved = SnapshotStore::new(&path).load().await.unwrap().unwrap();
        assert_eq!(saved.events.len(), 2);
        assert!(saved.matches_sources(&[work(), home()]));
    }

    #[tokio::test]
    async fn persist_failure_keeps_events() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let config = config().with_snapshot_path(blocker.join("snapshot.json"));
        let cache = cache(Arc::new(two_feeds()), config);

        let events = cache.fetch_all(&[work()], false).await;
        assert_eq!(events.len(), 1);
    }

    mod snapshot_load {
        use super::*;

        async fn seed(path: &std::path::Path, sources: &[CalendarSource], age: chrono::Duration) {
            let start = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
            let event = ResolvedOccurrence::new("cached", "Cached", start, start)
                .with_source(&sources[0]);
            let snapshot = CacheSnapshot::new(Utc::now() - age, sources, vec![event]);
            SnapshotStore::new(path).save(&snapshot).await.unwrap();
        }

        #[tokio::test]
        async fn adopts_snapshot_without_fetching() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("snapshot.json");
            seed(&path, &[work()], chrono::Duration::minutes(1)).await;

            let fetcher = Arc::new(two_feeds());
            let cache = cache(
                fetcher.clone(),
                config()
                    .with_snapshot_path(&path)
                    .with_background_refresh_delay(Duration::from_secs(3600)),
            );

            assert_eq!(
                cache.refresh(&[work()], false).await,
                FetchOutcome::Snapshot { events: 1 }
            );
            let events = cache.events().await;
            assert_eq!(events[0].id, "cached");
            assert_eq!(fetcher.calls(), 0);

            cache.shutdown();
        }

        #[tokio::test]
        async fn stale_snapshot_is_refreshed_in_background() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("snapshot.json");
            seed(&path, &[work()], chrono::Duration::hours(2)).await;

            let fetcher = Arc::new(two_feeds());
            let cache = cache(fetcher.clone(), config().with_snapshot_path(&path));

            let first = cache.fetch_all(&[work()], false).await;
            assert_eq!(first[0].id, "cached");

            cache.wait_background().await;
            assert_eq!(fetcher.calls(), 1);
            let refreshed = cache.events().await;
            assert_eq!(refreshed.len(), 1);
            assert_eq!(refreshed[0].title, "Standup");
        }

        #[tokio::test]
        async fn fresh_snapshot_background_refresh_is_a_no_op() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("snapshot.json");
            seed(&path, &[work()], chrono::Duration::minutes(1)).await;

            let fetcher = Arc::new(two_feeds());
            let cache = cache(fetcher.clone(), config().with_snapshot_path(&path));

            cache.fetch_all(&[work()], false).await;
            cache.wait_background().await;
            assert_eq!(fetcher.calls(), 0);
            assert_eq!(cache.events().await[0].id, "cached");
        }

        #[tokio::test]
        async fn snapshot_from_other_sources_is_ignored() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("snapshot.json");
            seed(&path, &[home()], chrono::Duration::minutes(1)).await;

            let fetcher = Arc::new(two_feeds());
            let cache = cache(fetcher.clone(), config().with_snapshot_path(&path));

            let events = cache.fetch_all(&[work()], false).await;
            assert_eq!(fetcher.calls(), 1);
            assert_eq!(events[0].title, "Standup");
        }

        #[tokio::test]
        async fn corrupt_snapshot_is_a_cache_miss() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("snapshot.json");
            std::fs::write(&path, "{ truncated").unwrap();

            let fetcher = Arc::new(two_feeds());
            let cache = cache(fetcher.clone(), config().with_snapshot_path(&path));

            let events = cache.fetch_all(&[work()], false).await;
            assert_eq!(events.len(), 1);
            assert_eq!(fetcher.calls(), 1);
        }

        #[tokio::test]
        async fn forced_call_skips_snapshot() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("snapshot.json");
            seed(&path, &[work()], chrono::Duration::minutes(1)).await;

            let fetcher = Arc::new(two_feeds());
            let cache = cache(fetcher.clone(), config().with_snapshot_path(&path));

            let events = cache.fetch_all(&[work()], true).await;
            assert_eq!(events[0].title, "Standup");
            assert_eq!(fetcher.calls(), 1);
        }
    }

    mod queries {
        use super::*;

        fn utc(d: u32, h: u32) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2025, 3, d, h, 0, 0).unwrap()
        }

        async fn seeded(events: Vec<ResolvedOccurrence>) -> IngestionCache {
            let cache = cache(Arc::new(FakeFetcher::default()), config());
            let mut state = cache.inner.state.write().await;
            let mut events = events;
            sort_by_start(&mut events);
            state.events = Arc::new(events);
            drop(state);
            cache
        }

        fn date(d: u32) -> NaiveDate {
            NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
        }

        #[tokio::test]
        async fn events_on_date_uses_day_intersection() {
            let cache = seeded(vec![
                ResolvedOccurrence::new("late", "Late", utc(10, 15), utc(10, 16)),
                ResolvedOccurrence::new("early", "Early", utc(10, 8), utc(10, 9)),
                ResolvedOccurrence::new("overnight", "Overnight", utc(9, 22), utc(10, 2)),
                ResolvedOccurrence::new("until-midnight", "Until", utc(9, 20), utc(10, 0)),
                ResolvedOccurrence::new("other-day", "Other", utc(11, 8), utc(11, 9)),
            ])
            .await;

            let ids: Vec<_> = cache
                .events_on_date(date(10))
                .await
                .into_iter()
                .map(|e| e.id)
                .collect();
            assert_eq!(ids, ["overnight", "early", "late"]);
        }

        #[tokio::test]
        async fn events_between_is_inclusive() {
            let cache = seeded(vec![
                ResolvedOccurrence::new("a", "A", utc(10, 8), utc(10, 9)),
                ResolvedOccurrence::new("b", "B", utc(10, 12), utc(10, 13)),
            ])
            .await;

            let hits = cache.events_between(utc(10, 9), utc(10, 12)).await;
            assert_eq!(hits.len(), 2);
            assert!(cache.events_between(utc(10, 10), utc(10, 11)).await.is_empty());
        }
    }
}
