//! Periodic refresh of the ingestion cache.
//!
//! [`RefreshScheduler`] refreshes once on start, then every interval, and
//! accepts on-demand refreshes through a [`RefreshHandle`]. It stops on
//! [`RefreshCommand::Stop`] or when every handle is dropped, cancelling the
//! cache's pending background work on the way out.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use feedcal_core::CalendarSource;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::cache::{FetchOutcome, IngestionCache};

/// Commands that can be sent to the scheduler.
#[derive(Debug, Clone)]
pub enum RefreshCommand {
    /// Refresh now. `force` bypasses the staleness check.
    RefreshNow { force: bool },
    /// Stop the scheduler.
    Stop,
}

/// What the scheduler has done so far.
#[derive(Debug, Clone, Default)]
pub struct RefreshState {
    /// Number of refreshes run.
    pub refreshes: u32,
    /// When the last refresh finished.
    pub last_refresh: Option<DateTime<Utc>>,
    /// Outcome of the last refresh.
    pub last_outcome: Option<FetchOutcome>,
}

/// Shared scheduler state.
pub type SharedRefreshState = Arc<RwLock<RefreshState>>;

/// Drives [`IngestionCache::refresh`] on a timer.
pub struct RefreshScheduler {
    cache: IngestionCache,
    sources: Vec<CalendarSource>,
    interval: Duration,
    state: SharedRefreshState,
    command_tx: mpsc::Sender<RefreshCommand>,
    command_rx: mpsc::Receiver<RefreshCommand>,
}

impl RefreshScheduler {
    /// Creates a scheduler refreshing `sources` at the cache's configured
    /// interval.
    pub fn new(cache: IngestionCache, sources: Vec<CalendarSource>) -> Self {
        let interval = cache.config().refresh_interval;
        let (command_tx, command_rx) = mpsc::channel(16);
        Self {
            cache,
            sources,
            interval,
            state: Arc::new(RwLock::new(RefreshState::default())),
            command_tx,
            command_rx,
        }
    }

    /// Builder: override the tick interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Returns a handle for sending commands to the scheduler.
    pub fn handle(&self) -> RefreshHandle {
        RefreshHandle {
            command_tx: self.command_tx.clone(),
            state: self.state.clone(),
        }
    }

    /// Runs until stopped.
    pub async fn run(self) {
        self.run_with(|_| {}).await;
    }

    /// Runs until stopped, calling `on_refresh` after every refresh.
    pub async fn run_with<F>(self, on_refresh: F)
    where
        F: Fn(&FetchOutcome) + Send + Sync,
    {
        let Self {
            cache,
            sources,
            interval,
            state,
            command_tx,
            mut command_rx,
        } = self;
        // Only handles keep the channel open from here on.
        drop(command_tx);

        info!(
            interval_secs = interval.as_secs(),
            sources = sources.len(),
            "refresh scheduler started"
        );

        let refresh = |force: bool| {
            let cache = &cache;
            let sources = &sources;
            let state = &state;
            let on_refresh = &on_refresh;
            async move {
                let outcome = cache.refresh(sources, force).await;
                if outcome.all_failed(sources.iter().filter(|s| s.enabled).count()) {
                    warn!("every source failed to refresh");
                }
                on_refresh(&outcome);
                let mut state = state.write().await;
                state.refreshes += 1;
                state.last_refresh = Some(Utc::now());
                state.last_outcome = Some(outcome);
            }
        };

        refresh(false).await;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    debug!("refresh interval elapsed");
                    refresh(true).await;
                }
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(RefreshCommand::RefreshNow { force }) => {
                            debug!(force, "received RefreshNow command");
                            refresh(force).await;
                        }
                        Some(RefreshCommand::Stop) | None => {
                            info!("refresh scheduler stopping");
                            break;
                        }
                    }
                }
            }
        }

        cache.shutdown();
    }
}

/// Handle for sending commands to a running scheduler.
#[derive(Clone, Debug)]
pub struct RefreshHandle {
    command_tx: mpsc::Sender<RefreshCommand>,
    state: SharedRefreshState,
}

impl RefreshHandle {
    /// Triggers a refresh.
    pub async fn refresh_now(
        &self,
        force: bool,
    ) -> Result<(), mpsc::error::SendError<RefreshCommand>> {
        self.command_tx
            .send(RefreshCommand::RefreshNow { force })
            .await
    }

    /// Stops the scheduler.
    pub async fn stop(&self) -> Result<(), mpsc::error::SendError<RefreshCommand>> {
        self.command_tx.send(RefreshCommand::Stop).await
    }

    /// Returns the current scheduler state.
    pub async fn state(&self) -> RefreshState {
        self.state.read().await.clone()
    }
}
