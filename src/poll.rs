//! Polling Module
//!
//! Generic interval-based data refresher with manual refresh, an
//! at-most-one-winner guard for overlapping fetches, and scoped teardown.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Refresh cadence used when a consumer does not pick its own.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Observable output of a poller.
///
/// `data` always holds the last successful result; a failed fetch leaves it
/// untouched and surfaces a message in `error` instead. `last_update` is set
/// only on success.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollState<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub loading: bool,
    pub last_update: Option<i64>,
}

impl<T> Default for PollState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            loading: false,
            last_update: None,
        }
    }
}

type FetchFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;
type FetchFn<T> = Arc<dyn Fn() -> FetchFuture<T> + Send + Sync>;

/// Periodically re-runs a fetch operation and publishes the latest outcome.
///
/// Automatic refreshes and manual `refresh` calls share one attempt counter:
/// whichever attempt started last is the only one whose outcome becomes
/// visible. A superseded fetch writes nothing, not even its error.
pub struct Poller<T: Clone + Send + Sync + 'static> {
    fetch: FetchFn<T>,
    interval: Duration,
    enabled: Arc<AtomicBool>,
    attempt: Arc<AtomicU64>,
    state_tx: Arc<watch::Sender<PollState<T>>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Clone + Send + Sync + 'static> Poller<T> {
    /// Poller with the default interval, enabled.
    pub fn new<F, Fut, E>(fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::fmt::Display,
    {
        Self::with_options(fetch, DEFAULT_POLL_INTERVAL, true)
    }

    pub fn with_interval<F, Fut, E>(fetch: F, interval: Duration) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::fmt::Display,
    {
        Self::with_options(fetch, interval, true)
    }

    pub fn with_options<F, Fut, E>(fetch: F, interval: Duration, enabled: bool) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::fmt::Display,
    {
        let fetch: FetchFn<T> = Arc::new(move || {
            let fut = fetch();
            Box::pin(async move { fut.await.map_err(|e| e.to_string()) }) as FetchFuture<T>
        });
        let (state_tx, _) = watch::channel(PollState::default());

        Self {
            fetch,
            interval,
            enabled: Arc::new(AtomicBool::new(enabled)),
            attempt: Arc::new(AtomicU64::new(0)),
            state_tx: Arc::new(state_tx),
            ticker: Mutex::new(None),
        }
    }

    /// Start the automatic refresh task. The first fetch fires immediately,
    /// then one per interval; each cycle is awaited before the next, so the
    /// automatic path never overlaps itself. No-op while disabled or with a
    /// zero interval.
    pub fn start(&self) {
        if !self.enabled.load(Ordering::SeqCst) || self.interval.is_zero() {
            return;
        }

        let Ok(mut slot) = self.ticker.lock() else {
            return;
        };
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        let fetch = self.fetch.clone();
        let enabled = self.enabled.clone();
        let attempt = self.attempt.clone();
        let state_tx = self.state_tx.clone();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if !enabled.load(Ordering::SeqCst) {
                    break;
                }
                run_attempt(&fetch, &enabled, &attempt, &state_tx).await;
            }
        });

        *slot = Some(handle);
    }

    /// Fetch once, out of band. Shares the supersede guard with the
    /// automatic path, so an older in-flight fetch loses to this one.
    pub async fn refresh(&self) {
        run_attempt(&self.fetch, &self.enabled, &self.attempt, &self.state_tx).await;
    }

    /// Stop polling and discard any in-flight fetch outcome. After this call
    /// no state update is published until the poller is re-enabled.
    pub fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        // Invalidate whatever is in flight.
        self.attempt.fetch_add(1, Ordering::SeqCst);

        if let Ok(mut slot) = self.ticker.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        if enabled {
            self.enabled.store(true, Ordering::SeqCst);
            self.start();
        } else {
            self.stop();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<PollState<T>> {
        self.state_tx.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PollState<T> {
        self.state_tx.borrow().clone()
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for Poller<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_attempt<T: Clone + Send + Sync>(
    fetch: &FetchFn<T>,
    enabled: &AtomicBool,
    attempt: &AtomicU64,
    state_tx: &watch::Sender<PollState<T>>,
) {
    let token = attempt.fetch_add(1, Ordering::SeqCst) + 1;

    state_tx.send_modify(|s| {
        s.loading = true;
        s.error = None;
    });

    let result = fetch().await;

    // Only the most recently started attempt may publish its outcome.
    if attempt.load(Ordering::SeqCst) != token {
        debug!("Discarding superseded fetch result");
        return;
    }
    if !enabled.load(Ordering::SeqCst) {
        return;
    }

    match result {
        Ok(data) => state_tx.send_modify(|s| {
            s.data = Some(data);
            s.loading = false;
            s.last_update = Some(chrono::Utc::now().timestamp_millis());
        }),
        Err(e) => {
            warn!("Poll fetch failed: {}", e);
            state_tx.send_modify(|s| {
                s.error = Some(e);
                s.loading = false;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn counting_poller(interval: Duration) -> (Arc<AtomicU64>, Poller<u64>) {
        let calls = Arc::new(AtomicU64::new(0));
        let fetch = {
            let calls = calls.clone();
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok::<u64, String>(n) }
            }
        };
        (calls, Poller::with_interval(fetch, interval))
    }

    #[tokio::test(start_paused = true)]
    async fn automatic_refresh_fires_immediately_then_per_interval() {
        let (calls, poller) = counting_poller(Duration::from_secs(30));

        poller.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(poller.state().data, Some(1));
        assert!(!poller.state().loading);

        // Nothing more before the interval elapses.
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(poller.state().data, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn later_refresh_wins_even_if_the_earlier_one_resolves_last() {
        let calls = Arc::new(AtomicU64::new(0));
        let fetch = {
            let calls = calls.clone();
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    // The first fetch is slow, the second fast.
                    let delay = if n == 1 { 100 } else { 10 };
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Ok::<_, Infallible>(n)
                }
            }
        };
        let poller = Arc::new(Poller::with_options(fetch, Duration::from_secs(3600), true));

        let first = {
            let poller = poller.clone();
            tokio::spawn(async move { poller.refresh().await })
        };
        // Let the first fetch get in flight before superseding it.
        tokio::time::sleep(Duration::from_millis(1)).await;
        let second = {
            let poller = poller.clone();
            tokio::spawn(async move { poller.refresh().await })
        };

        second.await.unwrap();
        first.await.unwrap();

        let state = poller.state();
        assert_eq!(state.data, Some(2), "stale result overwrote newer state");
        assert!(state.error.is_none());
        assert!(!state.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_reports_error_and_keeps_data() {
        let calls = Arc::new(AtomicU64::new(0));
        let fetch = {
            let calls = calls.clone();
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n == 1 {
                        Ok(42u64)
                    } else {
                        Err("connection refused".to_string())
                    }
                }
            }
        };
        let poller = Arc::new(Poller::with_interval(fetch, Duration::from_secs(5)));

        poller.refresh().await;
        assert_eq!(poller.state().data, Some(42));
        let first_update = poller.state().last_update;
        assert!(first_update.is_some());

        poller.refresh().await;
        let state = poller.state();
        assert_eq!(state.data, Some(42));
        assert_eq!(state.error.as_deref(), Some("connection refused"));
        assert_eq!(state.last_update, first_update);
    }

    #[tokio::test(start_paused = true)]
    async fn error_clears_at_the_start_of_the_next_attempt() {
        let calls = Arc::new(AtomicU64::new(0));
        let fetch = {
            let calls = calls.clone();
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n == 1 {
                        Err("boom".to_string())
                    } else {
                        Ok(7u64)
                    }
                }
            }
        };
        let poller = Poller::with_interval(fetch, Duration::from_secs(5));

        poller.refresh().await;
        assert_eq!(poller.state().error.as_deref(), Some("boom"));

        poller.refresh().await;
        let state = poller.state();
        assert!(state.error.is_none());
        assert_eq!(state.data, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_automatic_refreshes() {
        let (calls, poller) = counting_poller(Duration::from_secs(10));

        poller.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        poller.stop();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!poller.is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_the_in_flight_outcome() {
        let fetch = move || async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, Infallible>(1u64)
        };
        let poller = Arc::new(Poller::with_interval(fetch, Duration::from_secs(3600)));

        let in_flight = {
            let poller = poller.clone();
            tokio::spawn(async move { poller.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        poller.stop();

        in_flight.await.unwrap();
        let state = poller.state();
        assert_eq!(state.data, None);
        assert!(state.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn reenabling_resumes_polling() {
        let (calls, poller) = counting_poller(Duration::from_secs(10));

        poller.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        poller.set_enabled(false);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        poller.set_enabled(true);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_disables_the_automatic_path() {
        let (calls, poller) = counting_poller(Duration::ZERO);

        poller.start();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Manual refresh still works.
        poller.refresh().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
