//! Activity Module
//!
//! Keeps the session's last-activity timestamp fresh and enforces the idle
//! timeout from a background check task.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::session::SessionStore;

/// Cadence of the idle-timeout check. Expiry detection itself is based on
/// elapsed wall-clock time, so a late tick still catches it.
pub const ACTIVITY_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Forwards user-interaction pings into the session store and watches for
/// idle expiry.
///
/// The frontend reports document-level interaction (pointer press, pointer
/// move, key press, scroll, touch start) through `record`; each ping
/// refreshes the session's activity timestamp unthrottled. The watcher task
/// is a scoped resource: started explicitly, stopped via `stop` or on drop.
pub struct ActivityTracker {
    session: Arc<Mutex<SessionStore>>,
    check_interval: Duration,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ActivityTracker {
    pub fn new(session: Arc<Mutex<SessionStore>>) -> Self {
        Self::with_interval(session, ACTIVITY_CHECK_INTERVAL)
    }

    pub fn with_interval(session: Arc<Mutex<SessionStore>>, check_interval: Duration) -> Self {
        Self {
            session,
            check_interval,
            watcher: Mutex::new(None),
        }
    }

    /// Record one user interaction.
    pub fn record(&self) {
        if let Ok(mut session) = self.session.lock() {
            session.update_activity();
        }
    }

    /// Start the periodic timeout check. `on_expired` runs once per detected
    /// expiry; the caller uses it to send the user back to the login view.
    pub fn start<F>(&self, on_expired: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let Ok(mut slot) = self.watcher.lock() else {
            return;
        };
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        let session = self.session.clone();
        let check_interval = self.check_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let expired = match session.lock() {
                    Ok(mut session) => session.check_timeout(),
                    Err(_) => false,
                };

                if expired {
                    info!("Idle timeout reached, redirecting to login");
                    on_expired();
                }
            }
        });

        *slot = Some(handle);
        debug!("Activity watcher started");
    }

    /// Stop the timeout check task.
    pub fn stop(&self) {
        if let Ok(mut slot) = self.watcher.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
                debug!("Activity watcher stopped");
            }
        }
    }
}

impl Drop for ActivityTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionConfig, SessionStore};
    use crate::storage::MemoryStore;

    fn session_with_timeout(idle_timeout_ms: i64) -> Arc<Mutex<SessionStore>> {
        let config = SessionConfig {
            idle_timeout_ms,
            ..SessionConfig::default()
        };
        Arc::new(Mutex::new(SessionStore::with_config(
            Arc::new(MemoryStore::new()),
            config,
        )))
    }

    #[tokio::test]
    async fn watcher_fires_on_expired_once_the_idle_window_passes() {
        let session = session_with_timeout(30);
        session
            .lock()
            .unwrap()
            .authenticate("Ultr@S3Cr3t@!@#");

        let tracker = ActivityTracker::with_interval(session.clone(), Duration::from_millis(20));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tracker.start(move || {
            let _ = tx.send(());
        });

        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("expiry was never reported");
        assert!(!session.lock().unwrap().is_authenticated());
    }

    #[tokio::test]
    async fn activity_pings_keep_the_session_alive() {
        let session = session_with_timeout(120);
        session
            .lock()
            .unwrap()
            .authenticate("Ultr@S3Cr3t@!@#");

        let tracker = ActivityTracker::with_interval(session.clone(), Duration::from_millis(10));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tracker.start(move || {
            let _ = tx.send(());
        });

        // Keep pinging for longer than the idle window.
        for _ in 0..10 {
            tracker.record();
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        assert!(rx.try_recv().is_err());
        assert!(session.lock().unwrap().is_authenticated());
    }

    #[tokio::test]
    async fn stop_releases_the_watcher() {
        let session = session_with_timeout(10);
        session
            .lock()
            .unwrap()
            .authenticate("Ultr@S3Cr3t@!@#");

        let tracker = ActivityTracker::with_interval(session.clone(), Duration::from_millis(10));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tracker.start(move || {
            let _ = tx.send(());
        });
        tracker.stop();

        // Drain anything that slipped in before the stop.
        tokio::time::sleep(Duration::from_millis(50)).await;
        while rx.try_recv().is_ok() {}

        // A live watcher would report this expiry; a stopped one must not.
        session.lock().unwrap().authenticate("Ultr@S3Cr3t@!@#");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
        assert!(session.lock().unwrap().is_authenticated());
    }
}
