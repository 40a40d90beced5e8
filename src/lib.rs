//! Statement Console Desktop Library
//!
//! Core modules for the statement admin console companion app.

pub mod activity;
pub mod api;
pub mod commands;
pub mod guard;
pub mod logging;
pub mod poll;
pub mod session;
pub mod storage;

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use activity::ActivityTracker;
use api::{ApiClient, DashboardMetrics, ImportJob, NotificationItem};
use guard::RouteGuard;
use poll::{Poller, DEFAULT_POLL_INTERVAL};
use session::SessionStore;
use storage::StateStore;

/// Refresh cadence for the dashboard metric cards.
pub const DASHBOARD_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Refresh cadence for the active import-job list. Job status changes fast
/// while a file is being processed, so this one polls tighter.
pub const IMPORTS_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Refresh cadence for admin notifications.
pub const NOTIFICATIONS_POLL_INTERVAL: Duration = DEFAULT_POLL_INTERVAL;

/// Application state shared across commands
pub struct AppState {
    pub session: Arc<Mutex<SessionStore>>,
    pub storage: Arc<dyn StateStore>,
    pub api: ApiClient,
    pub activity: ActivityTracker,
    pub guard: RouteGuard,
    pub dashboard: Poller<DashboardMetrics>,
    pub imports: Poller<Vec<ImportJob>>,
    pub notifications: Poller<Vec<NotificationItem>>,
    pub monitors_started: AtomicBool,
}

impl AppState {
    pub fn new(storage: Arc<dyn StateStore>, api: ApiClient) -> Self {
        let session = Arc::new(Mutex::new(SessionStore::new(storage.clone())));
        let activity = ActivityTracker::new(session.clone());
        let guard = RouteGuard::new(session.clone());

        let dashboard = {
            let api = api.clone();
            Poller::with_interval(
                move || {
                    let api = api.clone();
                    async move { api.fetch_dashboard_metrics().await }
                },
                DASHBOARD_POLL_INTERVAL,
            )
        };

        let imports = {
            let api = api.clone();
            Poller::with_interval(
                move || {
                    let api = api.clone();
                    async move { api.fetch_active_imports().await }
                },
                IMPORTS_POLL_INTERVAL,
            )
        };

        let notifications = {
            let api = api.clone();
            Poller::with_interval(
                move || {
                    let api = api.clone();
                    async move { api.fetch_notifications().await }
                },
                NOTIFICATIONS_POLL_INTERVAL,
            )
        };

        Self {
            session,
            storage,
            api,
            activity,
            guard,
            dashboard,
            imports,
            notifications,
            monitors_started: AtomicBool::new(false),
        }
    }
}
