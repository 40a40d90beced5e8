//! Tauri Commands Module
//!
//! IPC commands exposed to the frontend.

use std::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};
use tauri::{command, AppHandle, Emitter, State, WebviewWindow};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::guard::RouteDecision;
use crate::poll::PollState;
use crate::storage::StateStore;
use crate::AppState;

const ACCOUNT_CACHE_KEY: &str = "account_cache";

// Response types for frontend

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStateResponse {
    pub is_authenticated: bool,
    pub is_locked: bool,
    pub lock_remaining_ms: i64,
    pub attempts_remaining: u32,
    pub current_page: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub success: bool,
    pub locked: bool,
    pub lock_remaining_ms: i64,
    pub attempts_remaining: u32,
    pub error: Option<String>,
}

/// Cached account list and recent query strings for the search screens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCache {
    pub accounts: Vec<CachedAccount>,
    pub recent_queries: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedAccount {
    pub id: String,
    pub account_number: String,
    pub label: String,
    pub currency: String,
}

// Commands

/// Current session state for rendering the login and lockout views
#[command]
pub fn get_session_state(state: State<'_, AppState>) -> SessionStateResponse {
    match state.session.lock() {
        Ok(session) => SessionStateResponse {
            is_authenticated: session.is_authenticated(),
            is_locked: session.is_locked(),
            lock_remaining_ms: session.lock_remaining_ms(),
            attempts_remaining: session.attempts_remaining(),
            current_page: session.current_page().to_string(),
        },
        Err(_) => SessionStateResponse {
            is_authenticated: false,
            is_locked: false,
            lock_remaining_ms: 0,
            attempts_remaining: 0,
            current_page: "/".to_string(),
        },
    }
}

/// Attempt a console login. The password itself is never logged.
#[command]
pub fn login(password: String, state: State<'_, AppState>) -> LoginResult {
    info!("Login requested");

    let Ok(mut session) = state.session.lock() else {
        return LoginResult {
            success: false,
            locked: false,
            lock_remaining_ms: 0,
            attempts_remaining: 0,
            error: Some("Session state unavailable".to_string()),
        };
    };

    if session.authenticate(&password) {
        return LoginResult {
            success: true,
            locked: false,
            lock_remaining_ms: 0,
            attempts_remaining: session.attempts_remaining(),
            error: None,
        };
    }

    if session.is_locked() {
        LoginResult {
            success: false,
            locked: true,
            lock_remaining_ms: session.lock_remaining_ms(),
            attempts_remaining: 0,
            error: Some("Too many failed attempts, try again later".to_string()),
        }
    } else {
        let remaining = session.attempts_remaining();
        LoginResult {
            success: false,
            locked: false,
            lock_remaining_ms: 0,
            attempts_remaining: remaining,
            error: Some(format!("Incorrect password, {} attempts remaining", remaining)),
        }
    }
}

/// Close the session
#[command]
pub fn logout(state: State<'_, AppState>) {
    info!("Logging out");

    if let Ok(mut session) = state.session.lock() {
        session.logout();
    }
}

/// Record one user interaction from the webview
#[command]
pub fn record_activity(state: State<'_, AppState>) {
    state.activity.record();
}

/// Check a navigation against the session state
#[command]
pub fn navigate(path: String, state: State<'_, AppState>) -> RouteDecision {
    state.guard.evaluate(&path)
}

/// Start the idle-timeout watcher and the dashboard pollers, forwarding
/// their updates to the webview as events.
#[command]
pub async fn start_monitors(
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<(), String> {
    debug!("Starting monitors");

    let expiry_app = app.clone();
    state.activity.start(move || {
        if let Err(e) = expiry_app.emit("session_expired", ()) {
            error!("Failed to emit session_expired: {}", e);
        }
    });

    state.dashboard.set_enabled(true);
    state.imports.set_enabled(true);
    state.notifications.set_enabled(true);

    // Event forwarders outlive individual poller restarts; spawn them once.
    if !state.monitors_started.swap(true, Ordering::SeqCst) {
        forward_updates(app.clone(), "dashboard_update", state.dashboard.subscribe());
        forward_updates(app.clone(), "imports_update", state.imports.subscribe());
        forward_updates(app, "notifications_update", state.notifications.subscribe());
    }

    Ok(())
}

/// Stop the idle-timeout watcher and all pollers
#[command]
pub fn stop_monitors(state: State<'_, AppState>) {
    debug!("Stopping monitors");

    state.activity.stop();
    state.dashboard.stop();
    state.imports.stop();
    state.notifications.stop();
}

/// Refresh the dashboard metrics immediately
#[command]
pub async fn refresh_dashboard(state: State<'_, AppState>) -> Result<(), String> {
    state.dashboard.refresh().await;
    Ok(())
}

/// Refresh the active import list immediately
#[command]
pub async fn refresh_imports(state: State<'_, AppState>) -> Result<(), String> {
    state.imports.refresh().await;
    Ok(())
}

/// Refresh notifications immediately
#[command]
pub async fn refresh_notifications(state: State<'_, AppState>) -> Result<(), String> {
    state.notifications.refresh().await;
    Ok(())
}

/// Enable or disable one poller by name
#[command]
pub async fn set_polling_enabled(
    target: String,
    enabled: bool,
    state: State<'_, AppState>,
) -> Result<(), String> {
    match target.as_str() {
        "dashboard" => state.dashboard.set_enabled(enabled),
        "imports" => state.imports.set_enabled(enabled),
        "notifications" => state.notifications.set_enabled(enabled),
        other => return Err(format!("Unknown poller: {}", other)),
    }
    Ok(())
}

/// Load the cached account list, if any
#[command]
pub fn get_account_cache(state: State<'_, AppState>) -> Option<AccountCache> {
    match state.storage.read(ACCOUNT_CACHE_KEY) {
        Ok(Some(json)) => serde_json::from_str(&json).ok(),
        Ok(None) => None,
        Err(e) => {
            error!("Failed to read account cache: {}", e);
            None
        }
    }
}

/// Persist the account list and recent queries
#[command]
pub fn save_account_cache(cache: AccountCache, state: State<'_, AppState>) -> Result<(), String> {
    let json = serde_json::to_string(&cache).map_err(|e| e.to_string())?;
    state
        .storage
        .write(ACCOUNT_CACHE_KEY, &json)
        .map_err(|e| e.to_string())
}

/// Drop the cached account list
#[command]
pub fn clear_account_cache(state: State<'_, AppState>) -> Result<(), String> {
    state
        .storage
        .remove(ACCOUNT_CACHE_KEY)
        .map_err(|e| e.to_string())
}

/// Minimize window
#[command]
pub fn minimize_window(window: WebviewWindow) {
    let _ = window.minimize();
}

/// Hide to system tray
#[command]
pub fn hide_to_tray(window: WebviewWindow) {
    let _ = window.hide();
}

/// Close window
#[command]
pub fn close_window(app: AppHandle) {
    app.exit(0);
}

fn forward_updates<T>(app: AppHandle, event: &'static str, mut rx: watch::Receiver<PollState<T>>)
where
    T: Clone + Send + Sync + Serialize + 'static,
{
    tauri::async_runtime::spawn(async move {
        while rx.changed().await.is_ok() {
            let update = rx.borrow_and_update().clone();
            if let Err(e) = app.emit(event, &update) {
                error!("Failed to emit {}: {}", event, e);
            }
        }
    });
}
