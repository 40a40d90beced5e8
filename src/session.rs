//! Session Module
//!
//! Handles console authentication, lockout and idle-timeout state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::storage::StateStore;

/// Storage key for the persisted session snapshot.
const SESSION_KEY: &str = "session";

/// Consecutive failed logins allowed before the session locks.
pub const MAX_LOGIN_ATTEMPTS: u32 = 5;

/// How long a locked session rejects logins.
pub const LOCK_DURATION_MS: i64 = 15 * 60 * 1000;

/// Inactivity window after which an authenticated session is closed.
pub const IDLE_TIMEOUT_MS: i64 = 30 * 60 * 1000;

/// Session state persisted on every mutation and restored at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub is_authenticated: bool,
    pub last_activity: i64,
    pub current_page: String,
    pub login_attempts: u32,
    pub is_locked: bool,
    pub lock_until: Option<i64>,
}

impl SessionSnapshot {
    fn fresh(now: i64) -> Self {
        Self {
            is_authenticated: false,
            last_activity: now,
            current_page: "/".to_string(),
            login_attempts: 0,
            is_locked: false,
            lock_until: None,
        }
    }
}

/// Tunables for the session state machine.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub max_attempts: u32,
    pub lock_duration_ms: i64,
    pub idle_timeout_ms: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            // TODO: compare against a salted hash once the provisioning flow
            // can deliver one instead of a shared literal.
            secret: "Ultr@S3Cr3t@!@#".to_string(),
            max_attempts: MAX_LOGIN_ATTEMPTS,
            lock_duration_ms: LOCK_DURATION_MS,
            idle_timeout_ms: IDLE_TIMEOUT_MS,
        }
    }
}

/// Single source of truth for authentication state.
///
/// All mutation goes through the methods below. Each successful mutation is
/// written to the storage port, so a restart restores the same session.
/// No method panics or returns an error; failed logins, lockout and idle
/// expiry are all reported through return values and queryable state.
pub struct SessionStore {
    snapshot: SessionSnapshot,
    config: SessionConfig,
    store: Arc<dyn StateStore>,
}

impl SessionStore {
    /// Restore the session from storage, or start logged out.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self::with_config(store, SessionConfig::default())
    }

    pub fn with_config(store: Arc<dyn StateStore>, config: SessionConfig) -> Self {
        let snapshot = match store.read(SESSION_KEY) {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(snapshot) => {
                    info!("Restored persisted session state");
                    snapshot
                }
                Err(e) => {
                    warn!("Discarding unreadable session snapshot: {}", e);
                    SessionSnapshot::fresh(now_ms())
                }
            },
            Ok(None) => SessionSnapshot::fresh(now_ms()),
            Err(e) => {
                warn!("Failed to read persisted session: {}", e);
                SessionSnapshot::fresh(now_ms())
            }
        };

        Self {
            snapshot,
            config,
            store,
        }
    }

    /// Attempt to authenticate with the given password.
    ///
    /// Returns false while the session is locked, without consuming an
    /// attempt. An expired lock is cleared first and the attempt is then
    /// evaluated as the start of a new cycle.
    pub fn authenticate(&mut self, candidate: &str) -> bool {
        self.authenticate_at(candidate, now_ms())
    }

    fn authenticate_at(&mut self, candidate: &str, now: i64) -> bool {
        if self.snapshot.is_locked {
            match self.snapshot.lock_until {
                Some(until) if now < until => {
                    info!("Login rejected: session is locked");
                    return false;
                }
                _ => {
                    self.snapshot.is_locked = false;
                    self.snapshot.lock_until = None;
                    self.snapshot.login_attempts = 0;
                    info!("Lock expired, accepting logins again");
                }
            }
        }

        if verify_secret(candidate, &self.config.secret) {
            self.snapshot.is_authenticated = true;
            self.snapshot.last_activity = now;
            self.snapshot.login_attempts = 0;
            self.snapshot.is_locked = false;
            self.snapshot.lock_until = None;
            info!("Login succeeded");
            self.persist();
            true
        } else {
            self.snapshot.login_attempts += 1;
            if self.snapshot.login_attempts >= self.config.max_attempts {
                self.snapshot.is_locked = true;
                self.snapshot.lock_until = Some(now + self.config.lock_duration_ms);
                warn!(
                    attempts = self.snapshot.login_attempts,
                    "Login attempt limit reached, session locked"
                );
            } else {
                info!(attempts = self.snapshot.login_attempts, "Login failed");
            }
            self.persist();
            false
        }
    }

    /// Close the session. Attempt and lock counters are kept.
    pub fn logout(&mut self) {
        self.snapshot.is_authenticated = false;
        self.snapshot.last_activity = now_ms();
        info!("Logged out");
        self.persist();
    }

    /// Record user interaction. Has no effect on authentication state.
    pub fn update_activity(&mut self) {
        self.update_activity_at(now_ms());
    }

    fn update_activity_at(&mut self, now: i64) {
        self.snapshot.last_activity = now;
        self.persist();
    }

    /// Record the last visited route, authenticated or not, so a later
    /// login can return to it.
    pub fn set_current_page(&mut self, path: &str) {
        self.snapshot.current_page = path.to_string();
        self.persist();
    }

    /// Close the session if the idle window has elapsed.
    ///
    /// The check is based on elapsed wall-clock time, so a late caller still
    /// detects expiry correctly. Returns true only when this call closed the
    /// session.
    pub fn check_timeout(&mut self) -> bool {
        self.check_timeout_at(now_ms())
    }

    fn check_timeout_at(&mut self, now: i64) -> bool {
        if !self.snapshot.is_authenticated {
            return false;
        }

        if now - self.snapshot.last_activity > self.config.idle_timeout_ms {
            self.snapshot.is_authenticated = false;
            info!("Session closed after inactivity");
            self.persist();
            true
        } else {
            false
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot.is_authenticated
    }

    pub fn is_locked(&self) -> bool {
        self.snapshot.is_locked
    }

    /// Milliseconds until a locked session accepts logins again, zero when
    /// not locked.
    pub fn lock_remaining_ms(&self) -> i64 {
        self.lock_remaining_at(now_ms())
    }

    fn lock_remaining_at(&self, now: i64) -> i64 {
        match self.snapshot.lock_until {
            Some(until) if self.snapshot.is_locked => (until - now).max(0),
            _ => 0,
        }
    }

    /// Failed logins left before the session locks.
    pub fn attempts_remaining(&self) -> u32 {
        self.config
            .max_attempts
            .saturating_sub(self.snapshot.login_attempts)
    }

    pub fn current_page(&self) -> &str {
        &self.snapshot.current_page
    }

    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }

    fn persist(&self) {
        match serde_json::to_string(&self.snapshot) {
            Ok(json) => {
                if let Err(e) = self.store.write(SESSION_KEY, &json) {
                    error!("Failed to persist session state: {}", e);
                }
            }
            Err(e) => error!("Failed to serialize session state: {}", e),
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Compare a candidate against the configured secret without short-circuiting
/// on the first mismatched byte.
fn verify_secret(candidate: &str, secret: &str) -> bool {
    let a = candidate.as_bytes();
    let b = secret.as_bytes();

    let mut diff = a.len() ^ b.len();
    for i in 0..a.len().min(b.len()) {
        diff |= usize::from(a[i] ^ b[i]);
    }
    diff == 0
}
