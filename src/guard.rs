//! Route Guard Module
//!
//! Gates navigation to protected views behind the session state.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::debug;

use crate::session::SessionStore;

/// Route of the login view, the only path reachable while logged out.
pub const LOGIN_PATH: &str = "/login";

/// Outcome of a navigation check.
///
/// Callers must not render protected content unless the decision is `Allow`;
/// on `Redirect` the target history entry is replaced, so going back does not
/// loop through the guard again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum RouteDecision {
    Allow,
    #[serde(rename_all = "camelCase")]
    Redirect {
        to: String,
        redirect_to: String,
        replace: bool,
    },
}

pub struct RouteGuard {
    session: Arc<Mutex<SessionStore>>,
}

impl RouteGuard {
    pub fn new(session: Arc<Mutex<SessionStore>>) -> Self {
        Self { session }
    }

    /// Check one navigation. The path is always recorded first, even while
    /// logged out, so a later login can return to it.
    pub fn evaluate(&self, path: &str) -> RouteDecision {
        let Ok(mut session) = self.session.lock() else {
            // Fail closed rather than leak a protected view.
            return Self::redirect(path);
        };

        session.set_current_page(path);

        if Self::is_protected(path) && !session.is_authenticated() {
            debug!("Blocked navigation to {}", path);
            return Self::redirect(path);
        }

        RouteDecision::Allow
    }

    fn is_protected(path: &str) -> bool {
        path != LOGIN_PATH
    }

    fn redirect(from: &str) -> RouteDecision {
        RouteDecision::Redirect {
            to: LOGIN_PATH.to_string(),
            redirect_to: from.to_string(),
            replace: true,
        }
    }
}
