//! Session store with subscribe/notify semantics

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

/// Signed-in account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

/// Tokens issued by the backend for a signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at_ms: i64,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms <= now_ms
    }
}

/// Current authentication state, broadcast to subscribers on every change
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    SignedOut,
    SignedIn(Session),
}

impl AuthState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::SignedIn(session) => Some(session),
            AuthState::SignedOut => None,
        }
    }
}

/// Holds the session for the process. Constructed once at startup and
/// passed to whatever needs it.
pub struct SessionStore {
    state: watch::Sender<AuthState>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(AuthState::SignedOut);
        Self { state }
    }

    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Session if signed in and not yet expired at `now_ms`
    pub fn active_session(&self, now_ms: i64) -> Option<Session> {
        self.state
            .borrow()
            .session()
            .filter(|s| !s.is_expired(now_ms))
            .cloned()
    }

    /// Receive every subsequent auth state change
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn set_session(&self, session: Session) {
        info!(user_id = %session.user.id, "Auth state changed: signed in");
        self.state.send_replace(AuthState::SignedIn(session));
    }

    pub fn clear(&self) {
        if self.state.borrow().session().is_some() {
            info!("Auth state changed: signed out");
        }
        self.state.send_replace(AuthState::SignedOut);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
