//! Sign-in, sign-up and sign-out against the backend, updating the session store

use std::sync::Arc;
use tracing::{info, warn};

use crate::account::client::BackendClient;
use crate::account::session::{Session, SessionStore};
use crate::config::AuthConfig;
use crate::error::{AppError, Result};
use crate::storage::clock::Clock;

pub struct AuthService {
    backend: Arc<dyn BackendClient>,
    sessions: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    allowed_domains: Vec<String>,
}

impl AuthService {
    pub fn new(
        backend: Arc<dyn BackendClient>,
        sessions: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            backend,
            sessions,
            clock,
            allowed_domains: config
                .allowed_email_domains
                .iter()
                .map(|d| d.trim().to_lowercase())
                .collect(),
        }
    }

    /// Whether sign-up is open to this address. An empty domain list allows everyone.
    pub fn is_allowed_email(&self, email: &str) -> bool {
        if self.allowed_domains.is_empty() {
            return true;
        }
        match email.trim().rsplit_once('@') {
            Some((local, domain)) if !local.is_empty() => {
                let domain = domain.to_lowercase();
                self.allowed_domains.iter().any(|d| *d == domain)
            }
            _ => false,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        check_credentials(email, password)?;
        let session = self.backend.sign_in(email.trim(), password).await?;
        self.sessions.set_session(session.clone());
        Ok(session)
    }

    /// Create an account. Returns `None` when the backend wants the email
    /// confirmed before issuing a session.
    pub async fn signup(&self, email: &str, password: &str) -> Result<Option<Session>> {
        check_credentials(email, password)?;
        if !self.is_allowed_email(email) {
            return Err(AppError::Validation(format!(
                "Sign-up is limited to {} addresses",
                self.allowed_domains.join(" and ")
            )));
        }

        let session = self.backend.sign_up(email.trim(), password).await?;
        match &session {
            Some(session) => self.sessions.set_session(session.clone()),
            None => info!(email = %email.trim(), "Sign-up pending email confirmation"),
        }
        Ok(session)
    }

    /// Sign out locally even if the backend call fails
    pub async fn logout(&self) -> Result<()> {
        if let Some(session) = self.sessions.current().session() {
            if let Err(e) = self.backend.sign_out(&session.access_token).await {
                warn!(error = %e, "Backend sign-out failed, clearing local session anyway");
            }
        }
        self.sessions.clear();
        Ok(())
    }

    /// Current session, if one exists and has not expired. An expired
    /// session is cleared so subscribers see the sign-out.
    pub fn session(&self) -> Option<Session> {
        let now = self.clock.now_ms();
        let active = self.sessions.active_session(now);
        if active.is_none() && self.sessions.current().session().is_some() {
            info!("Session expired");
            self.sessions.clear();
        }
        active
    }
}

fn check_credentials(email: &str, password: &str) -> Result<()> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::Validation("Email and password are required".to_string()));
    }
    Ok(())
}
