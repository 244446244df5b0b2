//! Premium subscription status via the `handle-premium` backend function

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::account::client::BackendClient;
use crate::account::session::{Session, SessionStore};
use crate::error::{AppError, Result};
use crate::storage::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PremiumState {
    Active,
    Expired,
    #[serde(other)]
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PremiumStatus {
    pub status: PremiumState,
    pub expires_at: Option<DateTime<Utc>>,
    pub credits: i64,
}

impl PremiumStatus {
    pub fn inactive() -> Self {
        Self {
            status: PremiumState::Inactive,
            expires_at: None,
            credits: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PremiumState::Active
    }
}

/// Row shape returned by the function
#[derive(Debug, Deserialize)]
struct PremiumRow {
    #[serde(default)]
    premium_status: Option<PremiumState>,
    #[serde(default)]
    premium_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    credits: Option<i64>,
}

pub struct PremiumService {
    backend: Arc<dyn BackendClient>,
    sessions: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    function: String,
}

impl PremiumService {
    pub fn new(
        backend: Arc<dyn BackendClient>,
        sessions: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
        function: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            sessions,
            clock,
            function: function.into(),
        }
    }

    pub async fn check(&self) -> Result<PremiumStatus> {
        let status = self.call("check").await?;
        debug!(status = ?status.status, "Checked premium status");
        Ok(status)
    }

    /// Mark the signed-in user premium
    pub async fn activate(&self) -> Result<PremiumStatus> {
        let status = self.call("activate").await?;
        info!(status = ?status.status, credits = status.credits, "Premium activated");
        Ok(status)
    }

    async fn call(&self, operation: &str) -> Result<PremiumStatus> {
        let session = self.require_session()?;
        let payload = json!({ "user_id": session.user.id, "operation": operation });
        let response = self
            .backend
            .invoke(&self.function, Some(&session.access_token), payload)
            .await?;

        if let Some(message) = response.error_message() {
            return Err(AppError::Internal(format!("Premium {} failed: {}", operation, message)));
        }
        if !response.is_success() {
            return Err(AppError::Internal(format!(
                "Premium {} failed with status {}",
                operation, response.status
            )));
        }

        self.interpret(response.body.get("data").cloned().unwrap_or(Value::Null))
    }

    fn require_session(&self) -> Result<Session> {
        self.sessions
            .active_session(self.clock.now_ms())
            .ok_or_else(|| AppError::AuthenticationFailed("Please sign in to continue".to_string()))
    }

    /// `data` is a single row for `check` and an array of updated rows for `activate`
    fn interpret(&self, data: Value) -> Result<PremiumStatus> {
        let row = match data {
            Value::Array(rows) => rows.into_iter().next(),
            Value::Null => None,
            other => Some(other),
        };
        let row: PremiumRow = match row {
            Some(row) => serde_json::from_value(row)?,
            None => return Ok(PremiumStatus::inactive()),
        };

        let now = self.clock.now_ms();
        let mut status = row.premium_status.unwrap_or(PremiumState::Inactive);
        if status == PremiumState::Active {
            if let Some(expiry) = row.premium_expiry {
                if expiry.timestamp_millis() < now {
                    status = PremiumState::Expired;
                }
            }
        }

        Ok(PremiumStatus {
            status,
            expires_at: row.premium_expiry,
            credits: row.credits.unwrap_or(0),
        })
    }
}
