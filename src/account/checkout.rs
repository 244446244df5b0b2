//! Payment checkout behind a narrow adapter boundary

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::account::client::BackendClient;
use crate::account::premium::{PremiumService, PremiumStatus};
use crate::account::session::SessionStore;
use crate::error::Result;

/// What the caller should do after a checkout step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// Send the user to the hosted checkout page
    Redirect { url: String },
    /// Payment confirmed and premium granted
    Completed { premium: PremiumStatus },
    Failed { reason: String },
}

#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn initiate_checkout(&self, plan_id: &str) -> Result<CheckoutOutcome>;

    /// Called once the payment provider reports completion for `user_id`
    async fn confirm_checkout(&self, user_id: &str) -> Result<CheckoutOutcome>;
}

/// Checkout through the backend's checkout function
pub struct BackendCheckout {
    backend: Arc<dyn BackendClient>,
    sessions: Arc<SessionStore>,
    premium: Arc<PremiumService>,
    function: String,
}

impl BackendCheckout {
    pub fn new(
        backend: Arc<dyn BackendClient>,
        sessions: Arc<SessionStore>,
        premium: Arc<PremiumService>,
        function: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            sessions,
            premium,
            function: function.into(),
        }
    }
}

#[async_trait]
impl CheckoutGateway for BackendCheckout {
    async fn initiate_checkout(&self, plan_id: &str) -> Result<CheckoutOutcome> {
        let token = self.sessions.current().session().map(|s| s.access_token.clone());
        let response = self
            .backend
            .invoke(&self.function, token.as_deref(), json!({ "plan_id": plan_id }))
            .await?;

        if let Some(url) = response.body.get("url").and_then(|v| v.as_str()) {
            info!(plan_id = %plan_id, "Checkout session created");
            return Ok(CheckoutOutcome::Redirect { url: url.to_string() });
        }

        let reason = response
            .error_message()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Checkout function returned status {}", response.status));
        warn!(plan_id = %plan_id, reason = %reason, "Checkout could not be started");
        Ok(CheckoutOutcome::Failed { reason })
    }

    async fn confirm_checkout(&self, user_id: &str) -> Result<CheckoutOutcome> {
        let signed_in = self.sessions.current().session().map(|s| s.user.id.clone());
        if signed_in.as_deref() != Some(user_id) {
            return Ok(CheckoutOutcome::Failed {
                reason: "Checkout completed for a different account".to_string(),
            });
        }

        let premium = self.premium.activate().await?;
        info!(user_id = %user_id, "Checkout confirmed");
        Ok(CheckoutOutcome::Completed { premium })
    }
}
