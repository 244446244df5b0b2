//! Closed-API provider reached through a backend proxy function

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::account::client::{BackendClient, FunctionResponse};
use crate::account::session::SessionStore;
use crate::error::{AppError, Result};
use crate::provider::traits::{classify_status, ImageProvider, ProviderKind, ProviderRequest};

/// Provider that delegates to the `generate-image` backend function
pub struct ProxyProvider {
    backend: Arc<dyn BackendClient>,
    sessions: Arc<SessionStore>,
    function: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProxyBody {
    #[serde(default)]
    image_urls: Vec<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

impl ProxyProvider {
    pub fn new(backend: Arc<dyn BackendClient>, sessions: Arc<SessionStore>, function: impl Into<String>) -> Self {
        Self {
            backend,
            sessions,
            function: function.into(),
        }
    }

    fn interpret(response: FunctionResponse) -> Result<Vec<String>> {
        let body: ProxyBody = serde_json::from_value(response.body.clone()).unwrap_or_default();

        if let Some(message) = body.error.or_else(|| {
            (!response.is_success()).then(|| format!("Proxy function returned {}", response.status))
        }) {
            return Err(match body.error_code.as_deref() {
                Some("BILLING_LIMIT_REACHED") => AppError::BillingLimit(message),
                Some("TIMEOUT") => AppError::Timeout(message),
                _ if response.is_success() => AppError::ProviderFailed(message),
                _ => classify_status(response.status, &message),
            });
        }

        let mut urls = body.image_urls;
        if let Some(url) = body.image_url {
            urls.push(url);
        }
        urls.retain(|u| !u.is_empty());

        if urls.is_empty() {
            return Err(AppError::ProviderFailed(
                "Proxy function returned no image URLs".to_string(),
            ));
        }
        Ok(urls)
    }
}

#[async_trait]
impl ImageProvider for ProxyProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<Vec<String>> {
        let token = self
            .sessions
            .current()
            .session()
            .map(|s| s.access_token.clone());

        let payload = json!({
            "prompt": request.prompt.trim(),
            "size": request.params.size(),
            "n": request.n,
        });

        debug!(provider = "openai", function = %self.function, size = %request.params.size(), "Invoking proxy function");

        let response = self
            .backend
            .invoke(&self.function, token.as_deref(), payload)
            .await?;

        let result = Self::interpret(response);
        if let Err(ref e) = result {
            warn!(provider = "openai", error = %e, "Proxy function failed");
        }
        result
    }
}
