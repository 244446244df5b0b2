//! Backend-as-a-service client: password auth and edge-function invocation

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::account::session::{Session, User};
use crate::config::BackendConfig;
use crate::error::{AppError, Result};

/// Raw result of invoking a backend function
#[derive(Debug, Clone)]
pub struct FunctionResponse {
    pub status: u16,
    pub body: Value,
}

impl FunctionResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `error` field of the body, if any
    pub fn error_message(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }
}

/// Identity and function surface of the external backend
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    /// Returns `None` when the account needs email confirmation first
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>>;

    async fn sign_out(&self, access_token: &str) -> Result<()>;

    async fn invoke(
        &self,
        function: &str,
        access_token: Option<&str>,
        payload: Value,
    ) -> Result<FunctionResponse>;
}

/// REST implementation (`/auth/v1/*`, `/functions/v1/*`)
pub struct HttpBackendClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserPayload,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthErrorPayload {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpBackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        })
    }

    async fn auth_error(response: reqwest::Response) -> AppError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<AuthErrorPayload>(&text)
            .ok()
            .and_then(|p| p.error_description.or(p.msg).or(p.message))
            .unwrap_or_else(|| format!("Backend returned {}", status));
        AppError::AuthenticationFailed(message)
    }

    fn into_session(token: TokenResponse) -> Session {
        let now = chrono::Utc::now().timestamp();
        let expires_at = token
            .expires_at
            .or_else(|| token.expires_in.map(|secs| now + secs))
            .unwrap_or(now + 3600);

        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at_ms: expires_at * 1000,
            user: User {
                id: token.user.id,
                email: token.user.email.unwrap_or_default(),
            },
        }
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::auth_error(response).await);
        }

        let token: TokenResponse = response.json().await?;
        debug!(user_id = %token.user.id, "Signed in");
        Ok(Self::into_session(token))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>> {
        let url = format!("{}/auth/v1/signup", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::auth_error(response).await);
        }

        // With email confirmation enabled the body is a bare user object
        let body: Value = response.json().await?;
        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)?;
            return Ok(Some(Self::into_session(token)));
        }
        Ok(None)
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::auth_error(response).await);
        }
        Ok(())
    }

    async fn invoke(
        &self,
        function: &str,
        access_token: Option<&str>,
        payload: Value,
    ) -> Result<FunctionResponse> {
        let url = format!("{}/functions/v1/{}", self.base_url, function);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token.unwrap_or(&self.anon_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(format!("Function {} timed out", function))
                } else if e.is_connect() {
                    AppError::TransientProvider(format!("Cannot reach backend function {}: {}", function, e))
                } else {
                    AppError::HttpClient(e)
                }
            })?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(body) => body,
                Err(_) => {
                    warn!(function = %function, status, "Backend function returned a non-JSON body");
                    json!({ "error": text })
                }
            }
        };

        Ok(FunctionResponse { status, body })
    }
}
