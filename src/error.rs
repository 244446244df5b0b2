//! Common error types for the image generation studio

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Invalid aspect ratio: {0}")]
    InvalidAspectRatio(String),

    #[error("Daily limit of {limit} free images reached")]
    QuotaExceeded { limit: u32, used: u32 },

    #[error("Provider temporarily unavailable: {0}")]
    TransientProvider(String),

    #[error("Provider rejected the request: {0}")]
    PermanentProvider(String),

    #[error("Billing limit reached: {0}")]
    BillingLimit(String),

    #[error("Provider error: {0}")]
    ProviderFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Checkout error: {0}")]
    Checkout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// How a failure should be treated by the retry loop and the fallback path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Rate limited, busy, timed out: worth another attempt
    Transient,
    /// Unknown model or malformed request: retrying cannot help
    Permanent,
    /// Provider account out of funds: never retried, never falls back
    Billing,
    /// Rejected locally before reaching a provider
    Validation,
    /// Anything else: retried until the attempt budget runs out
    Other,
}

impl AppError {
    /// Classify this error for retry and fallback decisions
    pub fn class(&self) -> FailureClass {
        match self {
            AppError::TransientProvider(_) | AppError::Timeout(_) => FailureClass::Transient,
            AppError::PermanentProvider(_) => FailureClass::Permanent,
            AppError::BillingLimit(_) => FailureClass::Billing,
            AppError::Validation(_)
            | AppError::InvalidAspectRatio(_)
            | AppError::QuotaExceeded { .. } => FailureClass::Validation,
            AppError::HttpClient(e) if e.is_timeout() || e.is_connect() => FailureClass::Transient,
            _ => FailureClass::Other,
        }
    }

    /// Whether the retry loop may schedule another attempt after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self.class(), FailureClass::Transient | FailureClass::Other)
    }

    /// Human-readable text for the notice shown to the user
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::InvalidAspectRatio(ratio) => {
                format!("\"{}\" is not a valid aspect ratio. Use the form W:H, e.g. 16:9.", ratio)
            }
            AppError::QuotaExceeded { limit, .. } => format!(
                "You've reached your daily limit of {} free images. Upgrade to Premium for unlimited generation.",
                limit
            ),
            AppError::TransientProvider(_) | AppError::Timeout(_) => {
                "The image service is busy right now. Please try again in a moment.".to_string()
            }
            AppError::PermanentProvider(msg) => {
                format!("{}. Please try a different model.", msg.trim_end_matches('.'))
            }
            AppError::BillingLimit(_) => {
                "The OpenAI account has reached its billing limit. Please try Hugging Face models instead."
                    .to_string()
            }
            AppError::AuthenticationFailed(msg) | AppError::NotFound(msg) => msg.clone(),
            AppError::Checkout(msg) => format!("Checkout failed: {}", msg),
            _ => "Something went wrong while generating images. Please try again.".to_string(),
        }
    }
}

/// Error response format (OpenAI compatible)
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Json(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", Some("invalid_json")),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, "provider_error", None),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", None),
            AppError::InvalidAspectRatio(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", Some("invalid_aspect_ratio")),
            AppError::QuotaExceeded { .. } => (StatusCode::TOO_MANY_REQUESTS, "quota_error", Some("daily_limit_reached")),
            AppError::TransientProvider(_) => (StatusCode::SERVICE_UNAVAILABLE, "provider_error", Some("provider_busy")),
            AppError::PermanentProvider(_) => (StatusCode::BAD_GATEWAY, "provider_error", Some("model_unavailable")),
            AppError::BillingLimit(_) => (StatusCode::PAYMENT_REQUIRED, "billing_error", Some("BILLING_LIMIT_REACHED")),
            AppError::ProviderFailed(_) => (StatusCode::BAD_GATEWAY, "provider_error", None),
            AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout_error", Some("TIMEOUT")),
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", Some("storage_error")),
            AppError::AuthenticationFailed(_) => (StatusCode::UNAUTHORIZED, "authentication_error", Some("not_signed_in")),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "invalid_request_error", Some("not_found")),
            AppError::Checkout(_) => (StatusCode::BAD_GATEWAY, "checkout_error", None),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                message: self.user_message(),
                r#type: error_type.to_string(),
                code: code.map(|c| c.to_string()),
            },
        });

        (status, body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
