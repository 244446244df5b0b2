//! Common traits and types for image generation providers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, Result};
use crate::params::GenerationParams;

/// Which external generation backend serves a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Closed API reached through the backend proxy function
    OpenAi,
    /// Inference API called directly with a model id
    HuggingFace,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::HuggingFace => "huggingface",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            other => Err(AppError::Validation(format!("Unknown provider '{}'", other))),
        }
    }
}

/// One provider call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Prompt with any style modifier already applied
    pub prompt: String,

    /// Remote model id, for providers that select by model
    pub model: Option<String>,

    /// Mapped dimensions, steps, guidance and negative prompt
    pub params: GenerationParams,

    /// Images wanted from this call
    pub n: u32,

    /// Random seed so concurrent attempts do not return identical images
    pub seed: Option<u64>,
}

/// Trait for image generation providers
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the provider kind
    fn kind(&self) -> ProviderKind;

    /// Whether the request's model id picks the remote model. Only these
    /// providers are eligible for the fallback model.
    fn selects_model(&self) -> bool {
        false
    }

    /// Generate images, returning one reference (URL, blob or data URL) per image
    async fn generate(&self, request: &ProviderRequest) -> Result<Vec<String>>;
}

/// Map an HTTP error status and body text onto the failure taxonomy
pub fn classify_status(status: u16, message: &str) -> AppError {
    let lower = message.to_lowercase();

    if lower.contains("does not exist") || lower.contains("model not found") {
        return AppError::PermanentProvider(message.to_string());
    }

    match status {
        429 | 500 | 502 | 503 | 504 => AppError::TransientProvider(format!("{}: {}", status, message)),
        400 | 404 | 422 => AppError::PermanentProvider(format!("{}: {}", status, message)),
        _ => AppError::ProviderFailed(format!("{}: {}", status, message)),
    }
}
