//! Request and outcome types for one generation batch

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::params::parse_aspect_ratio;
use crate::provider::ProviderKind;

pub const MAX_IMAGES_PER_BATCH: u32 = 6;

const MAX_BATCH_ID_LEN: usize = 64;

/// One user submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,

    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    /// Remote model id; only used by providers that select by model
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,

    #[serde(default = "default_count")]
    pub count: u32,

    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Art style appended to the prompt
    #[serde(default)]
    pub style: Option<String>,

    /// Client-chosen id for polling progress while the batch runs
    #[serde(default)]
    pub batch_id: Option<String>,
}

fn default_provider() -> ProviderKind {
    ProviderKind::HuggingFace
}

fn default_aspect_ratio() -> String {
    "1:1".to_string()
}

fn default_count() -> u32 {
    1
}

fn default_quality() -> u8 {
    7
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            provider: default_provider(),
            model: None,
            aspect_ratio: default_aspect_ratio(),
            count: default_count(),
            quality: default_quality(),
            style: None,
            batch_id: None,
        }
    }

    /// Reject the request before anything is sent
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(AppError::Validation("Please enter a prompt".to_string()));
        }
        if !(1..=MAX_IMAGES_PER_BATCH).contains(&self.count) {
            return Err(AppError::Validation(format!(
                "Image count must be between 1 and {}",
                MAX_IMAGES_PER_BATCH
            )));
        }
        if !(1..=10).contains(&self.quality) {
            return Err(AppError::Validation("Quality must be between 1 and 10".to_string()));
        }
        if let Some(id) = &self.batch_id {
            let well_formed = !id.is_empty()
                && id.len() <= MAX_BATCH_ID_LEN
                && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !well_formed {
                return Err(AppError::Validation(format!(
                    "Batch id must be 1 to {} letters, digits, '-' or '_'",
                    MAX_BATCH_ID_LEN
                )));
            }
        }
        parse_aspect_ratio(&self.aspect_ratio)?;
        Ok(())
    }
}

/// Result of a batch that delivered at least one image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub batch_id: String,
    /// Image references in request order
    pub images: Vec<String>,
    pub requested: u32,
    pub delivered: u32,
    /// Model that produced the images, if the provider selects by model
    pub model: Option<String>,
    pub fallback_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl GenerationOutcome {
    pub fn is_partial(&self) -> bool {
        self.delivered < self.requested
    }
}
