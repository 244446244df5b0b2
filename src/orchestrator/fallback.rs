//! Single-level substitution of a reliable model after a failed batch

use tracing::info;

use crate::error::{AppError, FailureClass};
use crate::provider::ImageProvider;

/// Notice shown while the fallback batch runs
pub const FALLBACK_NOTICE: &str = "The selected model is unavailable, trying an alternative model...";

#[derive(Debug, Clone)]
pub struct FallbackSelector {
    model: String,
}

impl FallbackSelector {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }

    /// Whether a failed batch on `model` could still fall back
    pub fn applies_to(&self, provider: &dyn ImageProvider, model: &str) -> bool {
        provider.selects_model() && model != self.model
    }

    /// Model to re-issue a zero-success batch with, if any.
    ///
    /// Only providers that select by model qualify, billing and validation
    /// failures never qualify, and a batch already on the fallback model has
    /// nowhere left to go.
    pub fn select(&self, provider: &dyn ImageProvider, failed_model: &str, error: &AppError) -> Option<&str> {
        if !self.applies_to(provider, failed_model) {
            return None;
        }
        match error.class() {
            FailureClass::Billing | FailureClass::Validation => None,
            class => {
                info!(
                    provider = %provider.name(),
                    failed_model = %failed_model,
                    fallback_model = %self.model,
                    class = ?class,
                    "Selecting fallback model"
                );
                Some(&self.model)
            }
        }
    }
}
