//! Registry of configured providers

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::provider::traits::{ImageProvider, ProviderKind};

/// Provider lookup by kind
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn ImageProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own kind, replacing any previous one
    pub fn register(&mut self, provider: Arc<dyn ImageProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn with(mut self, provider: Arc<dyn ImageProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn ImageProvider>> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| AppError::Validation(format!("Provider '{}' is not configured", kind)))
    }
}
