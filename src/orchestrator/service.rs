//! Batch orchestration: validation, quota, parameter mapping, dispatch,
//! fallback and result caching for one user submission

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::styles::{apply_style, is_known_style};
use crate::catalog::{ModelCatalog, ModelFamily};
use crate::config::GenerationConfig;
use crate::error::Result;
use crate::orchestrator::dispatcher::{BatchResult, Dispatcher};
use crate::orchestrator::fallback::{FallbackSelector, FALLBACK_NOTICE};
use crate::orchestrator::progress::{BatchProgress, ProgressReporter, OPEN_CEILING};
use crate::orchestrator::types::{GenerationOutcome, GenerationRequest};
use crate::params::{GenerationParams, ParameterMapper};
use crate::provider::registry::ProviderRegistry;
use crate::provider::{ImageProvider, ProviderRequest};
use crate::storage::cache::ImageCache;
use crate::storage::usage::UsageTracker;

/// Per-image estimate for providers without a catalog entry
const UNLISTED_MODEL_SECS: u32 = 15;

/// Share of the bar the first run may fill while a fallback run could follow
const FIRST_RUN_CEILING: u8 = 60;

/// Ratio used when the model does not support the requested one
const CLAMPED_RATIO: &str = "1:1";

/// Provider parameters resolved for one model
struct BatchPlan {
    model: Option<String>,
    params: GenerationParams,
    estimate: Duration,
}

pub struct GenerationService {
    providers: ProviderRegistry,
    catalog: Arc<ModelCatalog>,
    mapper: ParameterMapper,
    dispatcher: Dispatcher,
    fallback: FallbackSelector,
    progress: Arc<ProgressReporter>,
    results: Arc<ImageCache>,
    usage: Arc<UsageTracker>,
    default_model: String,
    stagger_ms: u64,
}

impl GenerationService {
    pub fn new(
        providers: ProviderRegistry,
        catalog: Arc<ModelCatalog>,
        config: &GenerationConfig,
        results: Arc<ImageCache>,
        usage: Arc<UsageTracker>,
    ) -> Self {
        Self {
            providers,
            catalog,
            mapper: ParameterMapper::new(config.base_size),
            dispatcher: Dispatcher::from_config(config),
            fallback: FallbackSelector::new(config.fallback_model.clone()),
            progress: Arc::new(ProgressReporter::new()),
            results,
            usage,
            default_model: config.default_model.clone(),
            stagger_ms: config.stagger_ms,
        }
    }

    /// Use a custom parameter table
    pub fn with_mapper(mut self, mapper: ParameterMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn progress(&self) -> Arc<ProgressReporter> {
        self.progress.clone()
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Generate one batch for `user_id`. Free users reserve their images
    /// against the daily quota before any provider is called; images that
    /// were not delivered are returned to the quota afterwards.
    pub async fn generate(&self, user_id: &str, premium: bool, request: GenerationRequest) -> Result<GenerationOutcome> {
        request.validate()?;
        let reservation = if premium {
            None
        } else {
            Some(self.usage.reserve(user_id, request.count)?)
        };

        let provider = self.providers.get(request.provider)?;
        if let Some(style) = request.style.as_deref().filter(|s| !s.trim().is_empty() && !is_known_style(s)) {
            debug!(style = %style, "Using free-text style modifier");
        }
        let prompt = apply_style(&request.prompt, request.style.as_deref());
        let requested_model = request.model.as_deref().unwrap_or(&self.default_model).to_string();

        let batch_id = request
            .batch_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let progress = self.progress.begin(&batch_id)?;
        info!(
            batch_id = %batch_id,
            user_id = %user_id,
            provider = %provider.name(),
            model = %requested_model,
            count = request.count,
            "Starting generation batch"
        );

        let (batch, model, fallback_used) = match self.run(&progress, provider, &prompt, &requested_model, &request).await {
            Ok(run) => run,
            Err(e) => {
                progress.finish();
                return Err(e);
            }
        };

        let notice = self.notice(&batch, fallback_used.then_some(requested_model.as_str()), model.as_deref());
        if let Some(notice) = &notice {
            progress.notice(notice.clone());
        }
        progress.finish();

        for image in &batch.images {
            if let Err(e) = self.results.save(image) {
                warn!(batch_id = %batch_id, error = %e, "Failed to cache generated image");
            }
        }
        if let Some(reservation) = reservation {
            reservation.commit(batch.delivered())?;
        }

        info!(
            batch_id = %batch_id,
            requested = batch.requested,
            delivered = batch.delivered(),
            fallback_used,
            "Generation batch complete"
        );
        Ok(GenerationOutcome {
            batch_id,
            requested: batch.requested,
            delivered: batch.delivered(),
            images: batch.images,
            model,
            fallback_used,
            notice,
        })
    }

    /// Dispatch the batch on `requested_model`, then once on the fallback
    /// model if that produced nothing and a fallback applies
    async fn run(
        &self,
        progress: &BatchProgress,
        provider: Arc<dyn ImageProvider>,
        prompt: &str,
        requested_model: &str,
        request: &GenerationRequest,
    ) -> Result<(BatchResult, Option<String>, bool)> {
        let plan = self.plan(provider.as_ref(), requested_model, request)?;
        let ceiling = if self.fallback.applies_to(provider.as_ref(), requested_model) {
            FIRST_RUN_CEILING
        } else {
            OPEN_CEILING
        };
        progress.start_phase(request.count, plan.estimate, ceiling);

        let error = match self
            .dispatcher
            .dispatch(provider.clone(), &self.provider_request(prompt, &plan), request.count, progress)
            .await
        {
            Ok(batch) => return Ok((batch, plan.model, false)),
            Err(error) => error,
        };

        let fallback_model = match self.fallback.select(provider.as_ref(), requested_model, &error) {
            Some(model) => model.to_string(),
            None => return Err(error),
        };
        warn!(
            batch_id = %progress.id(),
            failed_model = %requested_model,
            fallback_model = %fallback_model,
            error = %error,
            "Batch failed, retrying once with fallback model"
        );

        let plan = self.plan(provider.as_ref(), &fallback_model, request)?;
        progress.start_phase(request.count, plan.estimate, OPEN_CEILING);
        progress.notice(FALLBACK_NOTICE);
        let batch = self
            .dispatcher
            .dispatch(provider, &self.provider_request(prompt, &plan), request.count, progress)
            .await?;
        Ok((batch, plan.model, true))
    }

    fn provider_request(&self, prompt: &str, plan: &BatchPlan) -> ProviderRequest {
        ProviderRequest {
            prompt: prompt.to_string(),
            model: plan.model.clone(),
            params: plan.params.clone(),
            n: 1,
            seed: None,
        }
    }

    /// Resolve dimensions, steps and guidance for `model_id` on `provider`
    fn plan(&self, provider: &dyn ImageProvider, model_id: &str, request: &GenerationRequest) -> Result<BatchPlan> {
        if !provider.selects_model() {
            let params = self
                .mapper
                .map(&request.aspect_ratio, request.quality, ModelFamily::Standard)?;
            let secs = UNLISTED_MODEL_SECS as f64 + (self.stagger_ms * request.count.saturating_sub(1) as u64) as f64 / 1000.0;
            return Ok(BatchPlan {
                model: None,
                params,
                estimate: Duration::from_secs_f64(secs),
            });
        }

        let descriptor = self.catalog.get(model_id);
        let aspect_ratio = match descriptor {
            Some(model) if !model.supports_ratio(&request.aspect_ratio) => {
                warn!(
                    model = %model_id,
                    aspect_ratio = %request.aspect_ratio,
                    "Aspect ratio not supported by model, using 1:1"
                );
                CLAMPED_RATIO
            }
            _ => request.aspect_ratio.as_str(),
        };

        let params = self
            .mapper
            .map(aspect_ratio, request.quality, self.catalog.family_of(model_id))?;
        let secs = descriptor
            .map(|m| m.estimated_batch_secs(request.count, self.stagger_ms))
            .unwrap_or(UNLISTED_MODEL_SECS as f64);

        Ok(BatchPlan {
            model: Some(model_id.to_string()),
            params,
            estimate: Duration::from_secs_f64(secs),
        })
    }

    fn display_name(&self, model_id: &str) -> String {
        self.catalog
            .get(model_id)
            .map(|m| m.display_name.clone())
            .unwrap_or_else(|| model_id.to_string())
    }

    fn notice(&self, batch: &BatchResult, failed_model: Option<&str>, used_model: Option<&str>) -> Option<String> {
        let mut parts = Vec::new();
        if let (Some(failed), Some(used)) = (failed_model, used_model) {
            parts.push(format!(
                "{} was unavailable, so these images were generated with {}.",
                self.display_name(failed),
                self.display_name(used)
            ));
        }
        if batch.is_partial() {
            parts.push(format!(
                "Generated {} of {} requested images.",
                batch.delivered(),
                batch.requested
            ));
        }
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}
