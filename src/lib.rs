//! Multi-provider AI image generation studio
//!
//! Collects prompts and generation parameters, fans them out to remote
//! image-generation providers with retry, fallback and progress reporting,
//! and keeps results in an expiring local cache. Identity, premium status and
//! checkout are delegated to an external backend-as-a-service.

pub mod account;
pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod middleware;
pub mod orchestrator;
pub mod params;
pub mod provider;
pub mod storage;

pub use error::{AppError, Result};

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use account::{AuthService, BackendCheckout, BackendClient, CheckoutGateway, HttpBackendClient, PremiumService, SessionStore};
use catalog::ModelCatalog;
use config::Settings;
use orchestrator::GenerationService;
use provider::huggingface::HuggingFaceProvider;
use provider::proxy::ProxyProvider;
use provider::registry::ProviderRegistry;
use storage::{BlobStore, CacheSweeper, Clock, FileStore, ImageCache, KeyValueStore, SystemClock, UsageTracker};

/// User id recorded for usage when sign-in is disabled
pub const LOCAL_USER: &str = "local";

/// External collaborators the application state is assembled from
pub struct AppParts {
    pub store: Arc<dyn KeyValueStore>,
    pub backend: Arc<dyn BackendClient>,
    pub clock: Arc<dyn Clock>,
    pub sessions: Arc<SessionStore>,
    pub blobs: Arc<BlobStore>,
    pub providers: ProviderRegistry,
}

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<Settings>,
    pub auth: Arc<AuthService>,
    pub premium: Arc<PremiumService>,
    pub checkout: Arc<dyn CheckoutGateway>,
    pub generation: Arc<GenerationService>,
    pub results: Arc<ImageCache>,
    pub gallery: Arc<ImageCache>,
    pub usage: Arc<UsageTracker>,
    pub sweeper: Arc<CacheSweeper>,
}

impl AppState {
    /// Wire up production collaborators from settings
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&settings.storage.base_path)?);
        let backend: Arc<dyn BackendClient> = Arc::new(HttpBackendClient::new(&settings.backend)?);
        let sessions = Arc::new(SessionStore::new());
        let blobs = Arc::new(BlobStore::from_config(&settings.storage));

        let providers = ProviderRegistry::new()
            .with(Arc::new(HuggingFaceProvider::new(&settings.huggingface, blobs.clone())?))
            .with(Arc::new(ProxyProvider::new(
                backend.clone(),
                sessions.clone(),
                settings.backend.generate_function.clone(),
            )));

        Self::assemble(
            settings,
            AppParts {
                store,
                backend,
                clock: Arc::new(SystemClock),
                sessions,
                blobs,
                providers,
            },
        )
    }

    pub fn assemble(settings: Settings, parts: AppParts) -> Result<Self> {
        let AppParts {
            store,
            backend,
            clock,
            sessions,
            blobs,
            providers,
        } = parts;

        let ttl = Duration::from_secs(settings.cache.ttl_secs);
        let results = Arc::new(ImageCache::results(store.clone(), ttl, clock.clone()));
        let gallery = Arc::new(ImageCache::gallery(store.clone(), ttl, clock.clone()));
        let usage = Arc::new(UsageTracker::new(store, clock.clone(), settings.quota.free_daily_limit));

        let auth = Arc::new(AuthService::new(backend.clone(), sessions.clone(), clock.clone(), &settings.auth));
        let premium = Arc::new(PremiumService::new(
            backend.clone(),
            sessions.clone(),
            clock,
            settings.backend.premium_function.clone(),
        ));
        let checkout: Arc<dyn CheckoutGateway> = Arc::new(BackendCheckout::new(
            backend,
            sessions,
            premium.clone(),
            settings.backend.checkout_function.clone(),
        ));

        let catalog = Arc::new(ModelCatalog::new(settings.model_catalog()?));
        let generation = Arc::new(GenerationService::new(
            providers,
            catalog,
            &settings.generation,
            results.clone(),
            usage.clone(),
        ));
        let sweeper = Arc::new(CacheSweeper::new(vec![results.clone(), gallery.clone()], blobs, ttl));

        Ok(Self {
            settings: Arc::new(settings),
            auth,
            premium,
            checkout,
            generation,
            results,
            gallery,
            usage,
            sweeper,
        })
    }

    /// Id of the signed-in user, or the local user when sign-in is disabled
    pub fn current_user_id(&self) -> Result<String> {
        match self.auth.session() {
            Some(session) => Ok(session.user.id),
            None if !self.settings.auth.enabled => Ok(LOCAL_USER.to_string()),
            None => Err(AppError::AuthenticationFailed("Please sign in to continue".to_string())),
        }
    }

    /// Premium lookups that fail are treated as the free tier
    pub async fn is_premium(&self) -> bool {
        if self.auth.session().is_none() {
            return false;
        }
        match self.premium.check().await {
            Ok(status) => status.is_active(),
            Err(e) => {
                warn!(error = %e, "Premium check failed, applying free tier limits");
                false
            }
        }
    }
}
