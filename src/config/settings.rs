//! Application settings and configuration management

use crate::catalog::{ModelDescriptor, ModelFamily};
use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub backend: BackendConfig,
    pub huggingface: HuggingFaceConfig,
    pub generation: GenerationConfig,
    pub cache: CacheConfig,
    pub quota: QuotaConfig,
    pub checkout: CheckoutConfig,
    /// Replaces the built-in model catalog when non-empty
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Email domains accepted at signup
    #[serde(default = "default_email_domains")]
    pub allowed_email_domains: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_email_domains() -> Vec<String> {
    vec!["gmail.com".to_string(), "outlook.com".to_string()]
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst_size: u32,
}

fn default_rps() -> u32 {
    2
}

fn default_burst() -> u32 {
    5
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// JSON file backing the local key-value store
    #[serde(default = "default_storage_path")]
    pub base_path: String,
    /// Directory for images materialized from binary provider responses
    #[serde(default = "default_blob_path")]
    pub blob_path: String,
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
    /// "file" or "data_url"
    #[serde(default = "default_blob_mode")]
    pub blob_mode: String,
}

fn default_storage_path() -> String {
    "./studio_data/local_storage.json".to_string()
}

fn default_blob_path() -> String {
    "./studio_data/blobs".to_string()
}

fn default_url_prefix() -> String {
    "http://localhost:8080/blobs".to_string()
}

fn default_blob_mode() -> String {
    "file".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Backend-as-a-service connection (auth, edge functions)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub anon_key: String,
    #[serde(default = "default_generate_function")]
    pub generate_function: String,
    #[serde(default = "default_checkout_function")]
    pub checkout_function: String,
    #[serde(default = "default_premium_function")]
    pub premium_function: String,
    #[serde(default = "default_backend_timeout")]
    pub timeout_ms: u64,
}

fn default_generate_function() -> String {
    "generate-image".to_string()
}

fn default_checkout_function() -> String {
    "handle-polar-checkout".to_string()
}

fn default_premium_function() -> String {
    "handle-premium".to_string()
}

fn default_backend_timeout() -> u64 {
    30000
}

/// Direct inference provider
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HuggingFaceConfig {
    #[serde(default = "default_hf_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

fn default_hf_base_url() -> String {
    "https://api-inference.huggingface.co".to_string()
}

/// Batch dispatch, retry and fallback tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_model")]
    pub fallback_model: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_ms: u64,
    #[serde(default = "default_stagger")]
    pub stagger_ms: u64,
    #[serde(default = "default_base_size")]
    pub base_size: u32,
}

fn default_model() -> String {
    "stabilityai/stable-diffusion-xl-base-1.0".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1000
}

fn default_attempt_timeout() -> u64 {
    60000
}

fn default_stagger() -> u64 {
    300
}

fn default_base_size() -> u32 {
    1024
}

/// Local result cache
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_ttl() -> u64 {
    30 * 60
}

fn default_sweep_interval() -> u64 {
    60
}

/// Free tier allowance
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuotaConfig {
    #[serde(default = "default_daily_limit")]
    pub free_daily_limit: u32,
}

fn default_daily_limit() -> u32 {
    10
}

/// Payment plan
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutConfig {
    #[serde(default = "default_plan_id")]
    pub plan_id: String,
}

fn default_plan_id() -> String {
    "premium-monthly".to_string()
}

/// Model catalog override entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    pub id: String,
    pub name: String,
    pub family: String,
    #[serde(default)]
    pub aspect_ratios: Vec<String>,
    #[serde(default = "default_base_time")]
    pub base_time_secs: u32,
}

fn default_base_time() -> u32 {
    20
}

impl ModelConfig {
    /// Resolve into a catalog descriptor; the family tag is parsed once here
    pub fn to_descriptor(&self) -> Result<ModelDescriptor> {
        let family: ModelFamily = self.family.parse()?;
        let aspect_ratios = if self.aspect_ratios.is_empty() {
            vec!["1:1".to_string()]
        } else {
            self.aspect_ratios.clone()
        };
        Ok(ModelDescriptor {
            id: self.id.clone(),
            display_name: self.name.clone(),
            family,
            aspect_ratios,
            base_time_secs: self.base_time_secs,
        })
    }
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("auth.enabled", true)?
            .set_default("rate_limit.enabled", true)?
            .set_default("rate_limit.requests_per_second", default_rps())?
            .set_default("rate_limit.burst_size", default_burst())?
            .set_default("storage.base_path", default_storage_path())?
            .set_default("logging.level", default_log_level())?
            .set_default("backend.url", "")?
            .set_default("huggingface.api_key", "")?
            .set_default("generation.max_attempts", default_max_attempts())?
            .set_default("cache.ttl_secs", default_ttl())?
            .set_default("quota.free_daily_limit", default_daily_limit())?
            .set_default("checkout.plan_id", default_plan_id())?
            // Load from configuration file
            .add_source(File::with_name(path.as_ref().to_str().unwrap_or("config/default")).required(false))
            // Override with environment variables (prefixed with IMAGEGEN_)
            .add_source(
                Environment::with_prefix("IMAGEGEN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(config_error("Server port cannot be 0"));
        }

        if self.generation.max_attempts == 0 {
            return Err(config_error("generation.max_attempts must be at least 1"));
        }

        if self.generation.base_size < 64 {
            return Err(config_error("generation.base_size must be at least 64"));
        }

        if self.cache.ttl_secs == 0 {
            return Err(config_error("cache.ttl_secs must be positive"));
        }

        if !["file", "data_url"].contains(&self.storage.blob_mode.as_str()) {
            return Err(config_error(&format!(
                "Invalid storage.blob_mode '{}'. Must be 'file' or 'data_url'",
                self.storage.blob_mode
            )));
        }

        for model in &self.models {
            if model.id.is_empty() {
                return Err(config_error("Model id cannot be empty"));
            }
            model.to_descriptor()?;
        }

        let catalog = self.model_catalog()?;
        if !catalog.iter().any(|m| m.id == self.generation.fallback_model) {
            return Err(config_error(&format!(
                "Fallback model '{}' is not in the model catalog",
                self.generation.fallback_model
            )));
        }

        Ok(())
    }

    /// The configured model table, or the built-in one
    pub fn model_catalog(&self) -> Result<Vec<ModelDescriptor>> {
        if self.models.is_empty() {
            return Ok(crate::catalog::builtin_models());
        }
        self.models.iter().map(ModelConfig::to_descriptor).collect()
    }
}

fn config_error(message: &str) -> AppError {
    AppError::Config(config::ConfigError::Message(message.to_string()))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
            auth: AuthConfig {
                enabled: true,
                allowed_email_domains: default_email_domains(),
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                requests_per_second: default_rps(),
                burst_size: default_burst(),
            },
            storage: StorageConfig {
                base_path: default_storage_path(),
                blob_path: default_blob_path(),
                url_prefix: default_url_prefix(),
                blob_mode: default_blob_mode(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
            backend: BackendConfig {
                url: String::new(),
                anon_key: String::new(),
                generate_function: default_generate_function(),
                checkout_function: default_checkout_function(),
                premium_function: default_premium_function(),
                timeout_ms: default_backend_timeout(),
            },
            huggingface: HuggingFaceConfig {
                base_url: default_hf_base_url(),
                api_key: String::new(),
            },
            generation: GenerationConfig {
                default_model: default_model(),
                fallback_model: default_model(),
                max_attempts: default_max_attempts(),
                base_delay_ms: default_base_delay(),
                attempt_timeout_ms: default_attempt_timeout(),
                stagger_ms: default_stagger(),
                base_size: default_base_size(),
            },
            cache: CacheConfig {
                ttl_secs: default_ttl(),
                sweep_interval_secs: default_sweep_interval(),
            },
            quota: QuotaConfig {
                free_daily_limit: default_daily_limit(),
            },
            checkout: CheckoutConfig {
                plan_id: default_plan_id(),
            },
            models: vec![],
        }
    }
}
