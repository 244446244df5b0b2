//! Static model and art-style catalogs

pub mod styles;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{AppError, Result};

/// Parameter-table family a model belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Distilled few-step models (SDXL Turbo, FLUX schnell, ...)
    Turbo,
    /// General-purpose diffusion models
    Standard,
    /// Photographic realism
    Photorealistic,
    /// Anime and illustration tuned models
    Anime,
}

impl FromStr for ModelFamily {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "turbo" => Ok(Self::Turbo),
            "standard" => Ok(Self::Standard),
            "photorealistic" | "photo" => Ok(Self::Photorealistic),
            "anime" => Ok(Self::Anime),
            other => Err(AppError::Config(config::ConfigError::Message(format!(
                "Unknown model family '{}'. Must be one of turbo, standard, photorealistic, anime",
                other
            )))),
        }
    }
}

/// Static description of a selectable model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    pub family: ModelFamily,
    pub aspect_ratios: Vec<String>,
    /// Rough seconds for one image, used for progress estimates
    pub base_time_secs: u32,
}

impl ModelDescriptor {
    pub fn supports_ratio(&self, ratio: &str) -> bool {
        self.aspect_ratios.iter().any(|r| r == ratio)
    }

    /// Expected wall time for a batch, given that attempts run concurrently
    /// but are released with a stagger.
    pub fn estimated_batch_secs(&self, count: u32, stagger_ms: u64) -> f64 {
        let stagger = stagger_ms as f64 * count.saturating_sub(1) as f64 / 1000.0;
        self.base_time_secs as f64 + stagger
    }
}

/// Model lookup table keyed by model id
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
    index: HashMap<String, usize>,
}

impl ModelCatalog {
    pub fn new(models: Vec<ModelDescriptor>) -> Self {
        let index = models
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), i))
            .collect();
        Self { models, index }
    }

    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.index.get(id).map(|&i| &self.models[i])
    }

    pub fn list(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Family for a model id; ids outside the catalog use the standard table
    pub fn family_of(&self, id: &str) -> ModelFamily {
        self.get(id).map(|m| m.family).unwrap_or(ModelFamily::Standard)
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new(builtin_models())
    }
}

const WIDE_RATIOS: &[&str] = &[
    "1:1", "16:9", "9:16", "4:3", "3:4", "3:2", "2:3", "5:4", "4:5", "21:9", "9:21", "2:1",
    "1:2", "3:1", "1:3", "16:10", "10:16", "8:5", "5:8",
];

/// Built-in model table
pub fn builtin_models() -> Vec<ModelDescriptor> {
    fn entry(id: &str, name: &str, family: ModelFamily, ratios: &[&str], secs: u32) -> ModelDescriptor {
        ModelDescriptor {
            id: id.to_string(),
            display_name: name.to_string(),
            family,
            aspect_ratios: ratios.iter().map(|r| r.to_string()).collect(),
            base_time_secs: secs,
        }
    }

    let mut sdxl_ratios = WIDE_RATIOS.to_vec();
    sdxl_ratios.extend(["4:1", "1:4"]);
    let mut lightning_ratios = WIDE_RATIOS.to_vec();
    lightning_ratios.extend(["7:4", "4:7"]);
    let deepfloyd_ratios = &WIDE_RATIOS[..17];

    vec![
        entry("stabilityai/stable-diffusion-xl-base-1.0", "Stable Diffusion XL 1.5+", ModelFamily::Standard, &sdxl_ratios, 20),
        entry("runwayml/stable-diffusion-v1-5", "SD Lightning V2", ModelFamily::Turbo, &lightning_ratios, 8),
        entry("prompthero/openjourney", "OpenJourney V4 Pro", ModelFamily::Anime, WIDE_RATIOS, 15),
        entry("dreamshaper/dreamshaper-xl", "DreamShaper XL Pro", ModelFamily::Anime, WIDE_RATIOS, 18),
        entry("segmind/SSD-1B", "SDXL Turbo Pro", ModelFamily::Turbo, WIDE_RATIOS, 8),
        entry("stabilityai/sdxl-turbo", "SDXL Turbo", ModelFamily::Turbo, WIDE_RATIOS, 5),
        entry("dataautogpt3/RealVisXL-V4", "RealVisXL V4.0 UHD", ModelFamily::Photorealistic, WIDE_RATIOS, 25),
        entry("deepfloyd/IF-I-XL-v1.0", "DeepFloyd IF Ultra", ModelFamily::Standard, deepfloyd_ratios, 30),
        entry("lllyasviel/sd-controlnet-depth", "ControlNet + SDXL", ModelFamily::Standard, WIDE_RATIOS, 25),
        entry("playgroundai/playground-v2.5-1024px-aesthetic", "Playground V2.5 Ultra", ModelFamily::Standard, WIDE_RATIOS, 22),
        entry("stabilityai/stable-diffusion-3-medium", "Stable Diffusion 3 Medium", ModelFamily::Standard, WIDE_RATIOS, 25),
        entry("ByteDance/FLUX-1-schnell", "FLUX.1-schnell MAX", ModelFamily::Turbo, WIDE_RATIOS, 10),
        entry("PixArt-alpha/PixArt-XL-2-1024-MS", "PixArt-Σ Ultra", ModelFamily::Photorealistic, WIDE_RATIOS, 22),
    ]
}
