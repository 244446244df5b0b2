//! Aspect ratio, quality and model family to provider parameters

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::catalog::ModelFamily;
use crate::error::{AppError, Result};

/// Undesirable attributes sent with every request
pub const BASE_NEGATIVE_PROMPT: &str =
    "blurry, distorted, low quality, ugly, duplicate, poorly drawn, low resolution";

/// Provider parameters for one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub width: u32,
    pub height: u32,
    pub inference_steps: u32,
    pub guidance_scale: f32,
    pub negative_prompt: String,
}

impl GenerationParams {
    /// Size in the "WxH" form the proxied provider expects
    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Linear quality mapping for one model family
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyProfile {
    pub steps_base: u32,
    pub steps_per_quality: u32,
    pub guidance_base: f32,
    pub guidance_per_quality: f32,
    /// Appended to the baseline negative prompt
    pub negative_extra: String,
}

impl FamilyProfile {
    fn steps(&self, quality: u8) -> u32 {
        self.steps_base + self.steps_per_quality * quality as u32
    }

    fn guidance(&self, quality: u8) -> f32 {
        self.guidance_base + self.guidance_per_quality * quality as f32
    }
}

/// Default per-family tables
pub fn default_profiles() -> HashMap<ModelFamily, FamilyProfile> {
    let mut table = HashMap::new();
    table.insert(
        ModelFamily::Turbo,
        FamilyProfile {
            steps_base: 2,
            steps_per_quality: 1,
            guidance_base: 0.5,
            guidance_per_quality: 0.15,
            negative_extra: String::new(),
        },
    );
    table.insert(
        ModelFamily::Standard,
        FamilyProfile {
            steps_base: 30,
            steps_per_quality: 2,
            guidance_base: 5.5,
            guidance_per_quality: 0.5,
            negative_extra: String::new(),
        },
    );
    table.insert(
        ModelFamily::Photorealistic,
        FamilyProfile {
            steps_base: 32,
            steps_per_quality: 2,
            guidance_base: 4.5,
            guidance_per_quality: 0.35,
            negative_extra: "overexposed, underexposed, oversaturated, washed out, cartoon, painting"
                .to_string(),
        },
    );
    table.insert(
        ModelFamily::Anime,
        FamilyProfile {
            steps_base: 25,
            steps_per_quality: 2,
            guidance_base: 6.0,
            guidance_per_quality: 0.4,
            negative_extra: "bad anatomy, extra limbs, extra fingers, missing fingers, deformed hands, fused fingers"
                .to_string(),
        },
    );
    table
}

/// Maps user choices onto provider parameters
#[derive(Debug, Clone)]
pub struct ParameterMapper {
    base_size: u32,
    profiles: HashMap<ModelFamily, FamilyProfile>,
}

impl ParameterMapper {
    pub fn new(base_size: u32) -> Self {
        Self {
            base_size,
            profiles: default_profiles(),
        }
    }

    /// Replace the table used for one family
    pub fn with_profile(mut self, family: ModelFamily, profile: FamilyProfile) -> Self {
        self.profiles.insert(family, profile);
        self
    }

    /// Map an aspect ratio, quality (1-10, clamped) and family to parameters
    pub fn map(&self, aspect_ratio: &str, quality: u8, family: ModelFamily) -> Result<GenerationParams> {
        let (width, height) = self.dimensions(aspect_ratio)?;
        let quality = quality.clamp(1, 10);
        let profile = self
            .profiles
            .get(&family)
            .or_else(|| self.profiles.get(&ModelFamily::Standard))
            .ok_or_else(|| AppError::Internal(format!("No parameter table for {:?}", family)))?;

        let negative_prompt = if profile.negative_extra.is_empty() {
            BASE_NEGATIVE_PROMPT.to_string()
        } else {
            format!("{}, {}", BASE_NEGATIVE_PROMPT, profile.negative_extra)
        };

        Ok(GenerationParams {
            width,
            height,
            inference_steps: profile.steps(quality),
            guidance_scale: profile.guidance(quality),
            negative_prompt,
        })
    }

    /// Pixel dimensions with the longer side fixed at the base size
    pub fn dimensions(&self, aspect_ratio: &str) -> Result<(u32, u32)> {
        let (w, h) = parse_aspect_ratio(aspect_ratio)?;
        let base = self.base_size as f64;

        if w > h {
            let height = (base * h as f64 / w as f64).round().max(1.0) as u32;
            Ok((self.base_size, height))
        } else {
            let width = (base * w as f64 / h as f64).round().max(1.0) as u32;
            Ok((width, self.base_size))
        }
    }
}

impl Default for ParameterMapper {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Parse "W:H" into two positive integers
pub fn parse_aspect_ratio(aspect_ratio: &str) -> Result<(u32, u32)> {
    let invalid = || AppError::InvalidAspectRatio(aspect_ratio.to_string());

    let (w, h) = aspect_ratio.split_once(':').ok_or_else(invalid)?;
    let w: u32 = w.trim().parse().map_err(|_| invalid())?;
    let h: u32 = h.trim().parse().map_err(|_| invalid())?;

    if w == 0 || h == 0 {
        return Err(invalid());
    }
    Ok((w, h))
}
