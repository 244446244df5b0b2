//! Direct inference provider (Hugging-Face-style `POST /models/<id>`)

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::HuggingFaceConfig;
use crate::error::{AppError, Result};
use crate::provider::traits::{classify_status, ImageProvider, ProviderKind, ProviderRequest};
use crate::storage::blob::BlobStore;

/// Inference API client that returns images as binary payloads
pub struct HuggingFaceProvider {
    client: Client,
    base_url: String,
    api_key: String,
    blobs: Arc<BlobStore>,
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters<'a>,
}

#[derive(Debug, Serialize)]
struct InferenceParameters<'a> {
    width: u32,
    height: u32,
    num_inference_steps: u32,
    guidance_scale: f32,
    negative_prompt: &'a str,
    num_images_per_prompt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct InferenceError {
    #[serde(default)]
    error: Option<String>,
}

impl HuggingFaceProvider {
    /// Create a provider. Per-attempt timeouts are enforced by the retry
    /// unit, so the client itself carries none.
    pub fn new(config: &HuggingFaceConfig, blobs: Arc<BlobStore>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            blobs,
        })
    }

    fn model_url(&self, model: &str) -> String {
        format!("{}/models/{}", self.base_url, model)
    }
}

#[async_trait]
impl ImageProvider for HuggingFaceProvider {
    fn name(&self) -> &str {
        "huggingface"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::HuggingFace
    }

    fn selects_model(&self) -> bool {
        true
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<Vec<String>> {
        let model = request
            .model
            .as_deref()
            .ok_or_else(|| AppError::Validation("A model must be selected".to_string()))?;
        let url = self.model_url(model);

        debug!(provider = "huggingface", model = %model, seed = ?request.seed, "Sending inference request");

        let body = InferenceRequest {
            inputs: &request.prompt,
            parameters: InferenceParameters {
                width: request.params.width,
                height: request.params.height,
                num_inference_steps: request.params.inference_steps,
                guidance_scale: request.params.guidance_scale,
                negative_prompt: &request.params.negative_prompt,
                num_images_per_prompt: 1,
                seed: request.seed,
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    AppError::TransientProvider(format!("Connection failed to {}: {}", url, e))
                } else {
                    AppError::HttpClient(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<InferenceError>(&text)
                .ok()
                .and_then(|e| e.error)
                .unwrap_or_else(|| {
                    format!(
                        "Failed to generate image with model {}: {}",
                        model,
                        status.canonical_reason().unwrap_or("unknown status")
                    )
                });
            warn!(provider = "huggingface", model = %model, status = status.as_u16(), error = %message, "Inference request failed");
            return Err(classify_status(status.as_u16(), &message));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if content_type.as_deref().is_some_and(|ct| ct.starts_with("application/json")) {
            // A 200 with a JSON body is an error envelope, not an image
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<InferenceError>(&text)
                .ok()
                .and_then(|e| e.error)
                .unwrap_or_else(|| "Provider returned JSON instead of an image".to_string());
            return Err(classify_status(status.as_u16(), &message));
        }

        let bytes = response.bytes().await?;
        let reference = self.blobs.materialize(&bytes, content_type.as_deref()).await?;
        Ok(vec![reference])
    }
}
