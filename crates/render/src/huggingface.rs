//! Hugging Face inference backend.
//!
//! Calls the inference router's text-to-image task for a configured model
//! and provider. The quality hint is translated into step count and
//! guidance via [`resolve_quality`].

use async_trait::async_trait;
use serde_json::json;

use crate::backend::{decode_image_response, BackendError, RenderBackend, RenderRequest};
use crate::quality::{resolve_quality, DEFAULT_BASE_GUIDANCE, DEFAULT_BASE_STEPS};
use crate::rendered::RenderedImage;

const BACKEND_NAME: &str = "huggingface";

/// Fixed sampler seed so that scenes within a story share a look.
pub const DEFAULT_SEED: u64 = 123_456;

/// Default inference router base URL.
pub const DEFAULT_BASE_URL: &str = "https://router.huggingface.co";

/// Settings for the Hugging Face backend.
#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    pub api_key: String,
    pub model: String,
    /// Inference provider, e.g. `hf-inference`.
    pub provider: String,
    pub base_url: String,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "black-forest-labs/FLUX.1-schnell".to_string(),
            provider: "hf-inference".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            num_inference_steps: DEFAULT_BASE_STEPS,
            guidance_scale: DEFAULT_BASE_GUIDANCE,
            width: 768,
            height: 768,
        }
    }
}

/// Text-to-image through the Hugging Face inference router.
pub struct HuggingFaceBackend {
    client: reqwest::Client,
    config: HuggingFaceConfig,
}

impl HuggingFaceBackend {
    pub fn new(config: HuggingFaceConfig) -> Result<Self, BackendError> {
        if config.api_key.trim().is_empty() {
            return Err(BackendError::Configuration(
                "HUGGING_FACE_KEY must be set for the Hugging Face backend".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }

    /// Model endpoint: `{base}/{provider}/models/{model}`.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/models/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.provider,
            self.config.model
        )
    }

    /// JSON request body for `request`.
    pub fn payload(&self, request: &RenderRequest) -> serde_json::Value {
        let params = resolve_quality(
            request.quality,
            self.config.num_inference_steps,
            self.config.guidance_scale,
        );

        json!({
            "inputs": request.prompt,
            "parameters": {
                "negative_prompt": request.negative_prompt,
                "num_inference_steps": params.steps,
                "guidance_scale": params.guidance_scale,
                "width": self.config.width,
                "height": self.config.height,
                "seed": DEFAULT_SEED,
            }
        })
    }
}

#[async_trait]
impl RenderBackend for HuggingFaceBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn render(&self, request: &RenderRequest) -> Result<RenderedImage, BackendError> {
        tracing::debug!(
            model = %self.config.model,
            provider = %self.config.provider,
            quality = ?request.quality,
            "Submitting text-to-image request",
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .header(reqwest::header::ACCEPT, "image/png")
            .json(&self.payload(request))
            .send()
            .await?;

        decode_image_response(BACKEND_NAME, response).await
    }
}
