//! Pollinations backend.
//!
//! The prompt is URL-encoded into the path of a single `GET` request and
//! the response body is the image. Pollinations has no step/guidance
//! knobs, so the quality hint only toggles its `enhance` flag at level 3.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use crate::backend::{decode_image_response, BackendError, RenderBackend, RenderRequest};
use crate::huggingface::DEFAULT_SEED;
use crate::rendered::RenderedImage;

const BACKEND_NAME: &str = "pollinations";

/// Default prompt endpoint; the prompt is appended as the last path segment.
pub const DEFAULT_BASE_URL: &str = "https://image.pollinations.ai/prompt/";

/// Settings for the Pollinations backend.
#[derive(Debug, Clone)]
pub struct PollinationsConfig {
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    pub width: u32,
    pub height: u32,
}

impl Default for PollinationsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            width: 768,
            height: 768,
        }
    }
}

pub struct PollinationsBackend {
    client: reqwest::Client,
    base_url: Url,
    config: PollinationsConfig,
}

impl PollinationsBackend {
    pub fn new(config: PollinationsConfig) -> Result<Self, BackendError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            BackendError::Configuration(format!(
                "Invalid Pollinations base URL '{}': {e}",
                config.base_url
            ))
        })?;
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    /// Full request URL for `request`, with the prompt as an encoded path
    /// segment.
    pub fn request_url(&self, request: &RenderRequest) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                BackendError::Configuration(format!(
                    "Pollinations base URL '{}' cannot take path segments",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .push(&request.prompt);

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("width", &self.config.width.to_string())
                .append_pair("height", &self.config.height.to_string())
                .append_pair("seed", &DEFAULT_SEED.to_string())
                .append_pair("nologo", "true");
            if !request.negative_prompt.is_empty() {
                query.append_pair("negative_prompt", &request.negative_prompt);
            }
            if request.quality == Some(3) {
                query.append_pair("enhance", "true");
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl RenderBackend for PollinationsBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn render(&self, request: &RenderRequest) -> Result<RenderedImage, BackendError> {
        let url = self.request_url(request)?;
        tracing::debug!(
            host = ?url.host_str(),
            quality = ?request.quality,
            "Requesting Pollinations image",
        );

        let response = self.client.get(url).send().await?;
        decode_image_response(BACKEND_NAME, response).await
    }
}
