//! The rendering capability the pipeline depends on.

use async_trait::async_trait;

use crate::rendered::RenderedImage;

/// One image render request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub prompt: String,
    pub negative_prompt: String,
    /// Coarse quality hint (1-3). `None` means the backend's neutral midpoint.
    pub quality: Option<u8>,
}

/// Errors from a single render attempt.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("{backend} API error ({status}): {body}")]
    Api {
        backend: &'static str,
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body was not a decodable image.
    #[error("Invalid image payload: {0}")]
    Decode(String),

    /// The backend cannot be built or called with the given settings.
    #[error("Backend misconfigured: {0}")]
    Configuration(String),

    /// The backend reported it cannot serve the request right now.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// A text-to-image backend.
///
/// Implementations perform exactly one attempt per call; retry policy
/// lives in [`crate::retry::RetryingRenderClient`].
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Short identifier used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Render a single image for `request`.
    async fn render(&self, request: &RenderRequest) -> Result<RenderedImage, BackendError>;
}

/// Ensure the response has a success status code. Returns the response
/// unchanged on success, or a [`BackendError::Api`] carrying the status
/// and body text on failure.
pub(crate) async fn ensure_success(
    backend: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(BackendError::Api {
            backend,
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Read a successful response body and decode it as an image.
pub(crate) async fn decode_image_response(
    backend: &'static str,
    response: reqwest::Response,
) -> Result<RenderedImage, BackendError> {
    let response = ensure_success(backend, response).await?;
    let bytes = response.bytes().await?;
    RenderedImage::decode(&bytes)
}
