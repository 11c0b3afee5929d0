//! Post-processing stage applied to a story's full image set.

use async_trait::async_trait;
use storyreel_render::rendered::RenderedImage;

#[derive(Debug, thiserror::Error)]
pub enum PostprocessError {
    #[error("Post-processing backend failed: {0}")]
    Backend(String),

    #[error("Post-processing returned {returned} images for {expected} inputs")]
    CountMismatch { expected: usize, returned: usize },
}

/// Transforms a full set of rendered images. A failure is never fatal to
/// the story; the caller falls back to the unprocessed images.
#[async_trait]
pub trait Postprocessor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn process(&self, images: &[RenderedImage])
        -> Result<Vec<RenderedImage>, PostprocessError>;
}

/// Watermark remover stand-in that returns its input unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWatermarkRemover;

#[async_trait]
impl Postprocessor for NoopWatermarkRemover {
    fn name(&self) -> &'static str {
        "noop-watermark-remover"
    }

    async fn process(
        &self,
        images: &[RenderedImage],
    ) -> Result<Vec<RenderedImage>, PostprocessError> {
        Ok(images.to_vec())
    }
}

/// Run `postprocessor` and enforce one output per input.
pub async fn run_postprocessor(
    postprocessor: &dyn Postprocessor,
    images: &[RenderedImage],
) -> Result<Vec<RenderedImage>, PostprocessError> {
    let processed = postprocessor.process(images).await?;
    if processed.len() != images.len() {
        return Err(PostprocessError::CountMismatch {
            expected: images.len(),
            returned: processed.len(),
        });
    }
    Ok(processed)
}
