//! Prompt structuring: turning one free-text idea into a titled story
//! with an ordered list of scene descriptors.
//!
//! The pipeline depends only on the [`StoryStructurer`] capability. The
//! shipped implementation talks to Groq's OpenAI-compatible chat
//! completions endpoint in JSON mode.

pub mod error;
pub mod groq;
pub mod parse;

use async_trait::async_trait;
use storyreel_core::story::StructuredStory;

pub use error::StructuringError;

/// Structures a free-text idea into at most `max_scenes` scenes.
#[async_trait]
pub trait StoryStructurer: Send + Sync {
    async fn structure(
        &self,
        prompt: &str,
        max_scenes: u32,
    ) -> Result<StructuredStory, StructuringError>;
}
