//! Parsing of structuring service output.

use serde::Deserialize;
use storyreel_core::story::StructuredStory;

use crate::error::StructuringError;

/// Subset of an OpenAI-compatible chat completion response.
#[derive(Debug, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// Content of the first choice, if any and non-blank.
    pub fn into_content(self) -> Result<String, StructuringError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(StructuringError::EmptyResponse)
    }
}

/// Parse the JSON message content into a [`StructuredStory`], filling
/// absent character fields.
pub fn parse_structured_story(content: &str) -> Result<StructuredStory, StructuringError> {
    if content.trim().is_empty() {
        return Err(StructuringError::EmptyResponse);
    }
    let story: StructuredStory = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| StructuringError::Malformed(e.to_string()))?;
    Ok(story.with_character_defaults())
}

/// Models occasionally wrap JSON-mode output in a markdown fence.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}
