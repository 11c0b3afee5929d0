//! Create-story request contract and its validation.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Scene cap applied when the client does not send `max_num_scenes`.
pub const DEFAULT_MAX_NUM_SCENES: u32 = 5;

/// Upper bound a client may request for `max_num_scenes`.
pub const MAX_NUM_SCENES_LIMIT: u32 = 10;

/// Maximum length of the free-text idea in characters.
pub const MAX_PROMPT_LENGTH: u64 = 2_000;

/// Lowest and highest accepted quality hints.
pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 3;

fn default_max_num_scenes() -> u32 {
    DEFAULT_MAX_NUM_SCENES
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("prompt must not be blank".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Body of a create-story request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CreateStoryRequest {
    /// The free-text idea to turn into a story.
    #[validate(
        length(min = 1, max = 2000),
        custom(function = "validate_not_blank")
    )]
    pub prompt: String,
    #[serde(default = "default_max_num_scenes")]
    #[validate(range(min = 1, max = 10))]
    pub max_num_scenes: u32,
    #[serde(default)]
    pub remove_watermarks: bool,
    /// Coarse rendering quality hint, 1 (fast) to 3 (best).
    #[serde(default)]
    #[validate(range(min = 1, max = 3))]
    pub quality: Option<u8>,
}

impl CreateStoryRequest {
    pub fn new(prompt: impl Into<String>, max_num_scenes: u32) -> Self {
        Self {
            prompt: prompt.into(),
            max_num_scenes,
            remove_watermarks: false,
            quality: None,
        }
    }

    /// Run declarative validation, flattening failures into a single
    /// [`CoreError::Validation`].
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(format!("Invalid story request: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults_applied_on_deserialize() {
        let req: CreateStoryRequest =
            serde_json::from_str(r#"{"prompt": "a dog chasing a cat"}"#).unwrap();
        assert_eq!(req.max_num_scenes, DEFAULT_MAX_NUM_SCENES);
        assert!(!req.remove_watermarks);
        assert!(req.quality.is_none());
        assert!(req.check().is_ok());
    }

    #[test]
    fn rejects_empty_prompt() {
        let req = CreateStoryRequest::new("", 3);
        assert_matches!(req.check(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn rejects_blank_prompt() {
        let req = CreateStoryRequest::new("   \n ", 3);
        assert_matches!(req.check(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn rejects_overlong_prompt() {
        let req = CreateStoryRequest::new("x".repeat(MAX_PROMPT_LENGTH as usize + 1), 3);
        assert!(req.check().is_err());
    }

    #[test]
    fn scene_count_bounds() {
        assert!(CreateStoryRequest::new("idea", 0).check().is_err());
        assert!(CreateStoryRequest::new("idea", 1).check().is_ok());
        assert!(CreateStoryRequest::new("idea", MAX_NUM_SCENES_LIMIT).check().is_ok());
        assert!(CreateStoryRequest::new("idea", MAX_NUM_SCENES_LIMIT + 1)
            .check()
            .is_err());
    }

    #[test]
    fn quality_bounds() {
        let mut req = CreateStoryRequest::new("idea", 2);
        for q in MIN_QUALITY..=MAX_QUALITY {
            req.quality = Some(q);
            assert!(req.check().is_ok(), "quality {q} should be accepted");
        }
        req.quality = Some(0);
        assert!(req.check().is_err());
        req.quality = Some(4);
        assert!(req.check().is_err());
    }
}
