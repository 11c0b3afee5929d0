//! Story record, scene projection, and the story status state machine.
//!
//! A story moves `pending -> processing -> {completed | failed}`. Terminal
//! states are final. `archived` is never reached by a transition: it only
//! labels stories reconstructed from an on-disk journal that are not
//! resident in memory.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{StoryId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Archived,
}

impl StoryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StoryStatus::Pending => "pending",
            StoryStatus::Processing => "processing",
            StoryStatus::Completed => "completed",
            StoryStatus::Failed => "failed",
            StoryStatus::Archived => "archived",
        }
    }

    /// `completed` and `failed` are final; no transition leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, StoryStatus::Completed | StoryStatus::Failed)
    }
}

impl std::fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Structuring output
// ---------------------------------------------------------------------------

/// Consistency keywords used when the structuring service omits them.
pub const DEFAULT_CONSISTENCY_KEYWORDS: &[&str] =
    &["consistent visual style", "cohesive narrative"];

fn default_consistency_keywords() -> Vec<String> {
    DEFAULT_CONSISTENCY_KEYWORDS
        .iter()
        .map(|k| k.to_string())
        .collect()
}

/// One structured scene as returned by the prompt structuring service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescriptor {
    /// Who or what the scene is about.
    pub subject: String,
    /// What the subject does, as a verb phrase ("chases the cat").
    pub action: String,
    /// Where the scene takes place.
    pub environment: String,
    /// Per-scene visual style ("cinematic wide shot").
    pub style: String,
    /// Lighting and atmosphere.
    pub lighting: String,
    #[serde(default)]
    pub mood: Option<String>,
    /// Celebrity or character name, only when the user named one.
    #[serde(default)]
    pub character_reference: Option<String>,
    #[serde(default = "default_consistency_keywords")]
    pub consistency_keywords: Vec<String>,
    #[serde(default)]
    pub negative_prompt: String,
}

/// Complete output of the prompt structuring service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredStory {
    pub story_title: String,
    pub visual_style: String,
    #[serde(default)]
    pub character_concept: Option<String>,
    #[serde(default)]
    pub character_name: Option<String>,
    pub scenes: Vec<SceneDescriptor>,
}

impl StructuredStory {
    /// Fill absent character fields: the concept defaults to the visual
    /// style, and the name defaults to the concept.
    pub fn with_character_defaults(mut self) -> Self {
        let concept = self
            .character_concept
            .take()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| self.visual_style.clone());
        let name = self
            .character_name
            .take()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| concept.clone());
        self.character_concept = Some(concept);
        self.character_name = Some(name);
        self
    }
}

// ---------------------------------------------------------------------------
// Draft (structured + assembled, not yet persisted)
// ---------------------------------------------------------------------------

/// Final prompt pair produced for one scene by the scene assembler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenePrompt {
    pub prompt: String,
    pub negative_prompt: String,
}

/// A fully structured story ready to be registered and rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryDraft {
    pub original_prompt: String,
    pub story_title: String,
    pub visual_style: String,
    pub character_concept: Option<String>,
    pub character_name: Option<String>,
    pub scenes: Vec<ScenePrompt>,
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Externally addressable URL for a scene image.
pub fn scene_image_url(story_id: StoryId, scene_number: u32) -> String {
    format!("/api/v1/stories/{story_id}/scenes/{scene_number}/image")
}

/// One scene within a story. `image_url` and `image_path` stay `None`
/// until the story completes, and are never cleared afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneOutput {
    /// 1-indexed, stable position within the story.
    pub scene_number: u32,
    pub prompt: String,
    pub negative_prompt: String,
    pub image_url: Option<String>,
    pub image_path: Option<String>,
}

/// Full lifecycle state of one story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub story_id: StoryId,
    pub status: StoryStatus,
    pub original_prompt: String,
    pub story_title: String,
    pub visual_style: String,
    pub character_concept: Option<String>,
    pub character_name: Option<String>,
    pub scenes: Vec<SceneOutput>,
    /// Saved image paths in scene order; empty unless `completed`.
    pub images: Vec<String>,
    pub output_dir: String,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub error: Option<String>,
}

impl StoryRecord {
    /// Build a `pending` record from a draft. Scene numbers are assigned
    /// here and never change.
    pub fn pending(
        story_id: StoryId,
        draft: StoryDraft,
        output_dir: String,
        created_at: Timestamp,
    ) -> Self {
        let scenes = draft
            .scenes
            .into_iter()
            .zip(1u32..)
            .map(|(scene, scene_number)| SceneOutput {
                scene_number,
                prompt: scene.prompt,
                negative_prompt: scene.negative_prompt,
                image_url: None,
                image_path: None,
            })
            .collect();

        Self {
            story_id,
            status: StoryStatus::Pending,
            original_prompt: draft.original_prompt,
            story_title: draft.story_title,
            visual_style: draft.visual_style,
            character_concept: draft.character_concept,
            character_name: draft.character_name,
            scenes,
            images: Vec::new(),
            output_dir,
            created_at,
            completed_at: None,
            error: None,
        }
    }

    /// Look up a scene by its 1-indexed number.
    pub fn scene(&self, scene_number: u32) -> Option<&SceneOutput> {
        self.scenes.iter().find(|s| s.scene_number == scene_number)
    }

    /// `pending -> processing`.
    pub fn start_processing(&mut self) -> Result<(), CoreError> {
        match self.status {
            StoryStatus::Pending => {
                self.status = StoryStatus::Processing;
                Ok(())
            }
            other => Err(self.illegal_transition(other, StoryStatus::Processing)),
        }
    }

    /// `processing -> completed`, attaching one saved image path per scene.
    ///
    /// The path list must match the scene list exactly; a story is never
    /// half-illustrated.
    pub fn complete(&mut self, image_paths: Vec<String>, at: Timestamp) -> Result<(), CoreError> {
        if self.status != StoryStatus::Processing {
            return Err(self.illegal_transition(self.status, StoryStatus::Completed));
        }
        if image_paths.len() != self.scenes.len() {
            return Err(CoreError::Validation(format!(
                "Story {} has {} scenes but {} images were saved",
                self.story_id,
                self.scenes.len(),
                image_paths.len()
            )));
        }

        let story_id = self.story_id;
        for (scene, path) in self.scenes.iter_mut().zip(&image_paths) {
            scene.image_path = Some(path.clone());
            scene.image_url = Some(scene_image_url(story_id, scene.scene_number));
        }
        self.images = image_paths;
        self.status = StoryStatus::Completed;
        self.completed_at = Some(at);
        Ok(())
    }

    /// `pending | processing -> failed`, capturing the error message.
    pub fn fail(&mut self, message: impl Into<String>, at: Timestamp) -> Result<(), CoreError> {
        if self.status.is_terminal() || self.status == StoryStatus::Archived {
            return Err(self.illegal_transition(self.status, StoryStatus::Failed));
        }
        self.status = StoryStatus::Failed;
        self.error = Some(message.into());
        self.completed_at = Some(at);
        Ok(())
    }

    /// Compact listing projection.
    pub fn summary(&self) -> StorySummary {
        StorySummary {
            story_id: self.story_id,
            status: self.status,
            story_title: self.story_title.clone(),
            visual_style: self.visual_style.clone(),
            scene_count: self.scenes.len(),
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }

    fn illegal_transition(&self, from: StoryStatus, to: StoryStatus) -> CoreError {
        CoreError::Conflict(format!(
            "Story {} cannot move from '{from}' to '{to}'",
            self.story_id
        ))
    }
}

/// Listing entry for one story.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorySummary {
    pub story_id: StoryId,
    pub status: StoryStatus,
    pub story_title: String,
    pub visual_style: String,
    pub scene_count: usize,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
