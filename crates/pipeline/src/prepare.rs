//! Synchronous structuring stage.
//!
//! Runs before a story is registered so that structuring and validation
//! failures reach the caller directly instead of through polling.

use storyreel_core::assembler::assemble_scene;
use storyreel_core::error::CoreError;
use storyreel_core::request::CreateStoryRequest;
use storyreel_core::safety::prompt_safety_warnings;
use storyreel_core::story::{StoryDraft, StructuredStory};
use storyreel_structuring::StoryStructurer;

use crate::error::PipelineError;

/// Validate `request`, structure it, and assemble every scene prompt.
pub async fn prepare_story(
    structurer: &dyn StoryStructurer,
    request: &CreateStoryRequest,
) -> Result<StoryDraft, PipelineError> {
    request.check()?;

    let structured = structurer
        .structure(&request.prompt, request.max_num_scenes)
        .await?;

    Ok(build_draft(&request.prompt, structured, request.max_num_scenes)?)
}

/// Turn structuring output into a draft, enforcing the scene cap.
pub fn build_draft(
    original_prompt: &str,
    structured: StructuredStory,
    max_scenes: u32,
) -> Result<StoryDraft, CoreError> {
    if structured.story_title.trim().is_empty() {
        return Err(CoreError::Validation(
            "Structuring output has no story title".to_string(),
        ));
    }
    if structured.scenes.is_empty() {
        return Err(CoreError::Validation(
            "Structuring output has no scenes".to_string(),
        ));
    }

    let mut structured = structured.with_character_defaults();
    let cap = max_scenes as usize;
    if structured.scenes.len() > cap {
        tracing::warn!(
            returned = structured.scenes.len(),
            max_scenes,
            "Structuring returned too many scenes, truncating",
        );
        structured.scenes.truncate(cap);
    }

    let scenes = structured
        .scenes
        .iter()
        .enumerate()
        .map(|(index, descriptor)| {
            let scene = assemble_scene(descriptor).map_err(|e| match e {
                CoreError::Validation(msg) => {
                    CoreError::Validation(format!("Scene {}: {msg}", index + 1))
                }
                other => other,
            })?;
            for warning in prompt_safety_warnings(&scene.prompt) {
                tracing::warn!(scene = index + 1, warning, "Prompt safety audit");
            }
            Ok(scene)
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

    Ok(StoryDraft {
        original_prompt: original_prompt.to_string(),
        story_title: structured.story_title,
        visual_style: structured.visual_style,
        character_concept: structured.character_concept,
        character_name: structured.character_name,
        scenes,
    })
}
