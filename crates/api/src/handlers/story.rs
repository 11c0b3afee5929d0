//! Handlers for story submission, polling, listing, and scene images.

use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use storyreel_core::request::CreateStoryRequest;
use storyreel_core::types::StoryId;

use crate::error::{AppError, AppResult};
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

fn parse_story_id(raw: &str) -> AppResult<StoryId> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid story id '{raw}'")))
}

// ---------------------------------------------------------------------------
// POST /stories
// ---------------------------------------------------------------------------

/// Structure the idea and schedule rendering.
///
/// Returns 202 with the story in `processing` and its scene prompts; images
/// appear once polling reports `completed`.
pub async fn create_story(
    State(state): State<AppState>,
    Json(request): Json<CreateStoryRequest>,
) -> AppResult<impl IntoResponse> {
    let record = state.orchestrator.submit(request).await?;

    tracing::info!(
        story_id = %record.story_id,
        scenes = record.scenes.len(),
        "Story accepted",
    );

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: record })))
}

// ---------------------------------------------------------------------------
// GET /stories
// ---------------------------------------------------------------------------

/// List resident and archived stories, newest first.
pub async fn list_stories(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let stories = state
        .orchestrator
        .list(params.limit(), params.offset())
        .await?;

    tracing::debug!(count = stories.len(), "Listed stories");

    Ok(Json(DataResponse { data: stories }))
}

// ---------------------------------------------------------------------------
// GET /stories/{story_id}
// ---------------------------------------------------------------------------

pub async fn get_story(
    State(state): State<AppState>,
    Path(story_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let story_id = parse_story_id(&story_id)?;
    let record = state.orchestrator.fetch(story_id).await?;
    Ok(Json(DataResponse { data: record }))
}

// ---------------------------------------------------------------------------
// GET /stories/{story_id}/scenes/{scene_number}/image
// ---------------------------------------------------------------------------

/// Raw PNG bytes of one scene.
pub async fn get_scene_image(
    State(state): State<AppState>,
    Path((story_id, scene_number)): Path<(String, u32)>,
) -> AppResult<impl IntoResponse> {
    let story_id = parse_story_id(&story_id)?;
    let png = state
        .orchestrator
        .scene_image(story_id, scene_number)
        .await?;
    Ok(([(CONTENT_TYPE, "image/png")], png))
}
