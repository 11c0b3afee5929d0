use axum::routing::get;
use axum::Router;

use crate::handlers::story;
use crate::state::AppState;

/// Story routes, mounted under `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stories", get(story::list_stories).post(story::create_story))
        .route("/stories/{story_id}", get(story::get_story))
        .route(
            "/stories/{story_id}/scenes/{scene_number}/image",
            get(story::get_scene_image),
        )
}
