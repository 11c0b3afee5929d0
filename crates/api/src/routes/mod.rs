pub mod health;
pub mod story;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /stories                                       list, create
/// /stories/{story_id}                            get
/// /stories/{story_id}/scenes/{scene_number}/image  scene PNG
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(story::router())
}
