#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use storyreel_api::config::ServerConfig;
use storyreel_api::router::build_app_router;
use storyreel_api::state::AppState;
use storyreel_core::story::{SceneDescriptor, StructuredStory};
use storyreel_pipeline::journal::JournalStore;
use storyreel_pipeline::store::StoryStore;
use storyreel_pipeline::PipelineOrchestrator;
use storyreel_render::backend::{BackendError, RenderBackend, RenderRequest};
use storyreel_render::rendered::RenderedImage;
use storyreel_render::retry::{RetryConfig, RetryingRenderClient};
use storyreel_structuring::{StoryStructurer, StructuringError};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Returns `max_scenes` well-formed scenes for any prompt.
pub struct FakeStructurer;

#[async_trait]
impl StoryStructurer for FakeStructurer {
    async fn structure(
        &self,
        prompt: &str,
        max_scenes: u32,
    ) -> Result<StructuredStory, StructuringError> {
        Ok(StructuredStory {
            story_title: format!("Story of {prompt}"),
            visual_style: "cinematic".into(),
            character_concept: None,
            character_name: None,
            scenes: (1..=max_scenes)
                .map(|n| SceneDescriptor {
                    subject: format!("hero {n}"),
                    action: "crosses the bridge".into(),
                    environment: "a misty valley".into(),
                    style: "wide shot".into(),
                    lighting: "dawn light".into(),
                    mood: None,
                    character_reference: None,
                    consistency_keywords: vec![],
                    negative_prompt: "blurry".into(),
                })
                .collect(),
        })
    }
}

/// Fails every call with the given error.
pub struct FailingStructurer(pub fn() -> StructuringError);

#[async_trait]
impl StoryStructurer for FailingStructurer {
    async fn structure(&self, _: &str, _: u32) -> Result<StructuredStory, StructuringError> {
        Err((self.0)())
    }
}

pub struct SolidBackend;

#[async_trait]
impl RenderBackend for SolidBackend {
    fn name(&self) -> &'static str {
        "solid"
    }

    async fn render(&self, _: &RenderRequest) -> Result<RenderedImage, BackendError> {
        Ok(RenderedImage::solid(8, 8, [20, 40, 60]))
    }
}

pub struct DownBackend;

#[async_trait]
impl RenderBackend for DownBackend {
    fn name(&self) -> &'static str {
        "down"
    }

    async fn render(&self, _: &RenderRequest) -> Result<RenderedImage, BackendError> {
        Err(BackendError::Unavailable("service offline".into()))
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(outputs_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        outputs_dir: outputs_dir.to_path_buf(),
    }
}

/// Build the full application router with all middleware layers over the
/// given collaborators. Returns the state too so tests can inspect it.
pub async fn build_test_app_with(
    outputs_dir: &Path,
    structurer: Arc<dyn StoryStructurer>,
    backend: Arc<dyn RenderBackend>,
) -> (Router, AppState) {
    let config = test_config(outputs_dir);
    let journals = JournalStore::open(outputs_dir).await.unwrap();
    let store = Arc::new(StoryStore::new(Arc::new(journals)));
    let renderer = RetryingRenderClient::new(
        backend,
        RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            ..Default::default()
        },
    );
    let orchestrator = PipelineOrchestrator::new(store, structurer, renderer, None);

    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator,
    };
    let app = build_app_router(state.clone(), &config).unwrap();
    (app, state)
}

/// Test app with a working structurer and renderer.
pub async fn build_test_app(outputs_dir: &Path) -> (Router, AppState) {
    build_test_app_with(outputs_dir, Arc::new(FakeStructurer), Arc::new(SolidBackend)).await
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Poll `GET /api/v1/stories/{id}` until the status is terminal.
pub async fn wait_for_status(app: &Router, story_id: &str) -> serde_json::Value {
    for _ in 0..500 {
        let json = body_json(get(app.clone(), &format!("/api/v1/stories/{story_id}")).await).await;
        let status = json["data"]["status"].as_str().unwrap_or_default().to_string();
        if status == "completed" || status == "failed" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("story {story_id} did not finish");
}
