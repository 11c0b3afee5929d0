use std::sync::Arc;

use storyreel_pipeline::PipelineOrchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: the orchestrator holds its collaborators behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Story pipeline: submission, queries, and the background task queue.
    pub orchestrator: PipelineOrchestrator,
}
