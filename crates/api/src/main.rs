use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use storyreel_api::config::ServerConfig;
use storyreel_api::router::build_app_router;
use storyreel_api::state::AppState;
use storyreel_pipeline::journal::JournalStore;
use storyreel_pipeline::postprocess::NoopWatermarkRemover;
use storyreel_pipeline::store::StoryStore;
use storyreel_pipeline::PipelineOrchestrator;
use storyreel_render::factory::{build_backend, RenderConfig};
use storyreel_render::retry::RetryingRenderClient;
use storyreel_structuring::groq::{GroqConfig, GroqStructurer};

const DEFAULT_LOG_FILTER: &str = "storyreel_api=debug,storyreel_pipeline=debug,tower_http=debug";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env().expect("Invalid server configuration");
    tracing::info!(
        host = %config.host,
        port = config.port,
        outputs_dir = %config.outputs_dir.display(),
        "Loaded server configuration",
    );

    let orchestrator = build_orchestrator(&config).await;
    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator: orchestrator.clone(),
    };
    let app = build_app_router(state, &config).expect("Invalid CORS configuration");

    let host = config.host.parse().expect("HOST must be an IP address");
    let addr = SocketAddr::new(host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Connections are closed; let running stories finish within the budget.
    let budget = Duration::from_secs(config.shutdown_timeout_secs);
    if orchestrator.shutdown(budget).await {
        tracing::info!("All story pipelines finished, exiting");
    } else {
        tracing::warn!(
            budget_secs = config.shutdown_timeout_secs,
            "Exiting with story pipelines still running",
        );
    }
}

/// `RUST_LOG` filter (or [`DEFAULT_LOG_FILTER`]); `LOG_FORMAT=json` for
/// JSON lines.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wire structurer, render backend, and persistence into the pipeline.
/// Any misconfiguration aborts startup.
async fn build_orchestrator(config: &ServerConfig) -> PipelineOrchestrator {
    let render_config = RenderConfig::from_env().expect("Invalid render configuration");
    let backend = build_backend(&render_config).expect("Failed to build render backend");
    let renderer = RetryingRenderClient::new(backend, render_config.retry.clone());
    tracing::info!(
        backend = renderer.backend_name(),
        max_attempts = render_config.retry.max_attempts,
        "Renderer ready",
    );

    let groq_config = GroqConfig::from_env().expect("Invalid structuring configuration");
    tracing::info!(model = %groq_config.model, "Structurer ready");
    let structurer = Arc::new(GroqStructurer::new(groq_config));

    let journals = JournalStore::open(&config.outputs_dir)
        .await
        .expect("Failed to open outputs directory");
    let store = Arc::new(StoryStore::new(Arc::new(journals)));

    PipelineOrchestrator::new(
        store,
        structurer,
        renderer,
        Some(Arc::new(NoopWatermarkRemover)),
    )
}

/// Resolve on Ctrl-C, or on SIGTERM where available.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        () = interrupt => "SIGINT",
        () = terminate => "SIGTERM",
    };
    tracing::info!(signal, "Shutting down");
}
