use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use barstack::adapters::{FfmpegExecutor, FfprobeProber};
use barstack::{ComposeContext, ComposeError, ComposeSettings, OverlayPosition, ParallelComposer};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

type Composer = ParallelComposer<FfmpegExecutor, FfprobeProber>;

#[derive(Clone)]
struct AppState {
    composer: Arc<Composer>,
    settings: Arc<ComposeSettings>,
}

#[tokio::main]
async fn main() {
    let settings = ComposeSettings::from_env();

    tracing_subscriber::fmt::init();

    let context = match ComposeContext::start(settings.max_active_jobs) {
        Ok(context) => context,
        Err(e) => {
            error!("Failed to start composition context: {}", e);
            std::process::exit(1);
        }
    };

    let composer = Arc::new(ParallelComposer::new(
        FfmpegExecutor::new(&settings.ffmpeg_bin),
        FfprobeProber::new(&settings.ffprobe_bin),
        context.clone(),
    ));

    let addr = format!("{}:{}", settings.addr, settings.port);
    let app = router(AppState {
        composer,
        settings: Arc::new(settings),
    });

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind TCP listener");
    info!("Listening at {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed to start");

    context.shutdown();
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/compose", post(compose_media))
        .route("/health", get(health))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown requested");
}

#[derive(Debug, Deserialize)]
struct ComposeRequest {
    source: PathBuf,
    bar: PathBuf,
    output: PathBuf,
    #[serde(default)]
    position: OverlayPosition,
    chunk_seconds: Option<f64>,
    max_workers: Option<usize>,
    keyframe_multiplier: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ComposeResponse {
    output: PathBuf,
}

async fn compose_media(
    State(state): State<AppState>,
    Json(request): Json<ComposeRequest>,
) -> Result<Json<ComposeResponse>, (StatusCode, String)> {
    for path in [&request.source, &request.bar, &request.output] {
        if !path_is_valid(path) {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Invalid path: {}", path.display()),
            ));
        }
    }

    let config = state
        .settings
        .job_config(
            request.position,
            request.chunk_seconds,
            request.max_workers,
            request.keyframe_multiplier,
        )
        .map_err(into_response)?;

    let output = state
        .composer
        .compose(&request.source, &request.bar, &request.output, &config)
        .await
        .map_err(into_response)?;

    Ok(Json(ComposeResponse { output }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let context = state.composer.context();
    Json(json!({
        "active_jobs": context.active_jobs(),
        "capacity": context.capacity(),
        "shutting_down": context.is_shut_down(),
    }))
}

fn status_for(err: &ComposeError) -> StatusCode {
    match err {
        ComposeError::InvalidArgument(_) | ComposeError::EmptyInput => StatusCode::BAD_REQUEST,
        ComposeError::NotFound(_) => StatusCode::NOT_FOUND,
        ComposeError::InvalidMedia(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ComposeError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn into_response(err: ComposeError) -> (StatusCode, String) {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("Composition failed: {}", err);
    }
    (status, err.to_string())
}

// Inputs and output must be absolute and free of `..`.
fn path_is_valid(path: &Path) -> bool {
    path.is_absolute()
        && !path
            .components()
            .any(|component| matches!(component, Component::ParentDir))
}
