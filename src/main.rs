// HTTP entry point for the overlay translation pipeline

use overlay_translate::{
    core::{Config, PipelineError, PipelineOutput, TranslationError},
    services::{DetectionService, GeminiTranslator, PaddleDetector, TranslationDispatcher},
    utils::Metrics,
    ImageSource, Pipeline,
};

use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

type OverlayPipeline = Pipeline<PaddleDetector, GeminiTranslator>;

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pipeline: Arc<OverlayPipeline>,
    metrics: Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new().context("Failed to load configuration")?);

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "overlay_translate={}",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== OVERLAY TRANSLATE ===");
    info!(
        "Config: languages={} target={} model={} pairing={:?}",
        config.detector_params().languages.join("+"),
        config.target_language(),
        config.api.translation_model,
        config.translation.pairing
    );
    if config.api.api_key.is_none() {
        info!("GEMINI_API_KEY is not set; /translate will fail until it is");
    }

    // Initialize metrics
    let metrics = Metrics::new();

    info!("Initializing pipeline...");
    let detector = PaddleDetector::new(&config.detection.models_dir, &config.detector_params().languages)
        .context("Failed to initialize text detector")?;
    let translator = GeminiTranslator::new(&config.api, Some(metrics.clone()))?;

    let pipeline = Pipeline::new(
        DetectionService::new(detector, config.detector_params().clone()).with_metrics(metrics.clone()),
        TranslationDispatcher::new(translator)
            .with_pairing(config.translation.pairing)
            .with_metrics(metrics.clone()),
        config.target_language(),
        metrics.clone(),
    );

    let state = AppState {
        config: config.clone(),
        pipeline: Arc::new(pipeline),
        metrics,
    };

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .route("/translate", post(translate_frame))
        .route("/reset", post(reset_session))
        .with_state(state)
        .layer(DefaultBodyLimit::max(32 * 1024 * 1024))
        .layer(cors);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /           - Root endpoint");
    info!("  GET  /health     - Health check");
    info!("  GET  /metrics    - Prometheus metrics");
    info!("  GET  /stats      - Detailed statistics");
    info!("  POST /translate  - Translate a frame (multipart/form-data)");
    info!("  POST /reset      - Forget the previous frame");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> &'static str {
    "Overlay Translate - screen text detection and translation"
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "detector": state.pipeline.detector_name(),
        "target_language": state.pipeline.target_language(),
        "api_key_configured": state.config.api.api_key.is_some(),
        "session": format!("{:?}", state.pipeline.session_state().await),
    }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let snapshot = state.metrics.snapshot();
    serde_json::to_value(snapshot).map(Json).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize metrics: {}", e),
        )
    })
}

/// Translate one captured frame
///
/// # Request Format:
/// - multipart/form-data
/// - Field "image": the captured frame (PNG/JPEG)
/// - Field "target_language" (optional): overrides TARGET_LANGUAGE for this call
///
/// # Response:
/// - PipelineOutput JSON: translated fragments with their bounding boxes
async fn translate_frame(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PipelineOutput>, (StatusCode, String)> {
    let mut image: Option<Vec<u8>> = None;
    let mut target_language: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "image" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, format!("Read error: {}", e)))?;
                image = Some(data.to_vec());
            }
            "target_language" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, format!("Field read error: {}", e)))?;
                let value = value.trim();
                if !value.is_empty() {
                    target_language = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    let Some(image) = image else {
        return Err((StatusCode::BAD_REQUEST, "No image provided".to_string()));
    };

    let output = state
        .pipeline
        .process(ImageSource::from(image), target_language.as_deref())
        .await
        .map_err(|e| {
            error!("Frame processing failed: {}", e);
            (status_for(&e), format!("Processing failed: {}", e))
        })?;

    Ok(Json(output))
}

async fn reset_session(State(state): State<AppState>) -> StatusCode {
    state.pipeline.reset().await;
    StatusCode::NO_CONTENT
}

fn status_for(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::ImageLoad(_) => StatusCode::BAD_REQUEST,
        PipelineError::Translation(TranslationError::MissingApiKey) => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::Translation(_) => StatusCode::BAD_GATEWAY,
        PipelineError::Detection(_) | PipelineError::TaskJoin(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
