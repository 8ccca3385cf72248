//! HTTP app assembly and the remaining API handlers.

use anyhow::Result;
use std::path::Path as FsPath;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use axum::{
    extract::rejection::JsonRejection,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::services::{ServeDir, ServeFile};

use super::download_routes::download_routes;
use super::state::{GuardedSettings, ServerState};
use super::url_policy::sanitize_media_url;
use super::{log_requests, stamp_api_version, ServerConfig};
use crate::extractor::metadata::fetch_metadata;
use crate::extractor::size::{estimate_raw_total, project_audio_size, validate_playlist_items};
use crate::jobs::{AudioFormat, JobRegistry, Mode};
use crate::orchestrator::DownloadOrchestrator;
use crate::settings::{NamingTemplates, SettingsStore};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    hash: String,
    timestamp: i64,
    uptime: String,
}

fn format_uptime(duration: std::time::Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

/// GET /health
async fn health(State(state): State<ServerState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        hash: state.hash.clone(),
        timestamp: chrono::Utc::now().timestamp(),
        uptime: format_uptime(state.start_time.elapsed()),
    })
}

/// GET /naming-templates
async fn get_naming_templates(State(settings): State<GuardedSettings>) -> Response {
    match settings.load_templates() {
        Ok(templates) => Json(json!({ "namingTemplates": templates })).into_response(),
        Err(e) => {
            warn!("failed to read naming templates: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutTemplatesBody {
    naming_templates: NamingTemplates,
}

/// PUT /naming-templates
async fn put_naming_templates(
    State(settings): State<GuardedSettings>,
    body: Result<Json<PutTemplatesBody>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = body else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing namingTemplates" })),
        )
            .into_response();
    };

    match settings.save_templates(&body.naming_templates) {
        Ok(()) => Json(json!({
            "success": true,
            "namingTemplates": body.naming_templates,
        }))
        .into_response(),
        Err(e) => {
            warn!("failed to save naming templates: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetadataBody {
    url: String,
}

/// POST /metadata
async fn post_metadata(
    State(state): State<ServerState>,
    Json(body): Json<MetadataBody>,
) -> Response {
    let url = match sanitize_media_url(&body.url) {
        Ok(url) => url,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    match fetch_metadata(&state.config.extractor_bin, url.as_str()).await {
        Ok(metadata) => Json(metadata).into_response(),
        Err(e) => {
            warn!("metadata fetch failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilesizeBody {
    url: String,
    mode: Mode,
    #[serde(default)]
    quality: Option<String>,
    #[serde(default)]
    format: Option<AudioFormat>,
    #[serde(default)]
    playlist_items: Option<String>,
}

/// POST /filesize
async fn post_filesize(
    State(state): State<ServerState>,
    Json(body): Json<FilesizeBody>,
) -> Response {
    let url = match sanitize_media_url(&body.url) {
        Ok(url) => url,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    if let Some(items) = body.playlist_items.as_deref() {
        if let Err(e) = validate_playlist_items(items) {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    }

    let raw = estimate_raw_total(
        &state.config.extractor_bin,
        url.as_str(),
        body.mode,
        body.quality.as_deref(),
        body.playlist_items.as_deref(),
    )
    .await;

    let file_size = match body.mode {
        Mode::Audio => project_audio_size(raw, body.format),
        Mode::Video => raw,
    };

    Json(json!({ "fileSize": file_size })).into_response()
}

/// Fallback for unknown paths when no frontend directory is configured.
async fn missing_frontend() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "Frontend not configured; API available under /api",
    }))
}

/// Build the full application router.
pub fn make_app(
    config: ServerConfig,
    registry: Arc<dyn JobRegistry>,
    settings: Arc<SettingsStore>,
) -> Router {
    let orchestrator = Arc::new(DownloadOrchestrator::new(
        registry.clone(),
        config.extractor_bin.clone(),
    ));

    let state = ServerState {
        config: config.clone(),
        start_time: Instant::now(),
        registry,
        orchestrator,
        settings,
        hash: env!("GIT_HASH").to_string(),
    };

    let api_routes: Router<ServerState> = Router::new()
        .route("/health", get(health))
        .route(
            "/naming-templates",
            get(get_naming_templates).put(put_naming_templates),
        )
        .route("/metadata", post(post_metadata))
        .route("/filesize", post(post_filesize))
        .merge(download_routes());

    let app = Router::new().nest("/api", api_routes);

    // Unknown paths serve the SPA so client-side routing keeps working on
    // reload.
    let app = match config.frontend_dir_path {
        Some(frontend_path) => {
            let index = FsPath::new(&frontend_path).join("index.html");
            let static_files_service = ServeDir::new(&frontend_path)
                .append_index_html_on_directories(true)
                .fallback(ServeFile::new(index));
            app.fallback_service(static_files_service)
        }
        None => app.fallback(missing_frontend),
    };

    app.layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .layer(middleware::from_fn(stamp_api_version))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn run_server(
    config: ServerConfig,
    registry: Arc<dyn JobRegistry>,
    settings: Arc<SettingsStore>,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, registry, settings);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Ready to serve at port {}!", port);
    Ok(axum::serve(listener, app).await?)
}
