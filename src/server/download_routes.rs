//! Download submission and control endpoints.
//!
//! The submission handler does the synchronous half of the job: URL
//! sanitization, template validation and resolution, the pre-flight size
//! estimate, and registration. The subprocess work runs in the background;
//! clients follow it by polling the progress endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::extractor::size::estimate_raw_total;
use crate::jobs::{
    AudioFormat, ContentType, JobOptions, JobProgress, Mode, SubtitleLanguage, SubtitleOptions,
};
use crate::naming::{resolve_template, validate_template, TemplateContext};
use crate::server::state::{GuardedOrchestrator, GuardedRegistry, ServerState};
use crate::server::url_policy::sanitize_media_url;
use crate::settings::NamingTemplates;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequestBody {
    pub url: String,
    #[serde(default)]
    pub video_id: Option<String>,
    pub job_id: String,
    pub output_folder: String,
    pub mode: Mode,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub format: Option<AudioFormat>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub content_type: Option<ContentType>,
    #[serde(default)]
    pub create_per_channel_folder: bool,
    #[serde(default)]
    pub download_subtitles: bool,
    #[serde(default)]
    pub subtitle_language: Option<SubtitleLanguage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQueuedResponse {
    pub success: bool,
    pub job_id: String,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ActiveDownloadsResponse {
    pub downloads: HashMap<String, JobProgress>,
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Download not found" })),
    )
        .into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
        .into_response()
}

/// Pick the template matching the request's content type and mode.
fn select_template(templates: &NamingTemplates, content: ContentType, mode: Mode) -> &str {
    let pair = match content {
        ContentType::Single => &templates.single,
        ContentType::Playlist => &templates.playlist,
    };
    match mode {
        Mode::Video => &pair.video,
        Mode::Audio => &pair.audio,
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /download - Validate the request and queue the job.
async fn request_download(
    State(state): State<ServerState>,
    Json(body): Json<DownloadRequestBody>,
) -> Response {
    let url = match sanitize_media_url(&body.url) {
        Ok(url) => url,
        Err(e) => return bad_request(e.to_string()),
    };

    if body.job_id.trim().is_empty() {
        return bad_request("Missing job id");
    }
    if body.output_folder.trim().is_empty() {
        return bad_request("Missing output folder");
    }

    let templates = state.settings.load_templates().unwrap_or_else(|e| {
        warn!("falling back to default templates: {:#}", e);
        NamingTemplates::default()
    });

    let content = body.content_type.unwrap_or_default();
    let template = select_template(&templates, content, body.mode);
    if let Err(e) = validate_template(template, content, body.mode) {
        debug!("template rejected: {}", e);
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string(), "kind": e.kind() })),
        )
            .into_response();
    }

    let format_str = match body.mode {
        Mode::Video => "mp4",
        Mode::Audio => body.format.map(|f| f.as_str()).unwrap_or("mp3"),
    };
    let title = body
        .title
        .as_deref()
        .or(body.video_id.as_deref())
        .unwrap_or(body.job_id.as_str());
    let context = TemplateContext {
        title,
        channel: body.channel.as_deref().unwrap_or(""),
        quality: body.quality.as_deref(),
        format: format_str,
        index: body.index,
    };
    let resolved = resolve_template(template, &context, body.mode);

    let estimated_bytes = estimate_raw_total(
        &state.config.extractor_bin,
        url.as_str(),
        body.mode,
        body.quality.as_deref(),
        None,
    )
    .await;

    let options = JobOptions {
        url: url.to_string(),
        video_id: body.video_id.unwrap_or_default(),
        job_id: body.job_id.clone(),
        output_folder: PathBuf::from(body.output_folder),
        mode: body.mode,
        quality: body.quality,
        audio_format: body.format,
        estimated_bytes,
        resolved_filename: Some(resolved),
        subtitles: SubtitleOptions {
            download: body.download_subtitles,
            language: body.subtitle_language.unwrap_or(SubtitleLanguage::Auto),
        },
        per_channel_folder: body.create_per_channel_folder,
        channel: body.channel,
    };

    if let Err(e) = state.orchestrator.queue_download(options) {
        warn!("failed to queue download: {:#}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response();
    }

    Json(DownloadQueuedResponse {
        success: true,
        job_id: body.job_id,
        status: "queued",
    })
    .into_response()
}

/// GET /downloads/active - Progress of every registered job.
async fn get_active_downloads(State(registry): State<GuardedRegistry>) -> Response {
    Json(ActiveDownloadsResponse {
        downloads: registry.all_progress(),
    })
    .into_response()
}

/// DELETE /downloads/completed - Drop finished jobs from the registry.
async fn clear_finished_downloads(State(registry): State<GuardedRegistry>) -> Response {
    let cleared = registry.clear_finished();
    Json(json!({ "success": true, "cleared": cleared })).into_response()
}

/// GET /download/progress/:job_id
async fn get_progress(
    State(registry): State<GuardedRegistry>,
    Path(job_id): Path<String>,
) -> Response {
    match registry.get_progress(&job_id) {
        Some(progress) => Json(progress).into_response(),
        None => not_found(),
    }
}

/// POST /download/pause/:job_id
async fn pause_download(
    State(orchestrator): State<GuardedOrchestrator>,
    Path(job_id): Path<String>,
) -> Response {
    if orchestrator.pause(&job_id) {
        Json(json!({ "success": true })).into_response()
    } else {
        not_found()
    }
}

/// POST /download/resume/:job_id
async fn resume_download(
    State(orchestrator): State<GuardedOrchestrator>,
    Path(job_id): Path<String>,
) -> Response {
    if orchestrator.resume(&job_id) {
        Json(json!({ "success": true })).into_response()
    } else {
        not_found()
    }
}

/// POST /download/cancel/:job_id
async fn cancel_download(
    State(orchestrator): State<GuardedOrchestrator>,
    Path(job_id): Path<String>,
) -> Response {
    if orchestrator.cancel(&job_id) {
        Json(json!({ "success": true })).into_response()
    } else {
        not_found()
    }
}

// =============================================================================
// Router Construction
// =============================================================================

/// Build the download submission and control routes.
pub fn download_routes() -> Router<ServerState> {
    Router::new()
        .route("/download", post(request_download))
        .route("/downloads/active", get(get_active_downloads))
        .route("/downloads/completed", delete(clear_finished_downloads))
        .route("/download/progress/{job_id}", get(get_progress))
        .route("/download/pause/{job_id}", post(pause_download))
        .route("/download/resume/{job_id}", post(resume_download))
        .route("/download/cancel/{job_id}", post(cancel_download))
}
