//! HTTP request logging tuned to this service's traffic shape.
//!
//! While a download runs, clients hit the progress endpoints several times
//! a second; logged naively, that chatter drowns the lines that matter
//! (submissions, pause/resume/cancel, failures). The logging levels are
//! therefore built around which traffic to keep, not just how verbose to
//! be.

use axum::extract::State;
use axum::{
    body::{to_bytes, Body},
    http::Request,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info, warn};

use super::super::state::ServerState;

/// How much request traffic ends up in the log.
#[derive(PartialEq, PartialOrd, Clone, Debug, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    /// No request logging at all.
    None,
    /// Submissions and control actions; progress polling stays quiet.
    Control,
    /// Every request, polling included.
    All,
    /// Every request, plus small JSON bodies for client debugging.
    Debug,
}

impl Default for RequestsLoggingLevel {
    fn default() -> Self {
        Self::Control
    }
}

impl std::fmt::Display for RequestsLoggingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Progress endpoints the `Control` level keeps out of the log.
fn is_poll_request(path: &str) -> bool {
    path == "/api/downloads/active" || path.starts_with("/api/download/progress/")
}

/// Bodies larger than this are not echoed even at `Debug`.
const BODY_ECHO_LIMIT: usize = 2048;

pub async fn log_requests(
    State(state): State<ServerState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let level = state.config.requests_logging_level.clone();
    if level == RequestsLoggingLevel::None {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let quiet = level == RequestsLoggingLevel::Control && is_poll_request(&path);

    let request = if level >= RequestsLoggingLevel::Debug {
        match echo_request_body(request).await {
            Ok(request) => request,
            Err(response) => return response,
        }
    } else {
        request
    };

    let started = Instant::now();
    let response = next.run(request).await;

    if !quiet {
        info!(
            %method,
            path = %path,
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request handled"
        );
    }

    response
}

/// Log a small request body, handing the request back intact.
///
/// Only bodies with a declared length under the echo limit are buffered;
/// anything else passes through untouched so streaming uploads are never
/// stalled by logging.
async fn echo_request_body(request: Request<Body>) -> Result<Request<Body>, Response> {
    let declared = request
        .headers()
        .get("content-length")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());

    let Some(size) = declared.filter(|size| *size > 0 && *size <= BODY_ECHO_LIMIT) else {
        return Ok(request);
    };

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, size).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("could not buffer request body for logging: {}", err);
            return Err(Response::builder()
                .status(500)
                .body(Body::from("Internal Server Error"))
                .unwrap());
        }
    };

    info!(body = %String::from_utf8_lossy(&bytes), "request body");
    Ok(Request::from_parts(parts, Body::from(bytes)))
}
