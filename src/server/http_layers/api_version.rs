//! API version response header.

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};

/// Version constant advertised on every response.
pub const API_VERSION: &str = "1";

/// Middleware stamping `X-API-Version` on every response.
pub async fn stamp_api_version(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("x-api-version", HeaderValue::from_static(API_VERSION));
    response
}
