//! Media-platform URL sanitization.
//!
//! Requests are only forwarded to the extractor for a fixed set of hosts,
//! and only the query parameters the platform actually uses for addressing
//! survive. Everything else (tracking parameters, fragments, foreign hosts)
//! is stripped or rejected at the boundary.

use thiserror::Error;
use url::Url;

/// Hosts the service will hand to the extractor.
const ALLOWED_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtu.be",
];

/// Query parameters preserved on sanitized URLs.
const ALLOWED_QUERY_PARAMS: &[&str] = &["v", "list", "t"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlPolicyError {
    #[error("Invalid URL")]
    Malformed,

    #[error("Unsupported URL scheme: {0}")]
    Scheme(String),

    #[error("Unsupported host: {0}")]
    Host(String),
}

/// Validate and normalize a user-submitted media URL.
pub fn sanitize_media_url(raw: &str) -> Result<Url, UrlPolicyError> {
    let mut url = Url::parse(raw.trim()).map_err(|_| UrlPolicyError::Malformed)?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlPolicyError::Scheme(other.to_string())),
    }

    let host = url
        .host_str()
        .ok_or(UrlPolicyError::Malformed)?
        .to_lowercase();
    if !ALLOWED_HOSTS.contains(&host.as_str()) {
        return Err(UrlPolicyError::Host(host));
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| ALLOWED_QUERY_PARAMS.contains(&key.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.set_fragment(None);
    if kept.is_empty() {
        url.set_query(None);
    } else {
        let query = kept
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    Ok(url)
}
