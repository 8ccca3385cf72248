//! Filename template validation and resolution.
//!
//! Templates are user-typed strings mixing literal text with tags like
//! `<title>` or `<index>`. Which tags are mandatory and which are allowed
//! depends on the content type (single vs playlist) and the download mode
//! (video vs audio), so validation is a pure function of all three.

use chrono::Local;
use thiserror::Error;

use super::sanitize;
use crate::jobs::{ContentType, Mode};

/// Tags understood by the template engine.
const KNOWN_TAGS: &[&str] = &["title", "index", "quality", "channel", "date", "format"];

/// Characters that may not appear literally in a template.
const ILLEGAL_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '|', '<', '>'];

/// Validation failures, each with a stable wire kind for API responses.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Template is empty")]
    Empty,

    #[error("Template contains invalid characters: {0}")]
    InvalidCharacter(String),

    #[error("Template is missing mandatory tags: {0}")]
    MissingMandatory(String),

    #[error("Unknown tag <{0}>")]
    InvalidTag(String),

    #[error("The <index> tag is only valid for playlist templates")]
    InvalidIndex,

    #[error("The <quality> tag is only valid for video templates")]
    InvalidQuality,
}

impl TemplateError {
    /// Stable identifier used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            TemplateError::Empty => "empty",
            TemplateError::InvalidCharacter(_) => "invalid_character",
            TemplateError::MissingMandatory(_) => "missing_mandatory",
            TemplateError::InvalidTag(_) => "invalid_tag",
            TemplateError::InvalidIndex => "invalid_index",
            TemplateError::InvalidQuality => "invalid_quality",
        }
    }
}

/// Outcome of scanning a template: recognized tags and leftover literals.
struct ScannedTemplate {
    tags: Vec<String>,
    illegal: Vec<char>,
    unknown_tag: Option<String>,
}

/// Walk the template, consuming `<name>` tokens.
///
/// A `<` that does not open a well-formed tag token, and any `>` not closing
/// one, count as illegal literal characters.
fn scan(template: &str) -> ScannedTemplate {
    let chars: Vec<char> = template.chars().collect();
    let mut tags = Vec::new();
    let mut illegal = Vec::new();
    let mut unknown_tag = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '<' {
            // Try to consume a tag token: '<' word '>'
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_ascii_alphanumeric() {
                j += 1;
            }
            if j > i + 1 && j < chars.len() && chars[j] == '>' {
                let name: String = chars[i + 1..j].iter().collect();
                if KNOWN_TAGS.contains(&name.as_str()) {
                    tags.push(name);
                } else if unknown_tag.is_none() {
                    unknown_tag = Some(name);
                }
                i = j + 1;
                continue;
            }
            illegal.push('<');
        } else if ILLEGAL_CHARS.contains(&c) {
            illegal.push(c);
        }
        i += 1;
    }

    ScannedTemplate {
        tags,
        illegal,
        unknown_tag,
    }
}

/// Validate a template against the content type and download mode.
pub fn validate_template(
    template: &str,
    content_type: ContentType,
    mode: Mode,
) -> Result<(), TemplateError> {
    if template.trim().is_empty() {
        return Err(TemplateError::Empty);
    }

    let scanned = scan(template);

    if !scanned.illegal.is_empty() {
        let mut listed: Vec<String> = Vec::new();
        for c in scanned.illegal {
            let rendered = c.to_string();
            if !listed.contains(&rendered) {
                listed.push(rendered);
            }
        }
        return Err(TemplateError::InvalidCharacter(listed.join(" ")));
    }

    if let Some(name) = scanned.unknown_tag {
        return Err(TemplateError::InvalidTag(name));
    }

    let has = |name: &str| scanned.tags.iter().any(|t| t == name);

    if has("index") && content_type != ContentType::Playlist {
        return Err(TemplateError::InvalidIndex);
    }
    if has("quality") && mode != Mode::Video {
        return Err(TemplateError::InvalidQuality);
    }

    let mut missing = Vec::new();
    if !has("title") {
        missing.push("<title>");
    }
    if content_type == ContentType::Playlist && !has("index") {
        missing.push("<index>");
    }
    if mode == Mode::Video && !has("quality") {
        missing.push("<quality>");
    }
    if !missing.is_empty() {
        return Err(TemplateError::MissingMandatory(missing.join(", ")));
    }

    Ok(())
}

/// Metadata substituted into a template during resolution.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext<'a> {
    pub title: &'a str,
    pub channel: &'a str,
    pub quality: Option<&'a str>,
    pub format: &'a str,
    pub index: Option<u32>,
}

/// Substitute every tag occurrence, producing the final base name.
///
/// Assumes the template has already passed `validate_template`; tags that
/// have no value in the context resolve to the empty string.
pub fn resolve_template(template: &str, ctx: &TemplateContext, mode: Mode) -> String {
    let mut out = template.to_string();

    out = out.replace("<title>", &sanitize(ctx.title));
    out = out.replace("<channel>", &sanitize(ctx.channel));
    out = out.replace("<date>", &Local::now().format("%d-%m-%Y").to_string());
    out = out.replace("<format>", &ctx.format.to_uppercase());
    if mode == Mode::Video {
        let quality = ctx.quality.unwrap_or("");
        out = out.replace("<quality>", &quality.to_uppercase());
    }
    if let Some(index) = ctx.index {
        out = out.replace("<index>", &format!("{:02}", index));
    }

    out
}
