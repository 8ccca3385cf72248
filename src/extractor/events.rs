//! Parsing of the extractor's streaming stdout into progress events.
//!
//! The extractor emits one event per line when run with `--newline`, but
//! also rewrites progress lines in place using carriage returns, so the
//! byte stream is first split on both `\n` and `\r`. The line grammar is
//! simple token matching; a small state machine over the current stage is
//! all the structure it needs.

use crate::jobs::{Mode, Stage};

/// Markers that indicate the extractor has moved into post-processing.
const POSTPROCESS_MARKERS: &[&str] = &[
    "[ExtractAudio]",
    "[FixupM4a]",
    "[ffmpeg]",
    "[Metadata]",
    "[EmbedSubtitle]",
    "[Thumbnails]",
    "Deleting original file",
];

/// Event derived from one stdout line.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractorEvent {
    /// The extractor started writing a new stream.
    Stage(Stage),
    /// Post-processing (merge, transcode, metadata) is underway.
    Converting,
    /// A progress line: percentage of the current stage, with the stage
    /// total when the line carried a size token.
    Progress {
        percent: f64,
        stage_total: Option<u64>,
    },
}

/// Splits a raw byte stream into lines, treating `\r` like `\n`.
#[derive(Default)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every line completed by it.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        let mut lines = Vec::new();
        for c in chunk.chars() {
            if c == '\n' || c == '\r' {
                if !self.pending.is_empty() {
                    lines.push(std::mem::take(&mut self.pending));
                }
            } else {
                self.pending.push(c);
            }
        }
        lines
    }

    /// Return any trailing partial line once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

/// Stateful line parser for one extractor run.
pub struct LineParser {
    mode: Mode,
}

impl LineParser {
    pub fn new(mode: Mode) -> Self {
        Self { mode }
    }

    /// Parse one complete line into zero or more events.
    pub fn parse(&mut self, line: &str) -> Vec<ExtractorEvent> {
        let mut events = Vec::new();

        if line.contains("[Merger]") {
            events.push(ExtractorEvent::Stage(Stage::Merging));
            events.push(ExtractorEvent::Converting);
            return events;
        }

        if POSTPROCESS_MARKERS.iter().any(|m| line.contains(m)) {
            events.push(ExtractorEvent::Converting);
            return events;
        }

        if line.contains("[download]") {
            if let Some(destination) = value_after(line, "Destination:") {
                if let Some(stage) = stage_for_destination(destination) {
                    events.push(ExtractorEvent::Stage(stage));
                }
                return events;
            }

            if line.contains('%') {
                if let Some(percent) = parse_percent(line) {
                    let stage_total = parse_size_token(line);
                    events.push(ExtractorEvent::Progress {
                        percent,
                        stage_total,
                    });
                    // Near the end of an audio download the extractor starts
                    // transcoding without always printing a marker line.
                    if self.mode == Mode::Audio && percent >= 99.0 {
                        events.push(ExtractorEvent::Converting);
                    }
                }
            }
        }

        events
    }
}

/// Text following `marker` on the line, trimmed.
fn value_after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.find(marker)
        .map(|idx| line[idx + marker.len()..].trim())
}

/// Classify a destination path into the stage it belongs to.
fn stage_for_destination(path: &str) -> Option<Stage> {
    if path.ends_with(".mp4") && !path.contains(".m4a") {
        Some(Stage::Video)
    } else if path.ends_with(".m4a") || path.ends_with(".mp3") || path.ends_with(".opus") {
        Some(Stage::Audio)
    } else {
        None
    }
}

/// Extract the percentage from a progress line.
fn parse_percent(line: &str) -> Option<f64> {
    for token in line.split_whitespace() {
        if let Some(number) = token.strip_suffix('%') {
            if let Ok(value) = number.parse::<f64>() {
                return Some(value.clamp(0.0, 100.0));
            }
        }
    }
    None
}

/// Extract the `of ~?<num><unit>` size token from a progress line.
fn parse_size_token(line: &str) -> Option<u64> {
    let mut tokens = line.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "of" {
            let size = tokens.next()?;
            return parse_size(size.trim_start_matches('~'));
        }
    }
    None
}

/// Parse a size like `5.00MiB` or `700KB` into bytes.
///
/// Binary units (KiB/MiB/GiB/TiB) are powers of 1024; their SI counterparts
/// (K/KB, M/MB, G/GB, T/TB) are powers of 1000.
pub fn parse_size(value: &str) -> Option<u64> {
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: f64 = number.parse().ok()?;

    let multiplier: f64 = match unit {
        "" | "B" => 1.0,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0f64.powi(4),
        "K" | "KB" => 1000.0,
        "M" | "MB" => 1000.0 * 1000.0,
        "G" | "GB" => 1000.0 * 1000.0 * 1000.0,
        "T" | "TB" => 1000.0f64.powi(4),
        _ => return None,
    };

    Some((number * multiplier).round() as u64)
}
