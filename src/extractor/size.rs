//! Pre-flight size estimation.
//!
//! The extractor is invoked with `--skip-download -j`, which emits one JSON
//! record per video without fetching any media. Summing the reported file
//! sizes gives the byte estimate shown to the client before a download
//! starts.

use anyhow::{bail, Result};
use serde_json::Value;
use tracing::warn;

use super::args::build_size_probe_args;
use super::runner::run_collecting;
use crate::jobs::{AudioFormat, Mode};

/// Validate a `--playlist-items` selection.
///
/// The grammar mirrors the extractor's own: a comma-separated list whose
/// elements are integers or `A-B` ranges.
pub fn validate_playlist_items(spec: &str) -> Result<()> {
    if spec.trim().is_empty() {
        bail!("playlist selection is empty");
    }
    for element in spec.split(',') {
        let element = element.trim();
        let valid = match element.split_once('-') {
            Some((a, b)) => {
                !a.is_empty()
                    && !b.is_empty()
                    && a.chars().all(|c| c.is_ascii_digit())
                    && b.chars().all(|c| c.is_ascii_digit())
            }
            None => !element.is_empty() && element.chars().all(|c| c.is_ascii_digit()),
        };
        if !valid {
            bail!("invalid playlist selection element: {:?}", element);
        }
    }
    Ok(())
}

/// Sum the per-video sizes out of line-delimited JSON probe output.
///
/// Each record contributes `filesize`, falling back to `filesize_approx`.
/// Unparsable lines are skipped; an entirely unparsable output sums to 0.
pub fn total_from_ndjson(output: &str) -> u64 {
    let mut total = 0u64;
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(record) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        let size = record
            .get("filesize")
            .and_then(Value::as_f64)
            .or_else(|| record.get("filesize_approx").and_then(Value::as_f64));
        if let Some(size) = size {
            if size > 0.0 {
                total += size as u64;
            }
        }
    }
    total
}

/// Apply the audio projection factor to a raw container byte count.
pub fn project_audio_size(raw_bytes: u64, format: Option<AudioFormat>) -> u64 {
    match format {
        Some(format) => (raw_bytes as f64 * format.projection_factor()).round() as u64,
        None => raw_bytes,
    }
}

/// Run the size probe and return the raw (unprojected) byte total.
///
/// Returns 0 when the probe fails or produces nothing usable; size
/// estimation is advisory and must never block a download.
pub async fn estimate_raw_total(
    bin: &str,
    url: &str,
    mode: Mode,
    quality: Option<&str>,
    playlist_items: Option<&str>,
) -> u64 {
    let args = build_size_probe_args(url, mode, quality, playlist_items);
    match run_collecting(bin, &args).await {
        Ok(output) => total_from_ndjson(&output),
        Err(e) => {
            warn!("size probe failed: {}", e);
            0
        }
    }
}
