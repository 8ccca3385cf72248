//! Data models for download jobs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;

use crate::extractor::ExtractorHandle;

/// Download mode requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Video,
    Audio,
}

/// Whether a request refers to a single item or a playlist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Single,
    Playlist,
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::Single
    }
}

/// Target audio container for audio-mode downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    M4a,
    Wav,
    Opus,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Wav => "wav",
            AudioFormat::Opus => "opus",
        }
    }

    /// Multiplier converting the extractor's source-container byte count
    /// into an estimate of the post-transcode size.
    pub fn projection_factor(&self) -> f64 {
        match self {
            AudioFormat::Mp3 => 1.67,
            AudioFormat::M4a => 2.67,
            AudioFormat::Wav => 12.85,
            AudioFormat::Opus => 1.0,
        }
    }
}

/// Subtitle language selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleLanguage {
    Auto,
    En,
}

/// Subtitle embedding options (video mode only).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleOptions {
    pub download: bool,
    pub language: SubtitleLanguage,
}

impl Default for SubtitleOptions {
    fn default() -> Self {
        Self {
            download: false,
            language: SubtitleLanguage::Auto,
        }
    }
}

/// Immutable inputs for one download job.
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Sanitized platform URL to hand to the extractor.
    pub url: String,
    /// Opaque platform identifier of the media item.
    pub video_id: String,
    /// Caller-supplied job id; the registry key.
    pub job_id: String,
    /// User-chosen output directory.
    pub output_folder: PathBuf,
    pub mode: Mode,
    /// Quality tag such as `1080p` or `highest` (video mode).
    pub quality: Option<String>,
    /// Target audio container (audio mode).
    pub audio_format: Option<AudioFormat>,
    /// Pre-flight size estimate in bytes, 0 when unknown.
    pub estimated_bytes: u64,
    /// Template-resolved final base name, without extension.
    pub resolved_filename: Option<String>,
    pub subtitles: SubtitleOptions,
    /// Place the artifact under a per-channel subfolder.
    pub per_channel_folder: bool,
    pub channel: Option<String>,
}

/// Status of a download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Downloading,
    Paused,
    Converting,
    Completed,
    Failed,
    Canceled,
}

impl JobStatus {
    /// Terminal statuses absorb all later status mutations.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Canceled
        )
    }
}

/// Phase of work the extractor is currently performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Video,
    Audio,
    Merging,
    Complete,
}

/// Final artifact details recorded on completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResult {
    pub file_path: String,
    pub file_name: String,
    /// Human-readable size, e.g. `"12.34 MB"`.
    pub file_size: String,
}

/// Mutable per-job progress, the shape returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
    pub percentage: f64,
    /// Bytes per second, smoothed by the read-side sampler.
    pub speed: f64,
    /// Estimated seconds remaining, 0 when unknown.
    pub eta: u64,
    pub status: JobStatus,
    pub stage: Stage,
    pub video_total_bytes: u64,
    pub audio_total_bytes: u64,
    pub video_downloaded_bytes: u64,
    pub audio_downloaded_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DownloadResult>,
}

impl JobProgress {
    pub(crate) fn new(options: &JobOptions) -> Self {
        Self {
            total_bytes: options.estimated_bytes,
            downloaded_bytes: 0,
            percentage: 0.0,
            speed: 0.0,
            eta: 0,
            status: JobStatus::Downloading,
            stage: match options.mode {
                Mode::Video => Stage::Video,
                Mode::Audio => Stage::Audio,
            },
            video_total_bytes: 0,
            audio_total_bytes: 0,
            video_downloaded_bytes: 0,
            audio_downloaded_bytes: 0,
            error: None,
            result: None,
        }
    }
}

/// Runtime state of one registered job.
pub struct ActiveDownload {
    pub options: JobOptions,
    /// Handle to the running extractor; `None` between pause and resume.
    pub process: Option<ExtractorHandle>,
    /// Set when `register` finds an existing entry, so counters survive.
    pub is_resuming: bool,
    pub start_time: Instant,
    /// Read-side speed sampling state.
    pub last_sample_time: Instant,
    pub downloaded_at_last_sample: u64,
    pub progress: JobProgress,
}

impl ActiveDownload {
    pub(crate) fn new(options: JobOptions) -> Self {
        let progress = JobProgress::new(&options);
        let now = Instant::now();
        Self {
            options,
            process: None,
            is_resuming: false,
            start_time: now,
            last_sample_time: now,
            downloaded_at_last_sample: 0,
            progress,
        }
    }
}
