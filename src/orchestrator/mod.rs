//! Download job lifecycle.
//!
//! One orchestrator instance owns every job: it registers jobs in the
//! registry, spawns and supervises the extractor, routes parsed events into
//! the accountant, and turns a clean exit into a renamed final artifact.
//!
//! Failures never escape the background task. Everything that goes wrong
//! after the HTTP handler returned is recorded in the job's progress via
//! `fail_download`, and pause/cancel are deliberately not failures at all.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info, warn};

use crate::extractor::{
    build_download_args, spawn_extractor, ExtractorEvent, TEMP_SUFFIX,
};
use crate::jobs::{DownloadResult, JobOptions, JobRegistry, JobStatus};
use crate::naming::{reserve_unique_path, sanitize};

/// Why a run ended without producing an artifact.
#[derive(Debug, PartialEq, Eq)]
enum RunEnd {
    Paused,
    Canceled,
}

pub struct DownloadOrchestrator {
    registry: Arc<dyn JobRegistry>,
    extractor_bin: String,
}

impl DownloadOrchestrator {
    pub fn new(registry: Arc<dyn JobRegistry>, extractor_bin: impl Into<String>) -> Self {
        Self {
            registry,
            extractor_bin: extractor_bin.into(),
        }
    }

    pub fn registry(&self) -> &Arc<dyn JobRegistry> {
        &self.registry
    }

    /// Output directory for a job, honoring the per-channel layout.
    pub fn effective_output_folder(options: &JobOptions) -> PathBuf {
        if options.per_channel_folder {
            if let Some(channel) = options.channel.as_deref() {
                let folder = sanitize(channel);
                if !folder.is_empty() {
                    return options.output_folder.join(folder);
                }
            }
        }
        options.output_folder.clone()
    }

    /// Synchronous part of a download request: create the output directory,
    /// register the job, then hand the rest to a background task.
    pub fn queue_download(self: &Arc<Self>, options: JobOptions) -> Result<()> {
        let folder = Self::effective_output_folder(&options);
        std::fs::create_dir_all(&folder)
            .with_context(|| format!("Failed to create output folder {:?}", folder))?;

        self.registry.register(options.clone());

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run(options, folder).await;
        });
        Ok(())
    }

    /// Pause a job: mark it paused, then kill its subprocess.
    ///
    /// The registry entry and its counters stay; only the process goes
    /// away. Returns false when the job is unknown.
    pub fn pause(&self, job_id: &str) -> bool {
        if !self.registry.pause_download(job_id) {
            return false;
        }
        if let Some(handle) = self.registry.take_process(job_id) {
            handle.terminate();
        }
        info!(job_id, "download paused");
        true
    }

    /// Resume a paused job by re-running it with its original options.
    ///
    /// Registration is a status reset for the existing entry, so counters
    /// and stage carry over. Returns false when the job is unknown or not
    /// paused.
    pub fn resume(self: &Arc<Self>, job_id: &str) -> bool {
        if self.registry.status(job_id) != Some(JobStatus::Paused) {
            return false;
        }
        let Some(options) = self.registry.options(job_id) else {
            return false;
        };
        info!(job_id, "resuming download");
        self.queue_download(options).is_ok()
    }

    /// Cancel a job: remove it from the registry, then kill its subprocess.
    ///
    /// Idempotent at the surface; a second cancel finds nothing and returns
    /// false, which the HTTP layer reports as not found.
    pub fn cancel(&self, job_id: &str) -> bool {
        let Some(entry) = self.registry.remove(job_id) else {
            return false;
        };
        if let Some(handle) = entry.process {
            handle.terminate();
        }
        info!(job_id, "download canceled");
        true
    }

    /// The full background routine for one run of one job.
    async fn run(&self, options: JobOptions, folder: PathBuf) {
        let job_id = options.job_id.clone();
        match self.run_inner(&options, &folder).await {
            Ok(()) => info!(job_id = %job_id, "download completed"),
            Err(RunOutcome::Stopped(RunEnd::Paused)) => {
                debug!(job_id = %job_id, "run ended: download paused");
            }
            Err(RunOutcome::Stopped(RunEnd::Canceled)) => {
                debug!(job_id = %job_id, "run ended: download canceled");
            }
            Err(RunOutcome::Failed(error)) => {
                warn!(job_id = %job_id, %error, "download failed");
                self.registry.fail_download(&job_id, &format!("{:#}", error));
            }
        }
    }

    async fn run_inner(&self, options: &JobOptions, folder: &Path) -> RunResult {
        let job_id = &options.job_id;
        let args = build_download_args(options, folder);

        let process = match spawn_extractor(&self.extractor_bin, &args) {
            Ok(process) => process,
            Err(e) => return Err(RunOutcome::Failed(anyhow!(e))),
        };
        self.registry.attach_process(job_id, process.handle());

        let registry = self.registry.clone();
        let mode = options.mode;
        let job_for_events = job_id.clone();
        let exit = process
            .drive(mode, move |event| {
                apply_event(registry.as_ref(), &job_for_events, event)
            })
            .await;

        // The handle is spent whatever happened; a paused job already had
        // it taken.
        let _ = self.registry.take_process(job_id);

        // Status first: a terminate signal can surface as exit code 0, so
        // the registry is the authority on pause/cancel, not the code.
        if let Some(end) = self.stopped_state(job_id) {
            return Err(RunOutcome::Stopped(end));
        }

        let status = match exit {
            Ok(status) => status,
            Err(e) => return Err(RunOutcome::Failed(anyhow!(e))),
        };

        if status.success() {
            return self
                .finalize(options, folder)
                .await
                .map_err(RunOutcome::Failed);
        }

        // The kill from a pause/cancel delivered between the status check
        // above and here also lands as a non-zero exit; check once more.
        if let Some(end) = self.stopped_state(job_id) {
            return Err(RunOutcome::Stopped(end));
        }

        let code = status.code().unwrap_or(-1);
        Err(RunOutcome::Failed(anyhow!(
            "Download interrupted (code {})",
            code
        )))
    }

    /// Pause/cancel state of a job, if it is in one.
    fn stopped_state(&self, job_id: &str) -> Option<RunEnd> {
        match self.registry.status(job_id) {
            None | Some(JobStatus::Canceled) => Some(RunEnd::Canceled),
            Some(JobStatus::Paused) => Some(RunEnd::Paused),
            _ => None,
        }
    }

    /// Locate the quarantine artifact, rename it to its final name, and
    /// record the result.
    async fn finalize(&self, options: &JobOptions, folder: &Path) -> Result<()> {
        let src = find_artifact(folder, &options.job_id)
            .await?
            .ok_or_else(|| anyhow!("No complete file found"))?;

        let extension = src
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        let base = match &options.resolved_filename {
            Some(name) => name.clone(),
            None => sanitize(
                &src.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| options.job_id.clone()),
            ),
        };

        let desired = if extension.is_empty() {
            folder.join(&base)
        } else {
            folder.join(format!("{}.{}", base, extension))
        };

        let target = reserve_unique_path(&desired)
            .with_context(|| format!("Failed to claim final name for {:?}", desired))?;
        tokio::fs::rename(&src, &target)
            .await
            .with_context(|| format!("Failed to rename {:?} to {:?}", src, target))?;

        let metadata = tokio::fs::metadata(&target)
            .await
            .with_context(|| format!("Failed to stat {:?}", target))?;
        let size_bytes = metadata.len();

        let result = DownloadResult {
            file_path: target.display().to_string(),
            file_name: target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_size: format!("{:.2} MB", size_bytes as f64 / (1024.0 * 1024.0)),
        };

        self.registry
            .complete_download(&options.job_id, size_bytes, result);
        Ok(())
    }
}

type RunResult = std::result::Result<(), RunOutcome>;

enum RunOutcome {
    Stopped(RunEnd),
    Failed(anyhow::Error),
}

/// Route one parsed extractor event into the accountant.
fn apply_event(registry: &dyn JobRegistry, job_id: &str, event: ExtractorEvent) {
    match event {
        ExtractorEvent::Stage(stage) => registry.set_stage(job_id, stage),
        ExtractorEvent::Converting => registry.set_status(job_id, JobStatus::Converting),
        ExtractorEvent::Progress {
            percent,
            stage_total,
        } => {
            let total = match stage_total {
                Some(total) => {
                    registry.set_stage_total_bytes(job_id, total);
                    total
                }
                None => registry.stage_total_bytes(job_id),
            };
            if total > 0 {
                let downloaded = (total as f64 * percent / 100.0) as u64;
                registry.update_progress(job_id, downloaded);
            }
        }
    }
}

/// Find the completed quarantine artifact for a job.
///
/// Prefers files named `<jobId>.temp.*`; among several (intermediate
/// streams plus the merged output) the most recently modified wins. Files
/// still carrying the extractor's `.part` suffix are never candidates. As a
/// last resort the newest non-`.part` file in the folder is taken.
async fn find_artifact(folder: &Path, job_id: &str) -> Result<Option<PathBuf>> {
    let prefix = format!("{}{}", job_id, TEMP_SUFFIX);

    let mut entries = tokio::fs::read_dir(folder)
        .await
        .with_context(|| format!("Failed to read output folder {:?}", folder))?;

    let mut prefixed: Option<(SystemTime, PathBuf)> = None;
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if name.ends_with(".part") {
            continue;
        }

        let modified = entry
            .metadata()
            .await
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        if name.starts_with(&prefix) && prefixed.as_ref().map(|(t, _)| modified >= *t).unwrap_or(true)
        {
            prefixed = Some((modified, path.clone()));
        }
        if newest.as_ref().map(|(t, _)| modified >= *t).unwrap_or(true) {
            newest = Some((modified, path));
        }
    }

    Ok(prefixed.or(newest).map(|(_, path)| path))
}
