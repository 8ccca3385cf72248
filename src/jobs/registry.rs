//! The job registry: process-wide mapping from job id to active download.
//!
//! All mutation goes through the setters below so the counter invariants
//! hold after every event: stage downloaded never exceeds stage total,
//! `downloaded_bytes` is the sum of the stage counters, percentage stays in
//! [0, 100], and terminal statuses absorb later mutations.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use super::models::{
    ActiveDownload, DownloadResult, JobOptions, JobProgress, JobStatus, Mode, Stage,
};
use crate::extractor::ExtractorHandle;

/// Minimum interval between speed/ETA sample refreshes.
const SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Registry interface.
///
/// Handlers and the orchestrator hold this behind `Arc<dyn JobRegistry>` so
/// tests can substitute a double. Implementations must keep every operation
/// short and non-suspending; progress reads happen on the HTTP path.
pub trait JobRegistry: Send + Sync {
    /// Create the entry for a job, or revive an existing one.
    ///
    /// A pre-existing entry means the job is resuming: its status flips back
    /// to `downloading` and its counters are left untouched.
    fn register(&self, options: JobOptions);

    /// Write the current stage's total byte count.
    fn set_stage_total_bytes(&self, job_id: &str, total: u64);

    /// Read the current stage's total byte count (0 when unknown).
    fn stage_total_bytes(&self, job_id: &str) -> u64;

    /// Advance to a new stage.
    ///
    /// The video → audio transition finalises the video counter to its
    /// total; entering the merge stage pins the percentage at 99.
    fn set_stage(&self, job_id: &str, stage: Stage);

    /// Write the current stage's downloaded byte count and recompute the
    /// derived totals and percentage.
    fn update_progress(&self, job_id: &str, stage_downloaded: u64);

    /// Set the job status. Ignored once the job is in a terminal status.
    fn set_status(&self, job_id: &str, status: JobStatus);

    /// Mark the job completed and record the final artifact.
    fn complete_download(&self, job_id: &str, final_bytes: u64, result: DownloadResult);

    /// Mark the job failed with an error message.
    fn fail_download(&self, job_id: &str, error: &str);

    /// Mark the job paused. Returns false when the job is unknown or
    /// already terminal.
    fn pause_download(&self, job_id: &str) -> bool;

    /// Remove the entry, returning it so the caller can terminate the
    /// subprocess outside the registry lock.
    fn remove(&self, job_id: &str) -> Option<ActiveDownload>;

    /// Attach the running subprocess handle to the entry.
    fn attach_process(&self, job_id: &str, handle: ExtractorHandle);

    /// Detach and return the subprocess handle, leaving the entry in place.
    fn take_process(&self, job_id: &str) -> Option<ExtractorHandle>;

    /// Current status, `None` when the job is unknown.
    fn status(&self, job_id: &str) -> Option<JobStatus>;

    /// Clone of the job's immutable options.
    fn options(&self, job_id: &str) -> Option<JobOptions>;

    /// Progress view for one job, with speed/ETA sampling and the audio
    /// size projection applied.
    fn get_progress(&self, job_id: &str) -> Option<JobProgress>;

    /// Progress views for every registered job.
    fn all_progress(&self) -> HashMap<String, JobProgress>;

    /// Drop entries in a terminal status. Returns how many were removed.
    fn clear_finished(&self) -> usize;
}

/// In-memory registry guarded by a single mutex.
///
/// A coarse lock is fine here: operations are bounded and the lock is never
/// held across subprocess or filesystem I/O.
#[derive(Default)]
pub struct InMemoryJobRegistry {
    jobs: Mutex<HashMap<String, ActiveDownload>>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Refresh the stored speed/ETA if the last sample is stale.
fn refresh_sample(entry: &mut ActiveDownload, now: Instant) {
    let elapsed = now.duration_since(entry.last_sample_time);
    if elapsed < SAMPLE_INTERVAL {
        return;
    }

    let downloaded = entry.progress.downloaded_bytes;
    let delta = downloaded.saturating_sub(entry.downloaded_at_last_sample);
    let speed = delta as f64 / elapsed.as_secs_f64();
    entry.progress.speed = speed.max(0.0);

    let total = entry.progress.total_bytes;
    entry.progress.eta = if entry.progress.speed > 0.0 && total > downloaded {
        ((total - downloaded) as f64 / entry.progress.speed) as u64
    } else {
        0
    };

    entry.last_sample_time = now;
    entry.downloaded_at_last_sample = downloaded;
}

/// Build the outgoing view of an entry's progress.
///
/// For audio jobs with a known target format, the extractor reports the
/// source-container size, not the post-conversion size; the projection
/// factor corrects the exposed totals. Stored counters are never projected,
/// and a completed job already carries the real file size.
fn progress_view(entry: &ActiveDownload) -> JobProgress {
    let mut view = entry.progress.clone();

    if entry.options.mode == Mode::Audio && view.status != JobStatus::Completed {
        if let Some(format) = entry.options.audio_format {
            let factor = format.projection_factor();
            view.total_bytes = (view.total_bytes as f64 * factor).round() as u64;
            view.audio_total_bytes = (view.audio_total_bytes as f64 * factor).round() as u64;
            if view.total_bytes > 0 {
                view.percentage = (view.downloaded_bytes as f64 / view.total_bytes as f64 * 100.0)
                    .clamp(0.0, 100.0);
            }
        }
    }

    view
}

/// Recompute the derived counters after a stage counter changed.
fn recompute_derived(progress: &mut JobProgress) {
    progress.downloaded_bytes = progress.video_downloaded_bytes + progress.audio_downloaded_bytes;
    if progress.video_total_bytes > 0 && progress.audio_total_bytes > 0 {
        progress.total_bytes = progress.video_total_bytes + progress.audio_total_bytes;
    }
    if progress.total_bytes > 0 {
        progress.percentage = (progress.downloaded_bytes as f64 / progress.total_bytes as f64
            * 100.0)
            .clamp(0.0, 100.0);
    }
}

impl JobRegistry for InMemoryJobRegistry {
    fn register(&self, options: JobOptions) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(entry) = jobs.get_mut(&options.job_id) {
            // Resume: keep all counters, just revive the status.
            entry.is_resuming = true;
            entry.progress.status = JobStatus::Downloading;
            entry.progress.error = None;
            debug!(
                job_id = %options.job_id,
                resuming = entry.is_resuming,
                "re-registered existing job"
            );
            return;
        }
        jobs.insert(options.job_id.clone(), ActiveDownload::new(options));
    }

    fn set_stage_total_bytes(&self, job_id: &str, total: u64) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(entry) = jobs.get_mut(job_id) {
            match entry.progress.stage {
                Stage::Video => entry.progress.video_total_bytes = total,
                Stage::Audio => entry.progress.audio_total_bytes = total,
                _ => {}
            }
        }
    }

    fn stage_total_bytes(&self, job_id: &str) -> u64 {
        let jobs = self.jobs.lock().unwrap();
        jobs.get(job_id)
            .map(|entry| match entry.progress.stage {
                Stage::Video => entry.progress.video_total_bytes,
                Stage::Audio => entry.progress.audio_total_bytes,
                _ => 0,
            })
            .unwrap_or(0)
    }

    fn set_stage(&self, job_id: &str, stage: Stage) {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(entry) = jobs.get_mut(job_id) else {
            return;
        };

        let progress = &mut entry.progress;
        if progress.stage == Stage::Video && stage == Stage::Audio {
            // The extractor moves on only once the video stream is done;
            // finalise the video counter before audio updates arrive.
            progress.video_downloaded_bytes = progress.video_total_bytes;
            recompute_derived(progress);
        }
        if stage == Stage::Merging {
            progress.percentage = 99.0;
        }
        progress.stage = stage;
    }

    fn update_progress(&self, job_id: &str, stage_downloaded: u64) {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(entry) = jobs.get_mut(job_id) else {
            return;
        };

        let progress = &mut entry.progress;
        match progress.stage {
            Stage::Video => {
                progress.video_downloaded_bytes = if progress.video_total_bytes > 0 {
                    stage_downloaded.min(progress.video_total_bytes)
                } else {
                    stage_downloaded
                };
            }
            Stage::Audio => {
                progress.audio_downloaded_bytes = if progress.audio_total_bytes > 0 {
                    stage_downloaded.min(progress.audio_total_bytes)
                } else {
                    stage_downloaded
                };
            }
            _ => return,
        }
        recompute_derived(progress);
    }

    fn set_status(&self, job_id: &str, status: JobStatus) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(entry) = jobs.get_mut(job_id) {
            if entry.progress.status.is_terminal() {
                return;
            }
            entry.progress.status = status;
        }
    }

    fn complete_download(&self, job_id: &str, final_bytes: u64, result: DownloadResult) {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(entry) = jobs.get_mut(job_id) else {
            return;
        };
        if entry.progress.status.is_terminal() {
            return;
        }

        let progress = &mut entry.progress;
        progress.status = JobStatus::Completed;
        progress.stage = Stage::Complete;
        progress.percentage = 100.0;
        if final_bytes > 0 {
            progress.total_bytes = final_bytes;
            progress.downloaded_bytes = final_bytes;
        }
        progress.result = Some(result);
    }

    fn fail_download(&self, job_id: &str, error: &str) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(entry) = jobs.get_mut(job_id) {
            if entry.progress.status.is_terminal() {
                return;
            }
            entry.progress.status = JobStatus::Failed;
            entry.progress.error = Some(error.to_string());
        }
    }

    fn pause_download(&self, job_id: &str) -> bool {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(job_id) {
            Some(entry) if !entry.progress.status.is_terminal() => {
                entry.progress.status = JobStatus::Paused;
                true
            }
            _ => false,
        }
    }

    fn remove(&self, job_id: &str) -> Option<ActiveDownload> {
        self.jobs.lock().unwrap().remove(job_id)
    }

    fn attach_process(&self, job_id: &str, handle: ExtractorHandle) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(entry) = jobs.get_mut(job_id) {
            entry.process = Some(handle);
        }
    }

    fn take_process(&self, job_id: &str) -> Option<ExtractorHandle> {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.get_mut(job_id).and_then(|entry| entry.process.take())
    }

    fn status(&self, job_id: &str) -> Option<JobStatus> {
        let jobs = self.jobs.lock().unwrap();
        jobs.get(job_id).map(|entry| entry.progress.status)
    }

    fn options(&self, job_id: &str) -> Option<JobOptions> {
        let jobs = self.jobs.lock().unwrap();
        jobs.get(job_id).map(|entry| entry.options.clone())
    }

    fn get_progress(&self, job_id: &str) -> Option<JobProgress> {
        let mut jobs = self.jobs.lock().unwrap();
        let entry = jobs.get_mut(job_id)?;
        if !entry.progress.status.is_terminal() {
            refresh_sample(entry, Instant::now());
        }
        Some(progress_view(entry))
    }

    fn all_progress(&self) -> HashMap<String, JobProgress> {
        let mut jobs = self.jobs.lock().unwrap();
        let now = Instant::now();
        jobs.iter_mut()
            .map(|(id, entry)| {
                if !entry.progress.status.is_terminal() {
                    refresh_sample(entry, now);
                }
                (id.clone(), progress_view(entry))
            })
            .collect()
    }

    fn clear_finished(&self) -> usize {
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|_, entry| !entry.progress.status.is_terminal());
        before - jobs.len()
    }
}
