//! Per-job bookkeeping: options, progress counters, and the job registry.
//!
//! The registry is the single source of mutable state for the download
//! orchestrator. It is deliberately passive: it never reaches back into the
//! orchestrator, and every operation is short and synchronous so progress
//! reads never suspend.

mod models;
mod registry;

pub use models::{
    ActiveDownload, AudioFormat, ContentType, DownloadResult, JobOptions, JobProgress, JobStatus,
    Mode, Stage, SubtitleLanguage, SubtitleOptions,
};
pub use registry::{InMemoryJobRegistry, JobRegistry};
