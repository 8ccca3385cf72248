//! Driving of the external media extractor.
//!
//! The extractor is an opaque subprocess with a documented CLI and stdout
//! grammar. This module builds its argument vectors, supervises the
//! process, and turns its streaming output into progress events.

pub mod args;
pub mod events;
pub mod metadata;
pub mod runner;
pub mod size;

pub use args::{build_download_args, quality_selector, temp_output_template, TEMP_SUFFIX};
pub use events::{ExtractorEvent, LineBuffer, LineParser};
pub use runner::{
    extractor_version, spawn_extractor, ExtractorError, ExtractorHandle, RunningExtractor,
};
