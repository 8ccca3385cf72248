//! Tubelift Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod extractor;
pub mod jobs;
pub mod naming;
pub mod orchestrator;
pub mod server;
pub mod settings;

// Re-export commonly used types for convenience
pub use jobs::{InMemoryJobRegistry, JobRegistry};
pub use orchestrator::DownloadOrchestrator;
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
pub use settings::{NamingTemplates, SettingsStore};
