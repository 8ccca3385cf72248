use super::RequestsLoggingLevel;

/// Runtime configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The port to listen on.
    pub port: u16,
    /// The level of logging to perform on each request.
    pub requests_logging_level: RequestsLoggingLevel,
    /// Path to the frontend directory to be statically served.
    pub frontend_dir_path: Option<String>,
    /// Command used to invoke the extractor.
    pub extractor_bin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            requests_logging_level: RequestsLoggingLevel::default(),
            frontend_dir_path: None,
            extractor_bin: "yt-dlp".to_string(),
        }
    }
}
