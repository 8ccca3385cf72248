//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own settings file, output
//! directory, and fake extractor script.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::TcpListener;

use tubelift_server::server::server::make_app;
use tubelift_server::{InMemoryJobRegistry, RequestsLoggingLevel, ServerConfig, SettingsStore};

use super::fixtures::write_fake_extractor;

/// Test server instance with isolated settings, output dir, and extractor
///
/// When dropped, the server gracefully shuts down and temp resources are
/// cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Directory tests use as the download output folder
    pub output_dir: TempDir,

    // Private fields - keep resources alive until drop
    _settings_dir: TempDir,
    _extractor_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if temp resources cannot be created, the port cannot be
    /// bound, or the server does not become ready within the timeout.
    pub async fn spawn() -> Self {
        let settings_dir = TempDir::new().expect("Failed to create settings dir");
        let extractor_dir = TempDir::new().expect("Failed to create extractor dir");
        let output_dir = TempDir::new().expect("Failed to create output dir");

        let extractor_bin = write_fake_extractor(extractor_dir.path());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            frontend_dir_path: None,
            extractor_bin: extractor_bin.display().to_string(),
        };

        let app = make_app(
            config,
            Arc::new(InMemoryJobRegistry::new()),
            Arc::new(SettingsStore::new(settings_dir.path())),
        );

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            output_dir,
            _settings_dir: settings_dir,
            _extractor_dir: extractor_dir,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_until_ready().await;
        server
    }

    /// The path tests should pass as `outputFolder`.
    pub fn output_folder(&self) -> String {
        self.output_dir.path().display().to_string()
    }

    async fn wait_until_ready(&self) {
        let client = reqwest::Client::new();
        let url = format!("{}/api/health", self.base_url);
        for _ in 0..50 {
            if let Ok(response) = client.get(&url).send().await {
                if response.status().is_success() {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("Test server did not become ready");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
