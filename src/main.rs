use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tubelift_server::extractor::extractor_version;
use tubelift_server::{
    run_server, InMemoryJobRegistry, RequestsLoggingLevel, ServerConfig, SettingsStore,
};

#[derive(Parser, Debug)]
struct CliArgs {
    /// The port to listen on.
    #[clap(short, long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// Command used to invoke the extractor.
    #[clap(long, env = "EXTRACTOR_BIN", default_value = "yt-dlp")]
    pub extractor_bin: String,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "control")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    match extractor_version(&cli_args.extractor_bin).await {
        Ok(version) => info!("Extractor {} version {}", cli_args.extractor_bin, version),
        Err(e) => warn!(
            "Extractor {} is not answering ({}); downloads will fail until it is installed",
            cli_args.extractor_bin, e
        ),
    }

    // The settings file and the optional credentials file both live in the
    // working directory.
    let settings = Arc::new(SettingsStore::in_working_dir());
    let registry = Arc::new(InMemoryJobRegistry::new());

    let config = ServerConfig {
        port: cli_args.port,
        requests_logging_level: cli_args.logging_level,
        frontend_dir_path: cli_args.frontend_dir_path,
        extractor_bin: cli_args.extractor_bin,
    };

    run_server(config, registry, settings).await
}
