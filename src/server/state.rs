use axum::extract::FromRef;

use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;
use crate::jobs::JobRegistry;
use crate::orchestrator::DownloadOrchestrator;
use crate::settings::SettingsStore;

pub type GuardedRegistry = Arc<dyn JobRegistry>;
pub type GuardedOrchestrator = Arc<DownloadOrchestrator>;
pub type GuardedSettings = Arc<SettingsStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub registry: GuardedRegistry,
    pub orchestrator: GuardedOrchestrator,
    pub settings: GuardedSettings,
    pub hash: String,
}

impl FromRef<ServerState> for GuardedRegistry {
    fn from_ref(input: &ServerState) -> Self {
        input.registry.clone()
    }
}

impl FromRef<ServerState> for GuardedOrchestrator {
    fn from_ref(input: &ServerState) -> Self {
        input.orchestrator.clone()
    }
}

impl FromRef<ServerState> for GuardedSettings {
    fn from_ref(input: &ServerState) -> Self {
        input.settings.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
