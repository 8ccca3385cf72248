pub mod config;
mod download_routes;
mod http_layers;
#[allow(clippy::module_inception)]
pub mod server;
pub mod state;
pub mod url_policy;

pub use config::ServerConfig;
pub use http_layers::*;
#[allow(unused_imports)] // Used by main.rs
pub use server::{make_app, run_server};
