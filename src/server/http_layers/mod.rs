mod api_version;
mod requests_logging;

pub use api_version::{stamp_api_version, API_VERSION};
pub use requests_logging::{log_requests, RequestsLoggingLevel};
