//! HTTP middleware components.

pub mod logging;
pub mod metrics;
pub mod security_headers;

pub use logging::init_logging;
pub use metrics::{init_metrics, metrics_handler, metrics_middleware};
pub use security_headers::security_headers_middleware;
