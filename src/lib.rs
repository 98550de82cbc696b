//! Shared voicedesk library exports that keep the binary and tests aligned on common behavior.

pub mod backend;
pub mod config;
mod logging;
pub mod protocol;
pub mod session;
pub mod speech;
mod telemetry;

pub use logging::{init_logging, log_debug, log_debug_content, log_file_path};
pub use telemetry::init_tracing;
