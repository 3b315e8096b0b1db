// Engine Dispatch Core
// Runtime-switchable audio engines with lock-free selection and persisted state

// Module declarations
pub mod audio;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod engines;
pub mod error;
pub mod render;
pub mod session;
pub mod telemetry;
pub mod ui;

// Re-exports for convenience
pub use dispatcher::{Action, DispatcherEvent, DispatcherHandle, EngineDispatcher};
pub use engine::{Engine, EngineFactory, EngineRegistry, EngineType};
pub use error::DispatchError;

use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber for `log` and `tracing` output.
///
/// Honors `RUST_LOG` and defaults to `info`. Safe to call more than once;
/// later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
        log::info!("[Test] logging initialized twice");
    }
}
