pub mod analysis;
pub mod commands;
pub mod error;
pub mod models;

pub use commands::increments::{
    current_increment_prompt, redo_increment, revert_increment, revert_increments_from,
    verify_increment, IncrementTracker,
};
pub use commands::scoring::{export_state, run_analysis, scan, AnalysisReport, AnalysisRequest};
pub use error::{EngineError, Result};

/// Install the `env_logger` backend for the `log` facade. Defaults to
/// `info`; `RUST_LOG` overrides. Calling it twice is harmless.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
