pub mod commands;
pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::error::{LauncherError, LauncherResult};
pub use crate::core::state::{AppState, DEFAULT_LOG_FILTER};

/// Install the global `tracing` subscriber. `RUST_LOG` wins over `filter`;
/// calling this more than once is harmless.
pub fn init_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .try_init();
}

/// Open the launcher state from the default data dir, with logging set up
/// from its settings.
pub fn bootstrap() -> AppState {
    let state = AppState::new();
    init_logging(&state.settings.log_filter);
    tracing::info!("Launchpad backend starting...");
    state
}
