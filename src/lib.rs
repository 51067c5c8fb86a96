//! Procedure logbook with a dynamic filter engine.
//!
//! Procedures live in SQLite. Filters are named, persisted conjunctions of
//! typed conditions that compile to a parameterized SQL predicate, render
//! to a short human-readable summary, and travel in JSON backups.

pub mod config;
pub mod db;
pub mod filters;
pub mod models;
pub mod transfer;

use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber. `RUST_LOG` wins over
/// [`config::default_log_filter`]. A second call is a no-op.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} v{} logging initialized", config::APP_NAME, config::APP_VERSION);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_twice_does_not_panic() {
        init_tracing();
        init_tracing();
    }
}
