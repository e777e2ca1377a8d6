//! Structured logging setup.
//!
//! Everything logs through `tracing`. The subscriber writes human-readable
//! lines to stderr so stdout stays clean for command output (JSON exports).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over the configured filter; an empty value counts as unset.
pub(crate) fn filter_directives(env: Option<String>, configured: &str) -> String {
    match env {
        Some(value) if !value.trim().is_empty() => value,
        _ if configured.trim().is_empty() => "info".to_string(),
        _ => configured.to_string(),
    }
}

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init(configured_filter: &str) {
    let directives = filter_directives(std::env::var("RUST_LOG").ok(), configured_filter);
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        eprintln!("Invalid log filter '{directives}': {e}; falling back to 'info'");
        EnvFilter::new("info")
    });

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
    if result.is_err() {
        tracing::debug!("Logger already initialised");
    }
}
