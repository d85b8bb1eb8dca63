//! Tracing/logging initialization.
//!
//! JSON lines to stdout, filtered by `RUST_LOG`. Storage backends log through
//! `tracing` spans (`#[instrument]`), so the span fields (backend, table,
//! collection) land on every event emitted inside them.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber, falling back to `default_filter`.
///
/// Returns `false` when a subscriber was already installed.
pub fn init_with_default(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_current_span(true)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        init_with_default("debug");
        assert!(!init_with_default("debug"));
    }
}
