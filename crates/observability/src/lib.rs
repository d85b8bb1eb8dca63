//! Tracing/logging setup shared by every process embedding the catalog.

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Initialize process-wide logging with the default `info` filter.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with_default(tracing::DEFAULT_FILTER);
}
