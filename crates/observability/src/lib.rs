//! Process-wide tracing setup shared by the server binary and tools.

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Initialize human-readable logging for tests and local tooling.
pub fn init_for_tests() {
    tracing::init_pretty("debug");
}
