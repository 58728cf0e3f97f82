//! Process-wide logging setup.

/// Initialize tracing for the process.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    tracing::init();
}

pub mod tracing;

pub use tracing::LogFormat;
