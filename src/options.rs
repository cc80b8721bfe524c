//! Generator and runtime configuration.

use std::time::Duration;

/// Knobs consulted by the generator and threaded into generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindOptions {
    /// Suspension between polls of a foreign async task.
    pub poll_interval: Duration,
    /// Unsynchronized read attempts before falling back to the read lock.
    pub optimistic_attempts: usize,
    /// Indentation width of emitted source.
    pub indent_width: usize,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            poll_interval: tether_runtime::DEFAULT_POLL_INTERVAL,
            optimistic_attempts: tether_runtime::OPTIMISTIC_ATTEMPTS,
            indent_width: 4,
        }
    }
}
