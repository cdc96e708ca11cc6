//! Engine configuration.

use std::time::Duration;

/// Configuration for an [`RpcEngine`](crate::RpcEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a call may wait for its response before it is failed with
    /// `-32001 Request timed out`.
    ///
    /// Default: 30 seconds. `None` disables the deadline; pending calls
    /// are then only failed when the connection closes.
    pub call_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl EngineConfig {
    /// Sets the per-call deadline.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }
}
