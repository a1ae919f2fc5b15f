//! Gateway configuration

use embassy_time::Duration;

use crate::constants::CAN_QUEUE_TIMEOUT_MS;

/// What to do when a frame the gateway cannot carry reaches a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Return the error to the caller
    #[default]
    Report,
    /// Halt the system (panic) after logging the error
    Halt,
}

/// Runtime configuration of a [`Gateway`](crate::Gateway)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Allocate FD-sized (64 byte) frame buffers
    pub fd_enabled: bool,
    /// Bounded wait used by the receive and transmit paths
    pub queue_timeout: Duration,
    /// Escalation of unsupported frames
    pub error_policy: ErrorPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            fd_enabled: false,
            queue_timeout: Duration::from_millis(CAN_QUEUE_TIMEOUT_MS),
            error_policy: ErrorPolicy::Report,
        }
    }
}

impl GatewayConfig {
    pub fn with_fd(mut self, fd_enabled: bool) -> Self {
        self.fd_enabled = fd_enabled;
        self
    }

    pub fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = timeout;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }
}
