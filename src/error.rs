//! Error types for the gateway core
//!
//! This module defines the error types returned by the frame pipeline and
//! the bit timing validator.

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Error types for gateway operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// No free frame buffer was available, either at once or within the allowed wait
    #[error("Frame pool exhausted")]
    PoolExhausted,

    /// The pool has not been initialized (or was deinitialized)
    #[error("Frame pool is not initialized")]
    PoolNotInitialized,

    /// CAN FD frames are not transported by this gateway
    #[error("CAN FD frames are not supported")]
    UnsupportedFdFrame,

    /// The dispatch queue stayed full for the whole bounded wait
    #[error("Dispatch queue timeout")]
    DispatchTimeout,

    /// The dispatch queue was full on a non-blocking send
    #[error("Dispatch queue full")]
    DispatchFull,

    /// No frame was waiting on the dispatch queue
    #[error("No frame pending")]
    NothingPending,

    /// A bit timing segment is outside of the controller limits
    #[error("Bit timing {field} = {value} outside of [{min}, {max}]")]
    BitTimingOutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    /// The controller refused the derived baudrate
    #[error("Baudrate {baudrate} rejected by controller")]
    BaudrateRejected { baudrate: u32 },
}

impl GatewayError {
    /// Check if this error is a timeout error
    ///
    /// `PoolExhausted` is not: the non-blocking fault path reports it without
    /// ever waiting.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::DispatchTimeout)
    }

    /// Check if the caller may retry or drop and continue
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            GatewayError::UnsupportedFdFrame | GatewayError::PoolNotInitialized
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        assert!(GatewayError::DispatchTimeout.is_timeout());
        assert!(!GatewayError::PoolExhausted.is_timeout());
        assert!(GatewayError::PoolExhausted.is_recoverable());
        assert!(!GatewayError::DispatchFull.is_timeout());
    }

    #[test]
    fn test_display() {
        let err = GatewayError::BitTimingOutOfRange {
            field: "phase_seg1",
            value: 17,
            min: 1,
            max: 16,
        };
        assert_eq!(err.to_string(), "Bit timing phase_seg1 = 17 outside of [1, 16]");
        assert!(err.is_recoverable());
        assert!(!GatewayError::UnsupportedFdFrame.is_recoverable());
    }
}
