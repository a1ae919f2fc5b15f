//! CAN to GS-USB gateway core
//!
//! This crate implements the frame pipeline of a device that exposes a CAN
//! controller to a host running the SocketCAN `gs_usb` driver.
//!
//! # Features
//!
//! - Fixed pool of reusable host frame buffers, recycled through bounded queues
//! - Receive, transmit echo and error frame producers with per-path wait policies
//! - SocketCAN error frame encoding from controller fault snapshots
//! - Length code conversion for classic CAN and CAN FD lengths
//! - Bit timing validation against the controller capability
//!
//! # Example
//!
//! ```no_run
//! use gs_gateway::{EmbassyClock, FaultSnapshot, Gateway, GatewayConfig, Wait};
//!
//! # async fn run() -> gs_gateway::Result<()> {
//! let gateway: Gateway = Gateway::new(GatewayConfig::default(), EmbassyClock);
//!
//! // Fault interrupt: never waits
//! let fault = FaultSnapshot {
//!     bus_off: true,
//!     ..Default::default()
//! };
//! gateway.on_controller_fault(&fault)?;
//!
//! // USB task
//! loop {
//!     let frame = gateway.next_frame(Wait::Forever).await?;
//!     println!("TX  {}", frame);
//!     gateway.complete(frame);
//! }
//! # }
//! ```

pub mod bit_timing;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod error_frame;
pub mod frame;
pub mod gateway;
pub mod length_code;
pub mod pool;
pub mod queue;
pub mod structures;

// Re-export main types at crate root
pub use constants::{
    // CAN ID flags
    CAN_EFF_FLAG,
    // CAN ID masks
    CAN_EFF_MASK,
    CAN_ERR_FLAG,
    CAN_RTR_FLAG,
    CAN_SFF_MASK,
    // Gateway queues
    CAN_QUEUE_SIZE,
    CAN_QUEUE_TIMEOUT_MS,
    // CAN state constants
    GS_CAN_STATE_BUS_OFF,
    GS_CAN_STATE_ERROR_ACTIVE,
    GS_CAN_STATE_ERROR_PASSIVE,
    GS_CAN_STATE_ERROR_WARNING,
    GS_USB_RX_ECHO_ID,
};

pub use bit_timing::{BaudrateControl, ChannelTiming};
pub use clock::{EmbassyClock, TickSource};
pub use config::{ErrorPolicy, GatewayConfig};
pub use error::{GatewayError, Result};
pub use error_frame::{encode_error_frame, FaultSnapshot, ProtocolError};
pub use frame::{CanHeader, FrameFormat, FrameType, HostFrame, IdType};
pub use gateway::Gateway;
pub use length_code::{bytes_to_length_code, length_code_to_bytes};
pub use pool::FramePool;
pub use queue::{FrameQueue, Wait};
pub use structures::{BitTimingLimits, DeviceBitTiming, DeviceCapability, DeviceState};
