//! GS-USB gateway constants
//!
//! This module contains the constants shared by the frame pipeline: CAN
//! identifier flags, length code tables, host frame sizes, SocketCAN error
//! frame classes and the queue sizing of the gateway.

// ============================================================================
// CAN ID Flags (in CAN frame identifier)
// ============================================================================

/// Extended frame format flag (29-bit ID)
pub const CAN_EFF_FLAG: u32 = 0x8000_0000;
/// Remote transmission request flag
pub const CAN_RTR_FLAG: u32 = 0x4000_0000;
/// Error message frame flag
pub const CAN_ERR_FLAG: u32 = 0x2000_0000;

// ============================================================================
// CAN ID Masks
// ============================================================================

/// Standard frame format mask (11-bit ID)
pub const CAN_SFF_MASK: u32 = 0x0000_07FF;
/// Extended frame format mask (29-bit ID)
pub const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;

// ============================================================================
// CAN Payload Definitions
// ============================================================================

/// Maximum data length for classic CAN
pub const CAN_MAX_DLEN: usize = 8;
/// Maximum DLC for CAN FD
pub const CANFD_MAX_DLC: u8 = 15;
/// Maximum data length for CAN FD
pub const CANFD_MAX_DLEN: usize = 64;

/// Length code to data length table for CAN FD
pub const CANFD_DLC_TO_LEN: [usize; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

// ============================================================================
// GS-USB Frame Constants
// ============================================================================

/// Size of the host frame header (echo_id, can_id, can_dlc, channel, flags, reserved)
pub const GS_USB_HEADER_SIZE: usize = 12;

/// Echo ID value for frames that are not echoes of a host submission
pub const GS_USB_RX_ECHO_ID: u32 = 0xFFFF_FFFF;

/// Classic CAN frame size (without timestamp)
pub const GS_USB_FRAME_SIZE: usize = 20;
/// Classic CAN frame size (with hardware timestamp)
pub const GS_USB_FRAME_SIZE_HW_TIMESTAMP: usize = 24;
/// CAN FD frame size (without timestamp): 12-byte header + 64-byte data
pub const GS_USB_FRAME_SIZE_FD: usize = 76;
/// CAN FD frame size (with hardware timestamp)
pub const GS_USB_FRAME_SIZE_FD_HW_TIMESTAMP: usize = 80;

// ============================================================================
// CAN State Enum (GET_STATE response)
// ============================================================================

/// Normal operation
pub const GS_CAN_STATE_ERROR_ACTIVE: u32 = 0;
/// TEC/REC >= 96
pub const GS_CAN_STATE_ERROR_WARNING: u32 = 1;
/// TEC/REC >= 128
pub const GS_CAN_STATE_ERROR_PASSIVE: u32 = 2;
/// TEC > 255
pub const GS_CAN_STATE_BUS_OFF: u32 = 3;

/// Get human-readable name for CAN state
pub fn can_state_name(state: u32) -> &'static str {
    match state {
        GS_CAN_STATE_ERROR_ACTIVE => "ERROR_ACTIVE",
        GS_CAN_STATE_ERROR_WARNING => "ERROR_WARNING",
        GS_CAN_STATE_ERROR_PASSIVE => "ERROR_PASSIVE",
        GS_CAN_STATE_BUS_OFF => "BUS_OFF",
        _ => "UNKNOWN",
    }
}

// ============================================================================
// SocketCAN Error Frames (linux/can/error.h)
// ============================================================================

/// Payload length of an error frame
pub const CAN_ERR_DLC: u8 = 8;

/// Controller problems, details in data[1]
pub const CAN_ERR_CRTL: u32 = 0x0000_0004;
/// Protocol violations, details in data[2] and data[3]
pub const CAN_ERR_PROT: u32 = 0x0000_0008;
/// Received no ACK on transmission
pub const CAN_ERR_ACK: u32 = 0x0000_0020;
/// Bus off
pub const CAN_ERR_BUSOFF: u32 = 0x0000_0040;
/// Bus error (may flood)
pub const CAN_ERR_BUSERROR: u32 = 0x0000_0080;

/// data[1]: reached warning level for RX errors
pub const CAN_ERR_CRTL_RX_WARNING: u8 = 0x04;
/// data[1]: reached warning level for TX errors
pub const CAN_ERR_CRTL_TX_WARNING: u8 = 0x08;
/// data[1]: reached error passive status RX
pub const CAN_ERR_CRTL_RX_PASSIVE: u8 = 0x10;
/// data[1]: reached error passive status TX
pub const CAN_ERR_CRTL_TX_PASSIVE: u8 = 0x20;

/// data[2]: unspecified protocol error
pub const CAN_ERR_PROT_UNSPEC: u8 = 0x00;
/// data[2]: frame format error
pub const CAN_ERR_PROT_FORM: u8 = 0x02;
/// data[2]: bit stuffing error
pub const CAN_ERR_PROT_STUFF: u8 = 0x04;
/// data[2]: unable to send dominant bit
pub const CAN_ERR_PROT_BIT0: u8 = 0x08;
/// data[2]: unable to send recessive bit
pub const CAN_ERR_PROT_BIT1: u8 = 0x10;

/// data[3]: CRC sequence
pub const CAN_ERR_PROT_LOC_CRC_SEQ: u8 = 0x08;

/// Error counter level at which the warning bits are reported
pub const CAN_ERROR_WARNING_THRESHOLD: u8 = 96;
/// Error counter level at which the TX passive bit is reported
pub const CAN_ERROR_PASSIVE_THRESHOLD: u8 = 128;

// ============================================================================
// Gateway Queues
// ============================================================================

/// Number of frame slots backing the pool and the dispatch queue
pub const CAN_QUEUE_SIZE: usize = 64;

/// Default bounded wait for queue operations (ms)
pub const CAN_QUEUE_TIMEOUT_MS: u64 = 100;
