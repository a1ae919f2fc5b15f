//! GS-USB host frame implementation
//!
//! This module provides [`HostFrame`], the reusable buffer that carries one CAN
//! event toward the host, and [`CanHeader`], the controller-side description of
//! a frame that is copied into it.

use crate::constants::{
    CANFD_MAX_DLEN, CAN_EFF_FLAG, CAN_EFF_MASK, CAN_ERR_FLAG, CAN_MAX_DLEN, CAN_RTR_FLAG,
    CAN_SFF_MASK, GS_USB_FRAME_SIZE, GS_USB_FRAME_SIZE_FD, GS_USB_FRAME_SIZE_FD_HW_TIMESTAMP,
    GS_USB_FRAME_SIZE_HW_TIMESTAMP, GS_USB_HEADER_SIZE, GS_USB_RX_ECHO_ID,
};
use crate::length_code::length_code_to_bytes;

/// Identifier width reported by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdType {
    /// 11-bit identifier
    Standard,
    /// 29-bit identifier
    Extended,
}

/// Data or remote frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Data,
    Remote,
}

/// Classic CAN or CAN FD frame format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Classic,
    Fd,
}

/// Controller-side frame header
///
/// Mirrors what the CAN peripheral reports for a received frame or accepts for
/// a transmitted one. `length_code` is the raw hardware length code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanHeader {
    /// Numeric CAN identifier without flags
    pub identifier: u32,
    pub id_type: IdType,
    pub frame_type: FrameType,
    pub format: FrameFormat,
    /// Hardware length code (not a byte count)
    pub length_code: u8,
}

impl CanHeader {
    /// Create a classic data frame header with a standard identifier
    pub fn new(identifier: u32, length_code: u8) -> Self {
        Self {
            identifier,
            id_type: IdType::Standard,
            frame_type: FrameType::Data,
            format: FrameFormat::Classic,
            length_code,
        }
    }

    /// Create a classic data frame header with an extended identifier
    pub fn extended(identifier: u32, length_code: u8) -> Self {
        Self {
            id_type: IdType::Extended,
            ..Self::new(identifier, length_code)
        }
    }

    /// Turn this header into a remote frame header
    pub fn remote(mut self) -> Self {
        self.frame_type = FrameType::Remote;
        self
    }

    /// Turn this header into a CAN FD header
    pub fn fd(mut self) -> Self {
        self.format = FrameFormat::Fd;
        self
    }

    pub fn is_fd(&self) -> bool {
        self.format == FrameFormat::Fd
    }

    pub fn is_remote(&self) -> bool {
        self.frame_type == FrameType::Remote
    }

    /// Host-side identifier: numeric ID with the EFF/RTR flags merged in
    pub fn can_id(&self) -> u32 {
        let mut can_id = match self.id_type {
            IdType::Standard => self.identifier & CAN_SFF_MASK,
            IdType::Extended => (self.identifier & CAN_EFF_MASK) | CAN_EFF_FLAG,
        };
        if self.is_remote() {
            can_id |= CAN_RTR_FLAG;
        }
        can_id
    }
}

/// GS-USB host frame buffer
///
/// One slot of the frame pool. The payload region is allocated once when the
/// pool is initialized (8 bytes, or 64 for the FD layout) and reused for the
/// lifetime of the pool. The type is neither `Clone` nor `Copy`: holding a
/// `HostFrame` is owning that slot, and handing it to a queue gives it away.
pub struct HostFrame {
    /// Echo ID (0xFFFFFFFF for frames that are not host echoes)
    pub echo_id: u32,
    /// CAN identifier (with flags like CAN_EFF_FLAG if needed)
    pub can_id: u32,
    /// Hardware length code
    pub can_dlc: u8,
    /// CAN channel
    pub channel: u8,
    /// Frame flags
    pub flags: u8,
    /// Reserved byte
    pub reserved: u8,
    /// Timestamp in microseconds
    pub timestamp_us: u32,
    data: Vec<u8>,
    slot: u16,
    generation: u32,
}

impl HostFrame {
    /// Allocate the buffer for pool slot `slot`
    ///
    /// Allocation failure aborts the process: a partially built pool is never
    /// handed out.
    pub(crate) fn allocate(slot: u16, fd_layout: bool) -> Self {
        let len = if fd_layout { CANFD_MAX_DLEN } else { CAN_MAX_DLEN };
        Self {
            echo_id: GS_USB_RX_ECHO_ID,
            can_id: 0,
            can_dlc: 0,
            channel: 0,
            flags: 0,
            reserved: 0,
            timestamp_us: 0,
            data: vec![0u8; len],
            slot,
            generation: 0,
        }
    }

    /// Tag the buffer with the pool generation that owns it
    pub(crate) fn in_generation(mut self, generation: u32) -> Self {
        self.generation = generation;
        self
    }

    /// Pool slot this buffer belongs to
    pub fn slot(&self) -> u16 {
        self.slot
    }

    /// Pool generation this buffer was allocated for
    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }

    /// Whether the payload region uses the 64-byte FD layout
    pub fn is_fd_layout(&self) -> bool {
        self.data.len() == CANFD_MAX_DLEN
    }

    /// Whole payload region
    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    /// Whole payload region, mutable
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Copy `bytes` to the start of the payload, truncating to the region size
    ///
    /// Returns the number of bytes copied.
    pub fn copy_payload(&mut self, bytes: &[u8]) -> usize {
        let len = bytes.len().min(self.data.len());
        self.data[..len].copy_from_slice(&bytes[..len]);
        len
    }

    /// Zero the first `len` bytes of the payload
    pub fn clear_payload(&mut self, len: usize) {
        let len = len.min(self.data.len());
        self.data[..len].fill(0);
    }

    /// Get the arbitration ID (without flags)
    pub fn arbitration_id(&self) -> u32 {
        self.can_id & CAN_EFF_MASK
    }

    /// Check if this is an extended ID frame (29-bit)
    pub fn is_extended_id(&self) -> bool {
        (self.can_id & CAN_EFF_FLAG) != 0
    }

    /// Check if this is a remote transmission request
    pub fn is_remote_frame(&self) -> bool {
        (self.can_id & CAN_RTR_FLAG) != 0
    }

    /// Check if this is an error frame
    pub fn is_error_frame(&self) -> bool {
        (self.can_id & CAN_ERR_FLAG) != 0
    }

    /// Check if this is an echo of a host submitted frame
    pub fn is_echo_frame(&self) -> bool {
        self.echo_id != GS_USB_RX_ECHO_ID
    }

    /// Check if this is a received (or synthesized) frame
    pub fn is_rx_frame(&self) -> bool {
        self.echo_id == GS_USB_RX_ECHO_ID
    }

    /// Payload length encoded by the length code, bounded by the region size
    pub fn data_length(&self) -> usize {
        length_code_to_bytes(self.can_dlc).min(self.data.len())
    }

    /// Get frame data as a slice
    pub fn data(&self) -> &[u8] {
        &self.data[..self.data_length()]
    }

    /// Get frame size in bytes
    pub fn frame_size(hw_timestamp: bool, fd_layout: bool) -> usize {
        match (fd_layout, hw_timestamp) {
            (true, true) => GS_USB_FRAME_SIZE_FD_HW_TIMESTAMP,
            (true, false) => GS_USB_FRAME_SIZE_FD,
            (false, true) => GS_USB_FRAME_SIZE_HW_TIMESTAMP,
            (false, false) => GS_USB_FRAME_SIZE,
        }
    }

    /// Pack frame into the bytes the host driver reads
    ///
    /// Header fields are little-endian, followed by the whole payload region
    /// and, with `hw_timestamp`, the trailing timestamp.
    pub fn pack(&self, hw_timestamp: bool) -> Vec<u8> {
        let size = Self::frame_size(hw_timestamp, self.is_fd_layout());
        let mut buf = Vec::with_capacity(size);

        buf.extend_from_slice(&self.echo_id.to_le_bytes());
        buf.extend_from_slice(&self.can_id.to_le_bytes());
        buf.push(self.can_dlc);
        buf.push(self.channel);
        buf.push(self.flags);
        buf.push(self.reserved);
        debug_assert_eq!(buf.len(), GS_USB_HEADER_SIZE);

        buf.extend_from_slice(&self.data);

        if hw_timestamp {
            buf.extend_from_slice(&self.timestamp_us.to_le_bytes());
        }

        buf
    }
}

impl std::fmt::Display for HostFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_error_frame() {
            " ERR"
        } else if self.is_echo_frame() {
            " ECHO"
        } else {
            ""
        };

        let data_str = if self.is_remote_frame() {
            "remote request".to_string()
        } else {
            self.data()
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ")
        };

        write!(
            f,
            "{:>8X}{}   [{}]  {}",
            self.arbitration_id(),
            kind,
            self.data_length(),
            data_str
        )
    }
}

impl std::fmt::Debug for HostFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostFrame")
            .field("slot", &self.slot)
            .field("echo_id", &format_args!("0x{:08X}", self.echo_id))
            .field("can_id", &format_args!("0x{:08X}", self.can_id))
            .field("can_dlc", &self.can_dlc)
            .field("channel", &self.channel)
            .field("flags", &format_args!("0x{:02X}", self.flags))
            .field("data_length", &self.data_length())
            .field("timestamp_us", &self.timestamp_us)
            .finish()
    }
}
