//! GS-USB protocol structures
//!
//! This module contains the data structures exchanged with the host for bit
//! timing configuration and bus state reporting.

use crate::constants::{
    can_state_name, GS_CAN_STATE_BUS_OFF, GS_CAN_STATE_ERROR_ACTIVE, GS_CAN_STATE_ERROR_PASSIVE,
    GS_CAN_STATE_ERROR_WARNING,
};
use crate::error_frame::FaultSnapshot;

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// CAN bit timing configuration
///
/// Used for both the nominal (arbitration) phase and the data phase (CAN FD).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceBitTiming {
    /// Propagation segment
    pub prop_seg: u32,
    /// Phase segment 1
    pub phase_seg1: u32,
    /// Phase segment 2
    pub phase_seg2: u32,
    /// Synchronization jump width
    pub sjw: u32,
    /// Baud rate prescaler
    pub brp: u32,
}

impl DeviceBitTiming {
    /// Create a new bit timing configuration
    pub fn new(prop_seg: u32, phase_seg1: u32, phase_seg2: u32, sjw: u32, brp: u32) -> Self {
        Self {
            prop_seg,
            phase_seg1,
            phase_seg2,
            sjw,
            brp,
        }
    }

    /// Controller view of a timing: TSEG1 already includes the propagation segment
    pub fn from_segments(brp: u32, tseg1: u32, tseg2: u32, sjw: u32) -> Self {
        Self::new(0, tseg1, tseg2, sjw, brp)
    }

    /// TSEG1 as the controller counts it (prop_seg + phase_seg1)
    ///
    /// `None` if the host-supplied segments overflow.
    pub fn tseg1(&self) -> Option<u32> {
        self.prop_seg.checked_add(self.phase_seg1)
    }

    /// Time quanta per bit (sync segment included)
    pub fn quanta_per_bit(&self) -> Option<u32> {
        self.tseg1()?.checked_add(self.phase_seg2)?.checked_add(1)
    }

    /// Bitrate produced by this timing on a `clock_hz` controller clock
    ///
    /// Returns 0 for a zero prescaler.
    pub fn bitrate(&self, clock_hz: u32) -> u32 {
        let quanta =
            1 + self.prop_seg as u64 + self.phase_seg1 as u64 + self.phase_seg2 as u64;
        let divisor = self.brp as u64 * quanta;
        if divisor == 0 {
            return 0;
        }
        (clock_hz as u64 / divisor) as u32
    }

    /// Pack into bytes for USB transfer
    pub fn pack(&self) -> [u8; 20] {
        let mut buf = [0u8; 20];
        buf[0..4].copy_from_slice(&self.prop_seg.to_le_bytes());
        buf[4..8].copy_from_slice(&self.phase_seg1.to_le_bytes());
        buf[8..12].copy_from_slice(&self.phase_seg2.to_le_bytes());
        buf[12..16].copy_from_slice(&self.sjw.to_le_bytes());
        buf[16..20].copy_from_slice(&self.brp.to_le_bytes());
        buf
    }

    /// Unpack a BITTIMING / DATA_BITTIMING request (20 bytes, 5 x uint32)
    pub fn unpack(data: &[u8]) -> Self {
        Self {
            prop_seg: read_u32(data, 0),
            phase_seg1: read_u32(data, 4),
            phase_seg2: read_u32(data, 8),
            sjw: read_u32(data, 12),
            brp: read_u32(data, 16),
        }
    }
}

/// Bounds a bit timing must satisfy for one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitTimingLimits {
    pub tseg1_min: u32,
    pub tseg1_max: u32,
    pub tseg2_min: u32,
    pub tseg2_max: u32,
    pub sjw_max: u32,
    pub brp_min: u32,
    pub brp_max: u32,
}

/// Device capability including bit timing constraints
///
/// Supports both classic CAN (BT_CONST) and CAN FD (BT_CONST_EXT) descriptors.
/// When built from BT_CONST_EXT data, the data phase timing fields are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapability {
    /// Feature bitfield
    pub feature: u32,
    /// CAN clock frequency in Hz
    pub fclk_can: u32,
    /// Minimum TSEG1 value
    pub tseg1_min: u32,
    /// Maximum TSEG1 value
    pub tseg1_max: u32,
    /// Minimum TSEG2 value
    pub tseg2_min: u32,
    /// Maximum TSEG2 value
    pub tseg2_max: u32,
    /// Maximum SJW value
    pub sjw_max: u32,
    /// Minimum BRP value
    pub brp_min: u32,
    /// Maximum BRP value
    pub brp_max: u32,
    /// BRP increment value
    pub brp_inc: u32,

    // CAN FD data phase timing (optional)
    pub dtseg1_min: Option<u32>,
    pub dtseg1_max: Option<u32>,
    pub dtseg2_min: Option<u32>,
    pub dtseg2_max: Option<u32>,
    pub dsjw_max: Option<u32>,
    pub dbrp_min: Option<u32>,
    pub dbrp_max: Option<u32>,
    pub dbrp_inc: Option<u32>,
}

impl DeviceCapability {
    /// Unpack from BT_CONST data (40 bytes, 10 x uint32)
    pub fn unpack(data: &[u8]) -> Self {
        Self {
            feature: read_u32(data, 0),
            fclk_can: read_u32(data, 4),
            tseg1_min: read_u32(data, 8),
            tseg1_max: read_u32(data, 12),
            tseg2_min: read_u32(data, 16),
            tseg2_max: read_u32(data, 20),
            sjw_max: read_u32(data, 24),
            brp_min: read_u32(data, 28),
            brp_max: read_u32(data, 32),
            brp_inc: read_u32(data, 36),
            dtseg1_min: None,
            dtseg1_max: None,
            dtseg2_min: None,
            dtseg2_max: None,
            dsjw_max: None,
            dbrp_min: None,
            dbrp_max: None,
            dbrp_inc: None,
        }
    }

    /// Unpack from BT_CONST_EXT data (72 bytes, 18 x uint32)
    pub fn unpack_extended(data: &[u8]) -> Self {
        let mut cap = Self::unpack(data);
        cap.dtseg1_min = Some(read_u32(data, 40));
        cap.dtseg1_max = Some(read_u32(data, 44));
        cap.dtseg2_min = Some(read_u32(data, 48));
        cap.dtseg2_max = Some(read_u32(data, 52));
        cap.dsjw_max = Some(read_u32(data, 56));
        cap.dbrp_min = Some(read_u32(data, 60));
        cap.dbrp_max = Some(read_u32(data, 64));
        cap.dbrp_inc = Some(read_u32(data, 68));
        cap
    }

    /// Pack the BT_CONST response (40 bytes)
    pub fn pack(&self) -> [u8; 40] {
        let words = [
            self.feature,
            self.fclk_can,
            self.tseg1_min,
            self.tseg1_max,
            self.tseg2_min,
            self.tseg2_max,
            self.sjw_max,
            self.brp_min,
            self.brp_max,
            self.brp_inc,
        ];
        let mut buf = [0u8; 40];
        for (chunk, word) in buf.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        buf
    }

    /// Pack the BT_CONST_EXT response (72 bytes)
    ///
    /// Missing data phase fields fall back to the nominal ones.
    pub fn pack_extended(&self) -> [u8; 72] {
        let data = self.data_limits();
        let words = [
            data.tseg1_min,
            data.tseg1_max,
            data.tseg2_min,
            data.tseg2_max,
            data.sjw_max,
            data.brp_min,
            data.brp_max,
            self.dbrp_inc.unwrap_or(self.brp_inc),
        ];
        let mut buf = [0u8; 72];
        buf[..40].copy_from_slice(&self.pack());
        for (chunk, word) in buf[40..].chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        buf
    }

    /// Check if CAN FD data phase timing is available
    pub fn has_fd_timing(&self) -> bool {
        self.dtseg1_min.is_some()
    }

    /// Bounds for the nominal phase
    pub fn nominal_limits(&self) -> BitTimingLimits {
        BitTimingLimits {
            tseg1_min: self.tseg1_min,
            tseg1_max: self.tseg1_max,
            tseg2_min: self.tseg2_min,
            tseg2_max: self.tseg2_max,
            sjw_max: self.sjw_max,
            brp_min: self.brp_min,
            brp_max: self.brp_max,
        }
    }

    /// Bounds for the data phase, falling back to the nominal bounds
    pub fn data_limits(&self) -> BitTimingLimits {
        let nominal = self.nominal_limits();
        BitTimingLimits {
            tseg1_min: self.dtseg1_min.unwrap_or(nominal.tseg1_min),
            tseg1_max: self.dtseg1_max.unwrap_or(nominal.tseg1_max),
            tseg2_min: self.dtseg2_min.unwrap_or(nominal.tseg2_min),
            tseg2_max: self.dtseg2_max.unwrap_or(nominal.tseg2_max),
            sjw_max: self.dsjw_max.unwrap_or(nominal.sjw_max),
            brp_min: self.dbrp_min.unwrap_or(nominal.brp_min),
            brp_max: self.dbrp_max.unwrap_or(nominal.brp_max),
        }
    }

}

/// CAN device state for the GET_STATE response
///
/// Contains the current CAN bus state and error counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceState {
    /// CAN state enum value
    pub state: u32,
    /// RX error counter
    pub rxerr: u32,
    /// TX error counter
    pub txerr: u32,
}

impl DeviceState {
    /// Derive the reported state from a controller fault snapshot
    pub fn from_fault(fault: &FaultSnapshot) -> Self {
        let state = if fault.bus_off {
            GS_CAN_STATE_BUS_OFF
        } else if fault.error_passive {
            GS_CAN_STATE_ERROR_PASSIVE
        } else if fault.warning {
            GS_CAN_STATE_ERROR_WARNING
        } else {
            GS_CAN_STATE_ERROR_ACTIVE
        };
        Self {
            state,
            rxerr: fault.rx_error_count as u32,
            txerr: fault.tx_error_count as u32,
        }
    }

    /// Pack the GET_STATE response (12 bytes, 3 x uint32)
    pub fn pack(&self) -> [u8; 12] {
        let mut buf = [0u8; 12];
        buf[0..4].copy_from_slice(&self.state.to_le_bytes());
        buf[4..8].copy_from_slice(&self.rxerr.to_le_bytes());
        buf[8..12].copy_from_slice(&self.txerr.to_le_bytes());
        buf
    }

    /// Get human-readable state name
    pub fn state_name(&self) -> &'static str {
        can_state_name(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capability() -> DeviceCapability {
        DeviceCapability {
            feature: 0,
            fclk_can: 48_000_000,
            tseg1_min: 1,
            tseg1_max: 16,
            tseg2_min: 1,
            tseg2_max: 8,
            sjw_max: 4,
            brp_min: 1,
            brp_max: 1024,
            brp_inc: 1,
            dtseg1_min: None,
            dtseg1_max: None,
            dtseg2_min: None,
            dtseg2_max: None,
            dsjw_max: None,
            dbrp_min: None,
            dbrp_max: None,
            dbrp_inc: None,
        }
    }

    #[test]
    fn test_device_bit_timing_unpack() {
        let timing = DeviceBitTiming::new(1, 12, 2, 1, 6);
        let unpacked = DeviceBitTiming::unpack(&timing.pack());
        assert_eq!(unpacked, timing);
        assert_eq!(unpacked.tseg1(), Some(13));
        assert_eq!(unpacked.quanta_per_bit(), Some(16));
    }

    #[test]
    fn test_segment_overflow() {
        let timing = DeviceBitTiming::new(u32::MAX, 2, 2, 1, 6);
        assert_eq!(timing.tseg1(), None);
        assert_eq!(timing.quanta_per_bit(), None);
        assert_eq!(DeviceBitTiming::new(0, u32::MAX, 1, 1, 1).quanta_per_bit(), None);
        // Bitrate math is widened and never wraps
        assert_eq!(timing.bitrate(48_000_000), 0);
    }

    #[test]
    fn test_bitrate() {
        // 48 MHz / (6 * 16) = 500 kbps
        assert_eq!(DeviceBitTiming::new(1, 12, 2, 1, 6).bitrate(48_000_000), 500_000);
        assert_eq!(DeviceBitTiming::new(1, 12, 2, 1, 0).bitrate(48_000_000), 0);
    }

    #[test]
    fn test_capability_pack_unpack() {
        let cap = capability();
        let packed = cap.pack();
        assert_eq!(packed[4..8], 48_000_000u32.to_le_bytes());
        assert_eq!(DeviceCapability::unpack(&packed), cap);
        assert!(!cap.has_fd_timing());
    }

    #[test]
    fn test_capability_extended_fallback() {
        let cap = capability();
        assert_eq!(cap.data_limits(), cap.nominal_limits());

        let ext = DeviceCapability::unpack_extended(&cap.pack_extended());
        assert!(ext.has_fd_timing());
        assert_eq!(ext.dtseg1_max, Some(16));
        assert_eq!(ext.dsjw_max, Some(4));
    }

    #[test]
    fn test_device_state_from_fault() {
        let fault = FaultSnapshot {
            error_passive: true,
            warning: true,
            tx_error_count: 130,
            rx_error_count: 5,
            ..FaultSnapshot::default()
        };
        let state = DeviceState::from_fault(&fault);
        assert_eq!(state.state, GS_CAN_STATE_ERROR_PASSIVE);
        assert_eq!(state.state_name(), "ERROR_PASSIVE");
        assert_eq!(state.pack()[8..12], [130, 0, 0, 0]);

        let idle = DeviceState::from_fault(&FaultSnapshot::default());
        assert_eq!(idle.state, GS_CAN_STATE_ERROR_ACTIVE);
    }
}
