//! SocketCAN error frames
//!
//! Turns a controller fault snapshot into the error frame layout the host
//! driver understands: condition classes in the identifier, controller state
//! in data[1], protocol error type in data[2] and location in data[3].

use crate::constants::{
    CAN_ERROR_PASSIVE_THRESHOLD, CAN_ERROR_WARNING_THRESHOLD, CAN_ERR_ACK, CAN_ERR_BUSERROR,
    CAN_ERR_BUSOFF, CAN_ERR_CRTL, CAN_ERR_CRTL_RX_PASSIVE, CAN_ERR_CRTL_RX_WARNING,
    CAN_ERR_CRTL_TX_PASSIVE, CAN_ERR_CRTL_TX_WARNING, CAN_ERR_DLC, CAN_ERR_FLAG, CAN_ERR_PROT,
    CAN_ERR_PROT_BIT0, CAN_ERR_PROT_BIT1, CAN_ERR_PROT_FORM, CAN_ERR_PROT_LOC_CRC_SEQ,
    CAN_ERR_PROT_STUFF, CAN_ERR_PROT_UNSPEC, GS_USB_RX_ECHO_ID,
};
use crate::frame::HostFrame;

/// Protocol error raised during the arbitration phase
pub const ERROR_CATEGORY_PROTOCOL_ARBITRATION: u32 = 1 << 0;
/// Protocol error raised during the data phase
pub const ERROR_CATEGORY_PROTOCOL_DATA: u32 = 1 << 1;

/// Last error code latched by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolError {
    #[default]
    None,
    Stuff,
    Form,
    Ack,
    /// Recessive bit could not be sent
    Bit1,
    /// Dominant bit could not be sent
    Bit0,
    Crc,
    /// No new error since the last read
    NoChange,
    /// Code outside the 3-bit last error code range
    Other(u32),
}

impl ProtocolError {
    /// Decode the last error code register field
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => ProtocolError::None,
            1 => ProtocolError::Stuff,
            2 => ProtocolError::Form,
            3 => ProtocolError::Ack,
            4 => ProtocolError::Bit1,
            5 => ProtocolError::Bit0,
            6 => ProtocolError::Crc,
            7 => ProtocolError::NoChange,
            other => ProtocolError::Other(other),
        }
    }
}

/// Controller status sampled when a fault is signalled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaultSnapshot {
    pub bus_off: bool,
    pub error_passive: bool,
    pub warning: bool,
    pub tx_error_count: u8,
    pub rx_error_count: u8,
    /// Receive error counter reached the passive level
    pub rx_error_passive: bool,
    pub last_error: ProtocolError,
    /// `ERROR_CATEGORY_*` bits of the interrupt that reported the fault
    pub categories: u32,
}

impl FaultSnapshot {
    fn has_protocol_error(&self) -> bool {
        self.categories & (ERROR_CATEGORY_PROTOCOL_ARBITRATION | ERROR_CATEGORY_PROTOCOL_DATA) != 0
    }
}

/// Fill `frame` with the error frame describing `fault`
///
/// Returns `false` when the snapshot carries no reportable condition, in
/// which case the frame holds only the bare error flag and must not be sent.
pub fn encode_error_frame(fault: &FaultSnapshot, frame: &mut HostFrame, timestamp_us: u32) -> bool {
    frame.echo_id = GS_USB_RX_ECHO_ID;
    frame.can_id = CAN_ERR_FLAG;
    frame.can_dlc = CAN_ERR_DLC;
    frame.channel = 0;
    frame.flags = 0;
    frame.reserved = 0;
    frame.timestamp_us = timestamp_us;
    frame.clear_payload(CAN_ERR_DLC as usize);

    let mut ctrl = 0u8;
    let mut prot_type = 0u8;
    let mut prot_loc = 0u8;

    if fault.bus_off {
        frame.can_id |= CAN_ERR_BUSOFF;
    }

    if fault.error_passive || fault.warning {
        frame.can_id |= CAN_ERR_CRTL;
        if fault.warning {
            if fault.tx_error_count >= CAN_ERROR_WARNING_THRESHOLD {
                ctrl |= CAN_ERR_CRTL_TX_WARNING;
            }
            if fault.rx_error_count >= CAN_ERROR_WARNING_THRESHOLD {
                ctrl |= CAN_ERR_CRTL_RX_WARNING;
            }
        }
        if fault.error_passive {
            if fault.tx_error_count >= CAN_ERROR_PASSIVE_THRESHOLD {
                ctrl |= CAN_ERR_CRTL_TX_PASSIVE;
            }
            if fault.rx_error_passive {
                ctrl |= CAN_ERR_CRTL_RX_PASSIVE;
            }
        }
    }

    if fault.has_protocol_error() {
        frame.can_id |= CAN_ERR_BUSERROR;
        match fault.last_error {
            ProtocolError::None | ProtocolError::NoChange => {}
            ProtocolError::Stuff => prot_type = CAN_ERR_PROT_STUFF,
            ProtocolError::Form => prot_type = CAN_ERR_PROT_FORM,
            ProtocolError::Ack => frame.can_id |= CAN_ERR_ACK,
            ProtocolError::Bit1 => prot_type = CAN_ERR_PROT_BIT1,
            ProtocolError::Bit0 => prot_type = CAN_ERR_PROT_BIT0,
            ProtocolError::Crc => prot_loc = CAN_ERR_PROT_LOC_CRC_SEQ,
            ProtocolError::Other(_) => prot_type = CAN_ERR_PROT_UNSPEC,
        }
        if !matches!(fault.last_error, ProtocolError::None | ProtocolError::NoChange) {
            frame.can_id |= CAN_ERR_PROT;
        }
    }

    let payload = frame.payload_mut();
    payload[1] = ctrl;
    payload[2] = prot_type;
    payload[3] = prot_loc;

    frame.can_id != CAN_ERR_FLAG
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(fault: &FaultSnapshot) -> (bool, HostFrame) {
        let mut frame = HostFrame::allocate(0, false);
        frame.copy_payload(&[0xFF; 8]);
        let reportable = encode_error_frame(fault, &mut frame, 42);
        (reportable, frame)
    }

    #[test]
    fn test_empty_snapshot_is_not_reportable() {
        let (reportable, frame) = encode(&FaultSnapshot::default());
        assert!(!reportable);
        assert_eq!(frame.can_id, CAN_ERR_FLAG);
        assert_eq!(frame.data(), &[0u8; 8]);
    }

    #[test]
    fn test_bus_off() {
        let (reportable, frame) = encode(&FaultSnapshot {
            bus_off: true,
            ..Default::default()
        });
        assert!(reportable);
        assert!(frame.is_error_frame());
        assert_eq!(frame.can_id, CAN_ERR_FLAG | CAN_ERR_BUSOFF);
        assert_eq!(frame.can_dlc, CAN_ERR_DLC);
        assert_eq!(frame.timestamp_us, 42);
    }

    #[test]
    fn test_warning_threshold_boundary() {
        let at = FaultSnapshot {
            warning: true,
            tx_error_count: 96,
            ..Default::default()
        };
        let (_, frame) = encode(&at);
        assert_eq!(frame.data()[1] & CAN_ERR_CRTL_TX_WARNING, CAN_ERR_CRTL_TX_WARNING);

        let below = FaultSnapshot {
            tx_error_count: 95,
            ..at
        };
        let (reportable, frame) = encode(&below);
        // The controller-state class is still flagged, only the bit is missing
        assert!(reportable);
        assert_eq!(frame.can_id, CAN_ERR_FLAG | CAN_ERR_CRTL);
        assert_eq!(frame.data()[1] & CAN_ERR_CRTL_TX_WARNING, 0);
    }

    #[test]
    fn test_rx_warning() {
        let (_, frame) = encode(&FaultSnapshot {
            warning: true,
            rx_error_count: 100,
            ..Default::default()
        });
        assert_eq!(frame.data()[1], CAN_ERR_CRTL_RX_WARNING);
    }

    #[test]
    fn test_error_passive() {
        let (_, frame) = encode(&FaultSnapshot {
            error_passive: true,
            tx_error_count: 128,
            rx_error_passive: true,
            ..Default::default()
        });
        assert_eq!(
            frame.data()[1],
            CAN_ERR_CRTL_TX_PASSIVE | CAN_ERR_CRTL_RX_PASSIVE
        );

        let (_, frame) = encode(&FaultSnapshot {
            error_passive: true,
            tx_error_count: 127,
            ..Default::default()
        });
        assert_eq!(frame.data()[1], 0);
    }

    #[test]
    fn test_protocol_errors() {
        let cases = [
            (ProtocolError::Stuff, 2, CAN_ERR_PROT_STUFF),
            (ProtocolError::Form, 2, CAN_ERR_PROT_FORM),
            (ProtocolError::Bit1, 2, CAN_ERR_PROT_BIT1),
            (ProtocolError::Bit0, 2, CAN_ERR_PROT_BIT0),
            (ProtocolError::Crc, 3, CAN_ERR_PROT_LOC_CRC_SEQ),
        ];
        for (error, index, value) in cases {
            let (reportable, frame) = encode(&FaultSnapshot {
                last_error: error,
                categories: ERROR_CATEGORY_PROTOCOL_DATA,
                ..Default::default()
            });
            assert!(reportable);
            assert_eq!(frame.can_id, CAN_ERR_FLAG | CAN_ERR_BUSERROR | CAN_ERR_PROT);
            assert_eq!(frame.data()[index], value, "{:?}", error);
        }
    }

    #[test]
    fn test_ack_error_goes_to_identifier() {
        let (_, frame) = encode(&FaultSnapshot {
            last_error: ProtocolError::Ack,
            categories: ERROR_CATEGORY_PROTOCOL_ARBITRATION,
            ..Default::default()
        });
        assert_eq!(
            frame.can_id,
            CAN_ERR_FLAG | CAN_ERR_BUSERROR | CAN_ERR_PROT | CAN_ERR_ACK
        );
        assert_eq!(frame.data()[2], 0);
    }

    #[test]
    fn test_protocol_category_without_code() {
        let (reportable, frame) = encode(&FaultSnapshot {
            last_error: ProtocolError::NoChange,
            categories: ERROR_CATEGORY_PROTOCOL_ARBITRATION,
            ..Default::default()
        });
        assert!(reportable);
        assert_eq!(frame.can_id, CAN_ERR_FLAG | CAN_ERR_BUSERROR);

        // An error code without a protocol interrupt is not reported
        let (reportable, _) = encode(&FaultSnapshot {
            last_error: ProtocolError::Stuff,
            ..Default::default()
        });
        assert!(!reportable);
    }

    #[test]
    fn test_protocol_error_from_code() {
        assert_eq!(ProtocolError::from_code(0), ProtocolError::None);
        assert_eq!(ProtocolError::from_code(6), ProtocolError::Crc);
        assert_eq!(ProtocolError::from_code(7), ProtocolError::NoChange);
        assert_eq!(ProtocolError::from_code(0x0B), ProtocolError::Other(0x0B));
    }

    #[test]
    fn test_unrecognised_code_is_unspecified() {
        let (reportable, frame) = encode(&FaultSnapshot {
            last_error: ProtocolError::from_code(9),
            categories: ERROR_CATEGORY_PROTOCOL_DATA,
            ..Default::default()
        });
        assert!(reportable);
        assert_eq!(frame.can_id, CAN_ERR_FLAG | CAN_ERR_BUSERROR | CAN_ERR_PROT);
        assert_eq!(frame.data()[2], CAN_ERR_PROT_UNSPEC);
        assert_eq!(frame.data()[3], 0);
    }
}
