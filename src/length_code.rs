//! Length code conversion
//!
//! The controller reports payload sizes as a 4-bit length code. Codes 0-8
//! are byte counts, codes 9-15 select the CAN FD buckets 12..64.

use crate::constants::{CANFD_DLC_TO_LEN, CANFD_MAX_DLC, CAN_MAX_DLEN};

/// Convert a length code to a payload byte count
///
/// Total over every `u8`: codes outside the table decode to 0 because they can
/// only come from a corrupt register read.
pub fn length_code_to_bytes(code: u8) -> usize {
    CANFD_DLC_TO_LEN.get(code as usize).copied().unwrap_or(0)
}

/// Convert a payload byte count to the smallest length code that holds it
///
/// Counts above 64 clamp to the 64-byte code.
pub fn bytes_to_length_code(length: usize) -> u8 {
    if length <= CAN_MAX_DLEN {
        return length as u8;
    }
    CANFD_DLC_TO_LEN
        .iter()
        .position(|&bucket| bucket >= length)
        .map(|code| code as u8)
        .unwrap_or(CANFD_MAX_DLC)
}
