//! Bit timing negotiation
//!
//! Validates the timings requested by the host against the controller
//! capability before storing them. A rejected request leaves the stored
//! timing untouched.
//!
//! Timing changes are only expected while the channel is stopped; nothing here
//! synchronizes with the frame pipeline.

use log::{debug, warn};

use crate::error::{GatewayError, Result};
use crate::structures::{BitTimingLimits, DeviceBitTiming, DeviceCapability};

/// Controller hook that applies a nominal baudrate
pub trait BaudrateControl {
    /// Reconfigure the controller for `baudrate` bits per second
    ///
    /// Returns `false` if the controller cannot run at that rate.
    fn update_baudrate(&mut self, baudrate: u32) -> bool;
}

impl BitTimingLimits {
    /// Check one timing against these limits
    pub fn check(&self, prescaler: u32, tseg1: u32, tseg2: u32, sjw: u32) -> Result<()> {
        check_range("prescaler", prescaler, self.brp_min.max(1), self.brp_max)?;
        check_range("phase_seg1", tseg1, self.tseg1_min, self.tseg1_max)?;
        check_range("phase_seg2", tseg2, self.tseg2_min, self.tseg2_max)?;
        check_range("sjw", sjw, 1, self.sjw_max)
    }
}

fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<()> {
    if value < min || value > max {
        return Err(GatewayError::BitTimingOutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Fold the host's propagation segment into TSEG1
fn host_tseg1(request: &DeviceBitTiming, limits: &BitTimingLimits) -> Result<u32> {
    request.tseg1().ok_or_else(|| {
        warn!(
            "bit timing rejected: prop_seg {} + phase_seg1 {} overflows",
            request.prop_seg, request.phase_seg1
        );
        GatewayError::BitTimingOutOfRange {
            field: "phase_seg1",
            value: u32::MAX,
            min: limits.tseg1_min,
            max: limits.tseg1_max,
        }
    })
}

/// Stored nominal and data phase timing of one CAN channel
pub struct ChannelTiming<B: BaudrateControl> {
    capability: DeviceCapability,
    nominal: DeviceBitTiming,
    data: DeviceBitTiming,
    baudrate: B,
}

impl<B: BaudrateControl> ChannelTiming<B> {
    /// Start from the controller's power-on timings
    pub fn new(
        capability: DeviceCapability,
        nominal: DeviceBitTiming,
        data: DeviceBitTiming,
        baudrate: B,
    ) -> Self {
        Self {
            capability,
            nominal,
            data,
            baudrate,
        }
    }

    /// Validate and store the nominal timing, then apply the derived baudrate
    ///
    /// Returns the baudrate handed to the controller.
    pub fn try_set_nominal_timing(
        &mut self,
        prescaler: u32,
        phase_seg1: u32,
        phase_seg2: u32,
        sjw: u32,
    ) -> Result<u32> {
        if let Err(e) = self
            .capability
            .nominal_limits()
            .check(prescaler, phase_seg1, phase_seg2, sjw)
        {
            warn!("nominal bit timing rejected: {}", e);
            return Err(e);
        }

        let timing = DeviceBitTiming::from_segments(prescaler, phase_seg1, phase_seg2, sjw);
        let baudrate = timing.bitrate(self.capability.fclk_can);
        if !self.baudrate.update_baudrate(baudrate) {
            warn!("controller rejected baudrate {}", baudrate);
            return Err(GatewayError::BaudrateRejected { baudrate });
        }

        self.nominal = timing;
        debug!("nominal bit timing set, {} bit/s", baudrate);
        Ok(baudrate)
    }

    /// Validate and store the data phase timing
    pub fn try_set_data_timing(
        &mut self,
        prescaler: u32,
        phase_seg1: u32,
        phase_seg2: u32,
        sjw: u32,
    ) -> Result<()> {
        if let Err(e) = self
            .capability
            .data_limits()
            .check(prescaler, phase_seg1, phase_seg2, sjw)
        {
            warn!("data bit timing rejected: {}", e);
            return Err(e);
        }

        self.data = DeviceBitTiming::from_segments(prescaler, phase_seg1, phase_seg2, sjw);
        debug!("data bit timing set");
        Ok(())
    }

    /// Apply a BITTIMING request from the host
    pub fn apply_host_timing(&mut self, request: &DeviceBitTiming) -> Result<u32> {
        let tseg1 = host_tseg1(request, &self.capability.nominal_limits())?;
        self.try_set_nominal_timing(request.brp, tseg1, request.phase_seg2, request.sjw)
    }

    /// Apply a DATA_BITTIMING request from the host
    pub fn apply_host_data_timing(&mut self, request: &DeviceBitTiming) -> Result<()> {
        let tseg1 = host_tseg1(request, &self.capability.data_limits())?;
        self.try_set_data_timing(request.brp, tseg1, request.phase_seg2, request.sjw)
    }

    pub fn nominal(&self) -> DeviceBitTiming {
        self.nominal
    }

    pub fn data(&self) -> DeviceBitTiming {
        self.data
    }

    /// Nominal bitrate of the stored timing
    pub fn nominal_bitrate(&self) -> u32 {
        self.nominal.bitrate(self.capability.fclk_can)
    }

    /// Data phase bitrate of the stored timing
    pub fn data_bitrate(&self) -> u32 {
        self.data.bitrate(self.capability.fclk_can)
    }

    pub fn capability(&self) -> &DeviceCapability {
        &self.capability
    }
}
