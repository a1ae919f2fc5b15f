//! Monotonic tick source used to timestamp received frames

use embassy_time::{Instant, TICK_HZ};

/// Monotonic tick counter
pub trait TickSource {
    /// Current tick count
    fn ticks(&self) -> u64;

    /// Ticks per second
    fn tick_rate_hz(&self) -> u64;

    /// Current time in microseconds, wrapping at 32 bits like the host timestamp field
    ///
    /// Resolution is one tick; tick rates above 1 MHz count in whole microseconds.
    fn now_us(&self) -> u32 {
        let us_per_tick = (1_000_000 / self.tick_rate_hz().max(1)).max(1);
        let ticks_per_us = (self.tick_rate_hz() / 1_000_000).max(1);
        (self.ticks().wrapping_mul(us_per_tick) / ticks_per_us) as u32
    }
}

/// Tick source backed by the embassy time driver
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl TickSource for EmbassyClock {
    fn ticks(&self) -> u64 {
        Instant::now().as_ticks()
    }

    fn tick_rate_hz(&self) -> u64 {
        TICK_HZ
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTicks {
        ticks: u64,
        rate: u64,
    }

    impl TickSource for FixedTicks {
        fn ticks(&self) -> u64 {
            self.ticks
        }

        fn tick_rate_hz(&self) -> u64 {
            self.rate
        }
    }

    #[test]
    fn test_millisecond_ticks() {
        let clock = FixedTicks {
            ticks: 1500,
            rate: 1000,
        };
        assert_eq!(clock.now_us(), 1_500_000);
    }

    #[test]
    fn test_fast_ticks() {
        let clock = FixedTicks {
            ticks: 64_000_000,
            rate: 32_000_000,
        };
        assert_eq!(clock.now_us(), 2_000_000);
    }

    #[test]
    fn test_wraps_at_32_bits() {
        let clock = FixedTicks {
            ticks: (u32::MAX as u64) + 11,
            rate: 1_000_000,
        };
        assert_eq!(clock.now_us(), 10);
    }

    #[test]
    fn test_embassy_clock_is_monotonic() {
        let clock = EmbassyClock;
        let first = clock.ticks();
        assert!(clock.ticks() >= first);
        assert_eq!(clock.tick_rate_hz(), TICK_HZ);
    }
}
