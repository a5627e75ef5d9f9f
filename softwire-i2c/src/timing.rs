//! Bus timing table
//!
//! Only two distinct delay values appear in the Standard-mode and
//! Fast-mode waveforms: the clock low and clock high half-periods. The
//! START/STOP setup and hold times alias onto them (strictly, the START
//! setup time could be the high value in Fast mode; the longer low value
//! is used, which only slows the bus slightly).

use crate::error::BusError;

/// Nanosecond minimums per speed grade: (low, high)
const STANDARD_NS: (u32, u32) = (4_700, 4_000);
const FAST_NS: (u32, u32) = (1_300, 600);

/// Bus speed grade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    /// Standard mode, 100 kHz
    Standard,
    /// Fast mode, 400 kHz
    Fast,
    /// Fast mode plus, 1 MHz - not reachable by a GPIO bit-bang engine,
    /// always rejected at configuration time
    FastPlus,
}

/// Per-speed delay constants, in ticks of the platform cycle counter
///
/// Immutable once computed; a reconfiguration builds a fresh table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusTiming {
    low: u32,
    high: u32,
}

impl BusTiming {
    /// Compute the delay table for a speed grade from the platform tick
    /// rate, or [`BusError::Unsupported`] for grades the engine cannot
    /// generate.
    pub fn new(speed: Speed, ticks_per_sec: u32) -> Result<Self, BusError> {
        let (low_ns, high_ns) = match speed {
            Speed::Standard => STANDARD_NS,
            Speed::Fast => FAST_NS,
            Speed::FastPlus => return Err(BusError::Unsupported),
        };

        Ok(Self {
            low: ns_to_ticks(low_ns, ticks_per_sec),
            high: ns_to_ticks(high_ns, ticks_per_sec),
        })
    }

    /// Standard-mode table; the default the engine boots with
    pub fn standard(ticks_per_sec: u32) -> Self {
        Self {
            low: ns_to_ticks(STANDARD_NS.0, ticks_per_sec),
            high: ns_to_ticks(STANDARD_NS.1, ticks_per_sec),
        }
    }

    /// Clock low half-period
    pub fn low(&self) -> u32 {
        self.low
    }

    /// Clock high half-period
    pub fn high(&self) -> u32 {
        self.high
    }

    /// START setup time
    pub fn setup_start(&self) -> u32 {
        self.low
    }

    /// START hold time
    pub fn hold_start(&self) -> u32 {
        self.high
    }

    /// STOP setup time
    pub fn setup_stop(&self) -> u32 {
        self.high
    }

    /// Bus free time between a STOP and the next START
    pub fn bus_free(&self) -> u32 {
        self.low
    }
}

/// Convert a nanosecond minimum to counter ticks, plus one tick so the
/// truncated division never waits less than the minimum.
fn ns_to_ticks(ns: u32, ticks_per_sec: u32) -> u32 {
    (u64::from(ticks_per_sec) * u64::from(ns) / 1_000_000_000 + 1) as u32
}
