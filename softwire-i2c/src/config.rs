//! Bus configuration types

use crate::timing::Speed;

/// Addressing mode requested for the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Addressing {
    /// Standard 7-bit addresses
    SevenBit,
    /// 10-bit addresses - rejected at configuration time
    TenBit,
}

/// Active bus configuration
///
/// A plain value; applying it is [`crate::Bitbang::configure`]'s job and
/// the only place unsupported combinations are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Bus speed grade
    pub speed: Speed,
    /// Addressing mode
    pub addressing: Addressing,
}

impl Default for Config {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl Config {
    /// Standard mode (100 kHz), 7-bit addressing
    pub const STANDARD: Self = Self {
        speed: Speed::Standard,
        addressing: Addressing::SevenBit,
    };

    /// Fast mode (400 kHz), 7-bit addressing
    pub const FAST: Self = Self {
        speed: Speed::Fast,
        addressing: Addressing::SevenBit,
    };
}
