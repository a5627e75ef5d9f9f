//! Time source abstraction
//!
//! Bit timing in the engine is expressed as busy-waits on a free-running
//! counter. No alarm or interrupt support is required of the platform,
//! only a monotonically incrementing tick count and its rate.

/// Free-running cycle counter
///
/// The counter may wrap; consumers must compare with wrapping arithmetic.
/// The tick rate is expected to be constant for the lifetime of the value,
/// so delay constants derived from it stay valid.
pub trait CycleClock {
    /// Current counter value in ticks
    fn now(&self) -> u32;

    /// Counter rate in ticks per second
    fn ticks_per_sec(&self) -> u32;

    /// Busy-wait until the given number of ticks have passed
    fn spin(&self, ticks: u32) {
        let start = self.now();
        while self.now().wrapping_sub(start) < ticks {}
    }
}

impl<T: CycleClock + ?Sized> CycleClock for &T {
    fn now(&self) -> u32 {
        (**self).now()
    }

    fn ticks_per_sec(&self) -> u32 {
        (**self).ticks_per_sec()
    }
}
