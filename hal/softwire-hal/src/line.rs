//! Bus line abstraction
//!
//! The engine manipulates the clock and data lines of an open-drain bus
//! through this trait. Implementations own the two physical pins (or a
//! simulated pair) and perform direct, unbuffered line access.

/// Raw access to the clock and data lines of an open-drain bus
///
/// The bus is wired-AND: every party may pull a line low, and the line
/// only reads high when nobody does. Implementations must honor two
/// contracts that the engine's protocol logic depends on:
///
/// - Driving a line *high* releases it (input / high-impedance with an
///   external pull-up) rather than forcing it, so a peer's low drive wins.
/// - The `scl`/`sda` readbacks reflect the physical line level, not the
///   last level written. This is how the engine notices a peer stretching
///   the clock or holding data low.
pub trait LineDriver {
    /// Drive the clock line low, or release it high
    fn set_scl(&mut self, high: bool);

    /// Read the physical clock line level
    fn scl(&mut self) -> bool;

    /// Drive the data line low, or release it high
    fn set_sda(&mut self, high: bool);

    /// Read the physical data line level
    fn sda(&mut self) -> bool;

    /// Check whether both lines read high (bus free)
    fn idle(&mut self) -> bool {
        self.scl() && self.sda()
    }
}

impl<T: LineDriver + ?Sized> LineDriver for &mut T {
    fn set_scl(&mut self, high: bool) {
        (**self).set_scl(high);
    }

    fn scl(&mut self) -> bool {
        (**self).scl()
    }

    fn set_sda(&mut self, high: bool) {
        (**self).set_sda(high);
    }

    fn sda(&mut self) -> bool {
        (**self).sda()
    }
}
