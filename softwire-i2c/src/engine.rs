//! The engine aggregate
//!
//! One [`Bitbang`] value serves both bus roles, but never both at once:
//! the first controller transfer or target registration commits the
//! engine to that role, and the other role is rejected until an explicit
//! [`Bitbang::release`].

use softwire_hal::{CycleClock, I2cBus, LineDriver};

use crate::config::{Addressing, Config};
use crate::error::BusError;
use crate::segment::Segment;
use crate::target::{TargetConfig, TargetState};
use crate::timing::BusTiming;

/// Role the engine is committed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// No role claimed yet; either is still available
    Unconfigured,
    /// Bus controller: synchronous transfers and recovery
    Controller,
    /// Bus target: address-matched handler under an external clock
    Target,
}

/// Software I2C bus engine over a pair of raw lines
///
/// Owns the injected line driver and cycle counter exclusively; no two
/// engines may share one pair of lines.
pub struct Bitbang<L: LineDriver, C: CycleClock> {
    pub(crate) line: L,
    pub(crate) clock: C,
    pub(crate) timing: BusTiming,
    config: Config,
    pub(crate) role: Role,
    pub(crate) target: Option<TargetConfig>,
    pub(crate) target_state: TargetState,
    pub(crate) poll_budget: Option<u32>,
}

impl<L: LineDriver, C: CycleClock> Bitbang<L, C> {
    /// Bind an engine to a line driver and cycle counter
    ///
    /// Boots with the Standard-mode timing table; use
    /// [`Bitbang::configure`] to change speed.
    pub fn new(line: L, clock: C) -> Self {
        let timing = BusTiming::standard(clock.ticks_per_sec());

        Self {
            line,
            clock,
            timing,
            config: Config::STANDARD,
            role: Role::Unconfigured,
            target: None,
            target_state: TargetState::Idle,
            poll_budget: None,
        }
    }

    /// Apply a bus configuration
    ///
    /// Rejects 10-bit addressing and speed grades the engine cannot
    /// generate. Pure state update; the bus is not touched.
    pub fn configure(&mut self, config: Config) -> Result<(), BusError> {
        if config.addressing == Addressing::TenBit {
            return Err(BusError::Unsupported);
        }

        self.timing = BusTiming::new(config.speed, self.clock.ticks_per_sec())?;
        self.config = config;

        #[cfg(feature = "defmt")]
        defmt::debug!("bus configured: {}", config);

        Ok(())
    }

    /// The active configuration
    pub fn config(&self) -> Config {
        self.config
    }

    /// The active delay table
    pub fn timing(&self) -> BusTiming {
        self.timing
    }

    /// The role the engine is committed to
    pub fn role(&self) -> Role {
        self.role
    }

    /// Bound every clock-edge poll loop to `Some(iterations)`, after
    /// which the pending operation fails with [`BusError::PollExpired`].
    ///
    /// The default `None` is the protocol-faithful unbounded wait: a
    /// hung peer hangs the caller.
    pub fn set_poll_budget(&mut self, budget: Option<u32>) {
        self.poll_budget = budget;
    }

    /// Give up the committed role so the other one can be claimed
    ///
    /// Clears any target registration; the host must also stop invoking
    /// the edge detector.
    pub fn release(&mut self) {
        self.role = Role::Unconfigured;
        self.target = None;
        self.target_state = TargetState::Idle;
    }

    /// Borrow the underlying line driver
    ///
    /// Intended for host wiring that multiplexes the data pin between
    /// the engine and an edge-wait primitive. Touching line levels while
    /// an operation is in flight corrupts the bus.
    pub fn line_mut(&mut self) -> &mut L {
        &mut self.line
    }

    /// Tear the engine down into its line driver and clock
    pub fn into_parts(self) -> (L, C) {
        (self.line, self.clock)
    }

    /// Commit to the controller role, or fail if the engine is a target
    pub(crate) fn claim_controller(&mut self) -> Result<(), BusError> {
        match self.role {
            Role::Target => Err(BusError::InvalidRole),
            Role::Unconfigured => {
                self.role = Role::Controller;
                Ok(())
            }
            Role::Controller => Ok(()),
        }
    }

    /// Busy-wait for the given number of counter ticks
    pub(crate) fn pause(&self, ticks: u32) {
        self.clock.spin(ticks);
    }
}

impl<L: LineDriver, C: CycleClock> I2cBus for Bitbang<L, C> {
    type Error = BusError;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), BusError> {
        self.transfer(address, &mut [Segment::write(data)])
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.transfer(address, &mut [Segment::read(buf)])
    }

    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), BusError> {
        self.transfer(
            address,
            &mut [
                Segment::write(write_data),
                Segment::read(read_buf).with_restart(),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FakeClock, MockLine};
    use crate::timing::Speed;

    fn engine() -> Bitbang<MockLine, FakeClock> {
        Bitbang::new(MockLine::new(), FakeClock::new(1_000_000))
    }

    #[test]
    fn test_new_boots_standard() {
        let e = engine();
        assert_eq!(e.config(), Config::STANDARD);
        assert_eq!(e.timing(), BusTiming::standard(1_000_000));
        assert_eq!(e.role(), Role::Unconfigured);
    }

    #[test]
    fn test_configure_recomputes_timing() {
        let mut e = engine();
        e.configure(Config::FAST).unwrap();
        assert_eq!(e.config().speed, Speed::Fast);
        assert_eq!(
            e.timing(),
            BusTiming::new(Speed::Fast, 1_000_000).unwrap()
        );
    }

    #[test]
    fn test_configure_rejects_ten_bit() {
        let mut e = engine();
        let config = Config {
            addressing: Addressing::TenBit,
            ..Config::STANDARD
        };
        assert_eq!(e.configure(config), Err(BusError::Unsupported));
        // the bad config must not stick
        assert_eq!(e.config(), Config::STANDARD);
    }

    #[test]
    fn test_configure_rejects_fast_plus() {
        let mut e = engine();
        let config = Config {
            speed: Speed::FastPlus,
            ..Config::STANDARD
        };
        assert_eq!(e.configure(config), Err(BusError::Unsupported));
    }

    #[test]
    fn test_configure_touches_no_lines() {
        let mut e = engine();
        e.configure(Config::FAST).unwrap();
        assert!(e.line.events.is_empty());
    }

    #[test]
    fn test_roles_are_exclusive() {
        use crate::target::TargetConfig;

        // controller first: target registration is refused
        let mut e = engine();
        e.claim_controller().unwrap();
        assert_eq!(
            e.register_target(TargetConfig::new(0x20).unwrap()),
            Err(BusError::InvalidRole)
        );

        // target first: transfers are refused
        let mut e = engine();
        e.register_target(TargetConfig::new(0x20).unwrap()).unwrap();
        assert_eq!(
            e.transfer(0x21, &mut [Segment::write(&[0])]),
            Err(BusError::InvalidRole)
        );
    }

    #[test]
    fn test_double_registration_is_refused() {
        use crate::target::TargetConfig;

        let mut e = engine();
        e.register_target(TargetConfig::new(0x20).unwrap()).unwrap();
        assert_eq!(
            e.register_target(TargetConfig::new(0x21).unwrap()),
            Err(BusError::AlreadyRegistered)
        );
    }

    #[test]
    fn test_release_reopens_both_roles() {
        use crate::target::TargetConfig;

        let mut e = engine();
        e.register_target(TargetConfig::new(0x20).unwrap()).unwrap();
        e.release();
        assert_eq!(e.role(), Role::Unconfigured);
        e.claim_controller().unwrap();
        assert_eq!(e.role(), Role::Controller);
    }
}
