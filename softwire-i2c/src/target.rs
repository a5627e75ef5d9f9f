//! Target engine
//!
//! The target side is latent until the host's SDA edge context sees a
//! falling edge and [`Bitbang::start_detected`] confirms a START. The
//! host then calls [`Bitbang::run_target`] from a deferred execution
//! context that is free to block: the handler walks the whole
//! transaction under the external controller's clock, polling SCL edges,
//! and returns with the state machine back at [`TargetState::Idle`]
//! whatever happened on the wire.
//!
//! Callbacks run inline inside the bit-timed loop; a slow callback
//! stalls the bus directly.

use softwire_hal::{CycleClock, LineDriver};

use crate::engine::{Bitbang, Role};
use crate::error::BusError;

/// Target state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TargetState {
    /// Nothing in flight; the edge detector is armed
    Idle,
    /// Shifting in the address byte after a START
    ReceivingAddress,
    /// Controller is writing to us
    ReceivingData,
    /// Controller is reading from us
    SendingData,
}

/// Registered target identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TargetConfig {
    address: u8,
}

impl TargetConfig {
    /// Target configuration for a 7-bit address
    pub fn new(address: u8) -> Result<Self, BusError> {
        if address > 0x7F {
            return Err(BusError::Unsupported);
        }
        Ok(Self { address })
    }

    /// The address this target answers to
    pub fn address(&self) -> u8 {
        self.address
    }
}

/// Error a callback returns to refuse the current byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CallbackError;

/// Application callbacks moving bytes to and from the bus
///
/// Each runs synchronously inside the transaction walk and must return
/// quickly.
pub trait TargetEvents {
    /// The controller opened a write transaction addressed to us
    fn write_requested(&mut self);

    /// One received byte; an `Err` makes the engine NACK it and abort
    /// the transaction
    fn write_received(&mut self, byte: u8) -> Result<(), CallbackError>;

    /// Supply the first byte of a read transaction
    fn read_requested(&mut self) -> Result<u8, CallbackError>;

    /// Supply the next byte after the controller ACKed the previous one
    fn read_processed(&mut self) -> Result<u8, CallbackError>;

    /// A STOP closed the transaction
    fn stop(&mut self);
}

/// Why the transaction handler returned to idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TargetOutcome {
    /// STOP observed; `stop()` was invoked
    Stop,
    /// Address byte was for somebody else; no callback ran
    AddressMismatch,
    /// A callback refused a byte; the byte was NACKed where the ACK
    /// slot was ours
    CallbackError,
    /// A read ended by controller NACK with no STOP visible afterwards
    MasterNacked,
}

/// Line activity classified while SCL is high
enum Condition {
    /// SDA rose: STOP
    Stop,
    /// SDA fell: a new START
    Restart,
    /// SDA held steady until SCL fell: a data bit, already consumed
    Data(bool),
}

/// Handler-internal transaction end, driving the repeated-start loop
enum End {
    Stop,
    Restart,
    Mismatch,
    CallbackError,
    MasterNacked,
}

impl<L: LineDriver, C: CycleClock> Bitbang<L, C> {
    /// Register the target identity and claim the target role
    ///
    /// Rejected while another registration is active or after the engine
    /// has acted as a controller.
    pub fn register_target(&mut self, config: TargetConfig) -> Result<(), BusError> {
        if self.target.is_some() {
            return Err(BusError::AlreadyRegistered);
        }
        if self.role == Role::Controller {
            return Err(BusError::InvalidRole);
        }

        self.role = Role::Target;
        self.target = Some(config);
        self.target_state = TargetState::Idle;
        Ok(())
    }

    /// Drop the target registration and give the role back
    pub fn unregister_target(&mut self) {
        if self.target.take().is_some() {
            self.role = Role::Unconfigured;
            self.target_state = TargetState::Idle;
        }
    }

    /// The registered target, if any
    pub fn target(&self) -> Option<TargetConfig> {
        self.target
    }

    /// Current state of the target state machine
    pub fn target_state(&self) -> TargetState {
        self.target_state
    }

    /// START test for the host's SDA falling-edge context
    ///
    /// True when a transaction should be handed to [`Bitbang::run_target`]:
    /// a target is registered, nothing is in flight, and the lines show
    /// a START (SCL high with SDA pulled low). Must stay cheap; the
    /// protocol work belongs to the deferred context. A START observed
    /// while a previous transaction is still in flight is dropped, not
    /// queued.
    pub fn start_detected(&mut self) -> bool {
        self.target.is_some()
            && self.target_state == TargetState::Idle
            && self.line.scl()
            && !self.line.sda()
    }

    /// Walk one bus transaction as the addressed target
    ///
    /// Blocks on SCL edges for the duration; REPEATED-STARTs re-enter
    /// the address phase internally and are never surfaced. On return
    /// the state machine is back at [`TargetState::Idle`] and SDA is
    /// released, on error paths included.
    pub fn run_target<E: TargetEvents>(
        &mut self,
        events: &mut E,
    ) -> Result<TargetOutcome, BusError> {
        let Some(config) = self.target else {
            #[cfg(feature = "defmt")]
            defmt::warn!("target handler invoked with no registration");
            return Err(BusError::NoTarget);
        };
        let address = config.address();

        let result = loop {
            match self.target_transaction(address, events) {
                Ok(End::Restart) => continue,
                Ok(End::Stop) => break Ok(TargetOutcome::Stop),
                Ok(End::Mismatch) => break Ok(TargetOutcome::AddressMismatch),
                Ok(End::CallbackError) => break Ok(TargetOutcome::CallbackError),
                Ok(End::MasterNacked) => break Ok(TargetOutcome::MasterNacked),
                Err(e) => break Err(e),
            }
        };

        // Whatever happened, leave the bus electrically free
        self.line.set_sda(true);
        self.target_state = TargetState::Idle;
        result
    }

    fn target_transaction<E: TargetEvents>(
        &mut self,
        address: u8,
        events: &mut E,
    ) -> Result<End, BusError> {
        self.target_state = TargetState::ReceivingAddress;

        // The START hold phase may still be running; address bits begin
        // at the first rising edge after the clock drops.
        self.wait_scl(false)?;

        let byte = self.target_read_byte()?;
        let addr = byte >> 1;
        let is_read = byte & 1 != 0;

        if addr != address {
            #[cfg(feature = "defmt")]
            defmt::debug!("target: address {=u8:#x} is not ours", addr);
            return Ok(End::Mismatch);
        }

        self.target_send_ack(true)?;

        if is_read {
            self.target_send(events)
        } else {
            self.target_receive(events)
        }
    }

    /// Controller-writes direction: bytes in, ACKs out
    fn target_receive<E: TargetEvents>(&mut self, events: &mut E) -> Result<End, BusError> {
        self.target_state = TargetState::ReceivingData;
        events.write_requested();

        loop {
            let first = match self.wait_condition()? {
                Condition::Stop => {
                    events.stop();
                    return Ok(End::Stop);
                }
                Condition::Restart => return Ok(End::Restart),
                Condition::Data(bit) => bit,
            };

            let byte = self.target_read_rest(first)?;
            if events.write_received(byte).is_err() {
                #[cfg(feature = "defmt")]
                defmt::debug!("target: byte refused by callback, sending NACK");
                self.target_send_ack(false)?;
                return Ok(End::CallbackError);
            }
            self.target_send_ack(true)?;
        }
    }

    /// Controller-reads direction: bytes out under the external clock
    ///
    /// The controller signals "enough" by NACKing; only after that NACK
    /// can the line be watched for a STOP or REPEATED-START without
    /// fighting over SDA.
    fn target_send<E: TargetEvents>(&mut self, events: &mut E) -> Result<End, BusError> {
        self.target_state = TargetState::SendingData;

        let mut byte = match events.read_requested() {
            Ok(b) => b,
            Err(_) => return Ok(End::CallbackError),
        };

        loop {
            self.target_write_byte(byte)?;

            if self.target_read_bit()? {
                // NACK: the controller has every byte it wanted
                return match self.wait_condition()? {
                    Condition::Stop => {
                        events.stop();
                        Ok(End::Stop)
                    }
                    Condition::Restart => Ok(End::Restart),
                    Condition::Data(_) => Ok(End::MasterNacked),
                };
            }

            byte = match events.read_processed() {
                Ok(b) => b,
                Err(_) => return Ok(End::CallbackError),
            };
        }
    }

    /// Classify what the controller does next: a STOP, a new START, or
    /// the first bit of another byte.
    ///
    /// SDA is sampled at the SCL rising edge and watched for the whole
    /// high phase; a transition while SCL is high is a STOP or START by
    /// polarity, and a stable level is that bit's value, consumed here
    /// and handed to the byte assembly.
    fn wait_condition(&mut self) -> Result<Condition, BusError> {
        self.wait_scl(true)?;
        let initial = self.line.sda();

        let mut budget = self.poll_budget;
        while self.line.scl() {
            if self.line.sda() != initial {
                return Ok(if initial {
                    Condition::Restart
                } else {
                    Condition::Stop
                });
            }
            Self::debit(&mut budget)?;
        }

        Ok(Condition::Data(initial))
    }

    /// Poll until SCL reads the wanted level
    fn wait_scl(&mut self, high: bool) -> Result<(), BusError> {
        let mut budget = self.poll_budget;
        while self.line.scl() != high {
            Self::debit(&mut budget)?;
        }
        Ok(())
    }

    fn debit(budget: &mut Option<u32>) -> Result<(), BusError> {
        if let Some(remaining) = budget {
            if *remaining == 0 {
                return Err(BusError::PollExpired);
            }
            *remaining -= 1;
        }
        Ok(())
    }

    /// One bit under the external clock: sample at the rising edge,
    /// done at the falling edge
    fn target_read_bit(&mut self) -> Result<bool, BusError> {
        self.wait_scl(true)?;
        let bit = self.line.sda();
        self.wait_scl(false)?;
        Ok(bit)
    }

    fn target_read_byte(&mut self) -> Result<u8, BusError> {
        let mut byte = 0u8;
        for _ in 0..8 {
            byte = (byte << 1) | u8::from(self.target_read_bit()?);
        }
        Ok(byte)
    }

    /// Remaining seven bits of a byte whose MSB `wait_condition` already
    /// consumed
    fn target_read_rest(&mut self, first: bool) -> Result<u8, BusError> {
        let mut byte = u8::from(first);
        for _ in 0..7 {
            byte = (byte << 1) | u8::from(self.target_read_bit()?);
        }
        Ok(byte)
    }

    /// Drive the ACK slot: low for ACK, released high for NACK
    fn target_send_ack(&mut self, ack: bool) -> Result<(), BusError> {
        self.wait_scl(false)?;
        self.line.set_sda(!ack);

        self.wait_scl(true)?;
        self.wait_scl(false)?;

        self.line.set_sda(true); // release
        Ok(())
    }

    fn target_write_bit(&mut self, bit: bool) -> Result<(), BusError> {
        self.wait_scl(false)?;
        self.line.set_sda(bit);

        self.wait_scl(true)?;
        self.wait_scl(false)?;
        Ok(())
    }

    fn target_write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        for shift in (0..8).rev() {
            self.target_write_bit(byte & (1 << shift) != 0)?;
        }

        self.line.set_sda(true); // release SDA for the controller's ACK
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Bitbang;
    use crate::mock::{FakeClock, MockLine};

    fn engine() -> Bitbang<MockLine, FakeClock> {
        Bitbang::new(MockLine::new(), FakeClock::new(1_000_000))
    }

    #[test]
    fn test_config_rejects_wide_addresses() {
        assert!(TargetConfig::new(0x7F).is_ok());
        assert_eq!(TargetConfig::new(0x80), Err(BusError::Unsupported));
    }

    #[test]
    fn test_start_detected_needs_registration() {
        let mut e = engine();
        // lines show a START shape but nothing is registered
        e.line.script_sda(&[false]);
        assert!(!e.start_detected());
    }

    #[test]
    fn test_start_detected_matches_line_shape() {
        let mut e = engine();
        e.register_target(TargetConfig::new(0x50).unwrap()).unwrap();

        // SCL high, SDA low: START
        e.line.script_sda(&[false]);
        assert!(e.start_detected());

        // SDA high again: not a START
        assert!(!e.start_detected());
    }

    #[test]
    fn test_run_target_without_registration() {
        let mut e = engine();
        let mut nobody = NullEvents;
        assert_eq!(e.run_target(&mut nobody), Err(BusError::NoTarget));
    }

    #[test]
    fn test_poll_budget_unsticks_a_dead_bus() {
        let mut e = engine();
        e.register_target(TargetConfig::new(0x50).unwrap()).unwrap();
        e.set_poll_budget(Some(64));

        // SCL stays high forever: the address read never completes
        let mut nobody = NullEvents;
        assert_eq!(e.run_target(&mut nobody), Err(BusError::PollExpired));
        assert_eq!(e.target_state(), TargetState::Idle);
        assert!(e.line.sda_driven(), "SDA must be released on the way out");
    }

    #[test]
    fn test_unregister_disarms() {
        let mut e = engine();
        e.register_target(TargetConfig::new(0x50).unwrap()).unwrap();
        e.unregister_target();

        assert_eq!(e.target(), None);
        e.line.script_sda(&[false]);
        assert!(!e.start_detected());
    }

    struct NullEvents;

    impl TargetEvents for NullEvents {
        fn write_requested(&mut self) {}
        fn write_received(&mut self, _byte: u8) -> Result<(), CallbackError> {
            Ok(())
        }
        fn read_requested(&mut self) -> Result<u8, CallbackError> {
            Ok(0)
        }
        fn read_processed(&mut self) -> Result<u8, CallbackError> {
            Ok(0)
        }
        fn stop(&mut self) {}
    }
}
