//! Controller engine
//!
//! Synchronous bit-bang bus mastering: the calling context busy-waits
//! for the whole transaction. Every bit is transmitted by settling SDA,
//! then pulsing SCL high for the high half-period and low for the low
//! half-period; reads release SDA first and sample while SCL is high.

use softwire_hal::{CycleClock, LineDriver};

use crate::engine::Bitbang;
use crate::error::BusError;
use crate::segment::{Direction, Segment, SegmentOp};

#[cfg(feature = "clock-stretch")]
const STRETCH_POLL_LIMIT: u32 = 100_000;

impl<L: LineDriver, C: CycleClock> Bitbang<L, C> {
    /// Execute a sequence of segments against one target address
    ///
    /// The first segment begins with a START; see [`Segment`] for the
    /// framing between segments. Aborts on the first missing ACK, and on
    /// every path (success or abort) finishes with a STOP so the bus is
    /// left released.
    pub fn transfer(
        &mut self,
        address: u8,
        segments: &mut [Segment<'_>],
    ) -> Result<(), BusError> {
        self.claim_controller()?;
        if address > 0x7F {
            return Err(BusError::Unsupported);
        }
        if segments.is_empty() {
            return Ok(());
        }

        // Release the clock in case a previous abort left it low, so the
        // peer can recognize the coming START.
        self.set_scl(true);

        let result = self.run_segments(address, segments);
        self.stop();
        result
    }

    /// Free a bus left stuck by a peer parked mid-byte
    ///
    /// Emits a START, nine clock pulses with SDA released, a
    /// REPEATED-START and a STOP; nine clocks let a stuck peer finish
    /// its byte and release the line (NXP UM10204 rev. 6, section
    /// 3.1.16). Safe to call on an idle bus.
    pub fn recover_bus(&mut self) -> Result<(), BusError> {
        self.claim_controller()?;

        self.start();
        for _ in 0..9 {
            self.write_bit(true);
        }
        self.repeated_start();
        self.stop();

        if self.line.sda() {
            Ok(())
        } else {
            #[cfg(feature = "defmt")]
            defmt::warn!("bus recovery failed, SDA still low");
            Err(BusError::Busy)
        }
    }

    fn run_segments(
        &mut self,
        address: u8,
        segments: &mut [Segment<'_>],
    ) -> Result<(), BusError> {
        let count = segments.len();

        for i in 0..count {
            let dir = segments[i].direction();
            let prev_stopped = i > 0 && segments[i - 1].stop_after();
            let fresh_start = i == 0 || prev_stopped;
            let restart = !fresh_start
                && (segments[i].restart_before() || segments[i - 1].direction() != dir);
            // A read only continues past this segment when the next one
            // reads as well, with no framing boundary in between.
            let read_continues = dir == Direction::Read
                && !segments[i].stop_after()
                && i + 1 < count
                && segments[i + 1].direction() == Direction::Read
                && !segments[i + 1].restart_before();

            if prev_stopped {
                self.stop();
            }
            if fresh_start {
                self.start();
            } else if restart {
                self.repeated_start();
            }
            if fresh_start || restart {
                let byte0 = (address << 1) | u8::from(dir == Direction::Read);
                if !self.write_byte(byte0) {
                    return Err(BusError::AddressNack);
                }
            }

            match segments[i].op_mut() {
                SegmentOp::Write(data) => {
                    for &byte in data.iter() {
                        if !self.write_byte(byte) {
                            return Err(BusError::DataNack);
                        }
                    }
                }
                SegmentOp::Read(buf) => {
                    let len = buf.len();
                    for (n, slot) in buf.iter_mut().enumerate() {
                        *slot = self.read_byte();
                        // NACK only the terminal byte of the read
                        self.write_bit(n + 1 == len && !read_continues);
                    }
                }
            }
        }

        Ok(())
    }

    pub(crate) fn start(&mut self) {
        if !self.line.sda() {
            // SDA is already low; pulse the clock once to get a stuck
            // peer to release it before the real START.
            self.set_scl(false);
            self.pause(self.timing.low());
            self.set_scl(true);
            self.pause(self.timing.setup_start());
        }

        self.line.set_sda(false);
        self.pause(self.timing.hold_start());

        self.set_scl(false);
        self.pause(self.timing.low());
    }

    pub(crate) fn repeated_start(&mut self) {
        self.line.set_sda(true);
        self.set_scl(true);
        self.pause(self.timing.high());

        self.pause(self.timing.setup_start());
        self.start();
    }

    pub(crate) fn stop(&mut self) {
        self.line.set_sda(false);
        self.pause(self.timing.low());

        self.set_scl(true);
        self.pause(self.timing.high());

        self.pause(self.timing.setup_stop());
        self.line.set_sda(true);
        self.pause(self.timing.bus_free()); // in case we start again too soon
    }

    pub(crate) fn write_bit(&mut self, bit: bool) {
        // SDA hold time is zero, so no settle delay before the clock
        self.line.set_sda(bit);
        self.set_scl(true);
        self.pause(self.timing.high());
        self.set_scl(false);
        self.pause(self.timing.low());
    }

    pub(crate) fn read_bit(&mut self) -> bool {
        self.line.set_sda(true); // stop driving low, the peer has control

        self.set_scl(true);
        self.pause(self.timing.high());

        let bit = self.line.sda();

        self.set_scl(false);
        self.pause(self.timing.low());
        bit
    }

    /// Shift a byte out MSB-first; true when the receiver ACKed it
    pub(crate) fn write_byte(&mut self, byte: u8) -> bool {
        for shift in (0..8).rev() {
            self.write_bit(byte & (1 << shift) != 0);
        }

        // ACK is the receiver driving SDA low on the ninth bit
        !self.read_bit()
    }

    /// Shift a byte in MSB-first; the ACK slot is the caller's
    pub(crate) fn read_byte(&mut self) -> u8 {
        let mut byte = 0u8;
        for _ in 0..8 {
            byte = (byte << 1) | u8::from(self.read_bit());
        }
        byte
    }

    fn set_scl(&mut self, high: bool) {
        self.line.set_scl(high);

        #[cfg(feature = "clock-stretch")]
        if high {
            // Bounded wait for a peripheral stretching the clock
            let mut limit = STRETCH_POLL_LIMIT;
            while !self.line.scl() && limit > 0 {
                limit -= 1;
            }
        }
    }
}
