//! embedded-hal 1.0 adapter
//!
//! Lets ecosystem device drivers run over the controller engine through
//! the standard [`embedded_hal::i2c::I2c`] trait. Framing follows the
//! trait contract: one START for the transaction, a REPEATED-START plus
//! re-sent address on every direction change, one STOP at the end, and
//! adjacent same-direction operations concatenated.

use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use softwire_hal::{CycleClock, LineDriver};

use crate::engine::Bitbang;
use crate::error::BusError;

impl i2c::Error for BusError {
    fn kind(&self) -> ErrorKind {
        match self {
            BusError::AddressNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            BusError::DataNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            _ => ErrorKind::Other,
        }
    }
}

impl<L: LineDriver, C: CycleClock> ErrorType for Bitbang<L, C> {
    type Error = BusError;
}

impl<L: LineDriver, C: CycleClock> I2c for Bitbang<L, C> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), BusError> {
        self.claim_controller()?;
        if address > 0x7F {
            return Err(BusError::Unsupported);
        }
        if operations.is_empty() {
            return Ok(());
        }

        self.set_scl_released();

        let result = self.run_operations(address, operations);
        self.stop();
        result
    }
}

impl<L: LineDriver, C: CycleClock> Bitbang<L, C> {
    fn set_scl_released(&mut self) {
        self.line.set_scl(true);
    }

    fn run_operations(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), BusError> {
        let count = operations.len();

        for i in 0..count {
            let is_read = matches!(operations[i], Operation::Read(_));
            let addressed =
                i == 0 || is_read != matches!(operations[i - 1], Operation::Read(_));
            if addressed {
                if i == 0 {
                    self.start();
                } else {
                    self.repeated_start();
                }
                if !self.write_byte((address << 1) | u8::from(is_read)) {
                    return Err(BusError::AddressNack);
                }
            }

            let read_continues =
                is_read && i + 1 < count && matches!(operations[i + 1], Operation::Read(_));

            match &mut operations[i] {
                Operation::Write(data) => {
                    for &byte in data.iter() {
                        if !self.write_byte(byte) {
                            return Err(BusError::DataNack);
                        }
                    }
                }
                Operation::Read(buf) => {
                    let len = buf.len();
                    for (n, slot) in buf.iter_mut().enumerate() {
                        *slot = self.read_byte();
                        self.write_bit(n + 1 == len && !read_continues);
                    }
                }
            }
        }

        Ok(())
    }
}
