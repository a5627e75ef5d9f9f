//! Demo echo device
//!
//! A FIFO behind the target callbacks: controller writes queue bytes,
//! controller reads drain them. A full FIFO refuses the byte, which the
//! engine turns into a NACK on the wire.

use heapless::Deque;
use softwire_i2c::{CallbackError, TargetEvents};

const FIFO_DEPTH: usize = 32;

pub struct EchoDevice {
    fifo: Deque<u8, FIFO_DEPTH>,
}

impl EchoDevice {
    pub fn new() -> Self {
        Self { fifo: Deque::new() }
    }
}

impl Default for EchoDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetEvents for EchoDevice {
    fn write_requested(&mut self) {}

    fn write_received(&mut self, byte: u8) -> Result<(), CallbackError> {
        self.fifo.push_back(byte).map_err(|_| CallbackError)
    }

    fn read_requested(&mut self) -> Result<u8, CallbackError> {
        Ok(self.fifo.pop_front().unwrap_or(0xFF))
    }

    fn read_processed(&mut self) -> Result<u8, CallbackError> {
        Ok(self.fifo.pop_front().unwrap_or(0xFF))
    }

    fn stop(&mut self) {}
}
