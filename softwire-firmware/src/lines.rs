//! RP2040 line and clock bindings
//!
//! Open-drain emulation over `Flex` pins: driving low switches the pin
//! to output (latched low at init), driving high releases it to input
//! so the pull-up, or any peer holding the line, wins.

use embassy_rp::gpio::{Flex, Pull};
use embassy_time::Instant;
use softwire_hal::{CycleClock, LineDriver};

pub struct FlexLines {
    scl: Flex<'static>,
    sda: Flex<'static>,
}

impl FlexLines {
    pub fn new(mut scl: Flex<'static>, mut sda: Flex<'static>) -> Self {
        scl.set_pull(Pull::Up);
        sda.set_pull(Pull::Up);

        // latch the output level low once; open-drain from here on is
        // just direction switching
        scl.set_low();
        sda.set_low();
        scl.set_as_input();
        sda.set_as_input();

        Self { scl, sda }
    }

    /// Await the next SDA falling edge; the START pre-test runs after
    /// this resolves
    pub async fn wait_sda_falling(&mut self) {
        self.sda.wait_for_falling_edge().await;
    }
}

impl LineDriver for FlexLines {
    fn set_scl(&mut self, high: bool) {
        if high {
            self.scl.set_as_input();
        } else {
            self.scl.set_as_output();
        }
    }

    fn scl(&mut self) -> bool {
        self.scl.is_high()
    }

    fn set_sda(&mut self, high: bool) {
        if high {
            self.sda.set_as_input();
        } else {
            self.sda.set_as_output();
        }
    }

    fn sda(&mut self) -> bool {
        self.sda.is_high()
    }
}

/// Cycle counter over the embassy time driver (1 MHz on RP2040)
#[derive(Clone, Copy)]
pub struct TickClock;

impl CycleClock for TickClock {
    fn now(&self) -> u32 {
        Instant::now().as_ticks() as u32
    }

    fn ticks_per_sec(&self) -> u32 {
        embassy_time::TICK_HZ as u32
    }
}
