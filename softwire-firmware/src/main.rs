//! Softwire loopback demo for RP2040 boards
//!
//! Runs one bus engine as a target and a second one as a controller on
//! separate pin pairs. Jumper SDA to SDA (PIN_14 to PIN_16) and SCL to
//! SCL (PIN_15 to PIN_17) and the controller exercises the target's
//! FIFO echo device over a real electrical bus.
//!
//! The target's transaction walk blocks on clock edges for whole
//! transactions, so it runs on core 1 with an executor to itself; the
//! controller task stays on core 0.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::{Executor, Spawner};
use embassy_rp::gpio::Flex;
use embassy_rp::multicore::{spawn_core1, Stack};
use softwire_i2c::Bitbang;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::lines::{FlexLines, TickClock};

mod device;
mod lines;
mod tasks;

/// Address the demo echo device answers to
pub const DEVICE_ADDRESS: u8 = 0x42;

static CORE1_STACK: StaticCell<Stack<4096>> = StaticCell::new();
static EXECUTOR1: StaticCell<Executor> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("softwire demo firmware starting");

    let p = embassy_rp::init(Default::default());

    // Target pin pair
    let target_lines = FlexLines::new(Flex::new(p.PIN_15), Flex::new(p.PIN_14));
    let target_engine = Bitbang::new(target_lines, TickClock);

    // Controller pin pair, jumpered to the target's on the bench
    let controller_lines = FlexLines::new(Flex::new(p.PIN_17), Flex::new(p.PIN_16));
    let controller_engine = Bitbang::new(controller_lines, TickClock);

    spawn_core1(p.CORE1, CORE1_STACK.init(Stack::new()), move || {
        let executor1 = EXECUTOR1.init(Executor::new());
        executor1.run(|spawner| {
            unwrap!(spawner.spawn(tasks::target::target_task(target_engine)));
        });
    });

    unwrap!(spawner.spawn(tasks::controller::controller_task(controller_engine)));
}
