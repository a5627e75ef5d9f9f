//! Controller task
//!
//! Pushes a counter pattern into the echo device every half second and
//! reads it back over the jumpered loop. The transfers busy-wait, which
//! is acceptable here: nothing else shares core 0's executor time at
//! millisecond scale.

use defmt::*;
use embassy_time::Timer;
use softwire_hal::I2cBus;
use softwire_i2c::Bitbang;

use crate::lines::{FlexLines, TickClock};
use crate::DEVICE_ADDRESS;

#[embassy_executor::task]
pub async fn controller_task(mut engine: Bitbang<FlexLines, TickClock>) {
    let mut round: u8 = 0;

    loop {
        Timer::after_millis(500).await;

        let out = [round, round.wrapping_add(1), round.wrapping_add(2)];
        if let Err(e) = engine.write(DEVICE_ADDRESS, &out) {
            warn!("round {}: write failed: {}", round, e);
            round = round.wrapping_add(1);
            continue;
        }

        let mut echoed = [0u8; 3];
        match engine.read(DEVICE_ADDRESS, &mut echoed) {
            Ok(()) if echoed == out => info!("round {}: echo verified", round),
            Ok(()) => warn!("round {}: echo mismatch: {}", round, echoed),
            Err(e) => warn!("round {}: read failed: {}", round, e),
        }

        round = round.wrapping_add(1);
    }
}
