//! Target task
//!
//! The awaited SDA edge is the minimal-latency context: it does nothing
//! but the START test. The blocking transaction walk that follows is
//! the deferred context; this task is the only activity on core 1, so
//! blocking on clock edges for a whole transaction is fine.

use defmt::*;
use softwire_i2c::{Bitbang, TargetConfig};

use crate::device::EchoDevice;
use crate::lines::{FlexLines, TickClock};
use crate::DEVICE_ADDRESS;

#[embassy_executor::task]
pub async fn target_task(mut engine: Bitbang<FlexLines, TickClock>) {
    let config = unwrap!(TargetConfig::new(DEVICE_ADDRESS));
    unwrap!(engine.register_target(config));
    info!("target armed at address {=u8:x}", DEVICE_ADDRESS);

    let mut device = EchoDevice::new();

    loop {
        engine.line_mut().wait_sda_falling().await;
        if !engine.start_detected() {
            continue;
        }

        match engine.run_target(&mut device) {
            Ok(outcome) => debug!("target transaction done: {}", outcome),
            Err(e) => warn!("target transaction failed: {}", e),
        }
    }
}
