//! Host-side loopback: a controller engine and a target engine share a
//! simulated open-drain line pair, each on its own thread.
//!
//! The wire is wired-AND like the real bus: both parties drive a level
//! per line and the line reads high only when nobody pulls it low. The
//! controller paces the bus from a wall-clock tick counter; the target
//! thread plays the host's edge context by watching SDA and handing
//! detected STARTs to the transaction handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use softwire_hal::{CycleClock, I2cBus, LineDriver};
use softwire_i2c::{
    Bitbang, BusError, CallbackError, Segment, TargetConfig, TargetEvents, TargetOutcome,
};

const ADDR: u8 = 0x42;

/// Virtual tick rate. Slow enough that one clock phase (one tick) is
/// far longer than host thread scheduling jitter.
const HZ: u32 = 10_000;

/// Generous bound so a protocol regression fails the test instead of
/// hanging it.
const POLL_BUDGET: u32 = 400_000_000;

struct Wire {
    scl: [AtomicBool; 2],
    sda: [AtomicBool; 2],
}

impl Wire {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            scl: [AtomicBool::new(true), AtomicBool::new(true)],
            sda: [AtomicBool::new(true), AtomicBool::new(true)],
        })
    }

    fn scl_level(&self) -> bool {
        self.scl[0].load(Ordering::SeqCst) && self.scl[1].load(Ordering::SeqCst)
    }

    fn sda_level(&self) -> bool {
        self.sda[0].load(Ordering::SeqCst) && self.sda[1].load(Ordering::SeqCst)
    }

    fn idle(&self) -> bool {
        self.scl_level() && self.sda_level()
    }
}

/// One party's attachment to the wire
struct Port {
    wire: Arc<Wire>,
    id: usize,
}

impl Port {
    fn controller(wire: &Arc<Wire>) -> Self {
        Self {
            wire: wire.clone(),
            id: 0,
        }
    }

    fn target(wire: &Arc<Wire>) -> Self {
        Self {
            wire: wire.clone(),
            id: 1,
        }
    }
}

impl LineDriver for Port {
    fn set_scl(&mut self, high: bool) {
        self.wire.scl[self.id].store(high, Ordering::SeqCst);
    }

    fn scl(&mut self) -> bool {
        self.wire.scl_level()
    }

    fn set_sda(&mut self, high: bool) {
        self.wire.sda[self.id].store(high, Ordering::SeqCst);
    }

    fn sda(&mut self) -> bool {
        self.wire.sda_level()
    }
}

struct WallClock {
    origin: Instant,
    hz: u32,
}

impl WallClock {
    fn new(hz: u32) -> Self {
        Self {
            origin: Instant::now(),
            hz,
        }
    }
}

impl CycleClock for WallClock {
    fn now(&self) -> u32 {
        (self.origin.elapsed().as_nanos() * u128::from(self.hz) / 1_000_000_000) as u32
    }

    fn ticks_per_sec(&self) -> u32 {
        self.hz
    }

    fn spin(&self, ticks: u32) {
        let start = self.now();
        while self.now().wrapping_sub(start) < ticks {
            thread::yield_now();
        }
    }
}

/// Scripted device behind the target engine, recording every callback
#[derive(Default)]
struct Device {
    write_requested: usize,
    received: Vec<u8>,
    read_requested: usize,
    read_processed: usize,
    stops: usize,
    /// Bytes served to read transactions, in order
    supply: Vec<u8>,
    cursor: usize,
    /// Refuse written bytes from this index on
    refuse_from: Option<usize>,
}

impl Device {
    fn supplying(supply: &[u8]) -> Self {
        Self {
            supply: supply.to_vec(),
            ..Self::default()
        }
    }

    fn next_byte(&mut self) -> Result<u8, CallbackError> {
        let byte = self.supply.get(self.cursor).copied().unwrap_or(0xFF);
        self.cursor += 1;
        Ok(byte)
    }
}

impl TargetEvents for Device {
    fn write_requested(&mut self) {
        self.write_requested += 1;
    }

    fn write_received(&mut self, byte: u8) -> Result<(), CallbackError> {
        let index = self.received.len();
        self.received.push(byte);
        match self.refuse_from {
            Some(at) if index >= at => Err(CallbackError),
            _ => Ok(()),
        }
    }

    fn read_requested(&mut self) -> Result<u8, CallbackError> {
        self.read_requested += 1;
        self.next_byte()
    }

    fn read_processed(&mut self) -> Result<u8, CallbackError> {
        self.read_processed += 1;
        self.next_byte()
    }

    fn stop(&mut self) {
        self.stops += 1;
    }
}

struct TargetHarness {
    stop_flag: Arc<AtomicBool>,
    handle: thread::JoinHandle<(Device, Vec<TargetOutcome>)>,
}

impl TargetHarness {
    /// Tear the target down and collect what it saw
    fn finish(self) -> (Device, Vec<TargetOutcome>) {
        // let the final STOP settle before disarming
        thread::sleep(Duration::from_millis(20));
        self.stop_flag.store(true, Ordering::SeqCst);
        self.handle.join().unwrap()
    }
}

/// Register a target engine on the wire and poll for STARTs until told
/// to stop, emulating the host's SDA falling-edge context.
fn spawn_target(wire: &Arc<Wire>, device: Device) -> TargetHarness {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let armed = Arc::new(AtomicBool::new(false));

    let flag = stop_flag.clone();
    let armed_in = armed.clone();
    let port = Port::target(wire);

    let handle = thread::spawn(move || {
        let mut engine = Bitbang::new(port, WallClock::new(HZ));
        engine
            .register_target(TargetConfig::new(ADDR).unwrap())
            .unwrap();
        engine.set_poll_budget(Some(POLL_BUDGET));

        let mut device = device;
        let mut outcomes = Vec::new();
        let mut prev = engine.line_mut().sda();
        armed_in.store(true, Ordering::SeqCst);

        while !flag.load(Ordering::SeqCst) {
            let current = engine.line_mut().sda();
            if prev && !current && engine.start_detected() {
                match engine.run_target(&mut device) {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(_) => break,
                }
                prev = engine.line_mut().sda();
                continue;
            }
            prev = current;
        }

        (device, outcomes)
    });

    while !armed.load(Ordering::SeqCst) {
        thread::yield_now();
    }

    TargetHarness { stop_flag, handle }
}

fn controller(wire: &Arc<Wire>) -> Bitbang<Port, WallClock> {
    Bitbang::new(Port::controller(wire), WallClock::new(HZ))
}

#[test]
fn test_write_round_trip() {
    let wire = Wire::new();
    let target = spawn_target(&wire, Device::default());
    let mut bus = controller(&wire);

    bus.transfer(ADDR, &mut [Segment::write(&[0x11, 0x22, 0x33])])
        .unwrap();

    let (device, outcomes) = target.finish();
    assert_eq!(device.received, vec![0x11, 0x22, 0x33]);
    assert_eq!(device.write_requested, 1);
    assert_eq!(device.stops, 1);
    assert_eq!(outcomes, vec![TargetOutcome::Stop]);
    assert!(wire.idle(), "both lines must end released");
}

#[test]
fn test_read_termination() {
    let wire = Wire::new();
    let target = spawn_target(&wire, Device::supplying(&[9, 8, 7, 6]));
    let mut bus = controller(&wire);

    let mut buf = [0u8; 4];
    bus.transfer(ADDR, &mut [Segment::read(&mut buf)]).unwrap();

    let (device, outcomes) = target.finish();
    assert_eq!(buf, [9, 8, 7, 6]);
    assert_eq!(device.read_requested, 1);
    assert_eq!(device.read_processed, 3);
    assert_eq!(device.stops, 1);
    assert_eq!(outcomes, vec![TargetOutcome::Stop]);
    assert!(wire.idle());
}

#[test]
fn test_single_byte_read_never_calls_read_processed() {
    let wire = Wire::new();
    let target = spawn_target(&wire, Device::supplying(&[0x5A]));
    let mut bus = controller(&wire);

    let mut buf = [0u8; 1];
    bus.transfer(ADDR, &mut [Segment::read(&mut buf)]).unwrap();

    let (device, _) = target.finish();
    assert_eq!(buf, [0x5A]);
    assert_eq!(device.read_requested, 1);
    assert_eq!(device.read_processed, 0);
}

#[test]
fn test_repeated_start_chain() {
    let wire = Wire::new();
    let target = spawn_target(&wire, Device::supplying(&[0xAA, 0xBB]));
    let mut bus = controller(&wire);

    let mut buf = [0u8; 2];
    bus.transfer(
        ADDR,
        &mut [
            Segment::write(&[0x10]),
            Segment::read(&mut buf).with_restart(),
        ],
    )
    .unwrap();

    let (device, outcomes) = target.finish();
    assert_eq!(device.received, vec![0x10]);
    assert_eq!(buf, [0xAA, 0xBB]);
    // one address match per segment, but only one transaction end
    assert_eq!(device.write_requested, 1);
    assert_eq!(device.read_requested, 1);
    assert_eq!(device.read_processed, 1);
    assert_eq!(device.stops, 1, "no STOP may appear between the segments");
    assert_eq!(outcomes, vec![TargetOutcome::Stop]);
    assert!(wire.idle());
}

#[test]
fn test_write_read_via_bus_trait() {
    let wire = Wire::new();
    let target = spawn_target(&wire, Device::supplying(&[0xAB, 0xCD]));
    let mut bus = controller(&wire);

    let mut out = [0u8; 2];
    bus.write_read(ADDR, &[0x02], &mut out).unwrap();

    let (device, outcomes) = target.finish();
    assert_eq!(device.received, vec![0x02]);
    assert_eq!(out, [0xAB, 0xCD]);
    assert_eq!(outcomes, vec![TargetOutcome::Stop]);
}

#[test]
fn test_address_mismatch_is_silent() {
    let wire = Wire::new();
    let target = spawn_target(&wire, Device::default());
    let mut bus = controller(&wire);

    // 0xFF payload keeps SDA released after the mismatch, so the only
    // falling edge the disarmed-at-idle detector could see is a START
    let result = bus.transfer(ADDR + 1, &mut [Segment::write(&[0xFF])]);
    assert_eq!(result, Err(BusError::AddressNack));

    let (device, outcomes) = target.finish();
    assert_eq!(device.write_requested, 0);
    assert!(device.received.is_empty());
    assert_eq!(device.stops, 0, "no callback may fire on a mismatch");
    assert_eq!(outcomes, vec![TargetOutcome::AddressMismatch]);
    assert!(wire.idle(), "STOP must still leave the bus free");
}

#[test]
fn test_callback_refusal_nacks_the_byte() {
    let wire = Wire::new();
    let mut device = Device::default();
    device.refuse_from = Some(1);
    let target = spawn_target(&wire, device);
    let mut bus = controller(&wire);

    let result = bus.transfer(ADDR, &mut [Segment::write(&[5, 6, 7])]);
    assert_eq!(result, Err(BusError::DataNack));

    let (device, outcomes) = target.finish();
    // the refused byte was still delivered to the callback, nothing after
    assert_eq!(device.received, vec![5, 6]);
    assert_eq!(device.stops, 0);
    assert_eq!(outcomes, vec![TargetOutcome::CallbackError]);
    assert!(wire.idle(), "abort path must still issue the STOP");
}

#[test]
fn test_address_nack_with_nobody_listening() {
    let wire = Wire::new();
    let mut bus = controller(&wire);

    let result = bus.transfer(ADDR, &mut [Segment::write(&[1, 2])]);
    assert_eq!(result, Err(BusError::AddressNack));
    assert!(wire.idle());
}

#[test]
fn test_recover_bus_is_idempotent() {
    let wire = Wire::new();
    let mut bus = controller(&wire);

    bus.recover_bus().unwrap();
    bus.recover_bus().unwrap();
    assert!(wire.idle());
}
