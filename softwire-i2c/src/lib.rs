//! Software-defined I2C bus engine
//!
//! This crate implements the I2C protocol in software by directly
//! manipulating the levels of the SCL and SDA lines through an injected
//! [`softwire_hal::LineDriver`]. It supports Standard-mode and Fast-mode
//! speeds and does not support optional protocol features like 10-bit
//! addresses or full clock stretching.
//!
//! Two roles are provided by one engine value, [`Bitbang`]:
//!
//! - **Controller**: [`Bitbang::transfer`] drives a sequence of
//!   [`Segment`]s to completion, generating START / REPEATED-START / STOP
//!   and evaluating the ACK bit after every transmitted byte. The call is
//!   synchronous and busy-waits for the whole transaction.
//!   [`Bitbang::recover_bus`] frees a bus left stuck by a peer parked
//!   mid-byte.
//! - **Target**: [`Bitbang::start_detected`] is the non-blocking START
//!   test for the host's SDA edge context, and [`Bitbang::run_target`]
//!   is the transaction handler for a deferred execution context. The
//!   handler polls the external controller's clock, matches the address
//!   against the registered [`TargetConfig`] and moves bytes through the
//!   [`TargetEvents`] callbacks.
//!
//! The engine commits to one role on first use; switching requires an
//! explicit [`Bitbang::release`].
//!
//! Timings and protocol follow Rev. 7 of the I2C specification:
//! <https://www.nxp.com/docs/en/user-guide/UM10204.pdf>

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod engine;
pub mod error;
pub mod segment;
pub mod target;
pub mod timing;

mod controller;
mod ehal;

#[cfg(test)]
pub(crate) mod mock;

pub use config::{Addressing, Config};
pub use engine::{Bitbang, Role};
pub use error::BusError;
pub use segment::{Direction, Segment, SegmentOp};
pub use target::{CallbackError, TargetConfig, TargetEvents, TargetOutcome, TargetState};
pub use timing::{BusTiming, Speed};
