//! Engine error taxonomy
//!
//! Protocol failures are recovered locally up to returning the bus to
//! released lines; only the final classification reaches the caller.

/// Errors surfaced by the bus engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Speed grade, addressing mode or address the engine cannot provide
    Unsupported,
    /// No peer acknowledged the address byte; STOP was still issued
    AddressNack,
    /// A data byte was not acknowledged; the transaction was aborted
    /// after a STOP
    DataNack,
    /// Bus recovery left the data line held low
    Busy,
    /// Operation conflicts with the role the engine is committed to
    InvalidRole,
    /// A target registration is already active on this engine
    AlreadyRegistered,
    /// Target operation attempted with no registered target
    NoTarget,
    /// A bounded clock-edge poll ran out of iterations
    /// (see [`crate::Bitbang::set_poll_budget`])
    PollExpired,
}
