#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]

//! # TPU Core
//!
//! Shared vocabulary for protocol engines that run on a timer coprocessor:
//! timebase values, logical lines, scheduled pin actions, channel events and
//! the [`Timeline`] contract the engines are written against.
//!
//! An engine never touches a pin directly. It schedules matches that drive
//! output lines at exact timestamps and arms edge detectors on input lines,
//! then parks until the timeline hands it the next [`ChannelEvent`].

use core::fmt;

pub mod event;
pub mod flags;
pub mod line;
pub mod time;
pub mod timeline;

pub use event::*;
pub use flags::*;
pub use line::*;
pub use time::*;
pub use timeline::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type used by the timebase helpers
pub type TpuResult<T> = Result<T, TpuError>;

/// Errors raised while converting or validating timebase values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpuError {
    /// A converted duration does not fit the tick counter
    Overflow,
    /// The timebase reports a zero tick rate
    InvalidTickRate,
}

impl fmt::Display for TpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TpuError::Overflow => write!(f, "Duration overflows the tick counter"),
            TpuError::InvalidTickRate => write!(f, "Timebase tick rate is zero"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TpuError {}

#[cfg(feature = "defmt")]
impl defmt::Format for TpuError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            TpuError::Overflow => defmt::write!(fmt, "Overflow"),
            TpuError::InvalidTickRate => defmt::write!(fmt, "InvalidTickRate"),
        }
    }
}
