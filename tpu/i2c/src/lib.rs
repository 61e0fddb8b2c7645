#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]

//! # TPU I2C
//!
//! I2C bus master and slave engines written as event-driven state machines
//! on top of a [`tpu_core::Timeline`]. Each role is bound to four lines
//! (clock out, clock echo in, data out, data in) that share one frame of
//! state. Every clock edge, data bit and bus condition is produced by a
//! scheduled match or observed through an edge capture; no handler ever
//! waits.
//!
//! - [`I2cMaster`] issues START, clocks header and payload bytes, handles
//!   ACK/NACK, chains commands with repeated START and finishes with STOP.
//! - [`I2cSlave`] detects bus idle, START/STOP and repeated START, matches
//!   its address, exchanges bytes and can stall reads until the host has
//!   data ready.
//!
//! Addresses are given in their 8-bit on-wire form: the R/W bit is bit 0.

use core::fmt;

use tpu_core::{Line, TpuError};

pub mod command;
pub mod flags;
pub mod master;
pub mod slave;
pub mod timing;

pub use command::TransferCommand;
pub use flags::{ErrorFlags, HostSignals};
pub use master::{I2cMaster, MasterConfig, MasterConfigBuilder, MasterState};
pub use slave::{I2cSlave, SlaveConfig, SlaveConfigBuilder, SlaveMode, SlaveState, TransferStatus, WriteData};
pub use timing::{BusTiming, TimingOverride};

/// Bit 0 of a header selects the direction
pub const RW_MASK: u8 = 0x01;

/// Header addressed to every slave accepting general calls
pub const GENERAL_CALL: u8 = 0x00;

/// Reserved header used to wake slow receivers; never acknowledged
pub const START_BYTE: u8 = 0x01;

/// Capacity of every transfer buffer in bytes
pub const BUFFER_CAPACITY: usize = 64;

/// Maximum number of commands in one combined transfer
pub const MAX_COMMANDS: usize = 8;

/// Result type returned by the host-facing API
pub type I2cResult<T> = Result<T, I2cError>;

/// Errors returned synchronously by host calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cError {
    /// A transfer is already in flight
    Busy,
    /// The engine is not parked in a state that accepts the request
    NotReady,
    /// `init` has not run, or the engine was shut down
    NotInitialized,
    /// Out-of-range configuration or timing value
    InvalidParameter,
    /// Buffer larger than [`BUFFER_CAPACITY`]
    BufferTooLarge,
    /// Empty command list
    NoCommands,
    /// More than [`MAX_COMMANDS`] commands
    TooManyCommands,
    /// The last transfer saw an unexpected NACK
    Nack,
}

impl fmt::Display for I2cError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            I2cError::Busy => write!(f, "Transfer already in flight"),
            I2cError::NotReady => write!(f, "Engine not ready for this request"),
            I2cError::NotInitialized => write!(f, "Engine not initialized"),
            I2cError::InvalidParameter => write!(f, "Invalid parameter"),
            I2cError::BufferTooLarge => write!(f, "Buffer exceeds capacity"),
            I2cError::NoCommands => write!(f, "Command list is empty"),
            I2cError::TooManyCommands => write!(f, "Too many commands"),
            I2cError::Nack => write!(f, "Transfer not acknowledged"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for I2cError {}

#[cfg(feature = "defmt")]
impl defmt::Format for I2cError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            I2cError::Busy => defmt::write!(fmt, "Busy"),
            I2cError::NotReady => defmt::write!(fmt, "NotReady"),
            I2cError::NotInitialized => defmt::write!(fmt, "NotInitialized"),
            I2cError::InvalidParameter => defmt::write!(fmt, "InvalidParameter"),
            I2cError::BufferTooLarge => defmt::write!(fmt, "BufferTooLarge"),
            I2cError::NoCommands => defmt::write!(fmt, "NoCommands"),
            I2cError::TooManyCommands => defmt::write!(fmt, "TooManyCommands"),
            I2cError::Nack => defmt::write!(fmt, "Nack"),
        }
    }
}

impl embedded_hal::i2c::Error for I2cError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
        match self {
            I2cError::Nack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            _ => ErrorKind::Other,
        }
    }
}

impl From<TpuError> for I2cError {
    fn from(_: TpuError) -> Self {
        I2cError::InvalidParameter
    }
}

/// Transfer direction, taken from bit 0 of a header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

impl Direction {
    pub const fn from_header(header: u8) -> Self {
        if header & RW_MASK != 0 {
            Direction::Read
        } else {
            Direction::Write
        }
    }
}

/// The four lines bound to one master or slave instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cLines {
    pub scl_out: Line,
    pub scl_in: Line,
    pub sda_out: Line,
    pub sda_in: Line,
}

impl I2cLines {
    pub const fn all(&self) -> [Line; 4] {
        [self.scl_out, self.scl_in, self.sda_out, self.sda_in]
    }

    pub fn contains(&self, line: Line) -> bool {
        self.all().contains(&line)
    }
}
