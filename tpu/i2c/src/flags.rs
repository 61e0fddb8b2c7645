//! Error flags and host signals

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

/// Protocol error flags recorded by the engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ErrorFlags(u8);

impl ErrorFlags {
    pub const NONE: Self = Self(0x00);
    /// Master: unexpected NACK while writing
    pub const ACK_FAILED: Self = Self(0x01);
    /// Master: start requested while a transfer was in flight
    pub const BUSY: Self = Self(0x02);
    /// Slave: START seen outside the expected state
    pub const INVALID_START: Self = Self(0x10);
    /// Slave: read or write buffer capacity exceeded
    pub const BUFFER_OVERFLOW: Self = Self(0x20);
    /// Slave: STOP or repeated START did not validate
    pub const STOP_FAILED: Self = Self(0x40);

    const NAMES: [(ErrorFlags, &'static str); 5] = [
        (Self::ACK_FAILED, "AckFailed"),
        (Self::BUSY, "Busy"),
        (Self::INVALID_START, "InvalidStart"),
        (Self::BUFFER_OVERFLOW, "BufferOverflow"),
        (Self::STOP_FAILED, "StopFailed"),
    ];

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for ErrorFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ErrorFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ErrorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ErrorFlags {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "ErrorFlags({=u8:#x})", self.0);
    }
}

/// Pending host notifications, consumed with `take_signals`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HostSignals(u8);

impl HostSignals {
    pub const NONE: Self = Self(0x00);
    /// A transfer reached STOP or repeated START
    pub const TRANSFER_COMPLETE: Self = Self(0x01);
    /// Data-wait slave is holding SCL until the read buffer is ready
    pub const DATA_REQUEST: Self = Self(0x02);
    /// Slave gave up on a transfer whose STOP did not validate
    pub const TRANSFER_ABORTED: Self = Self(0x04);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for HostSignals {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for HostSignals {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "HostSignals({=u8:#x})", self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_set_operations() {
        let mut flags = ErrorFlags::NONE;
        assert!(flags.is_empty());

        flags |= ErrorFlags::BUFFER_OVERFLOW;
        flags.insert(ErrorFlags::STOP_FAILED);
        assert!(flags.contains(ErrorFlags::BUFFER_OVERFLOW));
        assert!(flags.contains(ErrorFlags::STOP_FAILED));
        assert!(!flags.contains(ErrorFlags::ACK_FAILED));
        assert_eq!(flags.bits(), 0x60);
    }

    #[test]
    fn test_flag_display() {
        assert_eq!(format!("{}", ErrorFlags::NONE), "none");
        assert_eq!(
            format!("{}", ErrorFlags::ACK_FAILED | ErrorFlags::BUSY),
            "AckFailed|Busy"
        );
    }
}
