//! Timebase types and conversions

use core::fmt;
use core::ops::{Add, Div};

use crate::{TpuError, TpuResult};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Absolute instant on the shared timebase counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Counter origin
    pub const ZERO: Self = Self(0);

    /// Create a timestamp from a raw counter value
    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Get the raw counter value
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Ticks elapsed since `earlier` (handles wraparound)
    pub fn elapsed_since(self, earlier: Timestamp) -> u64 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Check if this instant lies strictly after `other` (handles wraparound)
    pub fn is_after(self, other: Timestamp) -> bool {
        self != other && self.0.wrapping_sub(other.0) < u64::MAX / 2
    }
}

impl Add<Ticks> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Ticks) -> Timestamp {
        Timestamp(self.0.wrapping_add(u64::from(rhs.0)))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t:{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Timestamp {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "t:{}", self.0);
    }
}

/// Duration expressed in timebase ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(u32);

impl Ticks {
    /// Zero duration
    pub const ZERO: Self = Self(0);

    /// Create a duration from a tick count
    pub const fn new(ticks: u32) -> Self {
        Self(ticks)
    }

    /// Get the tick count
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check if the duration is zero
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Convert a duration in nanoseconds to ticks of a timebase running at
    /// `tick_rate_hz`, rounding down.
    pub fn from_nanos(tick_rate_hz: u32, nanos: u32) -> TpuResult<Self> {
        if tick_rate_hz == 0 {
            return Err(TpuError::InvalidTickRate);
        }
        let ticks = u64::from(tick_rate_hz) * u64::from(nanos) / NANOS_PER_SEC;
        u32::try_from(ticks).map(Self).map_err(|_| TpuError::Overflow)
    }

    /// Convert back to nanoseconds for a timebase running at `tick_rate_hz`
    pub fn to_nanos(self, tick_rate_hz: u32) -> TpuResult<u64> {
        if tick_rate_hz == 0 {
            return Err(TpuError::InvalidTickRate);
        }
        Ok(u64::from(self.0) * NANOS_PER_SEC / u64::from(tick_rate_hz))
    }
}

impl Add for Ticks {
    type Output = Ticks;

    fn add(self, rhs: Ticks) -> Ticks {
        Ticks(self.0.saturating_add(rhs.0))
    }
}

impl Div<u32> for Ticks {
    type Output = Ticks;

    fn div(self, rhs: u32) -> Ticks {
        Ticks(self.0 / rhs)
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ticks", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Ticks {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}ticks", self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nanos_to_ticks() {
        // 100 MHz timebase: one tick per 10 ns
        assert_eq!(Ticks::from_nanos(100_000_000, 4_700), Ok(Ticks::new(470)));
        assert_eq!(Ticks::from_nanos(100_000_000, 1_250), Ok(Ticks::new(125)));
        // rounds down below one tick
        assert_eq!(Ticks::from_nanos(100_000_000, 9), Ok(Ticks::ZERO));
        assert_eq!(Ticks::from_nanos(0, 100), Err(TpuError::InvalidTickRate));
    }

    #[test]
    fn test_ticks_to_nanos() {
        assert_eq!(Ticks::new(470).to_nanos(100_000_000), Ok(4_700));
        assert_eq!(Ticks::new(1).to_nanos(0), Err(TpuError::InvalidTickRate));
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let t0 = Timestamp::new(1_000);
        let t1 = t0 + Ticks::new(500);

        assert_eq!(t1.raw(), 1_500);
        assert_eq!(t1.elapsed_since(t0), 500);
        assert!(t1.is_after(t0));
        assert!(!t0.is_after(t1));
        assert!(!t0.is_after(t0));
    }

    #[test]
    fn test_timestamp_wraparound() {
        let near_end = Timestamp::new(u64::MAX - 10);
        let wrapped = near_end + Ticks::new(20);

        assert_eq!(wrapped.raw(), 9);
        assert_eq!(wrapped.elapsed_since(near_end), 20);
        assert!(wrapped.is_after(near_end));
    }

    #[test]
    fn test_ticks_ops() {
        assert_eq!(Ticks::new(1_000) / 20, Ticks::new(50));
        assert_eq!(Ticks::new(u32::MAX) + Ticks::new(1), Ticks::new(u32::MAX));
        assert!(Ticks::ZERO.is_zero());
    }
}
