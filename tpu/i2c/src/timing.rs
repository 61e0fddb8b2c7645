//! Bus timing derived from the bit rate, in timebase ticks

use tpu_core::Ticks;

use crate::{I2cError, I2cResult};

/// Fast-mode ceiling
pub const MAX_BIT_RATE_HZ: u32 = 400_000;

/// Shortest bit period that still leaves a non-zero data hold time
pub const MIN_BIT_TICKS: u32 = 20;

/// Master clock and condition timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusTiming {
    /// SCL low phase
    pub t_low: Ticks,
    /// SCL high phase
    pub t_high: Ticks,
    /// Bus free time before a START
    pub t_buf: Ticks,
    /// Setup time of a repeated START
    pub t_su_sta: Ticks,
    /// Setup time of a STOP
    pub t_su_sto: Ticks,
    /// Data hold time after SCL falls
    pub t_hd_dat: Ticks,
    /// Clock-stretch detection threshold
    pub tr_max: Ticks,
}

impl BusTiming {
    /// Derive a symmetric clock for `bit_rate_hz` on a timebase running at
    /// `tick_rate_hz`
    pub fn from_bit_rate(tick_rate_hz: u32, bit_rate_hz: u32) -> I2cResult<Self> {
        if bit_rate_hz == 0 || bit_rate_hz > MAX_BIT_RATE_HZ {
            return Err(I2cError::InvalidParameter);
        }
        let bit = tick_rate_hz / bit_rate_hz;
        if bit < MIN_BIT_TICKS {
            return Err(I2cError::InvalidParameter);
        }
        let bit = Ticks::new(bit);
        let half = bit / 2;
        Ok(Self {
            t_low: half,
            t_high: half,
            t_buf: half,
            t_su_sta: half,
            t_su_sto: half,
            t_hd_dat: bit / 20,
            tr_max: bit / 10,
        })
    }

    /// Commanded clock period
    pub fn bit_period(&self) -> Ticks {
        self.t_low + self.t_high
    }

    /// Replace the parameters set in `timing`, converting nanoseconds with
    /// `tick_rate_hz`
    pub fn with_override(mut self, tick_rate_hz: u32, timing: &TimingOverride) -> I2cResult<Self> {
        let convert = |nanos: Option<u32>, current: Ticks| -> I2cResult<Ticks> {
            match nanos {
                Some(ns) => Ok(Ticks::from_nanos(tick_rate_hz, ns)?),
                None => Ok(current),
            }
        };
        self.t_low = convert(timing.t_low_ns, self.t_low)?;
        self.t_high = convert(timing.t_high_ns, self.t_high)?;
        self.t_buf = convert(timing.t_buf_ns, self.t_buf)?;
        self.t_su_sta = convert(timing.t_su_sta_ns, self.t_su_sta)?;
        self.t_su_sto = convert(timing.t_su_sto_ns, self.t_su_sto)?;
        self.t_hd_dat = convert(timing.t_hd_dat_ns, self.t_hd_dat)?;
        self.tr_max = convert(timing.tr_max_ns, self.tr_max)?;

        // data must change strictly inside the low phase
        if self.t_low.is_zero() || self.t_high.is_zero() || self.t_hd_dat >= self.t_low {
            return Err(I2cError::InvalidParameter);
        }
        Ok(self)
    }
}

/// Per-parameter timing override in nanoseconds; `None` keeps the derived value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimingOverride {
    pub t_low_ns: Option<u32>,
    pub t_high_ns: Option<u32>,
    pub t_buf_ns: Option<u32>,
    pub t_su_sta_ns: Option<u32>,
    pub t_su_sto_ns: Option<u32>,
    pub t_hd_dat_ns: Option<u32>,
    pub tr_max_ns: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TCR1_HZ: u32 = 100_000_000;

    #[test]
    fn test_standard_mode_timing() {
        let timing = BusTiming::from_bit_rate(TCR1_HZ, 100_000).unwrap();

        assert_eq!(timing.t_low, Ticks::new(500));
        assert_eq!(timing.t_high, Ticks::new(500));
        assert_eq!(timing.t_buf, Ticks::new(500));
        assert_eq!(timing.t_su_sta, Ticks::new(500));
        assert_eq!(timing.t_su_sto, Ticks::new(500));
        assert_eq!(timing.t_hd_dat, Ticks::new(50));
        assert_eq!(timing.tr_max, Ticks::new(100));
    }

    #[test]
    fn test_period_matches_bit_rate() {
        for rate in [10_000, 100_000, 300_000, 333_333, 400_000] {
            let timing = BusTiming::from_bit_rate(TCR1_HZ, rate).unwrap();
            let bit = TCR1_HZ / rate;
            let period = timing.bit_period().raw();
            // within one tick of resolution
            assert!(bit - period <= 1, "rate {rate}: bit {bit} period {period}");
        }
    }

    #[test]
    fn test_rejects_out_of_range_rates() {
        assert_eq!(BusTiming::from_bit_rate(TCR1_HZ, 0), Err(I2cError::InvalidParameter));
        assert_eq!(BusTiming::from_bit_rate(TCR1_HZ, 1_000_000), Err(I2cError::InvalidParameter));
        // 1 MHz timebase leaves only 10 ticks per bit at 100 kHz
        assert_eq!(BusTiming::from_bit_rate(1_000_000, 100_000), Err(I2cError::InvalidParameter));
    }

    #[test]
    fn test_override_in_nanoseconds() {
        let timing = BusTiming::from_bit_rate(TCR1_HZ, 100_000).unwrap();
        let custom = TimingOverride {
            t_low_ns: Some(4_700),
            t_high_ns: Some(4_000),
            t_hd_dat_ns: Some(300),
            ..Default::default()
        };
        let timing = timing.with_override(TCR1_HZ, &custom).unwrap();

        assert_eq!(timing.t_low, Ticks::new(470));
        assert_eq!(timing.t_high, Ticks::new(400));
        assert_eq!(timing.t_hd_dat, Ticks::new(30));
        assert_eq!(timing.t_buf, Ticks::new(500));
        assert_eq!(timing.bit_period(), Ticks::new(870));
    }

    #[test]
    fn test_override_rejects_hold_beyond_low_phase() {
        let timing = BusTiming::from_bit_rate(TCR1_HZ, 100_000).unwrap();
        let custom = TimingOverride { t_hd_dat_ns: Some(6_000), ..Default::default() };
        assert_eq!(timing.with_override(TCR1_HZ, &custom), Err(I2cError::InvalidParameter));
    }
}
