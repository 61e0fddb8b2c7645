//! Recorded wire transitions and I2C bus-condition decoding

use std::fmt;

use tpu_core::{Level, Timestamp};

/// Index of a wire on a [`crate::SimBus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WireId(pub usize);

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wire{}", self.0)
    }
}

/// One level change of a wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub at: Timestamp,
    pub wire: WireId,
    pub level: Level,
}

/// START/STOP conditions: SDA changing while SCL is high
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusCondition {
    Start,
    Stop,
}

/// Ordered log of every wire transition since the bus was built
#[derive(Debug, Clone, Default)]
pub struct Waveform {
    transitions: Vec<Transition>,
}

impl Waveform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, at: Timestamp, wire: WireId, level: Level) {
        self.transitions.push(Transition { at, wire, level });
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn clear(&mut self) {
        self.transitions.clear();
    }

    /// Transitions of a single wire
    pub fn wire(&self, wire: WireId) -> impl Iterator<Item = &Transition> + '_ {
        self.transitions.iter().filter(move |t| t.wire == wire)
    }

    /// Level of `wire` just after `at`. Wires idle high.
    pub fn level_at(&self, wire: WireId, at: Timestamp) -> Level {
        self.wire(wire)
            .take_while(|t| !t.at.is_after(at))
            .last()
            .map_or(Level::High, |t| t.level)
    }

    /// Intervals during which `wire` was held low, as (fall, rise) pairs.
    /// A wire still low at the end of the log is not reported.
    pub fn low_intervals(&self, wire: WireId) -> Vec<(Timestamp, Timestamp)> {
        let mut intervals = Vec::new();
        let mut fell = None;
        for t in self.wire(wire) {
            match (t.level, fell) {
                (Level::Low, None) => fell = Some(t.at),
                (Level::High, Some(start)) => {
                    intervals.push((start, t.at));
                    fell = None;
                }
                _ => {}
            }
        }
        intervals
    }

    /// Rising transitions of `wire`
    pub fn rising_edges(&self, wire: WireId) -> Vec<Timestamp> {
        self.wire(wire)
            .filter(|t| t.level.is_high())
            .map(|t| t.at)
            .collect()
    }

    /// Decode START and STOP conditions of an I2C wire pair
    pub fn bus_conditions(&self, scl: WireId, sda: WireId) -> Vec<(Timestamp, BusCondition)> {
        let mut scl_level = Level::High;
        let mut conditions = Vec::new();
        for t in &self.transitions {
            if t.wire == scl {
                scl_level = t.level;
            } else if t.wire == sda && scl_level.is_high() {
                let condition = match t.level {
                    Level::Low => BusCondition::Start,
                    Level::High => BusCondition::Stop,
                };
                conditions.push((t.at, condition));
            }
        }
        conditions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCL: WireId = WireId(0);
    const SDA: WireId = WireId(1);

    fn at(ticks: u64) -> Timestamp {
        Timestamp::new(ticks)
    }

    #[test]
    fn test_decode_start_data_stop() {
        let mut wave = Waveform::new();
        wave.record(at(100), SDA, Level::Low); // START
        wave.record(at(150), SCL, Level::Low);
        wave.record(at(160), SDA, Level::High); // data, SCL low
        wave.record(at(200), SCL, Level::High);
        wave.record(at(250), SCL, Level::Low);
        wave.record(at(260), SDA, Level::Low);
        wave.record(at(300), SCL, Level::High);
        wave.record(at(350), SDA, Level::High); // STOP

        assert_eq!(
            wave.bus_conditions(SCL, SDA),
            vec![(at(100), BusCondition::Start), (at(350), BusCondition::Stop)]
        );
    }

    #[test]
    fn test_low_intervals_and_levels() {
        let mut wave = Waveform::new();
        wave.record(at(10), SCL, Level::Low);
        wave.record(at(20), SCL, Level::High);
        wave.record(at(30), SCL, Level::Low);

        assert_eq!(wave.low_intervals(SCL), vec![(at(10), at(20))]);
        assert_eq!(wave.rising_edges(SCL), vec![at(20)]);
        assert_eq!(wave.level_at(SCL, at(5)), Level::High);
        assert_eq!(wave.level_at(SCL, at(10)), Level::Low);
        assert_eq!(wave.level_at(SCL, at(25)), Level::High);
        assert_eq!(wave.level_at(SDA, at(25)), Level::High);
    }
}
