//! Logical lines and the pin-level vocabulary shared by engines and timelines

use core::fmt;

/// One timer channel bound to a pin, identified by its channel number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Line(pub u8);

impl Line {
    /// Create a line identifier
    pub const fn new(channel: u8) -> Self {
        Self(channel)
    }

    /// Get the raw channel number
    pub const fn channel(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Line {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "ch{}", self.0);
    }
}

/// Logic level observed on, or driven onto, a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }

    pub const fn is_low(self) -> bool {
        matches!(self, Level::Low)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> Self {
        level.is_high()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Level {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Level::Low => defmt::write!(fmt, "Low"),
            Level::High => defmt::write!(fmt, "High"),
        }
    }
}

/// Direction of an observed transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Rising,
    Falling,
}

impl Edge {
    /// Transition that takes a line from `from` to `to`, if any
    pub fn between(from: Level, to: Level) -> Option<Edge> {
        match (from, to) {
            (Level::Low, Level::High) => Some(Edge::Rising),
            (Level::High, Level::Low) => Some(Edge::Falling),
            _ => None,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Edge {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Edge::Rising => defmt::write!(fmt, "Rising"),
            Edge::Falling => defmt::write!(fmt, "Falling"),
        }
    }
}

/// Edge detector configuration of an input line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EdgeDetect {
    #[default]
    Disabled,
    Rising,
    Falling,
    Any,
}

impl EdgeDetect {
    /// Check if a transition satisfies this detector
    pub const fn accepts(self, edge: Edge) -> bool {
        matches!(
            (self, edge),
            (EdgeDetect::Any, _)
                | (EdgeDetect::Rising, Edge::Rising)
                | (EdgeDetect::Falling, Edge::Falling)
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for EdgeDetect {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            EdgeDetect::Disabled => defmt::write!(fmt, "Disabled"),
            EdgeDetect::Rising => defmt::write!(fmt, "Rising"),
            EdgeDetect::Falling => defmt::write!(fmt, "Falling"),
            EdgeDetect::Any => defmt::write!(fmt, "Any"),
        }
    }
}

/// Pin action applied atomically when a match fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinAction {
    SetHigh,
    SetLow,
    /// Fire the match event only
    NoChange,
}

impl PinAction {
    /// Level the action drives, if it drives one
    pub const fn level(self) -> Option<Level> {
        match self {
            PinAction::SetHigh => Some(Level::High),
            PinAction::SetLow => Some(Level::Low),
            PinAction::NoChange => None,
        }
    }

    /// Action that drives `level`
    pub const fn drive(level: Level) -> Self {
        match level {
            Level::High => PinAction::SetHigh,
            Level::Low => PinAction::SetLow,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PinAction {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            PinAction::SetHigh => defmt::write!(fmt, "SetHigh"),
            PinAction::SetLow => defmt::write!(fmt, "SetLow"),
            PinAction::NoChange => defmt::write!(fmt, "NoChange"),
        }
    }
}

/// Match register of a line. Each line carries two; scheduling into an
/// occupied slot replaces the pending match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchSlot {
    A,
    B,
}

impl MatchSlot {
    pub const fn index(self) -> usize {
        match self {
            MatchSlot::A => 0,
            MatchSlot::B => 1,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MatchSlot {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            MatchSlot::A => defmt::write!(fmt, "A"),
            MatchSlot::B => defmt::write!(fmt, "B"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_between_levels() {
        assert_eq!(Edge::between(Level::Low, Level::High), Some(Edge::Rising));
        assert_eq!(Edge::between(Level::High, Level::Low), Some(Edge::Falling));
        assert_eq!(Edge::between(Level::High, Level::High), None);
    }

    #[test]
    fn test_edge_detect_accepts() {
        assert!(EdgeDetect::Any.accepts(Edge::Rising));
        assert!(EdgeDetect::Any.accepts(Edge::Falling));
        assert!(EdgeDetect::Rising.accepts(Edge::Rising));
        assert!(!EdgeDetect::Rising.accepts(Edge::Falling));
        assert!(!EdgeDetect::Disabled.accepts(Edge::Falling));
    }

    #[test]
    fn test_pin_action_levels() {
        assert_eq!(PinAction::SetHigh.level(), Some(Level::High));
        assert_eq!(PinAction::NoChange.level(), None);
        assert_eq!(PinAction::drive(Level::Low), PinAction::SetLow);
    }
}
