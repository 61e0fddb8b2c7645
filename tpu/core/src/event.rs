//! Channel events delivered by a timeline to the engine owning a line

use core::fmt;

use crate::{Edge, Line, MatchSlot, Timestamp};

/// What woke the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A scheduled match fired
    Match(MatchSlot),
    /// An armed edge detector captured a transition
    Edge(Edge),
    /// Continuation requested by the engine itself through [`crate::Timeline::link`]
    Link,
}

/// A single wake-up of one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelEvent {
    pub line: Line,
    pub kind: EventKind,
    /// Match time, capture time of the edge, or link time
    pub at: Timestamp,
}

impl ChannelEvent {
    pub const fn matched(line: Line, slot: MatchSlot, at: Timestamp) -> Self {
        Self { line, kind: EventKind::Match(slot), at }
    }

    pub const fn edge(line: Line, edge: Edge, at: Timestamp) -> Self {
        Self { line, kind: EventKind::Edge(edge), at }
    }

    pub const fn link(line: Line, at: Timestamp) -> Self {
        Self { line, kind: EventKind::Link, at }
    }
}

impl fmt::Display for ChannelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EventKind::Match(slot) => write!(f, "{} match {:?} @{}", self.line, slot, self.at),
            EventKind::Edge(edge) => write!(f, "{} {:?} edge @{}", self.line, edge, self.at),
            EventKind::Link => write!(f, "{} link @{}", self.line, self.at),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ChannelEvent {
    fn format(&self, fmt: defmt::Formatter) {
        match self.kind {
            EventKind::Match(slot) => defmt::write!(fmt, "{} match {} @{}", self.line, slot, self.at),
            EventKind::Edge(edge) => defmt::write!(fmt, "{} {} edge @{}", self.line, edge, self.at),
            EventKind::Link => defmt::write!(fmt, "{} link @{}", self.line, self.at),
        }
    }
}
