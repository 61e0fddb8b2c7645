//! The scheduled-timeline contract
//!
//! A [`Timeline`] is the substrate every engine runs on: a free-running
//! counter, per-line match registers that apply a [`PinAction`] at an exact
//! count, and per-line edge detectors that capture the count of a transition.
//! Engines implement [`ChannelHandler`] and are resumed with one
//! [`ChannelEvent`] at a time; each handler arms its next wait condition and
//! returns.

use crate::{ChannelEvent, EdgeDetect, Level, Line, MatchSlot, PinAction, Timestamp};

/// Substrate of matches and edge captures shared by every engine on a timebase
pub trait Timeline {
    /// Frequency of the timebase counter in Hz
    fn tick_rate_hz(&self) -> u32;

    /// Current counter value
    fn now(&self) -> Timestamp;

    /// Arm a one-shot match. At `at` the action is applied to the pin and,
    /// if event handling is enabled on the line, a match event is raised.
    /// A time already in the past fires immediately.
    fn schedule_match(&mut self, line: Line, slot: MatchSlot, at: Timestamp, action: PinAction);

    /// Drop every pending match on the line
    fn cancel_matches(&mut self, line: Line);

    /// Drive an output line right now, outside of any match
    fn set_pin(&mut self, line: Line, level: Level);

    /// Arm the edge detector of an input line. The detector fires once and
    /// must be re-armed for the next transition.
    fn detect_edge(&mut self, line: Line, detect: EdgeDetect);

    fn enable_events(&mut self, line: Line);

    fn disable_events(&mut self, line: Line);

    /// Sample the level currently present on the line's pin
    fn read_pin(&self, line: Line) -> Level;

    /// Queue an immediate link event on the line, used to split one step of
    /// work across two handler invocations.
    fn link(&mut self, line: Line);

    /// Raise the host interrupt of the line
    fn signal_host(&mut self, line: Line);
}

/// An engine resumed by timeline events
pub trait ChannelHandler {
    /// Check if events on `line` are routed to this engine
    fn owns(&self, line: Line) -> bool;

    /// Handle one event. Runs to completion.
    fn handle(&mut self, timeline: &mut dyn Timeline, event: &ChannelEvent);
}
