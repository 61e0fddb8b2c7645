//! Simulated timeline: open-drain wires, timer-channel lines and the run loop

use std::collections::VecDeque;

use log::{debug, trace, warn};
use tpu_core::{
    ChannelEvent, ChannelHandler, Edge, EdgeDetect, Level, Line, MatchSlot, PinAction, Ticks,
    Timeline, Timestamp,
};

use crate::{SimError, SimResult, Waveform, WireId, DEFAULT_EVENT_LIMIT};

const MAX_LINES: usize = 256;

/// How a line is attached to its wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Open-drain driver; pulls the wire low or releases it
    Output,
    /// Edge detector and pin sampler
    Input,
}

/// Host interrupt raised through [`Timeline::signal_host`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostInterrupt {
    pub line: Line,
    pub at: Timestamp,
}

#[derive(Debug, Clone, Copy)]
struct PendingMatch {
    at: Timestamp,
    action: PinAction,
    seq: u64,
}

#[derive(Debug)]
struct LineState {
    wire: WireId,
    direction: Direction,
    drive: Level,
    detect: EdgeDetect,
    events_enabled: bool,
    matches: [Option<PendingMatch>; 2],
}

/// Wired-AND bus driven by scheduled matches
///
/// Ordering rules at one timestamp: matches fire in the order they were
/// scheduled, a match's own event is queued ahead of the edge events it
/// causes, and queued events are dispatched before the next match fires.
pub struct SimBus {
    tick_rate_hz: u32,
    now: Timestamp,
    wires: Vec<Level>,
    wire_names: Vec<&'static str>,
    lines: Vec<LineState>,
    events: VecDeque<ChannelEvent>,
    interrupts: Vec<HostInterrupt>,
    waveform: Waveform,
    next_seq: u64,
    event_limit: usize,
}

impl SimBus {
    /// Create an empty bus whose counter runs at `tick_rate_hz`
    pub fn new(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            now: Timestamp::ZERO,
            wires: Vec::new(),
            wire_names: Vec::new(),
            lines: Vec::new(),
            events: VecDeque::new(),
            interrupts: Vec::new(),
            waveform: Waveform::new(),
            next_seq: 0,
            event_limit: DEFAULT_EVENT_LIMIT,
        }
    }

    /// Bound the number of events a single run call may dispatch
    pub fn with_event_limit(mut self, limit: usize) -> Self {
        self.event_limit = limit;
        self
    }

    /// Add a pulled-up wire
    pub fn add_wire(&mut self, name: &'static str) -> WireId {
        self.wires.push(Level::High);
        self.wire_names.push(name);
        WireId(self.wires.len() - 1)
    }

    /// Attach an open-drain output line to `wire`
    pub fn add_output(&mut self, wire: WireId) -> SimResult<Line> {
        self.attach(wire, Direction::Output)
    }

    /// Attach an input line to `wire`
    pub fn add_input(&mut self, wire: WireId) -> SimResult<Line> {
        self.attach(wire, Direction::Input)
    }

    fn attach(&mut self, wire: WireId, direction: Direction) -> SimResult<Line> {
        if wire.0 >= self.wires.len() {
            return Err(SimError::UnknownWire(wire.0));
        }
        if self.lines.len() >= MAX_LINES {
            return Err(SimError::TooManyLines(MAX_LINES));
        }
        let line = Line::new(self.lines.len() as u8);
        self.lines.push(LineState {
            wire,
            direction,
            drive: Level::High,
            detect: EdgeDetect::Disabled,
            events_enabled: false,
            matches: [None, None],
        });
        debug!("{} attached to {} as {:?}", line, self.wire_names[wire.0], direction);
        Ok(line)
    }

    /// Resolved level of a wire
    pub fn wire_level(&self, wire: WireId) -> Level {
        self.wires.get(wire.0).copied().unwrap_or(Level::High)
    }

    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }

    pub fn interrupts(&self) -> &[HostInterrupt] {
        &self.interrupts
    }

    /// Drain the recorded host interrupts
    pub fn take_interrupts(&mut self) -> Vec<HostInterrupt> {
        std::mem::take(&mut self.interrupts)
    }

    /// Check if nothing is pending: no queued event and no armed match
    pub fn is_quiet(&self) -> bool {
        self.events.is_empty() && self.next_match().is_none()
    }

    /// Fire matches and dispatch events up to and including `deadline`, then
    /// advance the counter to `deadline`. Returns the number of events
    /// dispatched.
    pub fn run_until(
        &mut self,
        deadline: Timestamp,
        handlers: &mut [&mut dyn ChannelHandler],
    ) -> SimResult<usize> {
        if self.now.is_after(deadline) {
            return Err(SimError::TimeReversal { now: self.now, deadline });
        }
        let mut dispatched = 0;
        loop {
            if let Some(event) = self.events.pop_front() {
                dispatched += 1;
                if dispatched > self.event_limit {
                    warn!("event limit {} exceeded at {}", self.event_limit, self.now);
                    return Err(SimError::EventLimit(self.event_limit));
                }
                self.dispatch(&event, handlers);
                continue;
            }
            match self.next_match() {
                Some((at, index, slot)) if !at.is_after(deadline) => self.fire(at, index, slot),
                _ => break,
            }
        }
        self.now = deadline;
        Ok(dispatched)
    }

    /// Run for `duration` ticks from the current time
    pub fn run_for(
        &mut self,
        duration: Ticks,
        handlers: &mut [&mut dyn ChannelHandler],
    ) -> SimResult<usize> {
        let deadline = self.now + duration;
        self.run_until(deadline, handlers)
    }

    fn dispatch(&mut self, event: &ChannelEvent, handlers: &mut [&mut dyn ChannelHandler]) {
        match handlers.iter_mut().find(|handler| handler.owns(event.line)) {
            Some(handler) => {
                trace!("dispatch {}", event);
                handler.handle(self, event);
            }
            None => trace!("unowned {}", event),
        }
    }

    /// Earliest pending match as (effective time, line index, slot)
    fn next_match(&self) -> Option<(Timestamp, usize, MatchSlot)> {
        let now = self.now;
        self.lines
            .iter()
            .enumerate()
            .flat_map(|(index, state)| {
                [MatchSlot::A, MatchSlot::B]
                    .into_iter()
                    .filter_map(move |slot| state.matches[slot.index()].map(|m| (m, index, slot)))
            })
            .map(|(m, index, slot)| {
                let effective = if m.at.is_after(now) { m.at } else { now };
                (effective, m.seq, index, slot)
            })
            .min_by_key(|&(effective, seq, _, _)| (effective, seq))
            .map(|(effective, _, index, slot)| (effective, index, slot))
    }

    fn fire(&mut self, at: Timestamp, index: usize, slot: MatchSlot) {
        self.now = at;
        let line = Line::new(index as u8);
        let state = &mut self.lines[index];
        let Some(pending) = state.matches[slot.index()].take() else {
            return;
        };
        if state.events_enabled {
            self.events.push_back(ChannelEvent::matched(line, slot, at));
        }
        if let Some(level) = pending.action.level() {
            self.drive(line, level);
        }
    }

    fn drive(&mut self, line: Line, level: Level) {
        let Some(state) = self.lines.get_mut(usize::from(line.channel())) else {
            warn!("drive on unknown {}", line);
            return;
        };
        if state.direction != Direction::Output {
            warn!("drive on input {}", line);
            return;
        }
        state.drive = level;
        let wire = state.wire;
        self.resolve(wire);
    }

    /// Recompute a wire from its drivers and raise edge events on a change
    fn resolve(&mut self, wire: WireId) {
        let resolved = if self
            .lines
            .iter()
            .any(|l| l.wire == wire && l.direction == Direction::Output && l.drive.is_low())
        {
            Level::Low
        } else {
            Level::High
        };
        let previous = self.wires[wire.0];
        let Some(edge) = Edge::between(previous, resolved) else {
            return;
        };
        self.wires[wire.0] = resolved;
        self.waveform.record(self.now, wire, resolved);
        trace!("{} {} -> {:?} @{}", self.wire_names[wire.0], wire, resolved, self.now);

        let now = self.now;
        for (index, state) in self.lines.iter_mut().enumerate() {
            if state.wire == wire
                && state.direction == Direction::Input
                && state.events_enabled
                && state.detect.accepts(edge)
            {
                state.detect = EdgeDetect::Disabled;
                self.events
                    .push_back(ChannelEvent::edge(Line::new(index as u8), edge, now));
            }
        }
    }

    fn line_mut(&mut self, line: Line) -> Option<&mut LineState> {
        let state = self.lines.get_mut(usize::from(line.channel()));
        if state.is_none() {
            warn!("unknown {}", line);
        }
        state
    }
}

impl Timeline for SimBus {
    fn tick_rate_hz(&self) -> u32 {
        self.tick_rate_hz
    }

    fn now(&self) -> Timestamp {
        self.now
    }

    fn schedule_match(&mut self, line: Line, slot: MatchSlot, at: Timestamp, action: PinAction) {
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(state) = self.line_mut(line) {
            state.matches[slot.index()] = Some(PendingMatch { at, action, seq });
        }
    }

    fn cancel_matches(&mut self, line: Line) {
        if let Some(state) = self.line_mut(line) {
            state.matches = [None, None];
        }
    }

    fn set_pin(&mut self, line: Line, level: Level) {
        self.drive(line, level);
    }

    fn detect_edge(&mut self, line: Line, detect: EdgeDetect) {
        if let Some(state) = self.line_mut(line) {
            state.detect = detect;
        }
    }

    fn enable_events(&mut self, line: Line) {
        if let Some(state) = self.line_mut(line) {
            state.events_enabled = true;
        }
    }

    fn disable_events(&mut self, line: Line) {
        if let Some(state) = self.line_mut(line) {
            state.events_enabled = false;
        }
    }

    fn read_pin(&self, line: Line) -> Level {
        self.lines
            .get(usize::from(line.channel()))
            .map_or(Level::High, |state| self.wire_level(state.wire))
    }

    fn link(&mut self, line: Line) {
        self.events.push_back(ChannelEvent::link(line, self.now));
    }

    fn signal_host(&mut self, line: Line) {
        debug!("host interrupt from {} @{}", line, self.now);
        self.interrupts.push(HostInterrupt { line, at: self.now });
    }
}
