//! I2C master engine
//!
//! The master owns SCL and SDA drivers plus their echo inputs. A transfer is
//! a list of [`TransferCommand`]s: START, then for each command the header
//! and its payload bytes, a repeated START between commands and a STOP after
//! the last one.
//!
//! Clocking is driven by the SCL echo. Every rising edge schedules the next
//! low/high pair relative to the previous commanded rising edge; when the
//! observed edge lags that prediction by more than `tr_max` (a slave is
//! stretching the clock) the prediction moves to the observed edge. Data
//! changes are scheduled `t_hd_dat` after SCL falls, so SDA only ever moves
//! while SCL is low except for START and STOP.

use heapless::Vec;
use log::{debug, trace, warn};
use tpu_core::{
    ChannelEvent, ChannelHandler, Edge, EdgeDetect, EventKind, FlagLatch, Level, Line, MatchSlot,
    PinAction, Timeline, Timestamp,
};

use crate::{
    BusTiming, Direction, ErrorFlags, HostSignals, I2cError, I2cLines, I2cResult, TimingOverride,
    TransferCommand, MAX_COMMANDS,
};

/// Standard-mode bit rate
pub const DEFAULT_BIT_RATE_HZ: u32 = 100_000;

/// Master configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterConfig {
    pub bit_rate_hz: u32,
}

impl MasterConfig {
    pub fn builder() -> MasterConfigBuilder {
        MasterConfigBuilder::default()
    }
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self { bit_rate_hz: DEFAULT_BIT_RATE_HZ }
    }
}

/// Builder for [`MasterConfig`]
#[derive(Debug, Clone, Default)]
pub struct MasterConfigBuilder {
    config: MasterConfig,
}

impl MasterConfigBuilder {
    pub fn bit_rate(mut self, hz: u32) -> Self {
        self.config.bit_rate_hz = hz;
        self
    }

    pub fn build(self) -> MasterConfig {
        self.config
    }
}

/// Where the master is parked between events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterState {
    /// No transfer in flight
    Idle,
    /// START (or repeated START) scheduled, waiting for its SCL marker match
    StartPulse,
    /// Shifting header or data bits on each SCL rising edge
    PulseClock,
    /// ACK clock scheduled, waiting for its rising edge
    ProcessAck,
    /// ACK sampled, deciding the next step on the linked event
    AckDecision,
    /// Clock released for a repeated START
    RepeatedStart,
    /// Last clock released, waiting for its rising edge to place STOP
    Stop,
    /// STOP scheduled, waiting for its SCL marker match
    StopComplete,
}

#[cfg(feature = "defmt")]
impl defmt::Format for MasterState {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            MasterState::Idle => defmt::write!(fmt, "Idle"),
            MasterState::StartPulse => defmt::write!(fmt, "StartPulse"),
            MasterState::PulseClock => defmt::write!(fmt, "PulseClock"),
            MasterState::ProcessAck => defmt::write!(fmt, "ProcessAck"),
            MasterState::AckDecision => defmt::write!(fmt, "AckDecision"),
            MasterState::RepeatedStart => defmt::write!(fmt, "RepeatedStart"),
            MasterState::Stop => defmt::write!(fmt, "Stop"),
            MasterState::StopComplete => defmt::write!(fmt, "StopComplete"),
        }
    }
}

/// I2C master bound to four timeline lines
pub struct I2cMaster {
    lines: I2cLines,
    config: MasterConfig,
    timing: Option<BusTiming>,
    state: MasterState,
    in_use: bool,
    start_pending: bool,
    commands: Vec<TransferCommand, MAX_COMMANDS>,
    cmd_index: usize,
    cursor: usize,
    working_byte: u8,
    bit_count: u8,
    remaining: usize,
    direction: Direction,
    command_direction: Direction,
    pulse_edge_next: Timestamp,
    flags: FlagLatch,
    transfer_flags: ErrorFlags,
    signals: HostSignals,
}

impl I2cMaster {
    /// Create an uninitialized master. Call [`I2cMaster::init`] before use.
    pub fn new(lines: I2cLines, config: MasterConfig) -> Self {
        Self {
            lines,
            config,
            timing: None,
            state: MasterState::Idle,
            in_use: false,
            start_pending: false,
            commands: Vec::new(),
            cmd_index: 0,
            cursor: 0,
            working_byte: 0,
            bit_count: 0,
            remaining: 0,
            direction: Direction::Write,
            command_direction: Direction::Write,
            pulse_edge_next: Timestamp::ZERO,
            flags: FlagLatch::new(),
            transfer_flags: ErrorFlags::NONE,
            signals: HostSignals::NONE,
        }
    }

    /// Derive timing from the timeline's tick rate and put the lines in
    /// their idle configuration. Can be called again after `shutdown`.
    pub fn init(&mut self, timeline: &mut dyn Timeline) -> I2cResult<()> {
        let timing = BusTiming::from_bit_rate(timeline.tick_rate_hz(), self.config.bit_rate_hz)?;
        self.quiesce(timeline);
        self.timing = Some(timing);
        self.flags.reset();
        self.transfer_flags = ErrorFlags::NONE;
        self.signals = HostSignals::NONE;

        timeline.enable_events(self.lines.scl_out);
        timeline.detect_edge(self.lines.scl_in, EdgeDetect::Rising);
        debug!(
            "master init: {} Hz, bit period {}",
            self.config.bit_rate_hz,
            timing.bit_period()
        );
        Ok(())
    }

    /// Disable event handling on all lines, release both outputs and drop
    /// any transfer in flight. The engine stays allocated and can be
    /// re-initialized.
    pub fn shutdown(&mut self, timeline: &mut dyn Timeline) {
        if self.in_use {
            warn!("master shutdown aborts transfer in state {:?}", self.state);
        }
        self.quiesce(timeline);
        self.timing = None;
    }

    fn quiesce(&mut self, timeline: &mut dyn Timeline) {
        for line in self.lines.all() {
            timeline.disable_events(line);
            timeline.cancel_matches(line);
        }
        timeline.detect_edge(self.lines.scl_in, EdgeDetect::Disabled);
        timeline.detect_edge(self.lines.sda_in, EdgeDetect::Disabled);
        timeline.set_pin(self.lines.scl_out, Level::High);
        timeline.set_pin(self.lines.sda_out, Level::High);

        self.in_use = false;
        self.start_pending = false;
        self.state = MasterState::Idle;
        self.commands.clear();
    }

    /// Override individual timing parameters, given in nanoseconds
    pub fn set_timing(&mut self, timeline: &dyn Timeline, timing: &TimingOverride) -> I2cResult<()> {
        let current = self.timing.ok_or(I2cError::NotInitialized)?;
        if self.in_use {
            return Err(I2cError::Busy);
        }
        self.timing = Some(current.with_override(timeline.tick_rate_hz(), timing)?);
        Ok(())
    }

    pub fn timing(&self) -> Option<&BusTiming> {
        self.timing.as_ref()
    }

    pub fn state(&self) -> MasterState {
        self.state
    }

    /// Check if a transfer is in flight
    pub fn in_use(&self) -> bool {
        self.in_use
    }

    /// Write `data` to the device at `address`
    pub fn transmit(&mut self, timeline: &mut dyn Timeline, address: u8, data: &[u8]) -> I2cResult<()> {
        let mut commands = Vec::new();
        push_command(&mut commands, TransferCommand::write(address, data)?)?;
        self.start_transfer(timeline, commands)
    }

    /// Read `len` bytes from the device at `address`. The bytes are available
    /// through [`I2cMaster::read_data`] once the transfer completes.
    pub fn receive(&mut self, timeline: &mut dyn Timeline, address: u8, len: usize) -> I2cResult<()> {
        let mut commands = Vec::new();
        push_command(&mut commands, TransferCommand::read(address, len)?)?;
        self.start_transfer(timeline, commands)
    }

    /// Two legs joined by a repeated START. The direction of each leg comes
    /// from its header; a read leg receives `buf.len()` bytes.
    pub fn combined_transfer(
        &mut self,
        timeline: &mut dyn Timeline,
        header1: u8,
        buf1: &[u8],
        header2: u8,
        buf2: &[u8],
    ) -> I2cResult<()> {
        let mut commands = Vec::new();
        push_command(&mut commands, TransferCommand::new(header1, buf1)?)?;
        push_command(&mut commands, TransferCommand::new(header2, buf2)?)?;
        self.start_transfer(timeline, commands)
    }

    /// Run an arbitrary command list as one combined transfer
    pub fn raw_transfer(&mut self, timeline: &mut dyn Timeline, commands: &[TransferCommand]) -> I2cResult<()> {
        if commands.is_empty() {
            return Err(I2cError::NoCommands);
        }
        let commands = Vec::from_slice(commands).map_err(|_| I2cError::TooManyCommands)?;
        self.start_transfer(timeline, commands)
    }

    /// Command `index` of the current or last transfer
    pub fn command(&self, index: usize) -> Option<&TransferCommand> {
        self.commands.get(index)
    }

    /// Bytes received by the last read leg of the current or last transfer
    pub fn read_data(&self) -> Option<&[u8]> {
        self.commands
            .iter()
            .rev()
            .find(|cmd| cmd.direction() == Direction::Read)
            .map(TransferCommand::data)
    }

    /// Poll for completion of the last transfer
    pub fn poll(&self) -> nb::Result<(), I2cError> {
        if self.timing.is_none() {
            return Err(nb::Error::Other(I2cError::NotInitialized));
        }
        if self.in_use {
            return Err(nb::Error::WouldBlock);
        }
        if self.transfer_flags.contains(ErrorFlags::ACK_FAILED) {
            return Err(nb::Error::Other(I2cError::Nack));
        }
        Ok(())
    }

    /// Consume pending host notifications
    pub fn take_signals(&mut self) -> HostSignals {
        core::mem::take(&mut self.signals)
    }

    pub fn running_error_flags(&self) -> ErrorFlags {
        ErrorFlags::from_bits(self.flags.running())
    }

    pub fn clear_running_error_flags(&self) {
        self.flags.clear_running();
    }

    /// Move the running flags into the latched register atomically
    pub fn latch_and_clear_error_flags(&self) -> ErrorFlags {
        ErrorFlags::from_bits(self.flags.latch_and_clear())
    }

    pub fn latched_error_flags(&self) -> ErrorFlags {
        ErrorFlags::from_bits(self.flags.latched())
    }

    pub fn clear_latched_error_flags(&self) {
        self.flags.clear_latched();
    }

    fn raise(&mut self, flag: ErrorFlags) {
        self.flags.raise(flag.bits());
        self.transfer_flags.insert(flag);
    }

    fn start_transfer(
        &mut self,
        timeline: &mut dyn Timeline,
        commands: Vec<TransferCommand, MAX_COMMANDS>,
    ) -> I2cResult<()> {
        let timing = self.timing.ok_or(I2cError::NotInitialized)?;
        if self.in_use {
            self.flags.raise(ErrorFlags::BUSY.bits());
            warn!("master: transfer requested while busy");
            timeline.signal_host(self.lines.scl_out);
            return Err(I2cError::Busy);
        }
        if commands.is_empty() {
            return Err(I2cError::NoCommands);
        }

        self.commands = commands;
        self.cmd_index = 0;
        self.load_command();
        self.in_use = true;
        self.start_pending = true;
        self.transfer_flags = ErrorFlags::NONE;

        let start = timeline.now() + timing.t_buf;
        self.pulse_edge_next = start;
        // SDA first: the marker's handler reuses the SDA slot
        timeline.schedule_match(self.lines.sda_out, MatchSlot::A, start, PinAction::SetLow);
        timeline.schedule_match(self.lines.scl_out, MatchSlot::A, start, PinAction::NoChange);
        timeline.enable_events(self.lines.scl_in);
        timeline.detect_edge(self.lines.scl_in, EdgeDetect::Rising);
        self.state = MasterState::StartPulse;

        debug!(
            "START @{} header {:#04x}, {} command(s)",
            start,
            self.working_byte,
            self.commands.len()
        );
        Ok(())
    }

    fn load_command(&mut self) {
        let Some(cmd) = self.commands.get(self.cmd_index) else {
            return;
        };
        self.working_byte = cmd.header();
        self.bit_count = 8;
        self.command_direction = cmd.direction();
        self.remaining = cmd.len();
        self.cursor = 0;
        // the header itself is always written
        self.direction = Direction::Write;
    }

    fn current_len(&self) -> usize {
        self.commands.get(self.cmd_index).map_or(0, TransferCommand::len)
    }

    /// Adopt an observed edge as the new baseline when it lags the
    /// commanded one by more than `tr_max`
    fn track_stretch(&mut self, timing: &BusTiming, edge_at: Timestamp) {
        if edge_at.is_after(self.pulse_edge_next)
            && edge_at.elapsed_since(self.pulse_edge_next) > u64::from(timing.tr_max.raw())
        {
            trace!("clock stretched: expected {}, seen {}", self.pulse_edge_next, edge_at);
            self.pulse_edge_next = edge_at;
        }
    }

    /// Schedule one SCL low/high pair starting at `fall`
    fn clock_pulse(&mut self, timeline: &mut dyn Timeline, timing: &BusTiming, fall: Timestamp) {
        let rise = fall + timing.t_low;
        timeline.schedule_match(self.lines.scl_out, MatchSlot::A, fall, PinAction::SetLow);
        timeline.schedule_match(self.lines.scl_out, MatchSlot::B, rise, PinAction::SetHigh);
        self.pulse_edge_next = rise;
    }

    fn shift_out(&mut self) -> Level {
        let msb = self.working_byte & 0x80 != 0;
        self.working_byte <<= 1;
        Level::from(msb)
    }

    fn shift_in(&mut self, timeline: &dyn Timeline) {
        let bit = u8::from(timeline.read_pin(self.lines.sda_in).is_high());
        self.working_byte = (self.working_byte << 1) | bit;
    }

    fn on_clock_match(&mut self, timeline: &mut dyn Timeline, timing: &BusTiming, at: Timestamp) {
        match self.state {
            MasterState::StartPulse if self.start_pending => {
                self.start_pending = false;
                self.state = MasterState::PulseClock;
                self.pulse_clock(timeline, timing, at);
            }
            MasterState::StopComplete => self.finish_stop(timeline),
            _ => {}
        }
    }

    fn pulse_clock(&mut self, timeline: &mut dyn Timeline, timing: &BusTiming, at: Timestamp) {
        self.track_stretch(timing, at);
        let fall = self.pulse_edge_next + timing.t_high;
        let data_at = fall + timing.t_hd_dat;
        self.clock_pulse(timeline, timing, fall);
        timeline.detect_edge(self.lines.scl_in, EdgeDetect::Rising);

        if self.bit_count == 0 {
            match self.direction {
                Direction::Write => {
                    // release SDA for the receiver's ACK
                    timeline.schedule_match(self.lines.sda_out, MatchSlot::A, data_at, PinAction::SetHigh);
                }
                Direction::Read => {
                    let ack = if self.remaining > 0 { PinAction::SetLow } else { PinAction::SetHigh };
                    timeline.schedule_match(self.lines.sda_out, MatchSlot::A, data_at, ack);
                    self.shift_in(timeline);
                }
            }
            self.state = MasterState::ProcessAck;
            return;
        }

        self.bit_count -= 1;
        match self.direction {
            Direction::Write => {
                let bit = self.shift_out();
                timeline.schedule_match(self.lines.sda_out, MatchSlot::A, data_at, PinAction::drive(bit));
            }
            Direction::Read => self.shift_in(timeline),
        }
    }

    fn process_ack(&mut self, timeline: &mut dyn Timeline, timing: &BusTiming, at: Timestamp) {
        self.track_stretch(timing, at);
        match self.direction {
            Direction::Write => {
                // the ACK of the final data byte is not checked
                if self.remaining > 0 || self.current_len() == 0 {
                    if timeline.read_pin(self.lines.sda_in).is_high() {
                        warn!(
                            "NACK on command {} with {} byte(s) left",
                            self.cmd_index, self.remaining
                        );
                        self.raise(ErrorFlags::ACK_FAILED);
                        self.remaining = 0;
                    }
                }
            }
            Direction::Read => {
                let byte = self.working_byte;
                let cursor = self.cursor;
                if let Some(cmd) = self.commands.get_mut(self.cmd_index) {
                    cmd.store(cursor, byte);
                }
                self.cursor += 1;
            }
        }
        self.state = MasterState::AckDecision;
        timeline.link(self.lines.scl_in);
    }

    fn decide_after_ack(&mut self, timeline: &mut dyn Timeline, timing: &BusTiming) {
        let fall = self.pulse_edge_next + timing.t_high;
        let data_at = fall + timing.t_hd_dat;
        timeline.detect_edge(self.lines.scl_in, EdgeDetect::Rising);

        if self.remaining > 0 {
            self.clock_pulse(timeline, timing, fall);
            self.direction = self.command_direction;
            match self.direction {
                Direction::Write => {
                    let byte = self.commands.get(self.cmd_index).map_or(0, |cmd| cmd.byte(self.cursor));
                    self.cursor += 1;
                    self.working_byte = byte;
                    let bit = self.shift_out();
                    timeline.schedule_match(self.lines.sda_out, MatchSlot::A, data_at, PinAction::drive(bit));
                }
                Direction::Read => {
                    timeline.schedule_match(self.lines.sda_out, MatchSlot::A, data_at, PinAction::SetHigh);
                }
            }
            self.remaining -= 1;
            self.bit_count = 7;
            self.state = MasterState::PulseClock;
        } else if self.cmd_index + 1 < self.commands.len() {
            self.clock_pulse(timeline, timing, fall);
            timeline.schedule_match(self.lines.sda_out, MatchSlot::A, data_at, PinAction::SetHigh);
            self.cmd_index += 1;
            self.load_command();
            self.state = MasterState::RepeatedStart;
            trace!("repeated START for command {}", self.cmd_index);
        } else {
            // the marker matches of the final clock must not reach this engine
            timeline.disable_events(self.lines.scl_out);
            self.clock_pulse(timeline, timing, fall);
            timeline.schedule_match(self.lines.sda_out, MatchSlot::A, data_at, PinAction::SetLow);
            self.state = MasterState::Stop;
        }
    }

    fn finish_repeated_start(&mut self, timeline: &mut dyn Timeline, timing: &BusTiming, at: Timestamp) {
        self.pulse_edge_next = at;
        let restart = at + timing.t_su_sta;
        timeline.schedule_match(self.lines.sda_out, MatchSlot::A, restart, PinAction::SetLow);
        timeline.schedule_match(self.lines.scl_out, MatchSlot::A, restart, PinAction::NoChange);
        self.start_pending = true;
        self.state = MasterState::StartPulse;
    }

    fn begin_stop(&mut self, timeline: &mut dyn Timeline, timing: &BusTiming, at: Timestamp) {
        timeline.disable_events(self.lines.scl_in);
        self.pulse_edge_next = at;
        timeline.enable_events(self.lines.scl_out);
        let stop = at + timing.t_su_sto;
        timeline.schedule_match(self.lines.sda_out, MatchSlot::A, stop, PinAction::SetHigh);
        timeline.schedule_match(self.lines.scl_out, MatchSlot::A, stop, PinAction::SetHigh);
        self.state = MasterState::StopComplete;
    }

    fn finish_stop(&mut self, timeline: &mut dyn Timeline) {
        self.in_use = false;
        self.state = MasterState::Idle;
        self.signals.insert(HostSignals::TRANSFER_COMPLETE);
        timeline.signal_host(self.lines.scl_out);
        debug!("STOP @{}, flags {}", timeline.now(), self.transfer_flags);
    }
}

fn push_command(
    commands: &mut Vec<TransferCommand, MAX_COMMANDS>,
    command: TransferCommand,
) -> I2cResult<()> {
    commands.push(command).map_err(|_| I2cError::TooManyCommands)
}

impl ChannelHandler for I2cMaster {
    fn owns(&self, line: Line) -> bool {
        self.lines.contains(line)
    }

    fn handle(&mut self, timeline: &mut dyn Timeline, event: &ChannelEvent) {
        let Some(timing) = self.timing else {
            trace!("master not initialized, dropping {}", event);
            return;
        };
        let lines = self.lines;
        match event.kind {
            EventKind::Match(_) if event.line == lines.scl_out => {
                self.on_clock_match(timeline, &timing, event.at)
            }
            EventKind::Edge(Edge::Rising) if event.line == lines.scl_in => match self.state {
                MasterState::PulseClock => self.pulse_clock(timeline, &timing, event.at),
                MasterState::ProcessAck => self.process_ack(timeline, &timing, event.at),
                MasterState::RepeatedStart => self.finish_repeated_start(timeline, &timing, event.at),
                MasterState::Stop => self.begin_stop(timeline, &timing, event.at),
                state => trace!("clock edge ignored in {:?}", state),
            },
            EventKind::Link if event.line == lines.scl_in && self.state == MasterState::AckDecision => {
                self.decide_after_ack(timeline, &timing)
            }
            _ => trace!("master ignored {}", event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines() -> I2cLines {
        I2cLines {
            scl_out: Line(0),
            scl_in: Line(1),
            sda_out: Line(2),
            sda_in: Line(3),
        }
    }

    #[test]
    fn test_config_builder() {
        let config = MasterConfig::builder().bit_rate(400_000).build();
        assert_eq!(config.bit_rate_hz, 400_000);
        assert_eq!(MasterConfig::default().bit_rate_hz, DEFAULT_BIT_RATE_HZ);
    }

    #[test]
    fn test_uninitialized_master_rejects_requests() {
        let master = I2cMaster::new(lines(), MasterConfig::default());
        assert_eq!(master.state(), MasterState::Idle);
        assert!(!master.in_use());
        assert_eq!(master.poll(), Err(nb::Error::Other(I2cError::NotInitialized)));
        assert!(master.read_data().is_none());
    }

    fn bus_with_master(config: MasterConfig) -> (tpu_sim::SimBus, I2cMaster) {
        let mut bus = tpu_sim::SimBus::new(100_000_000);
        let scl = bus.add_wire("SCL");
        let sda = bus.add_wire("SDA");
        let lines = I2cLines {
            scl_out: bus.add_output(scl).unwrap(),
            scl_in: bus.add_input(scl).unwrap(),
            sda_out: bus.add_output(sda).unwrap(),
            sda_in: bus.add_input(sda).unwrap(),
        };
        (bus, I2cMaster::new(lines, config))
    }

    #[test]
    fn test_init_rejects_bad_bit_rate() {
        for rate in [0, 500_000] {
            let (mut bus, mut master) = bus_with_master(MasterConfig::builder().bit_rate(rate).build());
            assert_eq!(master.init(&mut bus), Err(I2cError::InvalidParameter));
            assert!(master.timing().is_none());
        }
    }

    #[test]
    fn test_init_derives_timing() {
        let (mut bus, mut master) = bus_with_master(MasterConfig::default());
        master.init(&mut bus).unwrap();
        let timing = master.timing().copied().unwrap();
        assert_eq!(timing.bit_period().raw(), 1_000);
        assert_eq!(timing.t_hd_dat.raw(), 50);
        assert_eq!(master.poll(), Ok(()));
    }

    #[test]
    fn test_requests_before_init() {
        let (mut bus, mut master) = bus_with_master(MasterConfig::default());
        assert_eq!(master.transmit(&mut bus, 0x64, &[1]), Err(I2cError::NotInitialized));
        assert_eq!(
            master.set_timing(&bus, &TimingOverride::default()),
            Err(I2cError::NotInitialized)
        );
    }

    #[test]
    fn test_command_list_limits() {
        let (mut bus, mut master) = bus_with_master(MasterConfig::default());
        master.init(&mut bus).unwrap();
        assert_eq!(master.raw_transfer(&mut bus, &[]), Err(I2cError::NoCommands));

        let command = TransferCommand::write(0x64, &[1]).unwrap();
        let commands: std::vec::Vec<_> = (0..=MAX_COMMANDS).map(|_| command.clone()).collect();
        assert_eq!(master.raw_transfer(&mut bus, &commands), Err(I2cError::TooManyCommands));
        assert_eq!(master.receive(&mut bus, 0x64, 65), Err(I2cError::BufferTooLarge));
        assert!(!master.in_use());
    }

    #[test]
    fn test_empty_read_leg_rejected() {
        let (mut bus, mut master) = bus_with_master(MasterConfig::default());
        master.init(&mut bus).unwrap();
        assert_eq!(master.receive(&mut bus, 0x64, 0), Err(I2cError::InvalidParameter));
        assert_eq!(
            master.combined_transfer(&mut bus, 0x64, &[1], 0x65, &[]),
            Err(I2cError::InvalidParameter)
        );
        assert!(!master.in_use());
        assert!(master.running_error_flags().is_empty());
    }

    #[test]
    fn test_busy_request_interrupts_host() {
        let (mut bus, mut master) = bus_with_master(MasterConfig::default());
        master.init(&mut bus).unwrap();
        master.transmit(&mut bus, 0x64, &[1]).unwrap();
        assert!(bus.interrupts().is_empty());

        assert_eq!(master.receive(&mut bus, 0x64, 1), Err(I2cError::Busy));
        assert_eq!(bus.interrupts().len(), 1);
        assert_eq!(bus.interrupts()[0].line, master.lines.scl_out);
        assert!(master.running_error_flags().contains(ErrorFlags::BUSY));
        // the transfer in flight is untouched
        assert_eq!(master.command(0).map(TransferCommand::header), Some(0x64));
    }

    #[test]
    fn test_transfer_start_parks_in_start_pulse() {
        let (mut bus, mut master) = bus_with_master(MasterConfig::default());
        master.init(&mut bus).unwrap();
        master.receive(&mut bus, 0x64, 2).unwrap();

        assert!(master.in_use());
        assert_eq!(master.state(), MasterState::StartPulse);
        assert_eq!(master.command(0).map(TransferCommand::header), Some(0x65));
        assert_eq!(master.read_data(), Some(&[0, 0][..]));
        assert_eq!(master.poll(), Err(nb::Error::WouldBlock));

        master.shutdown(&mut bus);
        assert!(!master.in_use());
        assert!(master.command(0).is_none());
    }

    #[test]
    fn test_owns_its_four_lines() {
        let master = I2cMaster::new(lines(), MasterConfig::default());
        assert!(master.owns(Line(0)));
        assert!(master.owns(Line(3)));
        assert!(!master.owns(Line(4)));
    }
}
