//! I2C slave engine
//!
//! The slave watches the bus through its SCL and SDA echo inputs and answers
//! through open-drain outputs. It first waits for the bus to be idle for
//! `t_buf` on both lines, then follows START, header, data bytes and the
//! closing STOP or repeated START. Incoming bits are sampled on SCL rising
//! edges; outgoing bits and ACKs are driven right after SCL falls.
//!
//! A STOP or repeated START can only follow an ACK cycle, so after each ACK
//! the slave arms a second SDA watch across the next clock high phase
//! (`*CheckStop2` / `ReadFindStop2`) to tell a bus condition from the first
//! data bit of the next byte.

use log::{debug, trace, warn};
use tpu_core::{
    ChannelEvent, ChannelHandler, Edge, EdgeDetect, EventKind, FlagLatch, Level, Line, MatchSlot,
    PinAction, Ticks, Timeline,
};

use crate::{
    Direction, ErrorFlags, HostSignals, I2cError, I2cLines, I2cResult, BUFFER_CAPACITY, GENERAL_CALL,
    START_BYTE,
};

/// Number of quiet observations (SCL, then SDA) that prove the bus idle
const IDLE_OBSERVATIONS: u8 = 2;

/// How the slave answers a read request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlaveMode {
    /// The read buffer is already loaded; never stall the clock
    #[default]
    DataReady,
    /// Hold SCL low after the read header until the host calls
    /// [`I2cSlave::issue_data_ready`]
    DataWait,
}

/// Slave configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveConfig {
    /// 8-bit address; bit 0 is ignored
    pub address: u8,
    /// Bits of the header compared against `address`
    pub address_mask: u8,
    /// Acknowledge header 0x00
    pub general_call: bool,
    pub mode: SlaveMode,
    /// Data setup time before a released clock rises
    pub setup_time_ns: u32,
    /// Quiet time on both lines before the bus counts as idle
    pub bus_free_time_ns: u32,
}

impl SlaveConfig {
    pub fn builder() -> SlaveConfigBuilder {
        SlaveConfigBuilder::default()
    }
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            address: 0,
            address_mask: 0xFE,
            general_call: false,
            mode: SlaveMode::DataReady,
            setup_time_ns: 1_250,
            bus_free_time_ns: 4_700,
        }
    }
}

/// Builder for [`SlaveConfig`]
#[derive(Debug, Clone, Default)]
pub struct SlaveConfigBuilder {
    config: SlaveConfig,
}

impl SlaveConfigBuilder {
    pub fn address(mut self, address: u8) -> Self {
        self.config.address = address;
        self
    }

    pub fn address_mask(mut self, mask: u8) -> Self {
        self.config.address_mask = mask;
        self
    }

    pub fn general_call(mut self, accept: bool) -> Self {
        self.config.general_call = accept;
        self
    }

    pub fn mode(mut self, mode: SlaveMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn setup_time_ns(mut self, ns: u32) -> Self {
        self.config.setup_time_ns = ns;
        self
    }

    pub fn bus_free_time_ns(mut self, ns: u32) -> Self {
        self.config.bus_free_time_ns = ns;
        self
    }

    pub fn build(self) -> SlaveConfig {
        self.config
    }
}

/// Where the slave is parked between events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaveState {
    /// Waiting for both lines to stay high for `t_buf`
    FindIdle,
    /// Bus idle, waiting for SDA to fall
    Idle,
    /// Transfer for another slave, waiting for its STOP or repeated START
    FindStop,
    /// SDA fell with SCL high, waiting for SCL to fall
    StartSdaLow,
    /// Shifting in the header
    WriteHeader,
    /// Driving ACK on the next SCL fall
    AckOut,
    /// Sampling the master's ACK
    AckIn,
    /// Releasing the ACK slot on the next SCL fall
    AckComplete,
    /// Shifting in a data byte
    WriteByte,
    /// First bit of a written byte, may turn out to be STOP or repeated START
    WriteByteCheckStop,
    /// SDA watched across the clock high phase
    WriteByteCheckStop2,
    /// Shifting out a data byte
    ReadByte,
    /// Master NACKed, waiting for the next clock
    ReadFindStop,
    /// Waiting for STOP or repeated START after a NACK
    ReadFindStop2,
}

#[cfg(feature = "defmt")]
impl defmt::Format for SlaveState {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            SlaveState::FindIdle => defmt::write!(fmt, "FindIdle"),
            SlaveState::Idle => defmt::write!(fmt, "Idle"),
            SlaveState::FindStop => defmt::write!(fmt, "FindStop"),
            SlaveState::StartSdaLow => defmt::write!(fmt, "StartSdaLow"),
            SlaveState::WriteHeader => defmt::write!(fmt, "WriteHeader"),
            SlaveState::AckOut => defmt::write!(fmt, "AckOut"),
            SlaveState::AckIn => defmt::write!(fmt, "AckIn"),
            SlaveState::AckComplete => defmt::write!(fmt, "AckComplete"),
            SlaveState::WriteByte => defmt::write!(fmt, "WriteByte"),
            SlaveState::WriteByteCheckStop => defmt::write!(fmt, "WriteByteCheckStop"),
            SlaveState::WriteByteCheckStop2 => defmt::write!(fmt, "WriteByteCheckStop2"),
            SlaveState::ReadByte => defmt::write!(fmt, "ReadByte"),
            SlaveState::ReadFindStop => defmt::write!(fmt, "ReadFindStop"),
            SlaveState::ReadFindStop2 => defmt::write!(fmt, "ReadFindStop2"),
        }
    }
}

/// Outcome of the last completed transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStatus {
    pub header: u8,
    /// Bytes exchanged, including any beyond the buffer
    pub size: usize,
    /// Running error flags
    pub errors: ErrorFlags,
}

/// Header and size reported by [`I2cSlave::get_write_data`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteData {
    pub header: u8,
    pub size: usize,
}

#[derive(Debug, Clone, Copy)]
struct SlaveTiming {
    t_su_dat: Ticks,
    t_buf: Ticks,
}

/// I2C slave bound to four timeline lines
pub struct I2cSlave {
    lines: I2cLines,
    config: SlaveConfig,
    timing: Option<SlaveTiming>,
    state: SlaveState,
    idle_detect: u8,
    header: u8,
    byte_cnt: usize,
    working_byte: u16,
    bit_cnt: u8,
    working_byte_cnt: usize,
    direction: Direction,
    last_ack: Level,
    holding_clock: bool,
    read_buffer: [u8; BUFFER_CAPACITY],
    read_size: usize,
    write_buffer: [u8; BUFFER_CAPACITY],
    write_size: usize,
    flags: FlagLatch,
    signals: HostSignals,
}

impl I2cSlave {
    /// Create an uninitialized slave with empty buffers
    pub fn new(lines: I2cLines, config: SlaveConfig) -> Self {
        Self {
            lines,
            config,
            timing: None,
            state: SlaveState::FindIdle,
            idle_detect: 0,
            header: 0,
            byte_cnt: 0,
            working_byte: 0,
            bit_cnt: 0,
            working_byte_cnt: 0,
            direction: Direction::Write,
            last_ack: Level::Low,
            holding_clock: false,
            read_buffer: [0; BUFFER_CAPACITY],
            read_size: 0,
            write_buffer: [0; BUFFER_CAPACITY],
            write_size: 0,
            flags: FlagLatch::new(),
            signals: HostSignals::NONE,
        }
    }

    /// Convert the configured times to ticks and start looking for an idle bus
    pub fn init(&mut self, timeline: &mut dyn Timeline) -> I2cResult<()> {
        let rate = timeline.tick_rate_hz();
        let timing = SlaveTiming {
            t_su_dat: Ticks::from_nanos(rate, self.config.setup_time_ns)?,
            t_buf: Ticks::from_nanos(rate, self.config.bus_free_time_ns)?,
        };
        if timing.t_buf.is_zero() {
            return Err(I2cError::InvalidParameter);
        }

        self.quiesce(timeline);
        self.timing = Some(timing);
        self.flags.reset();
        self.signals = HostSignals::NONE;
        self.header = 0;
        self.byte_cnt = 0;

        timeline.enable_events(self.lines.scl_in);
        timeline.enable_events(self.lines.sda_in);
        self.restart_idle_detection(timeline, &timing);
        debug!(
            "slave {:#04x}/{:#04x} init, t_buf {}",
            self.config.address, self.config.address_mask, timing.t_buf
        );
        Ok(())
    }

    /// Stop responding and release both outputs. Re-initialize with `init`.
    pub fn shutdown(&mut self, timeline: &mut dyn Timeline) {
        if !matches!(self.state, SlaveState::FindIdle | SlaveState::Idle) {
            warn!("slave shutdown in state {:?}", self.state);
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
        self.state = SlaveState::FindIdle;
        self.holding_clock = false;
    }

    pub fn state(&self) -> SlaveState {
        self.state
    }

    /// Check if the slave is stalling a read for [`I2cSlave::issue_data_ready`]
    pub fn holding_clock(&self) -> bool {
        self.holding_clock
    }

    /// Load the bytes returned to the master on reads
    pub fn set_read_buffer(&mut self, data: &[u8]) -> I2cResult<()> {
        if data.len() > BUFFER_CAPACITY {
            return Err(I2cError::BufferTooLarge);
        }
        if !self.between_transfers() && !self.holding_clock {
            return Err(I2cError::NotReady);
        }
        self.read_buffer[..data.len()].copy_from_slice(data);
        self.read_size = data.len();
        Ok(())
    }

    /// Accept up to `size` bytes on writes
    pub fn set_write_buffer(&mut self, size: usize) -> I2cResult<()> {
        if size > BUFFER_CAPACITY {
            return Err(I2cError::BufferTooLarge);
        }
        if !self.between_transfers() {
            return Err(I2cError::NotReady);
        }
        self.write_size = size;
        Ok(())
    }

    /// Bytes stored by writes, up to the configured size
    pub fn write_buffer(&self) -> &[u8] {
        &self.write_buffer[..self.write_size]
    }

    fn between_transfers(&self) -> bool {
        matches!(self.state, SlaveState::FindIdle | SlaveState::Idle | SlaveState::FindStop)
    }

    /// Release a read stalled in data-wait mode. Load the read buffer first.
    pub fn issue_data_ready(&mut self, timeline: &mut dyn Timeline) -> I2cResult<()> {
        let timing = self.timing.ok_or(I2cError::NotInitialized)?;
        if !self.holding_clock {
            return Err(I2cError::NotReady);
        }
        self.holding_clock = false;
        self.bit_cnt = 0;
        self.load_read_byte();
        let release = timeline.now() + timing.t_su_dat;
        timeline.schedule_match(self.lines.scl_out, MatchSlot::A, release, PinAction::SetHigh);
        // first bit goes out while the clock is still held
        self.output_data_bit(timeline, &timing);
        debug!("data ready, clock released @{}", release);
        Ok(())
    }

    pub fn get_transfer_status(&self) -> TransferStatus {
        TransferStatus {
            header: self.header,
            size: self.byte_cnt,
            errors: self.running_error_flags(),
        }
    }

    /// Copy the bytes of the last write into `dest`
    ///
    /// At most the configured write size is copied even when the master sent
    /// more; the returned size is the number of bytes the master sent.
    pub fn get_write_data(&self, dest: &mut [u8]) -> I2cResult<WriteData> {
        if self.timing.is_none() {
            return Err(I2cError::NotInitialized);
        }
        if dest.is_empty() {
            return Err(I2cError::InvalidParameter);
        }
        let count = self.byte_cnt.min(self.write_size).min(dest.len());
        dest[..count].copy_from_slice(&self.write_buffer[..count]);
        Ok(WriteData { header: self.header, size: self.byte_cnt })
    }

    pub fn take_signals(&mut self) -> HostSignals {
        core::mem::take(&mut self.signals)
    }

    pub fn running_error_flags(&self) -> ErrorFlags {
        ErrorFlags::from_bits(self.flags.running())
    }

    pub fn clear_running_error_flags(&self) {
        self.flags.clear_running();
    }

    pub fn latch_and_clear_error_flags(&self) -> ErrorFlags {
        ErrorFlags::from_bits(self.flags.latch_and_clear())
    }

    pub fn latched_error_flags(&self) -> ErrorFlags {
        ErrorFlags::from_bits(self.flags.latched())
    }

    pub fn clear_latched_error_flags(&self) {
        self.flags.clear_latched();
    }

    fn notify(&mut self, timeline: &mut dyn Timeline, signal: HostSignals, line: Line) {
        self.signals.insert(signal);
        timeline.signal_host(line);
    }

    fn restart_idle_detection(&mut self, timeline: &mut dyn Timeline, timing: &SlaveTiming) {
        self.state = SlaveState::FindIdle;
        self.idle_detect = 0;
        self.holding_clock = false;
        timeline.set_pin(self.lines.sda_out, Level::High);
        timeline.set_pin(self.lines.scl_out, Level::High);

        let quiet_until = timeline.now() + timing.t_buf;
        timeline.schedule_match(self.lines.scl_in, MatchSlot::A, quiet_until, PinAction::NoChange);
        timeline.schedule_match(self.lines.sda_in, MatchSlot::A, quiet_until, PinAction::NoChange);
        timeline.detect_edge(self.lines.scl_in, EdgeDetect::Any);
        timeline.detect_edge(self.lines.sda_in, EdgeDetect::Any);
    }

    fn idle_check(&mut self, timeline: &mut dyn Timeline, timing: &SlaveTiming, line: Line) {
        if self.state != SlaveState::FindIdle {
            return;
        }
        if timeline.read_pin(line).is_high() {
            self.idle_detect += 1;
            if self.idle_detect >= IDLE_OBSERVATIONS {
                self.state = SlaveState::Idle;
                timeline.detect_edge(self.lines.scl_in, EdgeDetect::Falling);
                timeline.detect_edge(self.lines.sda_in, EdgeDetect::Falling);
                debug!("slave {:#04x}: bus idle @{}", self.config.address, timeline.now());
            }
        } else {
            self.restart_idle_detection(timeline, timing);
        }
    }

    fn on_data_edge(&mut self, timeline: &mut dyn Timeline, timing: &SlaveTiming, edge: Edge) {
        match (self.state, edge) {
            (SlaveState::Idle, Edge::Falling) => {
                timeline.cancel_matches(self.lines.scl_in);
                timeline.cancel_matches(self.lines.sda_in);
                if timeline.read_pin(self.lines.scl_in).is_low() {
                    self.restart_idle_detection(timeline, timing);
                    return;
                }
                self.state = SlaveState::StartSdaLow;
                timeline.detect_edge(self.lines.sda_in, EdgeDetect::Disabled);
                timeline.detect_edge(self.lines.scl_in, EdgeDetect::Falling);
            }
            (SlaveState::FindStop, edge) => self.bystander_data_edge(timeline, edge),
            (SlaveState::WriteByteCheckStop2 | SlaveState::ReadFindStop2, Edge::Rising) => {
                self.found_stop(timeline, timing)
            }
            (SlaveState::WriteByteCheckStop2 | SlaveState::ReadFindStop2, Edge::Falling) => {
                self.found_repeated_start(timeline, timing)
            }
            _ => self.restart_idle_detection(timeline, timing),
        }
    }

    fn on_clock_edge(&mut self, timeline: &mut dyn Timeline, timing: &SlaveTiming) {
        match self.state {
            SlaveState::FindIdle => self.restart_idle_detection(timeline, timing),
            SlaveState::FindStop => {
                trace!("slave {:#04x}: clock edge while waiting for STOP", self.config.address)
            }
            SlaveState::Idle => {
                self.flags.raise(ErrorFlags::INVALID_START.bits());
                warn!("slave {:#04x}: clock moved on an idle bus", self.config.address);
                self.restart_idle_detection(timeline, timing);
            }
            SlaveState::StartSdaLow => self.transfer_start(timeline, timing),
            SlaveState::WriteHeader
            | SlaveState::WriteByte
            | SlaveState::WriteByteCheckStop
            | SlaveState::WriteByteCheckStop2 => self.data_bit_ready(timeline, timing),
            SlaveState::AckOut | SlaveState::AckIn | SlaveState::AckComplete => {
                self.handle_ack(timeline, timing)
            }
            SlaveState::ReadByte | SlaveState::ReadFindStop | SlaveState::ReadFindStop2 => {
                self.output_data_bit(timeline, timing)
            }
        }
    }

    fn transfer_start(&mut self, timeline: &mut dyn Timeline, timing: &SlaveTiming) {
        if timeline.read_pin(self.lines.sda_in).is_high() {
            self.flags.raise(ErrorFlags::INVALID_START.bits());
            warn!("slave {:#04x}: START not confirmed", self.config.address);
            self.restart_idle_detection(timeline, timing);
            return;
        }
        timeline.detect_edge(self.lines.scl_in, EdgeDetect::Rising);
        self.last_ack = Level::Low;
        self.state = SlaveState::WriteHeader;
        self.working_byte = 0;
        self.bit_cnt = 0;
        self.working_byte_cnt = 0;
        trace!("slave {:#04x}: START", self.config.address);
    }

    fn data_bit_ready(&mut self, timeline: &mut dyn Timeline, timing: &SlaveTiming) {
        if self.state == SlaveState::WriteByteCheckStop2 {
            // clock fell with SDA steady: plain data bit
            self.state = SlaveState::WriteByte;
            timeline.detect_edge(self.lines.scl_in, EdgeDetect::Rising);
            timeline.detect_edge(self.lines.sda_in, EdgeDetect::Disabled);
            return;
        }

        let bit = u16::from(timeline.read_pin(self.lines.sda_in).is_high());
        self.working_byte = (self.working_byte << 1) | bit;
        self.bit_cnt += 1;

        if self.state == SlaveState::WriteByteCheckStop {
            self.state = SlaveState::WriteByteCheckStop2;
            timeline.detect_edge(self.lines.sda_in, EdgeDetect::Any);
            timeline.detect_edge(self.lines.scl_in, EdgeDetect::Falling);
            return;
        }
        timeline.detect_edge(self.lines.scl_in, EdgeDetect::Rising);
        if self.bit_cnt < 8 {
            return;
        }

        timeline.detect_edge(self.lines.scl_in, EdgeDetect::Falling);
        let byte = self.working_byte as u8;
        if self.state == SlaveState::WriteHeader {
            self.match_header(timeline, byte);
            return;
        }

        self.working_byte_cnt += 1;
        if self.working_byte_cnt <= self.write_size {
            self.write_buffer[self.working_byte_cnt - 1] = byte;
        } else {
            self.flags.raise(ErrorFlags::BUFFER_OVERFLOW.bits());
            warn!(
                "slave {:#04x}: write byte {} dropped",
                self.config.address, self.working_byte_cnt
            );
        }
        self.state = SlaveState::AckOut;
    }

    fn match_header(&mut self, timeline: &mut dyn Timeline, byte: u8) {
        let addressed = (byte & self.config.address_mask) == self.config.address
            || (byte == GENERAL_CALL && self.config.general_call);
        if addressed {
            self.header = byte;
            self.direction = Direction::from_header(byte);
            self.state = SlaveState::AckOut;
            debug!("slave {:#04x}: addressed by {:#04x}", self.config.address, byte);
        } else if byte == START_BYTE {
            // never acknowledged; wait for the STOP or repeated START after it
            self.header = START_BYTE;
            self.direction = Direction::Read;
            self.state = SlaveState::AckIn;
        } else {
            trace!("slave {:#04x}: header {:#04x} not for us", self.config.address, byte);
            self.wait_for_stop(timeline);
        }
    }

    /// Sit out another slave's transfer. Timed idle detection is not used
    /// here since a clock high phase can outlast `t_buf`.
    fn wait_for_stop(&mut self, timeline: &mut dyn Timeline) {
        self.state = SlaveState::FindStop;
        timeline.set_pin(self.lines.sda_out, Level::High);
        timeline.set_pin(self.lines.scl_out, Level::High);
        timeline.cancel_matches(self.lines.scl_in);
        timeline.cancel_matches(self.lines.sda_in);
        timeline.detect_edge(self.lines.scl_in, EdgeDetect::Disabled);
        timeline.detect_edge(self.lines.sda_in, EdgeDetect::Any);
    }

    /// SDA moved while another slave is addressed; only a change with SCL
    /// high ends the wait
    fn bystander_data_edge(&mut self, timeline: &mut dyn Timeline, edge: Edge) {
        if timeline.read_pin(self.lines.scl_in).is_low() {
            timeline.detect_edge(self.lines.sda_in, EdgeDetect::Any);
            return;
        }
        match edge {
            Edge::Rising => {
                self.state = SlaveState::Idle;
                timeline.detect_edge(self.lines.scl_in, EdgeDetect::Falling);
                timeline.detect_edge(self.lines.sda_in, EdgeDetect::Falling);
            }
            Edge::Falling => {
                self.state = SlaveState::StartSdaLow;
                timeline.detect_edge(self.lines.sda_in, EdgeDetect::Disabled);
                timeline.detect_edge(self.lines.scl_in, EdgeDetect::Falling);
            }
        }
    }

    fn handle_ack(&mut self, timeline: &mut dyn Timeline, timing: &SlaveTiming) {
        match self.state {
            SlaveState::AckOut => {
                timeline.set_pin(self.lines.sda_out, Level::Low);
                self.state = SlaveState::AckComplete;
                timeline.detect_edge(self.lines.scl_in, EdgeDetect::Falling);
            }
            SlaveState::AckIn => {
                self.last_ack = timeline.read_pin(self.lines.sda_in);
                timeline.detect_edge(self.lines.scl_in, EdgeDetect::Falling);
                self.state = SlaveState::AckComplete;
            }
            _ => self.complete_ack(timeline, timing),
        }
    }

    fn complete_ack(&mut self, timeline: &mut dyn Timeline, timing: &SlaveTiming) {
        let data_wait = self.config.mode == SlaveMode::DataWait
            && self.working_byte_cnt == 0
            && self.direction == Direction::Read
            && self.header != START_BYTE;

        if data_wait {
            self.holding_clock = true;
            timeline.set_pin(self.lines.scl_out, Level::Low);
            self.notify(timeline, HostSignals::DATA_REQUEST, self.lines.scl_in);
            self.state = SlaveState::ReadByte;
            self.working_byte_cnt = 1;
            self.bit_cnt = 0;
            timeline.detect_edge(self.lines.scl_in, EdgeDetect::Falling);
            debug!("slave {:#04x}: holding clock for data", self.config.address);
            return;
        }

        match self.direction {
            Direction::Write => {
                timeline.detect_edge(self.lines.scl_in, EdgeDetect::Rising);
                self.state = SlaveState::WriteByteCheckStop;
                self.bit_cnt = 0;
                self.working_byte = 0;
                timeline.set_pin(self.lines.sda_out, Level::High);
            }
            Direction::Read if self.last_ack.is_high() => {
                timeline.detect_edge(self.lines.scl_in, EdgeDetect::Rising);
                self.state = SlaveState::ReadFindStop;
            }
            Direction::Read => {
                self.state = SlaveState::ReadByte;
                self.bit_cnt = 0;
                self.working_byte_cnt += 1;
                self.load_read_byte();
                self.output_data_bit(timeline, timing);
            }
        }
    }

    /// Load the next read byte with a trailing release bit for the ACK slot
    fn load_read_byte(&mut self) {
        let byte = if self.working_byte_cnt <= self.read_size {
            self.read_buffer[self.working_byte_cnt - 1]
        } else {
            self.flags.raise(ErrorFlags::BUFFER_OVERFLOW.bits());
            warn!(
                "slave {:#04x}: read byte {} past buffer",
                self.config.address, self.working_byte_cnt
            );
            0
        };
        self.working_byte = (u16::from(byte) << 8) | 0x80;
    }

    fn output_data_bit(&mut self, timeline: &mut dyn Timeline, timing: &SlaveTiming) {
        match self.state {
            SlaveState::ReadFindStop => {
                timeline.detect_edge(self.lines.scl_in, EdgeDetect::Falling);
                self.state = SlaveState::ReadFindStop2;
                timeline.detect_edge(self.lines.sda_in, EdgeDetect::Any);
                return;
            }
            SlaveState::ReadFindStop2 => {
                self.flags.raise(ErrorFlags::STOP_FAILED.bits());
                warn!("slave {:#04x}: no STOP after NACK", self.config.address);
                self.notify(timeline, HostSignals::TRANSFER_ABORTED, self.lines.scl_in);
                self.restart_idle_detection(timeline, timing);
                return;
            }
            _ => {}
        }

        let level = Level::from(self.working_byte & 0x8000 != 0);
        timeline.set_pin(self.lines.sda_out, level);
        self.working_byte <<= 1;
        self.bit_cnt += 1;
        if self.bit_cnt == 9 {
            self.state = SlaveState::AckIn;
            timeline.detect_edge(self.lines.scl_in, EdgeDetect::Rising);
        } else {
            timeline.detect_edge(self.lines.scl_in, EdgeDetect::Falling);
        }
    }

    fn found_stop(&mut self, timeline: &mut dyn Timeline, timing: &SlaveTiming) {
        self.byte_cnt = self.working_byte_cnt;
        self.notify(timeline, HostSignals::TRANSFER_COMPLETE, self.lines.sda_in);
        if timeline.read_pin(self.lines.scl_in).is_low() {
            self.flags.raise(ErrorFlags::STOP_FAILED.bits());
            warn!("slave {:#04x}: SDA rose with SCL low", self.config.address);
            self.restart_idle_detection(timeline, timing);
            return;
        }
        self.state = SlaveState::Idle;
        timeline.detect_edge(self.lines.scl_in, EdgeDetect::Falling);
        timeline.detect_edge(self.lines.sda_in, EdgeDetect::Falling);
        debug!(
            "slave {:#04x}: STOP, header {:#04x}, {} byte(s)",
            self.config.address, self.header, self.byte_cnt
        );
    }

    fn found_repeated_start(&mut self, timeline: &mut dyn Timeline, timing: &SlaveTiming) {
        self.byte_cnt = self.working_byte_cnt;
        self.notify(timeline, HostSignals::TRANSFER_COMPLETE, self.lines.sda_in);
        timeline.detect_edge(self.lines.sda_in, EdgeDetect::Disabled);
        if timeline.read_pin(self.lines.scl_in).is_low() {
            self.flags.raise(ErrorFlags::INVALID_START.bits());
            warn!("slave {:#04x}: SDA fell with SCL low", self.config.address);
            self.restart_idle_detection(timeline, timing);
            return;
        }
        self.state = SlaveState::StartSdaLow;
        timeline.detect_edge(self.lines.scl_in, EdgeDetect::Falling);
        trace!("slave {:#04x}: repeated START", self.config.address);
    }
}

impl ChannelHandler for I2cSlave {
    fn owns(&self, line: Line) -> bool {
        self.lines.contains(line)
    }

    fn handle(&mut self, timeline: &mut dyn Timeline, event: &ChannelEvent) {
        let Some(timing) = self.timing else {
            return;
        };
        let lines = self.lines;
        match event.kind {
            EventKind::Match(_) if event.line == lines.scl_in || event.line == lines.sda_in => {
                self.idle_check(timeline, &timing, event.line)
            }
            EventKind::Edge(edge) if event.line == lines.sda_in => {
                self.on_data_edge(timeline, &timing, edge)
            }
            EventKind::Edge(_) if event.line == lines.scl_in => self.on_clock_edge(timeline, &timing),
            _ => trace!("slave ignored {}", event),
        }
    }
}
