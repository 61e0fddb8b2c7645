//! Shared bus rig: one master and two slaves on a simulated SCL/SDA pair

#![allow(dead_code)]

use tpu_core::{ChannelHandler, Level, Line, Ticks, Timeline};
use tpu_i2c::{I2cLines, I2cMaster, I2cSlave, MasterConfig, SlaveConfig, SlaveMode};
use tpu_sim::{BusCondition, SimBus, WireId};

/// Timebase of the rig, 10 ns per tick
pub const TICK_RATE_HZ: u32 = 100_000_000;

pub const SLAVE1_ADDRESS: u8 = 0x64;
pub const SLAVE1_MASK: u8 = 0xFE;
pub const SLAVE2_ADDRESS: u8 = 0x70;
pub const SLAVE2_MASK: u8 = 0xF0;

/// Upper bound on the simulated time of one transfer
const TRANSFER_LIMIT_TICKS: u32 = 10_000_000;
const STEP_TICKS: u32 = 1_000;
/// Length of each phase of the bit-banged stimulus
const BANG_PHASE_TICKS: u32 = 500;

pub struct Rig {
    pub bus: SimBus,
    pub scl: WireId,
    pub sda: WireId,
    pub master: I2cMaster,
    pub master_lines: I2cLines,
    pub slave1: I2cSlave,
    pub slave1_lines: I2cLines,
    pub slave2: I2cSlave,
    /// Stimulus drivers owned by no engine
    pub ext_scl: Line,
    pub ext_sda: Line,
}

fn attach(bus: &mut SimBus, scl: WireId, sda: WireId) -> I2cLines {
    I2cLines {
        scl_out: bus.add_output(scl).unwrap(),
        scl_in: bus.add_input(scl).unwrap(),
        sda_out: bus.add_output(sda).unwrap(),
        sda_in: bus.add_input(sda).unwrap(),
    }
}

impl Rig {
    pub fn new() -> Self {
        Self::with_slave1_mode(SlaveMode::DataReady)
    }

    /// Build the rig, initialize every engine and let the slaves find the
    /// bus idle
    pub fn with_slave1_mode(mode: SlaveMode) -> Self {
        let mut bus = SimBus::new(TICK_RATE_HZ);
        let scl = bus.add_wire("SCL");
        let sda = bus.add_wire("SDA");

        let master_lines = attach(&mut bus, scl, sda);
        let slave1_lines = attach(&mut bus, scl, sda);
        let slave2_lines = attach(&mut bus, scl, sda);
        let ext_scl = bus.add_output(scl).unwrap();
        let ext_sda = bus.add_output(sda).unwrap();

        let mut master = I2cMaster::new(master_lines, MasterConfig::default());
        let mut slave1 = I2cSlave::new(
            slave1_lines,
            SlaveConfig::builder()
                .address(SLAVE1_ADDRESS)
                .address_mask(SLAVE1_MASK)
                .general_call(true)
                .mode(mode)
                .build(),
        );
        let mut slave2 = I2cSlave::new(
            slave2_lines,
            SlaveConfig::builder()
                .address(SLAVE2_ADDRESS)
                .address_mask(SLAVE2_MASK)
                .general_call(true)
                .build(),
        );
        master.init(&mut bus).unwrap();
        slave1.init(&mut bus).unwrap();
        slave2.init(&mut bus).unwrap();

        let mut rig = Self {
            bus,
            scl,
            sda,
            master,
            master_lines,
            slave1,
            slave1_lines,
            slave2,
            ext_scl,
            ext_sda,
        };
        rig.run_for(STEP_TICKS);
        rig
    }

    pub fn run_for(&mut self, ticks: u32) {
        let handlers: &mut [&mut dyn ChannelHandler] =
            &mut [&mut self.master, &mut self.slave1, &mut self.slave2];
        self.bus.run_for(Ticks::new(ticks), handlers).unwrap();
    }

    /// Run until the master finishes its transfer, then let the bus settle
    pub fn run_until_idle(&mut self) {
        let mut elapsed = 0;
        while self.master.in_use() {
            assert!(elapsed < TRANSFER_LIMIT_TICKS, "transfer did not finish");
            self.run_for(STEP_TICKS);
            elapsed += STEP_TICKS;
        }
        self.run_for(STEP_TICKS);
    }

    /// Step in small increments until `done` holds
    pub fn run_until(&mut self, mut done: impl FnMut(&Rig) -> bool) {
        let mut elapsed = 0;
        while !done(&*self) {
            assert!(elapsed < TRANSFER_LIMIT_TICKS, "condition never reached");
            self.run_for(10);
            elapsed += 10;
        }
    }

    pub fn drive_ext_scl(&mut self, high: bool) {
        self.bus.set_pin(self.ext_scl, high.into());
    }

    pub fn drive_ext_sda(&mut self, high: bool) {
        self.bus.set_pin(self.ext_sda, high.into());
    }

    /// Clock one bit with the external drivers, leaving SCL low
    pub fn bang_bit(&mut self, high: bool) {
        self.drive_ext_sda(high);
        self.run_for(BANG_PHASE_TICKS);
        self.drive_ext_scl(true);
        self.run_for(BANG_PHASE_TICKS);
        self.drive_ext_scl(false);
        self.run_for(BANG_PHASE_TICKS);
    }

    /// Bit-bang START and a header byte, returning the SDA level seen
    /// during the ACK clock. Leaves SCL low and SDA released.
    pub fn bang_header(&mut self, header: u8) -> Level {
        self.drive_ext_sda(false);
        self.run_for(BANG_PHASE_TICKS);
        self.drive_ext_scl(false);
        self.run_for(BANG_PHASE_TICKS);
        for bit in (0..8).rev() {
            self.bang_bit((header >> bit) & 1 != 0);
        }
        self.drive_ext_sda(true);
        self.run_for(BANG_PHASE_TICKS);
        self.drive_ext_scl(true);
        self.run_for(BANG_PHASE_TICKS);
        let ack = self.bus.wire_level(self.sda);
        self.drive_ext_scl(false);
        self.run_for(BANG_PHASE_TICKS);
        ack
    }

    /// Bit-bang STOP from SCL low and let the slaves settle
    pub fn bang_stop(&mut self) {
        self.drive_ext_sda(false);
        self.run_for(BANG_PHASE_TICKS);
        self.drive_ext_scl(true);
        self.run_for(BANG_PHASE_TICKS);
        self.drive_ext_sda(true);
        self.run_for(STEP_TICKS * 2);
    }

    /// START/STOP sequence seen on the wires so far
    pub fn conditions(&self) -> Vec<BusCondition> {
        self.bus
            .waveform()
            .bus_conditions(self.scl, self.sda)
            .into_iter()
            .map(|(_, condition)| condition)
            .collect()
    }

    /// Lengths of every SCL low phase, in ticks
    pub fn scl_low_times(&self) -> Vec<u64> {
        self.bus
            .waveform()
            .low_intervals(self.scl)
            .into_iter()
            .map(|(fall, rise)| rise.elapsed_since(fall))
            .collect()
    }
}
