//! # TPU Sim
//!
//! A host-side [`Timeline`](tpu_core::Timeline) for running protocol engines
//! without hardware. Lines are attached to open-drain wires with pull-ups,
//! matches fire in time order, armed edge detectors turn wire transitions
//! into channel events, and every transition is kept in a [`Waveform`] for
//! inspection.
//!
//! ```rust,no_run
//! use tpu_core::Ticks;
//! use tpu_sim::SimBus;
//!
//! let mut bus = SimBus::new(100_000_000);
//! let scl = bus.add_wire("SCL");
//! let _probe = bus.add_input(scl).unwrap();
//! bus.run_for(Ticks::new(1_000), &mut []).unwrap();
//! ```

use thiserror::Error;
use tpu_core::Timestamp;

mod bus;
mod waveform;

pub use bus::{Direction, HostInterrupt, SimBus};
pub use waveform::{BusCondition, Transition, Waveform, WireId};

/// Default bound on events dispatched by one run call
pub const DEFAULT_EVENT_LIMIT: usize = 1_000_000;

/// Result type used by the simulator
pub type SimResult<T> = Result<T, SimError>;

/// Errors raised by the simulator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("unknown wire {0}")]
    UnknownWire(usize),
    #[error("line table full ({0} lines)")]
    TooManyLines(usize),
    #[error("deadline {deadline} lies before current time {now}")]
    TimeReversal { now: Timestamp, deadline: Timestamp },
    #[error("event limit of {0} exceeded in one run")]
    EventLimit(usize),
}
