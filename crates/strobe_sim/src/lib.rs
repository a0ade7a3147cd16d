//! Discrete-event simulation kernel with delta-cycle signal semantics.
//!
//! This crate implements the scheduling core of an HDL simulator: a time
//! wheel of pending events, a registry of signals whose writes are buffered
//! until a commit, edge- and change-sensitive processes, and a delta-cycle
//! engine that settles each time step before time moves on.
//!
//! # Architecture
//!
//! Within one time step, every ready process runs against the same committed
//! snapshot. Their writes are committed together, and the processes sensitive
//! to the resulting changes form the next delta cycle. A time step ends when
//! a commit wakes nobody. A bounded number of delta cycles guards against
//! zero-delay feedback loops.
//!
//! # Usage
//!
//! ```
//! use strobe_sim::{ClockSpec, ProcessSpec, Scheduler, Sensitivity, SimTime, StopCondition};
//!
//! let mut sched = Scheduler::default();
//! let clk = sched
//!     .add_clock("clk", ClockSpec::with_half_period(SimTime::from_ns(1)))
//!     .unwrap();
//! sched
//!     .add_process(
//!         ProcessSpec::new("tick").sensitive_to(Sensitivity::posedge(clk)),
//!         |ctx| {
//!             println!("tick at {}", ctx.now());
//!             Ok(())
//!         },
//!     )
//!     .unwrap();
//! let summary = sched.start(StopCondition::Until(SimTime::from_ns(10))).unwrap();
//! assert_eq!(summary.final_time, SimTime::from_ns(10));
//! ```
//!
//! # Modules
//!
//! - `time` - Femtosecond-resolution simulation time
//! - `value` - Boolean and bit-vector signal values
//! - `wheel` - Time-ordered event queue
//! - `signal` - Signal registry with buffered writes and change detection
//! - `process` - Process registration and sensitivity matching
//! - `context` - The per-activation handle given to process bodies
//! - `delta` - Delta-cycle settling of one time step
//! - `clock` - Free-running clock generators
//! - `trace` - Recording of committed changes
//! - `scheduler` - Lifecycle and main loop

#![warn(missing_docs)]

pub mod clock;
pub mod context;
pub mod delta;
pub mod error;
pub mod kernel;
pub mod process;
pub mod scheduler;
pub mod signal;
pub mod time;
pub mod trace;
pub mod value;
pub mod wheel;

pub use clock::{ClockDriver, ClockSpec};
pub use context::{HaltHandle, ProcessContext};
pub use delta::{DeltaCycleEngine, SettleReport, DEFAULT_MAX_DELTA_CYCLES};
pub use error::SimError;
pub use kernel::Kernel;
pub use process::{Process, ProcessId, ProcessSpec, ProcessTable, Sensitivity, Trigger};
pub use scheduler::{HaltReason, RunSummary, Scheduler, SchedulerState, StopCondition};
pub use signal::{Change, SignalId, SignalRegistry};
pub use time::{ParseTimeError, SimTime, TimeUnit};
pub use trace::{JsonLinesTrace, MemoryTrace, TraceEntry, TraceRecorder};
pub use value::{Value, ValueType};
pub use wheel::{Event, EventBatch, TimeWheel};

/// Configuration for a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    /// Maximum delta cycles per time step before reporting an oscillation.
    pub max_delta_cycles: u32,
    /// Whether to keep an in-memory trace of every committed change.
    pub record_trace: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_delta_cycles: DEFAULT_MAX_DELTA_CYCLES,
            record_trace: true,
        }
    }
}
