//! Simulation error types.
//!
//! Every failure the kernel can report is a variant of [`SimError`]. Errors
//! are raised synchronously at the call that violates a contract; none are
//! retried, and an error during a run halts the scheduler.

use std::io;

use crate::process::ProcessId;
use crate::signal::SignalId;
use crate::time::SimTime;
use crate::value::ValueType;

/// Errors that can occur during elaboration or simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// An event was scheduled strictly before the current time.
    #[error("cannot schedule at {requested}: current time is already {now}")]
    InvalidTime {
        /// The requested event time.
        requested: SimTime,
        /// The current simulation time.
        now: SimTime,
    },

    /// A signal ID was not produced by this kernel's registry.
    #[error("unknown signal id {}", .0.as_raw())]
    UnknownSignal(SignalId),

    /// A process name was registered twice.
    #[error("process '{0}' is already registered")]
    DuplicateProcess(String),

    /// A signal name was registered twice.
    #[error("signal '{0}' is already registered")]
    DuplicateSignal(String),

    /// A value of the wrong type was written to a signal.
    #[error("type mismatch on signal '{signal}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Name of the signal being written.
        signal: String,
        /// The signal's declared type.
        expected: ValueType,
        /// The type of the written value.
        found: ValueType,
    },

    /// The delta-cycle loop did not quiesce within the configured bound.
    #[error("no quiescence at {time} after {iterations} delta cycles (combinational loop?)")]
    Oscillation {
        /// Time step at which the loop was detected.
        time: SimTime,
        /// Number of delta cycles executed before giving up.
        iterations: u32,
    },

    /// A signal or process was registered after the simulation started.
    #[error("cannot register '{0}' after the simulation has started")]
    LateRegistration(String),

    /// `start` was called on a scheduler that has already halted.
    #[error("scheduler has already halted; construct a new one to run again")]
    AlreadyHalted,

    /// A clock was declared with a half period of zero.
    #[error("clock '{0}' has a zero half period")]
    ZeroClockPeriod(String),

    /// Adding a delay to the current time overflowed the tick counter.
    #[error("time overflow: {now} + {delay}")]
    TimeOverflow {
        /// The time the delay was added to.
        now: SimTime,
        /// The delay that overflowed.
        delay: SimTime,
    },

    /// A process body reported a failure.
    #[error("process {} failed at {time}: {message}", .process.as_raw())]
    Process {
        /// The failing process.
        process: ProcessId,
        /// Time at which it failed.
        time: SimTime,
        /// The failure description.
        message: String,
    },

    /// Writing to a trace sink failed.
    #[error("trace I/O error: {0}")]
    Trace(#[from] io::Error),
}
