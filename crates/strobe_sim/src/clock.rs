//! Free-running clock generators.
//!
//! A clock is an ordinary boolean signal plus a driver process with no
//! sensitivity. The driver inverts the signal and wakes itself again one
//! half period later, so edges are committed like any other write and
//! edge-sensitive processes see them in the following delta cycle.

use crate::context::ProcessContext;
use crate::error::SimError;
use crate::process::Process;
use crate::signal::SignalId;
use crate::time::SimTime;

/// Shape of a clock: period, level before the first edge, and start offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockSpec {
    /// Full period; the signal toggles every half period.
    pub period: SimTime,
    /// Signal level until the first toggle.
    pub initial: bool,
    /// Delay before the clock starts; the first toggle is at `start + period / 2`.
    pub start: SimTime,
}

impl ClockSpec {
    /// A clock with the given full period, starting low at time zero.
    ///
    /// Toggles are spaced by `period / 2` rounded down to whole femtoseconds,
    /// so an odd period runs one femtosecond fast per cycle.
    pub fn new(period: SimTime) -> Self {
        Self {
            period,
            initial: false,
            start: SimTime::ZERO,
        }
    }

    /// A clock that toggles every `half`.
    pub fn with_half_period(half: SimTime) -> Self {
        Self::new(SimTime::from_fs(half.as_fs().saturating_mul(2)))
    }

    /// Sets the level before the first toggle.
    pub fn initial(mut self, level: bool) -> Self {
        self.initial = level;
        self
    }

    /// Delays the clock by `offset`.
    pub fn start(mut self, offset: SimTime) -> Self {
        self.start = offset;
        self
    }

    /// Time between two toggles, `period / 2` rounded down.
    pub fn half_period(&self) -> SimTime {
        self.period.half()
    }

    /// Time of the first toggle, or `None` on overflow.
    pub fn first_toggle(&self) -> Option<SimTime> {
        self.start.checked_add(self.half_period())
    }
}

/// Driver process of a clock signal.
#[derive(Debug)]
pub struct ClockDriver {
    signal: SignalId,
    half: SimTime,
}

impl ClockDriver {
    /// Creates a driver toggling `signal` every `half`.
    pub fn new(signal: SignalId, half: SimTime) -> Self {
        Self { signal, half }
    }
}

impl Process for ClockDriver {
    fn run(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), SimError> {
        let level = ctx.read_bool(self.signal)?;
        ctx.write(self.signal, !level)?;
        ctx.wake_after(self.half)
    }
}
