//! The top-level simulation driver.
//!
//! A [`Scheduler`] is built in the `Idle` state, where signals, processes and
//! clocks are registered. [`Scheduler::start`] moves it to `Running`, runs the
//! initialization phase, then repeatedly advances the time wheel and settles
//! each time step until the stop condition is met. It then passes through
//! `Stopping` (trace finalization) and ends in `Halted`, which is terminal.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::clock::{ClockDriver, ClockSpec};
use crate::context::{HaltHandle, ProcessContext};
use crate::delta::{DeltaCycleEngine, SettleReport};
use crate::error::SimError;
use crate::kernel::Kernel;
use crate::process::{Process, ProcessId, ProcessSpec, ProcessTable};
use crate::signal::{SignalId, SignalRegistry};
use crate::time::SimTime;
use crate::trace::{TraceEntry, TraceRecorder};
use crate::value::Value;
use crate::wheel::Event;
use crate::SimConfig;

/// Lifecycle state of a [`Scheduler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    /// Accepting registrations; not yet started.
    Idle,
    /// Executing time steps.
    Running,
    /// The stop condition was met; flushing traces.
    Stopping,
    /// Finished. No further runs or registrations are accepted.
    Halted,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Stopping => "stopping",
            SchedulerState::Halted => "halted",
        };
        f.write_str(s)
    }
}

/// When a run should end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopCondition {
    /// Process every event at or before the given time, then stop there.
    Until(SimTime),
    /// Run until the event queue drains or a halt is requested.
    Halt,
}

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum HaltReason {
    /// The end time of [`StopCondition::Until`] was reached.
    EndTime,
    /// No events were left to process.
    Starved,
    /// A halt was requested through a [`HaltHandle`].
    Requested,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HaltReason::EndTime => "end time reached",
            HaltReason::Starved => "no more events",
            HaltReason::Requested => "halt requested",
        };
        f.write_str(s)
    }
}

/// Statistics of a completed run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Simulation time at halt.
    pub final_time: SimTime,
    /// Time steps that processed at least one event.
    pub time_steps: u64,
    /// Delta cycles across all time steps, initialization included.
    pub delta_cycles: u64,
    /// Process activations.
    pub process_runs: u64,
    /// Why the run ended.
    pub reason: HaltReason,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            final_time: SimTime::ZERO,
            time_steps: 0,
            delta_cycles: 0,
            process_runs: 0,
            reason: HaltReason::Starved,
        }
    }

    fn absorb(&mut self, report: SettleReport) {
        self.delta_cycles += u64::from(report.deltas);
        self.process_runs += report.runs;
    }
}

/// Owns a [`Kernel`] and drives it through the scheduler lifecycle.
pub struct Scheduler {
    kernel: Kernel,
    engine: DeltaCycleEngine,
    state: SchedulerState,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl Scheduler {
    /// Creates an idle scheduler.
    pub fn new(config: SimConfig) -> Self {
        Self {
            kernel: Kernel::new(config.record_trace),
            engine: DeltaCycleEngine::new(config.max_delta_cycles),
            state: SchedulerState::Idle,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Current simulation time.
    pub fn now(&self) -> SimTime {
        self.kernel.wheel.now()
    }

    /// Declares a signal with an initial value, which also fixes its type.
    pub fn add_signal(
        &mut self,
        name: &str,
        initial: impl Into<Value>,
    ) -> Result<SignalId, SimError> {
        self.ensure_idle(name)?;
        self.kernel.signals.register(name, initial.into())
    }

    /// Registers a closure as a process.
    pub fn add_process<F>(&mut self, spec: ProcessSpec, body: F) -> Result<ProcessId, SimError>
    where
        F: FnMut(&mut ProcessContext<'_>) -> Result<(), SimError> + 'static,
    {
        self.add_boxed_process(spec, Box::new(body))
    }

    /// Registers a boxed [`Process`].
    ///
    /// Every signal in the sensitivity list must already be declared.
    pub fn add_boxed_process(
        &mut self,
        spec: ProcessSpec,
        body: Box<dyn Process>,
    ) -> Result<ProcessId, SimError> {
        self.ensure_idle(&spec.name)?;
        if let Some(missing) = spec
            .sensitivity
            .iter()
            .find(|s| !self.kernel.signals.contains(s.signal))
        {
            return Err(SimError::UnknownSignal(missing.signal));
        }
        let id = self.kernel.processes.register(spec, body)?;
        debug!(process = id.as_raw(), "registered process");
        Ok(id)
    }

    /// Declares a boolean clock signal named `name` and its driver.
    ///
    /// The signal holds `spec.initial` until the first toggle at
    /// `spec.start + spec.period / 2`, then inverts every half period. The
    /// driver process is registered under `"<name>.driver"`.
    pub fn add_clock(&mut self, name: &str, spec: ClockSpec) -> Result<SignalId, SimError> {
        self.ensure_idle(name)?;
        let half = spec.half_period();
        if half.is_zero() {
            return Err(SimError::ZeroClockPeriod(name.to_string()));
        }
        let first = spec.first_toggle().ok_or(SimError::TimeOverflow {
            now: spec.start,
            delay: half,
        })?;
        let driver_name = format!("{name}.driver");
        if self.kernel.signals.lookup(name).is_some() {
            return Err(SimError::DuplicateSignal(name.to_string()));
        }
        if self.kernel.processes.lookup(&driver_name).is_some() {
            return Err(SimError::DuplicateProcess(driver_name));
        }
        // Nothing below can fail once both names are free: the wheel is
        // still at time zero while idle.
        let signal = self.add_signal(name, spec.initial)?;
        let driver = self.add_boxed_process(
            ProcessSpec::new(driver_name),
            Box::new(ClockDriver::new(signal, half)),
        )?;
        self.kernel.wheel.schedule_at(first, Event::Wake(driver))?;
        debug!(clock = name, %half, %first, "registered clock");
        Ok(signal)
    }

    /// Schedules an external write of `value` to `signal` at `time`.
    pub fn schedule_write(
        &mut self,
        time: SimTime,
        signal: SignalId,
        value: impl Into<Value>,
    ) -> Result<(), SimError> {
        self.ensure_idle("scheduled write")?;
        let value = value.into();
        self.kernel.signals.check(signal, &value)?;
        self.kernel
            .wheel
            .schedule_at(time, Event::Update { signal, value })
    }

    /// Sends every committed change to `sink` in addition to the in-memory trace.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceRecorder>) -> Result<(), SimError> {
        self.ensure_idle("trace sink")?;
        self.kernel.set_sink(sink);
        Ok(())
    }

    /// A handle that stops the run after the current time step.
    pub fn halt_handle(&self) -> HaltHandle {
        self.kernel.halt.clone()
    }

    /// Runs the simulation until `stop` is met.
    ///
    /// Events at exactly the end time of [`StopCondition::Until`] are
    /// processed. If the next event lies beyond it, time advances to the end
    /// time and the run stops there. A scheduler runs at most once.
    pub fn start(&mut self, stop: StopCondition) -> Result<RunSummary, SimError> {
        if self.state != SchedulerState::Idle {
            return Err(SimError::AlreadyHalted);
        }
        self.state = SchedulerState::Running;
        debug!(
            signals = self.kernel.signals.len(),
            processes = self.kernel.processes.len(),
            ?stop,
            "simulation started"
        );

        let result = self.run_loop(stop);
        self.state = SchedulerState::Stopping;
        let summary = match result {
            Ok(summary) => {
                let finalized = self.kernel.finalize();
                self.state = SchedulerState::Halted;
                finalized?;
                summary
            }
            Err(err) => {
                if let Err(flush) = self.kernel.finalize() {
                    warn!(error = %flush, "failed to finalize trace after error");
                }
                self.state = SchedulerState::Halted;
                return Err(err);
            }
        };
        debug!(
            time = %summary.final_time,
            reason = %summary.reason,
            steps = summary.time_steps,
            runs = summary.process_runs,
            "simulation halted"
        );
        Ok(summary)
    }

    /// Runs for `duration` from the current time.
    pub fn run_for(&mut self, duration: SimTime) -> Result<RunSummary, SimError> {
        let now = self.now();
        let end = now.checked_add(duration).ok_or(SimError::TimeOverflow {
            now,
            delay: duration,
        })?;
        self.start(StopCondition::Until(end))
    }

    fn run_loop(&mut self, stop: StopCondition) -> Result<RunSummary, SimError> {
        let mut summary = RunSummary::new();
        self.kernel.announce_signals()?;

        let initial = self.kernel.processes.initial();
        if !initial.is_empty() {
            summary.absorb(self.engine.run(&mut self.kernel, initial)?);
        }

        summary.reason = loop {
            if self.kernel.halt.is_requested() {
                break HaltReason::Requested;
            }
            let Some(next) = self.kernel.wheel.peek_time() else {
                break HaltReason::Starved;
            };
            if let StopCondition::Until(end) = stop {
                if next > end {
                    self.kernel.wheel.skip_to(end);
                    break HaltReason::EndTime;
                }
            }
            let Some(batch) = self.kernel.wheel.advance() else {
                break HaltReason::Starved;
            };
            summary.time_steps += 1;
            summary.absorb(self.engine.settle(&mut self.kernel, batch.events)?);
        };
        summary.final_time = self.kernel.wheel.now();
        Ok(summary)
    }

    fn ensure_idle(&self, what: &str) -> Result<(), SimError> {
        if self.state == SchedulerState::Idle {
            Ok(())
        } else {
            Err(SimError::LateRegistration(what.to_string()))
        }
    }

    /// Committed value of `signal`.
    pub fn read(&self, signal: SignalId) -> Result<&Value, SimError> {
        self.kernel.signals.read(signal)
    }

    /// Finds a signal by name.
    pub fn lookup(&self, name: &str) -> Option<SignalId> {
        self.kernel.signals.lookup(name)
    }

    /// Recorded changes, empty when trace recording is disabled.
    pub fn trace(&self) -> &[TraceEntry] {
        self.kernel.trace().map(|t| t.entries()).unwrap_or_default()
    }

    /// The signal registry.
    pub fn signals(&self) -> &SignalRegistry {
        self.kernel.signals()
    }

    /// The process table.
    pub fn processes(&self) -> &ProcessTable {
        self.kernel.processes()
    }

    /// Number of activations of `process` so far.
    pub fn run_count(&self, process: ProcessId) -> Option<u64> {
        self.kernel.processes.run_count(process)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Sensitivity;

    #[test]
    fn registration_closes_after_start() {
        let mut sched = Scheduler::default();
        sched.add_signal("a", false).unwrap();
        sched.start(StopCondition::Halt).unwrap();
        assert_eq!(sched.state(), SchedulerState::Halted);

        let err = sched.add_signal("b", false).unwrap_err();
        assert!(matches!(err, SimError::LateRegistration(ref name) if name == "b"));
        let err = sched
            .add_process(ProcessSpec::new("p"), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, SimError::LateRegistration(_)));
    }

    #[test]
    fn second_start_is_rejected() {
        let mut sched = Scheduler::default();
        sched.start(StopCondition::Until(SimTime::from_ns(1))).unwrap();
        let err = sched.start(StopCondition::Halt).unwrap_err();
        assert!(matches!(err, SimError::AlreadyHalted));
    }

    #[test]
    fn sensitivity_must_name_declared_signals() {
        let mut sched = Scheduler::default();
        let err = sched
            .add_process(
                ProcessSpec::new("p").sensitive_to(Sensitivity::change(SignalId::from_raw(3))),
                |_| Ok(()),
            )
            .unwrap_err();
        assert!(matches!(err, SimError::UnknownSignal(_)));
        assert!(sched.processes().is_empty());
    }

    #[test]
    fn empty_queue_starves_without_moving_time() {
        let mut sched = Scheduler::default();
        let summary = sched.start(StopCondition::Until(SimTime::from_ns(10))).unwrap();
        assert_eq!(summary.reason, HaltReason::Starved);
        assert_eq!(summary.final_time, SimTime::ZERO);
        assert_eq!(summary.time_steps, 0);
    }

    #[test]
    fn events_past_the_end_are_left_pending() {
        let mut sched = Scheduler::default();
        let s = sched.add_signal("s", false).unwrap();
        sched.schedule_write(SimTime::from_ns(3), s, true).unwrap();
        sched.schedule_write(SimTime::from_ns(8), s, false).unwrap();

        let summary = sched.run_for(SimTime::from_ns(5)).unwrap();
        assert_eq!(summary.reason, HaltReason::EndTime);
        assert_eq!(summary.final_time, SimTime::from_ns(5));
        assert_eq!(summary.time_steps, 1);
        assert_eq!(sched.read(s).unwrap(), &Value::Bool(true));
    }

    #[test]
    fn events_at_the_end_time_are_processed() {
        let mut sched = Scheduler::default();
        let s = sched.add_signal("s", false).unwrap();
        sched.schedule_write(SimTime::from_ns(5), s, true).unwrap();
        let summary = sched.start(StopCondition::Until(SimTime::from_ns(5))).unwrap();
        assert_eq!(sched.read(s).unwrap(), &Value::Bool(true));
        assert_eq!(summary.final_time, SimTime::from_ns(5));
    }

    #[test]
    fn schedule_write_is_type_checked() {
        let mut sched = Scheduler::default();
        let s = sched.add_signal("s", Value::bits(0, 4)).unwrap();
        let err = sched.schedule_write(SimTime::ZERO, s, true).unwrap_err();
        assert!(matches!(err, SimError::TypeMismatch { .. }));
    }

    #[test]
    fn zero_period_clock_rejected() {
        let mut sched = Scheduler::default();
        let err = sched
            .add_clock("clk", ClockSpec::new(SimTime::ZERO))
            .unwrap_err();
        assert!(matches!(err, SimError::ZeroClockPeriod(ref name) if name == "clk"));
        assert!(sched.lookup("clk").is_none());
    }

    #[test]
    fn clock_driver_is_named_after_the_clock() {
        let mut sched = Scheduler::default();
        sched
            .add_clock("clk", ClockSpec::new(SimTime::from_ns(2)))
            .unwrap();
        assert!(sched.processes().lookup("clk.driver").is_some());
    }

    #[test]
    fn failed_clock_registration_leaves_no_signal() {
        let mut sched = Scheduler::default();
        sched
            .add_process(ProcessSpec::new("clk.driver"), |_| Ok(()))
            .unwrap();
        let err = sched
            .add_clock("clk", ClockSpec::new(SimTime::from_ns(2)))
            .unwrap_err();
        assert!(matches!(err, SimError::DuplicateProcess(ref name) if name == "clk.driver"));
        assert!(sched.lookup("clk").is_none());
        assert!(sched.signals().is_empty());
    }

    #[test]
    fn clock_name_taken_by_a_signal() {
        let mut sched = Scheduler::default();
        sched.add_signal("clk", false).unwrap();
        let err = sched
            .add_clock("clk", ClockSpec::new(SimTime::from_ns(2)))
            .unwrap_err();
        assert!(matches!(err, SimError::DuplicateSignal(_)));
        assert!(sched.processes().is_empty());
    }

    #[test]
    fn process_error_halts_the_scheduler() {
        let mut sched = Scheduler::default();
        sched
            .add_process(ProcessSpec::new("bad").initialize(), |ctx| {
                Err(ctx.fail("broken"))
            })
            .unwrap();
        let err = sched.start(StopCondition::Halt).unwrap_err();
        assert!(matches!(err, SimError::Process { .. }));
        assert_eq!(sched.state(), SchedulerState::Halted);
    }

    #[test]
    fn display_impls() {
        assert_eq!(SchedulerState::Running.to_string(), "running");
        assert_eq!(HaltReason::EndTime.to_string(), "end time reached");
    }
}
