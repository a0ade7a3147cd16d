//! The handle a process body uses to interact with the kernel.
//!
//! There is no ambient "current simulation": everything a process may do
//! (read the time, read or write signals, schedule itself, ask the run to
//! stop) goes through the [`ProcessContext`] it is handed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::SimError;
use crate::process::ProcessId;
use crate::signal::{SignalId, SignalRegistry};
use crate::time::SimTime;
use crate::value::Value;
use crate::wheel::{Event, TimeWheel};

/// A cloneable flag asking the scheduler to stop after the current time step.
///
/// The flag may be raised from a process body or from another thread; the
/// scheduler polls it between time steps, never in the middle of one.
#[derive(Clone, Debug, Default)]
pub struct HaltHandle(Arc<AtomicBool>);

impl HaltHandle {
    /// Creates a lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once the flag has been raised.
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Kernel access for one activation of one process.
pub struct ProcessContext<'a> {
    process: ProcessId,
    now: SimTime,
    signals: &'a mut SignalRegistry,
    wheel: &'a mut TimeWheel,
    halt: &'a HaltHandle,
    rerun: bool,
}

impl<'a> ProcessContext<'a> {
    pub(crate) fn new(
        process: ProcessId,
        signals: &'a mut SignalRegistry,
        wheel: &'a mut TimeWheel,
        halt: &'a HaltHandle,
    ) -> Self {
        Self {
            process,
            now: wheel.now(),
            signals,
            wheel,
            halt,
            rerun: false,
        }
    }

    /// The current simulation time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// The ID of the running process.
    pub fn process(&self) -> ProcessId {
        self.process
    }

    /// Reads the committed value of `signal`.
    ///
    /// Writes issued in the current delta cycle, including this process's
    /// own, are not visible yet.
    pub fn read(&self, signal: SignalId) -> Result<&Value, SimError> {
        self.signals.read(signal)
    }

    /// Reads `signal` as a boolean; bit vectors report their LSB.
    pub fn read_bool(&self, signal: SignalId) -> Result<bool, SimError> {
        self.signals.read(signal).map(Value::is_high)
    }

    /// Queues `value` for `signal`, visible after the current delta commits.
    pub fn write(&mut self, signal: SignalId, value: impl Into<Value>) -> Result<(), SimError> {
        self.signals.write(signal, value.into())
    }

    /// Schedules `value` to be written to `signal` after `delay`.
    ///
    /// A zero delay is the same as [`write`](Self::write).
    pub fn write_after(
        &mut self,
        signal: SignalId,
        value: impl Into<Value>,
        delay: SimTime,
    ) -> Result<(), SimError> {
        let value = value.into();
        if delay.is_zero() {
            return self.signals.write(signal, value);
        }
        self.signals.check(signal, &value)?;
        self.wheel
            .schedule_after(delay, Event::Update { signal, value })
            .map(|_| ())
    }

    /// Wakes this process again after `delay`.
    ///
    /// A zero delay re-runs the process in the next delta cycle of the
    /// current time step.
    pub fn wake_after(&mut self, delay: SimTime) -> Result<(), SimError> {
        if delay.is_zero() {
            self.rerun = true;
            return Ok(());
        }
        self.wheel
            .schedule_after(delay, Event::Wake(self.process))
            .map(|_| ())
    }

    /// Asks the scheduler to stop once the current time step has settled.
    pub fn request_halt(&self) {
        self.halt.request();
    }

    /// Builds a [`SimError::Process`] attributed to this process and time.
    pub fn fail(&self, message: impl Into<String>) -> SimError {
        SimError::Process {
            process: self.process,
            time: self.now,
            message: message.into(),
        }
    }

    pub(crate) fn rerun_requested(&self) -> bool {
        self.rerun
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        signals: SignalRegistry,
        wheel: TimeWheel,
        halt: HaltHandle,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                signals: SignalRegistry::new(),
                wheel: TimeWheel::new(),
                halt: HaltHandle::new(),
            }
        }

        fn ctx(&mut self) -> ProcessContext<'_> {
            ProcessContext::new(
                ProcessId::from_raw(0),
                &mut self.signals,
                &mut self.wheel,
                &self.halt,
            )
        }
    }

    #[test]
    fn writes_are_buffered() {
        let mut fx = Fixture::new();
        let s = fx.signals.register("s", Value::Bool(false)).unwrap();
        {
            let mut ctx = fx.ctx();
            ctx.write(s, true).unwrap();
            assert!(!ctx.read_bool(s).unwrap());
        }
        assert_eq!(fx.signals.commit().len(), 1);
        assert_eq!(fx.signals.read(s).unwrap(), &Value::Bool(true));
    }

    #[test]
    fn delayed_write_goes_to_the_wheel() {
        let mut fx = Fixture::new();
        let s = fx.signals.register("s", Value::bits(0, 4)).unwrap();
        fx.ctx()
            .write_after(s, Value::bits(9, 4), SimTime::from_ns(3))
            .unwrap();
        assert!(!fx.signals.has_pending());
        let batch = fx.wheel.advance().unwrap();
        assert_eq!(batch.time, SimTime::from_ns(3));
        assert_eq!(
            batch.events,
            vec![Event::Update {
                signal: s,
                value: Value::bits(9, 4),
            }]
        );
    }

    #[test]
    fn delayed_write_is_type_checked() {
        let mut fx = Fixture::new();
        let s = fx.signals.register("s", Value::bits(0, 4)).unwrap();
        let err = fx
            .ctx()
            .write_after(s, true, SimTime::from_ns(1))
            .unwrap_err();
        assert!(matches!(err, SimError::TypeMismatch { .. }));
        assert!(fx.wheel.is_empty());
    }

    #[test]
    fn zero_delay_wake_requests_rerun() {
        let mut fx = Fixture::new();
        let mut ctx = fx.ctx();
        ctx.wake_after(SimTime::ZERO).unwrap();
        assert!(ctx.rerun_requested());
        drop(ctx);
        assert!(fx.wheel.is_empty());
    }

    #[test]
    fn timed_wake_schedules_event() {
        let mut fx = Fixture::new();
        fx.ctx().wake_after(SimTime::from_ps(500)).unwrap();
        assert_eq!(fx.wheel.peek_time(), Some(SimTime::from_ps(500)));
    }

    #[test]
    fn halt_request_is_shared() {
        let mut fx = Fixture::new();
        let observer = fx.halt.clone();
        fx.ctx().request_halt();
        assert!(observer.is_requested());
    }

    #[test]
    fn fail_names_process_and_time() {
        let mut fx = Fixture::new();
        let err = fx.ctx().fail("boom");
        assert!(matches!(
            err,
            SimError::Process { time, ref message, .. } if time == SimTime::ZERO && message == "boom"
        ));
    }
}
