//! Settling of all activity at a single simulation time.
//!
//! The engine alternates between running a batch of ready processes and
//! committing their writes. The processes woken by that commit form the next
//! batch. A time step ends at quiescence, when a commit wakes nobody.

use std::collections::BTreeSet;

use tracing::{trace, warn};

use crate::context::ProcessContext;
use crate::error::SimError;
use crate::kernel::Kernel;
use crate::process::ProcessId;
use crate::wheel::Event;

/// Default bound on delta cycles per time step.
pub const DEFAULT_MAX_DELTA_CYCLES: u32 = 10_000;

/// Counters for one settled time step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SettleReport {
    /// Delta cycles in which at least one process ran.
    pub deltas: u32,
    /// Process activations.
    pub runs: u64,
}

/// Runs delta cycles until quiescence or until the bound is hit.
#[derive(Clone, Copy, Debug)]
pub struct DeltaCycleEngine {
    max_deltas: u32,
}

impl Default for DeltaCycleEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DELTA_CYCLES)
    }
}

impl DeltaCycleEngine {
    /// Creates an engine that gives up after `max_deltas` cycles in one step.
    pub fn new(max_deltas: u32) -> Self {
        Self { max_deltas }
    }

    /// The configured bound.
    pub fn max_deltas(&self) -> u32 {
        self.max_deltas
    }

    /// Settles the events due at the kernel's current time.
    ///
    /// Wake-ups join the first batch directly. Timed signal updates are
    /// written and committed first (as delta 0), and the processes they
    /// sensitize join the first batch too.
    pub fn settle(&self, kernel: &mut Kernel, events: Vec<Event>) -> Result<SettleReport, SimError> {
        let mut ready = BTreeSet::new();
        for event in events {
            match event {
                Event::Wake(id) => {
                    ready.insert(id);
                }
                Event::Update { signal, value } => kernel.signals.write(signal, value)?,
            }
        }
        if kernel.signals.has_pending() {
            ready.extend(kernel.commit_and_sensitize(0)?);
        }
        self.run(kernel, ready)
    }

    /// Runs delta cycles starting from the `ready` batch.
    pub fn run(
        &self,
        kernel: &mut Kernel,
        mut ready: BTreeSet<ProcessId>,
    ) -> Result<SettleReport, SimError> {
        let time = kernel.wheel.now();
        let mut report = SettleReport::default();

        while !ready.is_empty() {
            if report.deltas >= self.max_deltas {
                warn!(%time, iterations = report.deltas, "delta cycles did not quiesce");
                return Err(SimError::Oscillation {
                    time,
                    iterations: report.deltas,
                });
            }
            trace!(%time, delta = report.deltas + 1, ready = ready.len(), "delta cycle");

            let mut rerun = BTreeSet::new();
            for id in std::mem::take(&mut ready) {
                let mut ctx =
                    ProcessContext::new(id, &mut kernel.signals, &mut kernel.wheel, &kernel.halt);
                kernel.processes.run(id, &mut ctx)?;
                if ctx.rerun_requested() {
                    rerun.insert(id);
                }
                report.runs += 1;
            }
            report.deltas += 1;

            ready = kernel.commit_and_sensitize(report.deltas)?;
            ready.extend(rerun);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{Process, ProcessSpec, Sensitivity};
    use crate::signal::SignalId;
    use crate::time::SimTime;
    use crate::value::Value;

    fn boxed<F>(f: F) -> Box<dyn Process>
    where
        F: FnMut(&mut ProcessContext<'_>) -> Result<(), SimError> + 'static,
    {
        Box::new(f)
    }

    fn register(kernel: &mut Kernel, spec: ProcessSpec, body: Box<dyn Process>) -> ProcessId {
        kernel.processes.register(spec, body).unwrap()
    }

    fn value(kernel: &Kernel, s: SignalId) -> Value {
        kernel.signals.read(s).unwrap().clone()
    }

    #[test]
    fn reads_see_the_pre_commit_snapshot() {
        let mut kernel = Kernel::new(true);
        let a = kernel.signals.register("a", Value::Bool(true)).unwrap();
        let b = kernel.signals.register("b", Value::Bool(false)).unwrap();
        // Each process copies the other signal; with buffered writes the
        // values swap instead of both ending up equal.
        let p = register(
            &mut kernel,
            ProcessSpec::new("copy_a_to_b"),
            boxed(move |ctx| {
                let v = ctx.read(a)?.clone();
                ctx.write(b, v)
            }),
        );
        let q = register(
            &mut kernel,
            ProcessSpec::new("copy_b_to_a"),
            boxed(move |ctx| {
                let v = ctx.read(b)?.clone();
                ctx.write(a, v)
            }),
        );

        let report = DeltaCycleEngine::default()
            .run(&mut kernel, [p, q].into_iter().collect())
            .unwrap();
        assert_eq!(report.deltas, 1);
        assert_eq!(value(&kernel, a), Value::Bool(false));
        assert_eq!(value(&kernel, b), Value::Bool(true));
    }

    #[test]
    fn chain_propagates_one_delta_per_stage() {
        let mut kernel = Kernel::new(true);
        let a = kernel.signals.register("a", Value::Bool(false)).unwrap();
        let b = kernel.signals.register("b", Value::Bool(false)).unwrap();
        let c = kernel.signals.register("c", Value::Bool(false)).unwrap();
        register(
            &mut kernel,
            ProcessSpec::new("ab").sensitive_to(Sensitivity::change(a)),
            boxed(move |ctx| {
                let v = ctx.read_bool(a)?;
                ctx.write(b, v)
            }),
        );
        register(
            &mut kernel,
            ProcessSpec::new("bc").sensitive_to(Sensitivity::change(b)),
            boxed(move |ctx| {
                let v = ctx.read_bool(b)?;
                ctx.write(c, v)
            }),
        );

        let report = DeltaCycleEngine::default()
            .settle(
                &mut kernel,
                vec![Event::Update {
                    signal: a,
                    value: Value::Bool(true),
                }],
            )
            .unwrap();
        assert_eq!(report.deltas, 2);
        assert_eq!(report.runs, 2);
        assert_eq!(value(&kernel, c), Value::Bool(true));

        let deltas: Vec<(SignalId, u32)> = kernel
            .trace()
            .unwrap()
            .entries()
            .iter()
            .map(|e| (e.signal, e.delta))
            .collect();
        assert_eq!(deltas, vec![(a, 0), (b, 1), (c, 2)]);
    }

    #[test]
    fn wake_event_runs_process_without_signal_change() {
        let mut kernel = Kernel::new(true);
        let out = kernel.signals.register("out", Value::bits(0, 4)).unwrap();
        let p = register(
            &mut kernel,
            ProcessSpec::new("p"),
            boxed(move |ctx| ctx.write(out, Value::bits(7, 4))),
        );
        let report = DeltaCycleEngine::default()
            .settle(&mut kernel, vec![Event::Wake(p)])
            .unwrap();
        assert_eq!(report.runs, 1);
        assert_eq!(value(&kernel, out), Value::bits(7, 4));
    }

    #[test]
    fn unchanged_write_wakes_nobody() {
        let mut kernel = Kernel::new(true);
        let s = kernel.signals.register("s", Value::Bool(true)).unwrap();
        register(
            &mut kernel,
            ProcessSpec::new("listener").sensitive_to(Sensitivity::change(s)),
            boxed(|ctx| Err(ctx.fail("must not run"))),
        );
        let report = DeltaCycleEngine::default()
            .settle(
                &mut kernel,
                vec![Event::Update {
                    signal: s,
                    value: Value::Bool(true),
                }],
            )
            .unwrap();
        assert_eq!(report, SettleReport::default());
        assert!(kernel.trace().unwrap().entries().is_empty());
    }

    #[test]
    fn feedback_loop_hits_the_bound() {
        let mut kernel = Kernel::new(false);
        let x = kernel.signals.register("x", Value::Bool(false)).unwrap();
        let a = register(
            &mut kernel,
            ProcessSpec::new("raise").sensitive_to(Sensitivity::negedge(x)),
            boxed(move |ctx| ctx.write(x, true)),
        );
        register(
            &mut kernel,
            ProcessSpec::new("lower").sensitive_to(Sensitivity::posedge(x)),
            boxed(move |ctx| ctx.write(x, false)),
        );

        let err = DeltaCycleEngine::new(1000)
            .run(&mut kernel, [a].into_iter().collect())
            .unwrap_err();
        assert!(matches!(
            err,
            SimError::Oscillation {
                iterations: 1000,
                ..
            }
        ));
    }

    #[test]
    fn zero_delay_rerun_counts_toward_the_bound() {
        let mut kernel = Kernel::new(false);
        let p = register(
            &mut kernel,
            ProcessSpec::new("spin"),
            boxed(|ctx| ctx.wake_after(SimTime::ZERO)),
        );
        let err = DeltaCycleEngine::new(5)
            .run(&mut kernel, [p].into_iter().collect())
            .unwrap_err();
        assert!(matches!(err, SimError::Oscillation { iterations: 5, .. }));
    }

    #[test]
    fn bounded_rerun_settles() {
        let mut kernel = Kernel::new(false);
        let count = kernel.signals.register("count", Value::bits(0, 8)).unwrap();
        let p = register(
            &mut kernel,
            ProcessSpec::new("counter"),
            boxed(move |ctx| {
                let n = ctx.read(count)?.as_bits().and_then(|b| b.to_u64()).unwrap_or(0);
                if n < 3 {
                    ctx.write(count, Value::bits(n + 1, 8))?;
                    ctx.wake_after(SimTime::ZERO)?;
                }
                Ok(())
            }),
        );
        let report = DeltaCycleEngine::new(10)
            .run(&mut kernel, [p].into_iter().collect())
            .unwrap();
        assert_eq!(report.runs, 4);
        assert_eq!(value(&kernel, count), Value::bits(3, 8));
    }

    #[test]
    fn process_error_propagates() {
        let mut kernel = Kernel::new(false);
        let p = register(
            &mut kernel,
            ProcessSpec::new("bad"),
            boxed(|ctx| Err(ctx.fail("broken"))),
        );
        let err = DeltaCycleEngine::default()
            .run(&mut kernel, [p].into_iter().collect())
            .unwrap_err();
        assert!(matches!(err, SimError::Process { process, .. } if process == p));
    }
}
