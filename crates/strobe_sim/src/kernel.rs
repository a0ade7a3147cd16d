//! The kernel's shared state: time wheel, signals, processes and trace.
//!
//! [`Kernel`] only groups the pieces; the delta-cycle engine and the
//! scheduler drive them. Commits go through [`Kernel::commit`] so that every
//! change lands in the trace exactly once.

use std::collections::BTreeSet;

use crate::context::HaltHandle;
use crate::error::SimError;
use crate::process::{ProcessId, ProcessTable};
use crate::signal::{Change, SignalRegistry};
use crate::trace::{MemoryTrace, TraceEntry, TraceRecorder};
use crate::wheel::TimeWheel;

/// All mutable simulation state, owned by the scheduler.
pub struct Kernel {
    pub(crate) wheel: TimeWheel,
    pub(crate) signals: SignalRegistry,
    pub(crate) processes: ProcessTable,
    pub(crate) halt: HaltHandle,
    trace: Option<MemoryTrace>,
    sink: Option<Box<dyn TraceRecorder>>,
}

impl Kernel {
    /// Creates an empty kernel; `record_trace` keeps an in-memory trace.
    pub fn new(record_trace: bool) -> Self {
        Self {
            wheel: TimeWheel::new(),
            signals: SignalRegistry::new(),
            processes: ProcessTable::new(),
            halt: HaltHandle::new(),
            trace: record_trace.then(MemoryTrace::new),
            sink: None,
        }
    }

    /// The time wheel.
    pub fn wheel(&self) -> &TimeWheel {
        &self.wheel
    }

    /// The signal registry.
    pub fn signals(&self) -> &SignalRegistry {
        &self.signals
    }

    /// The process table.
    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }

    /// The in-memory trace, if recording is enabled.
    pub fn trace(&self) -> Option<&MemoryTrace> {
        self.trace.as_ref()
    }

    /// Sets an additional trace destination.
    pub fn set_sink(&mut self, sink: Box<dyn TraceRecorder>) {
        self.sink = Some(sink);
    }

    /// Announces every registered signal to the sink.
    pub(crate) fn announce_signals(&mut self) -> Result<(), SimError> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        for (id, name, _) in self.signals.iter() {
            sink.register_signal(id, name)?;
        }
        Ok(())
    }

    /// Commits pending writes, records the changes and returns them.
    pub(crate) fn commit(&mut self, delta: u32) -> Result<Vec<Change>, SimError> {
        let changes = self.signals.commit();
        if changes.is_empty() || (self.trace.is_none() && self.sink.is_none()) {
            return Ok(changes);
        }
        let time = self.wheel.now();
        for change in &changes {
            let entry = TraceEntry {
                time,
                delta,
                signal: change.signal,
                value: change.new.clone(),
            };
            if let Some(trace) = self.trace.as_mut() {
                trace.record(&entry)?;
            }
            if let Some(sink) = self.sink.as_mut() {
                sink.record(&entry)?;
            }
        }
        Ok(changes)
    }

    /// Commits and returns the processes the changes wake.
    pub(crate) fn commit_and_sensitize(
        &mut self,
        delta: u32,
    ) -> Result<BTreeSet<ProcessId>, SimError> {
        let changes = self.commit(delta)?;
        Ok(self.processes.sensitized(&changes))
    }

    /// Flushes the sink.
    pub(crate) fn finalize(&mut self) -> Result<(), SimError> {
        if let Some(sink) = self.sink.as_mut() {
            sink.finalize()?;
        }
        Ok(())
    }
}
