//! Process registration and sensitivity matching.
//!
//! A process is a body implementing [`Process`] plus a sensitivity list of
//! `(signal, trigger)` pairs. The [`ProcessTable`] indexes sensitivities by
//! signal so that a commit's change set maps to the processes it wakes
//! without scanning the whole table.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use strobe_common::{Arena, ArenaId};

use crate::context::ProcessContext;
use crate::error::SimError;
use crate::signal::{Change, SignalId};
use crate::value::Value;

/// Opaque ID of a registered process. IDs follow registration order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ProcessId(u32);

impl ProcessId {
    /// Creates a `ProcessId` from a raw index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

impl ArenaId for ProcessId {
    fn from_raw(index: u32) -> Self {
        Self(index)
    }

    fn as_raw(self) -> u32 {
        self.0
    }
}

/// Which transitions of a signal wake a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    /// False-like to true-like.
    PosEdge,
    /// True-like to false-like.
    NegEdge,
    /// Any value difference.
    AnyChange,
}

impl Trigger {
    /// Returns `true` if the transition `old -> new` fires this trigger.
    pub fn fires(self, old: &Value, new: &Value) -> bool {
        match self {
            Trigger::PosEdge => !old.is_high() && new.is_high(),
            Trigger::NegEdge => old.is_high() && !new.is_high(),
            Trigger::AnyChange => old != new,
        }
    }
}

/// One entry of a sensitivity list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sensitivity {
    /// The watched signal.
    pub signal: SignalId,
    /// The transition kind that wakes the process.
    pub trigger: Trigger,
}

impl Sensitivity {
    /// Positive-edge sensitivity on `signal`.
    pub fn posedge(signal: SignalId) -> Self {
        Self {
            signal,
            trigger: Trigger::PosEdge,
        }
    }

    /// Negative-edge sensitivity on `signal`.
    pub fn negedge(signal: SignalId) -> Self {
        Self {
            signal,
            trigger: Trigger::NegEdge,
        }
    }

    /// Value-change sensitivity on `signal`.
    pub fn change(signal: SignalId) -> Self {
        Self {
            signal,
            trigger: Trigger::AnyChange,
        }
    }
}

/// A unit of simulated behaviour.
///
/// `run` is called once per activation and must return without blocking;
/// writes it issues through the context become visible only after the
/// current delta cycle commits.
pub trait Process {
    /// Executes one activation of the process.
    fn run(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), SimError>;
}

impl<F> Process for F
where
    F: FnMut(&mut ProcessContext<'_>) -> Result<(), SimError>,
{
    fn run(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), SimError> {
        self(ctx)
    }
}

/// Registration data for a process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Unique process name.
    pub name: String,
    /// Transitions that wake the process.
    pub sensitivity: Vec<Sensitivity>,
    /// Whether the process runs once during initialization, before any event.
    pub initialize: bool,
}

impl ProcessSpec {
    /// Starts a spec with an empty sensitivity list.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sensitivity: Vec::new(),
            initialize: false,
        }
    }

    /// Adds a sensitivity entry.
    pub fn sensitive_to(mut self, sensitivity: Sensitivity) -> Self {
        self.sensitivity.push(sensitivity);
        self
    }

    /// Runs the process once at initialization.
    pub fn initialize(mut self) -> Self {
        self.initialize = true;
        self
    }
}

struct Entry {
    spec: ProcessSpec,
    body: Box<dyn Process>,
    runs: u64,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("spec", &self.spec)
            .field("runs", &self.runs)
            .finish_non_exhaustive()
    }
}

/// All registered processes and a signal-to-process sensitivity index.
#[derive(Debug, Default)]
pub struct ProcessTable {
    entries: Arena<ProcessId, Entry>,
    by_name: HashMap<String, ProcessId>,
    /// Processes listening on each signal, in registration order.
    index: HashMap<SignalId, Vec<ProcessId>>,
}

impl ProcessTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a process body under `spec`.
    ///
    /// Fails with [`SimError::DuplicateProcess`] if the name is taken.
    pub fn register(
        &mut self,
        spec: ProcessSpec,
        body: Box<dyn Process>,
    ) -> Result<ProcessId, SimError> {
        if self.by_name.contains_key(&spec.name) {
            return Err(SimError::DuplicateProcess(spec.name));
        }
        let name = spec.name.clone();
        let watched: BTreeSet<SignalId> = spec.sensitivity.iter().map(|s| s.signal).collect();
        let id = self.entries.alloc(Entry {
            spec,
            body,
            runs: 0,
        });
        for signal in watched {
            self.index.entry(signal).or_default().push(id);
        }
        self.by_name.insert(name, id);
        Ok(id)
    }

    /// Returns the processes woken by `changes`, in registration order.
    ///
    /// A process appears at most once however many of its sensitivities fire.
    pub fn sensitized(&self, changes: &[Change]) -> BTreeSet<ProcessId> {
        let mut woken = BTreeSet::new();
        for change in changes {
            let Some(listeners) = self.index.get(&change.signal) else {
                continue;
            };
            for &id in listeners {
                if woken.contains(&id) {
                    continue;
                }
                let Some(entry) = self.entries.get(id) else {
                    continue;
                };
                let fires = entry
                    .spec
                    .sensitivity
                    .iter()
                    .filter(|s| s.signal == change.signal)
                    .any(|s| s.trigger.fires(&change.old, &change.new));
                if fires {
                    woken.insert(id);
                }
            }
        }
        woken
    }

    /// Processes flagged to run during initialization.
    pub fn initial(&self) -> BTreeSet<ProcessId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.spec.initialize)
            .map(|(id, _)| id)
            .collect()
    }

    /// Runs one activation of `id`.
    pub fn run(&mut self, id: ProcessId, ctx: &mut ProcessContext<'_>) -> Result<(), SimError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| ctx.fail(format!("no process with id {}", id.as_raw())))?;
        entry.runs += 1;
        entry.body.run(ctx)
    }

    /// Finds a process by name.
    pub fn lookup(&self, name: &str) -> Option<ProcessId> {
        self.by_name.get(name).copied()
    }

    /// Returns the registered name of `id`.
    pub fn name(&self, id: ProcessId) -> Option<&str> {
        self.entries.get(id).map(|e| e.spec.name.as_str())
    }

    /// Returns the sensitivity list of `id`.
    pub fn sensitivity(&self, id: ProcessId) -> Option<&[Sensitivity]> {
        self.entries.get(id).map(|e| e.spec.sensitivity.as_slice())
    }

    /// Number of times `id` has run.
    pub fn run_count(&self, id: ProcessId) -> Option<u64> {
        self.entries.get(id).map(|e| e.runs)
    }

    /// Number of registered processes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no process is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
