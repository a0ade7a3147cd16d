//! Signal storage with buffered writes and change detection.
//!
//! Writes never touch the visible value: they land in a per-signal pending
//! slot and only become visible at [`SignalRegistry::commit`]. This is what
//! keeps every process in a delta cycle looking at the same snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strobe_common::{Arena, ArenaId};

use crate::error::SimError;
use crate::value::{Value, ValueType};

/// Opaque ID of a registered signal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct SignalId(u32);

impl SignalId {
    /// Creates a `SignalId` from a raw index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

impl ArenaId for SignalId {
    fn from_raw(index: u32) -> Self {
        Self(index)
    }

    fn as_raw(self) -> u32 {
        self.0
    }
}

#[derive(Clone, Debug)]
struct SignalState {
    name: String,
    ty: ValueType,
    value: Value,
    pending: Option<Value>,
}

/// A committed value change, with the values on both sides of the commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    /// The signal that changed.
    pub signal: SignalId,
    /// Value before the commit.
    pub old: Value,
    /// Value after the commit.
    pub new: Value,
}

/// Owns every signal's committed and pending value.
#[derive(Debug, Default)]
pub struct SignalRegistry {
    signals: Arena<SignalId, SignalState>,
    by_name: HashMap<String, SignalId>,
    /// Signals holding a pending value, in first-write order.
    dirty: Vec<SignalId>,
}

impl SignalRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a signal; its type is taken from `initial`.
    pub fn register(&mut self, name: &str, initial: Value) -> Result<SignalId, SimError> {
        if self.by_name.contains_key(name) {
            return Err(SimError::DuplicateSignal(name.to_string()));
        }
        let id = self.signals.alloc(SignalState {
            name: name.to_string(),
            ty: initial.ty(),
            value: initial,
            pending: None,
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Returns the committed value of `signal`.
    pub fn read(&self, signal: SignalId) -> Result<&Value, SimError> {
        self.state(signal).map(|s| &s.value)
    }

    /// Queues `value` as the next value of `signal`.
    ///
    /// The visible value is unchanged until [`commit`](Self::commit). A later
    /// write before the commit replaces an earlier one.
    pub fn write(&mut self, signal: SignalId, value: Value) -> Result<(), SimError> {
        self.check(signal, &value)?;
        let state = self
            .signals
            .get_mut(signal)
            .ok_or(SimError::UnknownSignal(signal))?;
        if state.pending.replace(value).is_none() {
            self.dirty.push(signal);
        }
        Ok(())
    }

    /// Verifies that `value` may be written to `signal`.
    pub fn check(&self, signal: SignalId, value: &Value) -> Result<(), SimError> {
        let state = self.state(signal)?;
        if value.ty() != state.ty {
            return Err(SimError::TypeMismatch {
                signal: state.name.clone(),
                expected: state.ty,
                found: value.ty(),
            });
        }
        Ok(())
    }

    /// Applies every pending value and reports the signals that changed.
    ///
    /// Changes are returned in signal-ID order. Writing a signal's current
    /// value back produces no change entry.
    pub fn commit(&mut self) -> Vec<Change> {
        let mut dirty = std::mem::take(&mut self.dirty);
        dirty.sort_unstable();

        let mut changes = Vec::new();
        for id in dirty {
            let Some(state) = self.signals.get_mut(id) else {
                continue;
            };
            let Some(next) = state.pending.take() else {
                continue;
            };
            if next != state.value {
                let old = std::mem::replace(&mut state.value, next);
                changes.push(Change {
                    signal: id,
                    old,
                    new: state.value.clone(),
                });
            }
        }
        changes
    }

    /// Returns `true` if any write is waiting for a commit.
    pub fn has_pending(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Finds a signal by name.
    pub fn lookup(&self, name: &str) -> Option<SignalId> {
        self.by_name.get(name).copied()
    }

    /// Returns the name of `signal`.
    pub fn name(&self, signal: SignalId) -> Result<&str, SimError> {
        self.state(signal).map(|s| s.name.as_str())
    }

    /// Returns the declared type of `signal`.
    pub fn ty(&self, signal: SignalId) -> Result<ValueType, SimError> {
        self.state(signal).map(|s| s.ty)
    }

    /// Returns `true` if `signal` belongs to this registry.
    pub fn contains(&self, signal: SignalId) -> bool {
        self.signals.contains(signal)
    }

    /// Number of registered signals.
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Returns `true` if no signal is registered.
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Iterates `(id, name, committed value)` in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (SignalId, &str, &Value)> {
        self.signals
            .iter()
            .map(|(id, s)| (id, s.name.as_str(), &s.value))
    }

    fn state(&self, signal: SignalId) -> Result<&SignalState, SimError> {
        self.signals
            .get(signal)
            .ok_or(SimError::UnknownSignal(signal))
    }
}
