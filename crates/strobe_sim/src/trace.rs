//! Recording of committed signal changes.
//!
//! Every commit that changes a signal produces one [`TraceEntry`]. The
//! [`TraceRecorder`] trait abstracts where those entries go: [`MemoryTrace`]
//! keeps them for inspection after the run, [`JsonLinesTrace`] streams them
//! as one JSON object per line.

use std::collections::HashMap;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::signal::SignalId;
use crate::time::SimTime;
use crate::value::Value;

/// One committed change of one signal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Time step of the commit.
    pub time: SimTime,
    /// Delta cycle within the time step (0 is the commit of timed updates).
    pub delta: u32,
    /// The signal that changed.
    pub signal: SignalId,
    /// The newly committed value.
    pub value: Value,
}

/// Destination for trace entries.
pub trait TraceRecorder {
    /// Announces a signal before the run starts.
    fn register_signal(&mut self, _id: SignalId, _name: &str) -> Result<(), SimError> {
        Ok(())
    }

    /// Records one committed change.
    fn record(&mut self, entry: &TraceEntry) -> Result<(), SimError>;

    /// Flushes buffered output once the run has halted.
    fn finalize(&mut self) -> Result<(), SimError> {
        Ok(())
    }
}

/// In-memory trace, in commit order.
#[derive(Clone, Debug, Default)]
pub struct MemoryTrace {
    entries: Vec<TraceEntry>,
}

impl MemoryTrace {
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded entries.
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Entries for a single signal.
    pub fn for_signal(&self, signal: SignalId) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter().filter(move |e| e.signal == signal)
    }
}

impl TraceRecorder for MemoryTrace {
    fn record(&mut self, entry: &TraceEntry) -> Result<(), SimError> {
        self.entries.push(entry.clone());
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    time_fs: u64,
    delta: u32,
    signal: &'a str,
    value: &'a Value,
}

/// Streams entries as JSON lines, with signal names resolved.
pub struct JsonLinesTrace<W: Write> {
    writer: W,
    names: HashMap<SignalId, String>,
}

impl<W: Write> JsonLinesTrace<W> {
    /// Creates a recorder writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            names: HashMap::new(),
        }
    }

    /// Consumes the recorder and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TraceRecorder for JsonLinesTrace<W> {
    fn register_signal(&mut self, id: SignalId, name: &str) -> Result<(), SimError> {
        self.names.insert(id, name.to_string());
        Ok(())
    }

    fn record(&mut self, entry: &TraceEntry) -> Result<(), SimError> {
        let fallback;
        let signal = match self.names.get(&entry.signal) {
            Some(name) => name.as_str(),
            None => {
                fallback = format!("#{}", entry.signal.as_raw());
                fallback.as_str()
            }
        };
        let line = JsonLine {
            time_fs: entry.time.as_fs(),
            delta: entry.delta,
            signal,
            value: &entry.value,
        };
        serde_json::to_writer(&mut self.writer, &line).map_err(std::io::Error::from)?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SimError> {
        self.writer.flush()?;
        Ok(())
    }
}
