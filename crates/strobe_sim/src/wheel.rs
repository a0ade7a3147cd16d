//! Pending-event queue and the current simulation time.
//!
//! [`TimeWheel`] owns the only copy of "now". Time moves exclusively through
//! [`TimeWheel::advance`] (and [`TimeWheel::skip_to`] at the end of a bounded
//! run), so it can never go backwards.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::error::SimError;
use crate::process::ProcessId;
use crate::signal::SignalId;
use crate::time::SimTime;
use crate::value::Value;

/// Something that happens at a scheduled time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Run the process at the start of the time step.
    Wake(ProcessId),
    /// Write `value` to `signal` at the start of the time step.
    Update {
        /// The signal to drive.
        signal: SignalId,
        /// The value written.
        value: Value,
    },
}

/// All events due at a single time, in scheduling order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventBatch {
    /// The time the batch is due.
    pub time: SimTime,
    /// The events, in the order they were scheduled.
    pub events: Vec<Event>,
}

#[derive(Debug)]
struct Scheduled {
    time: SimTime,
    seq: u64,
    event: Event,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time).then(self.seq.cmp(&other.seq))
    }
}

/// Min-heap of future events plus the current time.
///
/// Events due at the same time come out in insertion order.
#[derive(Debug, Default)]
pub struct TimeWheel {
    now: SimTime,
    queue: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
}

impl TimeWheel {
    /// Creates an empty wheel at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current simulation time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedules `event` at the absolute time `time`.
    ///
    /// Scheduling at the current time is allowed; strictly earlier times
    /// fail with [`SimError::InvalidTime`].
    pub fn schedule_at(&mut self, time: SimTime, event: Event) -> Result<(), SimError> {
        if time < self.now {
            return Err(SimError::InvalidTime {
                requested: time,
                now: self.now,
            });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Scheduled { time, seq, event }));
        Ok(())
    }

    /// Schedules `event` at `now + delay` and returns that time.
    pub fn schedule_after(&mut self, delay: SimTime, event: Event) -> Result<SimTime, SimError> {
        let time = self
            .now
            .checked_add(delay)
            .ok_or(SimError::TimeOverflow {
                now: self.now,
                delay,
            })?;
        self.schedule_at(time, event)?;
        Ok(time)
    }

    /// Returns the time of the earliest pending event.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.queue.peek().map(|Reverse(s)| s.time)
    }

    /// Pops every event sharing the earliest pending time and moves `now`
    /// to that time.
    ///
    /// Returns `None`, leaving `now` untouched, when nothing is pending.
    pub fn advance(&mut self) -> Option<EventBatch> {
        let time = self.peek_time()?;
        let mut events = Vec::new();
        while let Some(Reverse(next)) = self.queue.peek() {
            if next.time != time {
                break;
            }
            if let Some(Reverse(scheduled)) = self.queue.pop() {
                events.push(scheduled.event);
            }
        }
        debug_assert!(time >= self.now, "time wheel moved backwards");
        self.now = time;
        Some(EventBatch { time, events })
    }

    /// Moves `now` forward to `time` without popping anything.
    ///
    /// Never moves past the earliest pending event and never moves backwards;
    /// the resulting time is returned.
    pub fn skip_to(&mut self, time: SimTime) -> SimTime {
        let target = match self.peek_time() {
            Some(next) => time.min(next),
            None => time,
        };
        if target > self.now {
            self.now = target;
        }
        self.now
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
