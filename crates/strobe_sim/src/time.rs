//! Simulation time with femtosecond ticks and unit-scaled construction.
//!
//! [`SimTime`] is an absolute point on the simulated timeline. It is also used
//! for durations (delays, clock periods); the kernel only ever adds a
//! duration to the current time, so a separate type would buy nothing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Femtoseconds per picosecond.
pub const FS_PER_PS: u64 = 1_000;
/// Femtoseconds per nanosecond.
pub const FS_PER_NS: u64 = 1_000_000;
/// Femtoseconds per microsecond.
pub const FS_PER_US: u64 = 1_000_000_000;
/// Femtoseconds per millisecond.
pub const FS_PER_MS: u64 = 1_000_000_000_000;
/// Femtoseconds per second.
pub const FS_PER_S: u64 = 1_000_000_000_000_000;

/// Unit scale for constructing and displaying times.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Femtoseconds.
    Fs,
    /// Picoseconds.
    Ps,
    /// Nanoseconds.
    Ns,
    /// Microseconds.
    Us,
    /// Milliseconds.
    Ms,
    /// Seconds.
    S,
}

impl TimeUnit {
    /// Number of femtosecond ticks in one unit.
    pub fn fs(self) -> u64 {
        match self {
            TimeUnit::Fs => 1,
            TimeUnit::Ps => FS_PER_PS,
            TimeUnit::Ns => FS_PER_NS,
            TimeUnit::Us => FS_PER_US,
            TimeUnit::Ms => FS_PER_MS,
            TimeUnit::S => FS_PER_S,
        }
    }

    /// The unit's suffix as written in durations (`"ns"`, `"us"`, ...).
    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Fs => "fs",
            TimeUnit::Ps => "ps",
            TimeUnit::Ns => "ns",
            TimeUnit::Us => "us",
            TimeUnit::Ms => "ms",
            TimeUnit::S => "s",
        }
    }

    fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "fs" => Some(TimeUnit::Fs),
            "ps" => Some(TimeUnit::Ps),
            "ns" => Some(TimeUnit::Ns),
            "us" => Some(TimeUnit::Us),
            "ms" => Some(TimeUnit::Ms),
            "s" => Some(TimeUnit::S),
            _ => None,
        }
    }
}

/// A point (or span) of simulated time, counted in femtosecond ticks.
///
/// Totally ordered. The kernel never moves the current time backwards.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SimTime(u64);

impl SimTime {
    /// Time zero.
    pub const ZERO: SimTime = SimTime(0);

    /// Creates a time of `count` units, or `None` on overflow.
    pub fn new(count: u64, unit: TimeUnit) -> Option<Self> {
        count.checked_mul(unit.fs()).map(SimTime)
    }

    /// Creates a time from a femtosecond tick count.
    pub const fn from_fs(fs: u64) -> Self {
        Self(fs)
    }

    /// Creates a time from picoseconds.
    pub const fn from_ps(ps: u64) -> Self {
        Self(ps * FS_PER_PS)
    }

    /// Creates a time from nanoseconds.
    pub const fn from_ns(ns: u64) -> Self {
        Self(ns * FS_PER_NS)
    }

    /// Creates a time from microseconds.
    pub const fn from_us(us: u64) -> Self {
        Self(us * FS_PER_US)
    }

    /// Returns the raw femtosecond tick count.
    pub const fn as_fs(self) -> u64 {
        self.0
    }

    /// Returns `true` for time zero.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Adds a duration, or `None` on overflow.
    pub fn checked_add(self, delay: SimTime) -> Option<SimTime> {
        self.0.checked_add(delay.0).map(SimTime)
    }

    /// Halves a duration (truncated), as used for clock half periods.
    pub const fn half(self) -> SimTime {
        SimTime(self.0 / 2)
    }

    /// The largest unit that divides this time exactly.
    pub fn natural_unit(self) -> TimeUnit {
        [TimeUnit::S, TimeUnit::Ms, TimeUnit::Us, TimeUnit::Ns, TimeUnit::Ps]
            .into_iter()
            .find(|u| self.0 >= u.fs() && self.0 % u.fs() == 0)
            .unwrap_or(TimeUnit::Fs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "0 s");
        }
        let unit = self.natural_unit();
        write!(f, "{} {}", self.0 / unit.fs(), unit.suffix())
    }
}

/// Error returned when a duration string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseTimeError {
    /// The input was empty.
    #[error("empty duration string")]
    Empty,
    /// The input did not start with a number.
    #[error("invalid duration: no numeric value in '{0}'")]
    NoNumber(String),
    /// The input had no unit suffix.
    #[error("missing unit in duration '{0}' (use fs, ps, ns, us, ms, or s)")]
    MissingUnit(String),
    /// The unit suffix is not recognized.
    #[error("unknown duration unit '{0}' (use fs, ps, ns, us, ms, or s)")]
    UnknownUnit(String),
    /// The value does not fit in the femtosecond tick counter.
    #[error("duration '{0}' is too large")]
    Overflow(String),
}

/// Parses durations such as `"10ns"`, `"250 ps"` or `"1us"`.
impl FromStr for SimTime {
    type Err = ParseTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseTimeError::Empty);
        }

        let digit_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        if digit_end == 0 {
            return Err(ParseTimeError::NoNumber(s.to_string()));
        }

        let number: u64 = s[..digit_end]
            .parse()
            .map_err(|_| ParseTimeError::Overflow(s.to_string()))?;

        let suffix = s[digit_end..].trim();
        if suffix.is_empty() {
            return Err(ParseTimeError::MissingUnit(s.to_string()));
        }
        let unit = TimeUnit::from_suffix(suffix)
            .ok_or_else(|| ParseTimeError::UnknownUnit(suffix.to_string()))?;

        SimTime::new(number, unit).ok_or_else(|| ParseTimeError::Overflow(s.to_string()))
    }
}
