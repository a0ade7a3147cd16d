//! Configuration types deserialized from `strobe.toml`.
//!
//! Durations are kept as the strings the user wrote (`"10ns"`, `"500 ps"`)
//! and resolved to [`SimTime`] on demand, so error messages can quote them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use strobe_sim::{ClockSpec, SimConfig, SimTime, DEFAULT_MAX_DELTA_CYCLES};

use crate::error::ConfigError;

/// The top-level configuration parsed from `strobe.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrobeConfig {
    /// Run settings.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Named clock definitions.
    #[serde(default)]
    pub clocks: BTreeMap<String, ClockDef>,
}

/// The `[simulation]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Stop time; `strobe run` stops at 10 ns when neither this nor `--time` is set.
    #[serde(default)]
    pub end_time: Option<String>,
    /// Delta cycles per time step before an oscillation is reported.
    #[serde(default = "default_max_delta_cycles")]
    pub max_delta_cycles: u32,
    /// Path of a JSON-lines trace file to write.
    #[serde(default)]
    pub trace: Option<PathBuf>,
}

fn default_max_delta_cycles() -> u32 {
    DEFAULT_MAX_DELTA_CYCLES
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            end_time: None,
            max_delta_cycles: default_max_delta_cycles(),
            trace: None,
        }
    }
}

impl SimulationConfig {
    /// The resolved stop time, if one is configured.
    pub fn end_time(&self) -> Result<Option<SimTime>, ConfigError> {
        self.end_time
            .as_deref()
            .map(|s| parse_duration("simulation.end_time", s))
            .transpose()
    }

    /// Kernel settings derived from this table.
    pub fn sim_config(&self) -> SimConfig {
        SimConfig {
            max_delta_cycles: self.max_delta_cycles,
            ..SimConfig::default()
        }
    }
}

/// A `[clocks.<name>]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClockDef {
    /// Full clock period, e.g. `"10ns"`.
    pub period: String,
    /// Level before the first toggle.
    #[serde(default)]
    pub initial: bool,
    /// Delay before the clock starts.
    #[serde(default)]
    pub start: Option<String>,
}

impl ClockDef {
    /// Resolves this definition into a [`ClockSpec`]; `name` is used in errors.
    pub fn spec(&self, name: &str) -> Result<ClockSpec, ConfigError> {
        let period = parse_duration(&format!("clocks.{name}.period"), &self.period)?;
        let mut spec = ClockSpec::new(period).initial(self.initial);
        if let Some(start) = &self.start {
            spec = spec.start(parse_duration(&format!("clocks.{name}.start"), start)?);
        }
        Ok(spec)
    }
}

/// Parses a duration literal, naming `field` on failure.
pub fn parse_duration(field: &str, value: &str) -> Result<SimTime, ConfigError> {
    value
        .parse::<SimTime>()
        .map_err(|e| ConfigError::InvalidDuration {
            field: field.to_string(),
            message: e.to_string(),
        })
}
