//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::StrobeConfig;
use std::path::Path;

/// Name of the configuration file looked up in a project directory.
pub const CONFIG_FILE_NAME: &str = "strobe.toml";

/// Loads and validates a `strobe.toml` configuration from a project directory.
pub fn load_config(project_dir: &Path) -> Result<StrobeConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `strobe.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<StrobeConfig, ConfigError> {
    let config: StrobeConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks that every duration parses and that bounds and periods are usable.
///
/// Clock periods must be an even number of femtoseconds so both half
/// periods are equal.
fn validate_config(config: &StrobeConfig) -> Result<(), ConfigError> {
    if config.simulation.max_delta_cycles == 0 {
        return Err(ConfigError::ValidationError(
            "simulation.max_delta_cycles must be positive".to_string(),
        ));
    }
    config.simulation.end_time()?;
    for (name, def) in &config.clocks {
        let spec = def.spec(name)?;
        if spec.half_period().is_zero() {
            return Err(ConfigError::ValidationError(format!(
                "clock '{name}' period {} is too short to toggle",
                def.period
            )));
        }
        if spec.period.as_fs() % 2 != 0 {
            return Err(ConfigError::ValidationError(format!(
                "clock '{name}' period {} is not an even number of femtoseconds",
                def.period
            )));
        }
    }
    Ok(())
}
