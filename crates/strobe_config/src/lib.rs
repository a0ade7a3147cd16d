//! Parsing and validation of `strobe.toml` simulation settings.
//!
//! This crate reads the configuration file and produces a strongly-typed
//! [`StrobeConfig`] whose duration strings have already been checked, so
//! callers can resolve them into [`strobe_sim::SimTime`] values without
//! further error handling.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
