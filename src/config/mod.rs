//! Configuration module - engine tuning knobs
//!
//! This module provides functionality for:
//! - Loading engine configuration from a JSON file
//! - Default values for all settings
//! - Type definitions for config structures
//!
//! # Module Structure
//!
//! - `defaults` - All default constant values
//! - `types` - Configuration struct definitions (EngineConfig, TimingConfig)
//! - `loader` - File system loading and parsing

mod defaults;
mod loader;
mod types;

pub use defaults::*;
pub use loader::{default_config_path, load_config};
pub use types::{EngineConfig, TimingConfig};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
