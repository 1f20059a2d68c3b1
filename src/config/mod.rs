//! Configuration module - settings for storage, rendering and models
//!
//! # Module Structure
//!
//! - `defaults` - All default constant values
//! - `types` - The `Config` struct and its getters
//! - `loader` - File system loading and parsing

pub mod defaults;
mod loader;
mod types;

pub use types::Config;

pub use loader::{config_path, load_config, load_config_from};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
