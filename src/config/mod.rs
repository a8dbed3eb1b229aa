//! Configuration module
//!
//! Handles loading, parsing, and validating TOML configuration files.
//! All fields carry defaults, so running without a config file is supported.

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CrawlerConfig, EngineConfig, FetchConfig, IndexConfig, OutputConfig, RobotsConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
