//! Configuration module for Shelf-Scout
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use shelf_scout::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("scout.toml")).unwrap();
//! println!("Parallelism: {}", config.runner.parallelism);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DetectorConfig, FetchSettings, GovernorConfig, OutputConfig, RetryConfig,
    RunnerConfig, SelectorConfig, SelectorList, SoftBlockPolicy, SourceConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::KNOWN_STAGES;
