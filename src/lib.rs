//! Shelf-Scout: a block-aware product listing harvester
//!
//! This crate turns search terms into deduplicated product records collected
//! from several web sources, pacing requests per source, retrying soft blocks,
//! backing off from hard blocks and tracking every unit of work as a job.

pub mod config;
pub mod output;
pub mod harvest;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Shelf-Scout operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] storage::StorageError),

    #[error("Invalid job transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: i64,
        from: state::JobStatus,
        to: state::JobStatus,
    },

    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("No fetch strategy registered for source '{0}'")]
    MissingStrategy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL template in config: {0}")]
    InvalidTemplate(String),

    #[error("Invalid selector in config: {0}")]
    InvalidSelector(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// A scraped item that could not be turned into a record
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Record is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Record link is unusable: {0}")]
    BadLink(#[from] UrlError),

    #[error("Record price {0} is outside the accepted range")]
    PriceOutOfRange(f64),

    #[error("Record name is {0} characters long")]
    NameTooLong(usize),
}

/// Result type alias for Shelf-Scout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use harvest::{Orchestrator, RunSummary};
pub use state::{JobStatus, RateState};
pub use url::{build_target_url, canonicalize_link};
