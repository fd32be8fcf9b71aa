//! Harvest pipeline
//!
//! This module holds everything between a search term and a stored record:
//! - Fetch strategies and the outcome stages run after every fetch
//! - Block detection, the adaptive rate governor and bounded retries
//! - Listing extraction and record validation
//! - Job tracking and the orchestrator that drives a whole run

mod detector;
mod events;
mod extractor;
mod fetcher;
mod governor;
mod middleware;
mod orchestrator;
mod record;
mod retry;
mod target;
mod tracker;

pub use detector::{BlockDetector, BlockVerdict, HARD_BLOCK_STATUSES};
pub use events::{JobOutcome, RunEvent, RunSummary};
pub use extractor::{Extractor, RawRecord, SelectorExtractor};
pub use fetcher::{build_http_client, FetchConfig, FetchStrategy, HttpFetcher, StrategyRegistry};
pub use governor::RateGovernor;
pub use middleware::{ChallengeWarning, OutcomeStage, StageChain, TransientStatus, TRANSIENT_STATUSES};
pub use orchestrator::Orchestrator;
pub use record::{
    normalize_price, AvailabilityStatus, Record, MAX_NAME_CHARS, PRICE_RANGE, UNKNOWN_AVAILABILITY,
};
pub use retry::{RetryController, RetryPolicy};
pub use target::{BlockKind, FetchOutcome, Target};
pub use tracker::JobTracker;
