//! State module for tracking collection progress
//!
//! # Components
//!
//! - `JobStatus`: Lifecycle of a (source, search term) job
//! - `RateState`: Per-source adaptive delay window used by the rate governor

mod job_state;
mod rate_state;

pub use job_state::JobStatus;
pub use rate_state::{RateState, MIN_WIDEN_STEP};
