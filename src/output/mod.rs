//! Output module for reporting harvest results
//!
//! This module handles:
//! - Loading job and record statistics from the database
//! - Printing statistics, pending jobs and run summaries

pub mod stats;

pub use stats::{load_statistics, print_pending, print_statistics, HarvestStatistics};

use crate::harvest::RunSummary;

/// Prints the summary of a finished run to stdout
pub fn print_run_summary(summary: &RunSummary) {
    println!("=== Run Summary ===\n");
    println!("Jobs:");
    println!("  Created: {}", summary.jobs_created);
    println!("  Completed: {}", summary.jobs_completed);
    println!("  Failed: {}", summary.jobs_failed);
    println!("  Finished: {}", summary.jobs_finished());
    println!();
    println!("Records:");
    println!("  Inserted: {}", summary.records_inserted);
    println!("  Skipped (duplicate): {}", summary.records_skipped_duplicate);
    println!("  Rejected: {}", summary.records_rejected);
    println!();
    println!(
        "Blocks: {} soft, {} hard",
        summary.soft_blocks, summary.hard_blocks
    );
    println!("Elapsed: {:.1}s", summary.elapsed.as_secs_f64());
}
