//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! job and record statistics from the storage layer.

use crate::state::JobStatus;
use crate::storage::{JobRecord, Storage};
use crate::ScoutError;

/// Harvest statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestStatistics {
    /// Total number of stored records
    pub total_records: u64,

    /// Record counts per source, sorted by source name
    pub records_by_source: Vec<(String, u64)>,

    /// Job counts for every status, in lifecycle order
    pub jobs_by_status: Vec<(JobStatus, u64)>,
}

impl HarvestStatistics {
    pub fn total_jobs(&self) -> u64 {
        self.jobs_by_status.iter().map(|(_, n)| n).sum()
    }

    pub fn jobs_in(&self, status: JobStatus) -> u64 {
        self.jobs_by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(ScoutError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<HarvestStatistics, ScoutError> {
    let total_records = storage.count_records()?;
    let records_by_source = storage.count_records_by_source()?;

    let mut jobs_by_status = Vec::new();
    for status in JobStatus::all_states() {
        jobs_by_status.push((status, storage.count_jobs_by_status(status)?));
    }

    Ok(HarvestStatistics {
        total_records,
        records_by_source,
        jobs_by_status,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Records: {}", stats.total_records);
    for (source, count) in &stats.records_by_source {
        println!("  {}: {}", source, count);
    }
    println!();

    let total_jobs = stats.total_jobs();
    println!("Jobs: {}", total_jobs);
    for (status, count) in &stats.jobs_by_status {
        let percentage = if total_jobs > 0 {
            (*count as f64 / total_jobs as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    let finished = stats.jobs_in(JobStatus::Completed) + stats.jobs_in(JobStatus::Failed);
    let success_rate = if finished > 0 {
        (stats.jobs_in(JobStatus::Completed) as f64 / finished as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Success Rate: {:.1}% ({} / {} finished jobs completed)",
        success_rate,
        stats.jobs_in(JobStatus::Completed),
        finished
    );
}

/// Prints jobs that were created but never started
pub fn print_pending(jobs: &[JobRecord]) {
    println!("=== Pending Jobs ({}) ===\n", jobs.len());
    for job in jobs {
        println!(
            "  #{} {}/'{}' (created {})",
            job.job_id, job.source, job.search_term, job.created_at
        );
    }
}
