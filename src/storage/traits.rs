//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::harvest::Record;
use crate::state::JobStatus;
use crate::storage::{InsertOutcome, JobRecord, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Writes take `&mut self`; callers share a backend behind a mutex and hold
/// the lock across any read-check-write sequence.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Sets the final status and finish timestamp of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Job Management =====

    /// Inserts a pending job and returns its ID
    fn create_job(&mut self, source: &str, search_term: &str) -> StorageResult<i64>;

    /// Gets a job by ID
    fn get_job(&self, job_id: i64) -> StorageResult<Option<JobRecord>>;

    /// Marks a job running and stamps `started_at`
    fn start_job(&mut self, job_id: i64) -> StorageResult<()>;

    /// Marks a job completed with its item count and stamps `completed_at`
    fn complete_job(&mut self, job_id: i64, item_count: u64) -> StorageResult<()>;

    /// Marks a job failed with a reason and stamps `completed_at`
    fn fail_job(&mut self, job_id: i64, reason: &str) -> StorageResult<()>;

    /// Gets all jobs still in the pending state, oldest first
    fn list_pending_jobs(&self) -> StorageResult<Vec<JobRecord>>;

    // ===== Records =====

    /// Inserts a record unless its canonical link is already stored
    ///
    /// # Returns
    ///
    /// * `InsertOutcome::Inserted` - A new row was written
    /// * `InsertOutcome::Duplicate` - The link was already present; nothing changed
    fn insert_record(&mut self, record: &Record) -> StorageResult<InsertOutcome>;

    // ===== Statistics =====

    /// Gets the total number of stored records
    fn count_records(&self) -> StorageResult<u64>;

    /// Counts jobs in the given status
    fn count_jobs_by_status(&self, status: JobStatus) -> StorageResult<u64>;

    /// Gets (source, record count) pairs sorted by source name
    fn count_records_by_source(&self) -> StorageResult<Vec<(String, u64)>>;
}
