//! Job lifecycle tracking
//!
//! Jobs move `pending -> running -> completed | failed`. Every transition is
//! checked and written while holding the storage lock, so concurrent workers
//! never see or produce a half-applied state change.

use crate::state::JobStatus;
use crate::storage::{lock, JobRecord, SharedStorage, Storage};
use crate::{Result, ScoutError};

#[derive(Clone)]
pub struct JobTracker {
    storage: SharedStorage,
}

impl JobTracker {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Creates a pending job for one (source, search term) pair
    pub fn create(&self, source: &str, search_term: &str) -> Result<i64> {
        let mut storage = lock(&self.storage)?;
        let job_id = storage.create_job(source, search_term)?;
        tracing::debug!("Created job {} for {}/'{}'", job_id, source, search_term);
        Ok(job_id)
    }

    /// Moves a pending job to running
    pub fn start(&self, job_id: i64) -> Result<()> {
        let mut storage = lock(&self.storage)?;
        check_transition(&*storage, job_id, JobStatus::Running)?;
        storage.start_job(job_id)?;
        Ok(())
    }

    /// Moves a running job to completed with the number of records it added
    pub fn complete(&self, job_id: i64, item_count: u64) -> Result<()> {
        let mut storage = lock(&self.storage)?;
        check_transition(&*storage, job_id, JobStatus::Completed)?;
        storage.complete_job(job_id, item_count)?;
        Ok(())
    }

    /// Moves a running job to failed
    pub fn fail(&self, job_id: i64, reason: &str) -> Result<()> {
        let mut storage = lock(&self.storage)?;
        check_transition(&*storage, job_id, JobStatus::Failed)?;
        storage.fail_job(job_id, reason)?;
        Ok(())
    }

    pub fn get(&self, job_id: i64) -> Result<JobRecord> {
        let storage = lock(&self.storage)?;
        storage.get_job(job_id)?.ok_or(ScoutError::JobNotFound(job_id))
    }

    /// Jobs that were created but never started, oldest first
    pub fn list_pending(&self) -> Result<Vec<JobRecord>> {
        let storage = lock(&self.storage)?;
        Ok(storage.list_pending_jobs()?)
    }
}

fn check_transition(storage: &(dyn Storage + Send), job_id: i64, to: JobStatus) -> Result<()> {
    let job = storage
        .get_job(job_id)?
        .ok_or(ScoutError::JobNotFound(job_id))?;

    if !job.status.can_transition_to(to) {
        return Err(ScoutError::InvalidTransition {
            job_id,
            from: job.status,
            to,
        });
    }
    Ok(())
}
