//! Run events and the summary they add up to
//!
//! Workers never touch the summary directly. They send [`RunEvent`]s over a
//! channel and a single collector folds them into a [`RunSummary`].

use crate::harvest::target::BlockKind;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { item_count: u64 },
    Failed { reason: String },
}

/// Something that happened while working on a (source, term) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    JobCreated {
        job_id: i64,
        source: String,
        search_term: String,
    },
    /// The store refused to create the job; the pair was not worked on
    JobCreateFailed {
        source: String,
        search_term: String,
        error: String,
    },
    RecordInserted {
        job_id: i64,
    },
    RecordDuplicate {
        job_id: i64,
    },
    /// A scraped listing failed validation and was skipped
    RecordRejected {
        job_id: i64,
        reason: String,
    },
    /// A target ended blocked after its retries
    Blocked {
        job_id: i64,
        page: u32,
        kind: BlockKind,
    },
    JobFinished {
        job_id: i64,
        outcome: JobOutcome,
    },
}

/// Totals reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub jobs_created: u64,
    pub jobs_completed: u64,
    /// Includes pairs whose job could not even be created
    pub jobs_failed: u64,
    pub records_inserted: u64,
    pub records_skipped_duplicate: u64,
    pub records_rejected: u64,
    pub soft_blocks: u64,
    pub hard_blocks: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Folds one event into the totals
    pub fn apply(&mut self, event: &RunEvent) {
        match event {
            RunEvent::JobCreated { .. } => self.jobs_created += 1,
            RunEvent::JobCreateFailed { .. } => self.jobs_failed += 1,
            RunEvent::RecordInserted { .. } => self.records_inserted += 1,
            RunEvent::RecordDuplicate { .. } => self.records_skipped_duplicate += 1,
            RunEvent::RecordRejected { .. } => self.records_rejected += 1,
            RunEvent::Blocked { kind, .. } => match kind {
                BlockKind::Soft => self.soft_blocks += 1,
                BlockKind::Hard => self.hard_blocks += 1,
            },
            RunEvent::JobFinished { outcome, .. } => match outcome {
                JobOutcome::Completed { .. } => self.jobs_completed += 1,
                JobOutcome::Failed { .. } => self.jobs_failed += 1,
            },
        }
    }

    /// Jobs that ended one way or the other
    pub fn jobs_finished(&self) -> u64 {
        self.jobs_completed + self.jobs_failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} jobs created, {} completed, {} failed; {} records inserted, {} duplicates, {} rejected; {} soft / {} hard blocks in {:.1}s",
            self.jobs_created,
            self.jobs_completed,
            self.jobs_failed,
            self.records_inserted,
            self.records_skipped_duplicate,
            self.records_rejected,
            self.soft_blocks,
            self.hard_blocks,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Drains `events` until every sender is dropped
pub async fn collect(mut events: mpsc::UnboundedReceiver<RunEvent>) -> RunSummary {
    let mut summary = RunSummary::default();

    while let Some(event) = events.recv().await {
        match &event {
            RunEvent::JobCreateFailed {
                source,
                search_term,
                error,
            } => {
                tracing::error!("Could not create job for {}/'{}': {}", source, search_term, error);
            }
            RunEvent::RecordRejected { job_id, reason } => {
                tracing::debug!("Job {}: listing skipped: {}", job_id, reason);
            }
            RunEvent::JobFinished {
                job_id,
                outcome: JobOutcome::Completed { item_count },
            } => {
                tracing::info!("Job {} completed with {} new records", job_id, item_count);
            }
            RunEvent::JobFinished {
                job_id,
                outcome: JobOutcome::Failed { reason },
            } => {
                tracing::warn!("Job {} failed: {}", job_id, reason);
            }
            _ => {}
        }
        summary.apply(&event);
    }

    summary
}
