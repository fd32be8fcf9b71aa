//! Run orchestration
//!
//! This module drives a whole harvest run:
//! - Expanding enabled sources and search terms into (source, term) pairs
//! - Running pairs on a bounded pool of worker tasks
//! - Paginating each pair through the governor and the retry controller
//! - Extracting, validating and storing records
//! - Recording every job's fate and adding it all up into a summary

use crate::config::{Config, SoftBlockPolicy, SourceConfig};
use crate::harvest::detector::BlockDetector;
use crate::harvest::events::{self, JobOutcome, RunEvent, RunSummary};
use crate::harvest::extractor::{Extractor, SelectorExtractor};
use crate::harvest::fetcher::{FetchConfig, FetchStrategy, StrategyRegistry};
use crate::harvest::governor::RateGovernor;
use crate::harvest::middleware::StageChain;
use crate::harvest::record::Record;
use crate::harvest::retry::{RetryController, RetryPolicy};
use crate::harvest::target::{BlockKind, FetchOutcome, Target};
use crate::harvest::tracker::JobTracker;
use crate::storage::{lock, InsertOutcome, SharedStorage, StorageError};
use crate::{Result, ScoutError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

const REASON_CANCELLED: &str = "cancelled";
const REASON_HARD_BLOCK: &str = "hard_block";
const REASON_SOFT_BLOCK: &str = "soft_block";
const REASON_NETWORK_FAILURE: &str = "network_failure";

/// Main harvest orchestrator
pub struct Orchestrator {
    config: Arc<Config>,
    storage: SharedStorage,
    tracker: JobTracker,
    strategies: StrategyRegistry,
    extractors: HashMap<String, Arc<dyn Extractor>>,
    governor: Arc<RateGovernor>,
    retry: Arc<RetryController>,
}

impl Orchestrator {
    /// Creates an orchestrator for the enabled sources of `config`
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `storage` - Store shared by every worker
    /// * `strategies` - Fetch strategy per source
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Ready to run
    /// * `Err(ScoutError::MissingStrategy)` - An enabled source has no strategy
    /// * `Err(ScoutError::Config)` - Bad selectors or middleware names
    pub fn new(config: Config, storage: SharedStorage, strategies: StrategyRegistry) -> Result<Self> {
        let mut extractors: HashMap<String, Arc<dyn Extractor>> = HashMap::new();
        for source in config.enabled_sources() {
            if strategies.get(&source.name).is_none() {
                return Err(ScoutError::MissingStrategy(source.name.clone()));
            }
            extractors.insert(
                source.name.clone(),
                Arc::new(SelectorExtractor::new(&source.selectors)?),
            );
        }

        let detector = Arc::new(BlockDetector::new(&config.detector));
        let stages = Arc::new(StageChain::from_names(
            &config.fetch.middleware,
            &config.detector,
        )?);
        tracing::debug!("Outcome stages: {:?}", stages.names());
        let governor = Arc::new(RateGovernor::new(
            config.governor.clone(),
            config.enabled_sources(),
        ));
        let retry = Arc::new(RetryController::new(
            detector,
            stages,
            Arc::clone(&governor),
        ));

        Ok(Self {
            config: Arc::new(config),
            tracker: JobTracker::new(Arc::clone(&storage)),
            storage,
            strategies,
            extractors,
            governor,
            retry,
        })
    }

    /// Replaces the extractor used for `source`
    pub fn with_extractor(mut self, source: impl Into<String>, extractor: Arc<dyn Extractor>) -> Self {
        self.extractors.insert(source.into(), extractor);
        self
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    pub fn governor(&self) -> &RateGovernor {
        &self.governor
    }

    /// Runs every (source, term) pair to completion
    ///
    /// See [`run_with_cancel`](Self::run_with_cancel).
    pub async fn run(&self, terms: &[String], parallelism: usize) -> RunSummary {
        self.run_with_cancel(terms, parallelism, CancellationToken::new())
            .await
    }

    /// Runs every (source, term) pair, stopping early when `cancel` fires
    ///
    /// Pairs are formed from every enabled source and every term in `terms`;
    /// a source's own `search-terms` stand in when `terms` is empty. At most
    /// `parallelism` pairs are worked on at once.
    ///
    /// On cancellation, pairs not yet started are skipped, and running pairs
    /// finish the fetch in flight and fail their job with `cancelled`.
    ///
    /// A run always returns a summary; blocked or failed jobs are counted in
    /// it, never raised.
    pub async fn run_with_cancel(
        &self,
        terms: &[String],
        parallelism: usize,
        cancel: CancellationToken,
    ) -> RunSummary {
        let started = Instant::now();
        let pairs = self.pairs(terms);
        let parallelism = parallelism.max(1);

        tracing::info!(
            "Starting run: {} pairs across {} sources, parallelism {}",
            pairs.len(),
            self.config.enabled_sources().count(),
            parallelism
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let collector = tokio::spawn(events::collect(events_rx));

        let semaphore = Arc::new(Semaphore::new(parallelism));
        let mut workers = JoinSet::new();

        for (source, term) in pairs {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Run cancelled; remaining pairs will not start");
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            let worker = match self.worker(&source, events_tx.clone(), cancel.clone()) {
                Some(w) => w,
                None => {
                    tracing::error!("No fetch strategy or extractor for source '{}'", source.name);
                    continue;
                }
            };

            workers.spawn(async move {
                let _permit = permit;
                worker.run(term).await;
            });
        }

        drop(events_tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker task ended abnormally: {}", e);
            }
        }

        let mut summary = match collector.await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!("Event collector ended abnormally: {}", e);
                RunSummary::default()
            }
        };
        summary.elapsed = started.elapsed();

        tracing::info!("Run finished: {}", summary);
        summary
    }

    /// (source, term) pairs, interleaved across sources
    fn pairs(&self, terms: &[String]) -> Vec<(Arc<SourceConfig>, String)> {
        let per_source: Vec<(Arc<SourceConfig>, Vec<String>)> = self
            .config
            .enabled_sources()
            .map(|source| {
                let chosen = if terms.is_empty() {
                    source.search_terms.as_slice()
                } else {
                    terms
                };
                let chosen: Vec<String> = chosen
                    .iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
                if chosen.is_empty() {
                    tracing::warn!("Source '{}' has no search terms to run", source.name);
                }
                (Arc::new(source.clone()), chosen)
            })
            .collect();

        let longest = per_source.iter().map(|(_, t)| t.len()).max().unwrap_or(0);
        let mut pairs = Vec::new();
        for i in 0..longest {
            for (source, terms) in &per_source {
                if let Some(term) = terms.get(i) {
                    pairs.push((Arc::clone(source), term.clone()));
                }
            }
        }
        pairs
    }

    fn worker(
        &self,
        source: &Arc<SourceConfig>,
        events: mpsc::UnboundedSender<RunEvent>,
        cancel: CancellationToken,
    ) -> Option<Worker> {
        Some(Worker {
            strategy: self.strategies.get(&source.name)?,
            extractor: Arc::clone(self.extractors.get(&source.name)?),
            fetch_config: FetchConfig::for_source(&self.config.fetch, source),
            policy: RetryPolicy::for_source(&self.config.retry, source),
            on_soft_block: self.config.runner.on_soft_block,
            source: Arc::clone(source),
            tracker: self.tracker.clone(),
            storage: Arc::clone(&self.storage),
            governor: Arc::clone(&self.governor),
            retry: Arc::clone(&self.retry),
            events,
            cancel,
        })
    }
}

/// Records gathered so far by one job
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    inserted: u64,
    duplicates: u64,
}

/// Everything one worker task needs to run a single (source, term) pair
struct Worker {
    source: Arc<SourceConfig>,
    strategy: Arc<dyn FetchStrategy>,
    extractor: Arc<dyn Extractor>,
    fetch_config: FetchConfig,
    policy: RetryPolicy,
    on_soft_block: SoftBlockPolicy,
    tracker: JobTracker,
    storage: SharedStorage,
    governor: Arc<RateGovernor>,
    retry: Arc<RetryController>,
    events: mpsc::UnboundedSender<RunEvent>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self, term: String) {
        let job_id = match self.tracker.create(&self.source.name, &term) {
            Ok(id) => id,
            Err(e) => {
                self.emit(RunEvent::JobCreateFailed {
                    source: self.source.name.clone(),
                    search_term: term,
                    error: e.to_string(),
                });
                return;
            }
        };
        self.emit(RunEvent::JobCreated {
            job_id,
            source: self.source.name.clone(),
            search_term: term.clone(),
        });

        if let Err(e) = self.tracker.start(job_id) {
            // A job that never ran cannot be moved to failed; it stays pending
            self.emit(RunEvent::JobFinished {
                job_id,
                outcome: JobOutcome::Failed {
                    reason: format!("persistence_error: {}", e),
                },
            });
            return;
        }

        tracing::info!("Job {} started: {}/'{}'", job_id, self.source.name, term);

        let mut outcome = self.paginate(job_id, &term).await;

        let recorded = match &outcome {
            JobOutcome::Completed { item_count } => self.tracker.complete(job_id, *item_count),
            JobOutcome::Failed { reason } => self.tracker.fail(job_id, reason),
        };
        if let Err(e) = recorded {
            tracing::error!("Job {} could not be finalized: {}", job_id, e);
            outcome = JobOutcome::Failed {
                reason: format!("persistence_error: {}", e),
            };
        }

        self.emit(RunEvent::JobFinished { job_id, outcome });
    }

    /// Walks the source's pages in order and decides how the job ends
    async fn paginate(&self, job_id: i64, term: &str) -> JobOutcome {
        let mut tally = Tally::default();

        for page in self.source.pages() {
            if self.cancel.is_cancelled() {
                return failed(REASON_CANCELLED);
            }

            let target = match Target::new(&self.source, term, page) {
                Ok(t) => t,
                Err(e) => return failed(&format!("invalid_target: {}", e)),
            };

            let delay = self.governor.next_delay(&self.source.name);
            if !delay.is_zero() {
                tracing::debug!("Waiting {:?} before {}", delay, target);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.cancel.cancelled() => return failed(REASON_CANCELLED),
                }
            }

            let outcome = self
                .retry
                .execute(
                    &target,
                    self.strategy.as_ref(),
                    &self.fetch_config,
                    &self.policy,
                    &self.cancel,
                )
                .await;

            match outcome {
                FetchOutcome::Success { content, .. } => {
                    if let Err(e) = self.store_page(job_id, &target, &content, &mut tally) {
                        tracing::error!("Job {}: storing records from {} failed: {}", job_id, target, e);
                        return failed(&format!("persistence_error: {}", e));
                    }
                }
                FetchOutcome::Blocked { kind, .. } => {
                    self.emit(RunEvent::Blocked { job_id, page, kind });
                    if kind == BlockKind::Hard {
                        return failed(REASON_HARD_BLOCK);
                    }
                    if self.cancel.is_cancelled() {
                        return failed(REASON_CANCELLED);
                    }
                    tracing::warn!("Job {}: soft block persisted on {}; stopping", job_id, target);
                    return self.soft_stop(REASON_SOFT_BLOCK, tally);
                }
                FetchOutcome::NetworkFailure { reason } => {
                    if self.cancel.is_cancelled() {
                        return failed(REASON_CANCELLED);
                    }
                    tracing::warn!("Job {}: giving up on {}: {}", job_id, target, reason);
                    return self.soft_stop(REASON_NETWORK_FAILURE, tally);
                }
            }
        }

        JobOutcome::Completed {
            item_count: tally.inserted,
        }
    }

    /// Ends a job whose pagination stopped early on an exhausted soft failure
    fn soft_stop(&self, reason: &str, tally: Tally) -> JobOutcome {
        match self.on_soft_block {
            SoftBlockPolicy::Complete => JobOutcome::Completed {
                item_count: tally.inserted,
            },
            SoftBlockPolicy::CompleteIfAny if tally.inserted + tally.duplicates > 0 => {
                JobOutcome::Completed {
                    item_count: tally.inserted,
                }
            }
            SoftBlockPolicy::CompleteIfAny | SoftBlockPolicy::Fail => failed(reason),
        }
    }

    /// Extracts, validates and inserts the records of one page
    fn store_page(
        &self,
        job_id: i64,
        target: &Target,
        content: &str,
        tally: &mut Tally,
    ) -> std::result::Result<(), StorageError> {
        let raw_records = self.extractor.extract(content, target);
        if raw_records.is_empty() {
            tracing::info!("No listings found on {}", target);
        }

        for raw in raw_records {
            let record = match Record::from_raw(raw, target, job_id) {
                Ok(r) => r,
                Err(e) => {
                    self.emit(RunEvent::RecordRejected {
                        job_id,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let inserted = lock(&self.storage)?.insert_record(&record)?;
            match inserted {
                InsertOutcome::Inserted => {
                    tally.inserted += 1;
                    self.emit(RunEvent::RecordInserted { job_id });
                }
                InsertOutcome::Duplicate => {
                    tally.duplicates += 1;
                    self.emit(RunEvent::RecordDuplicate { job_id });
                }
            }
        }

        Ok(())
    }

    fn emit(&self, event: RunEvent) {
        // The collector outlives every worker
        let _ = self.events.send(event);
    }
}

fn failed(reason: &str) -> JobOutcome {
    JobOutcome::Failed {
        reason: reason.to_string(),
    }
}
