//! Outcome stages applied between a fetch and block detection
//!
//! Each stage maps one outcome to another. Stages run in the order they are
//! listed in `fetch.middleware`.

use crate::config::{DetectorConfig, KNOWN_STAGES};
use crate::harvest::target::{FetchOutcome, Target};
use crate::ConfigError;

/// Status codes worth retrying that do not indicate a block
pub const TRANSIENT_STATUSES: [u16; 4] = [500, 502, 504, 408];

/// A single `FetchOutcome -> FetchOutcome` step
pub trait OutcomeStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, target: &Target, outcome: FetchOutcome) -> FetchOutcome;
}

/// Logs challenge pages without changing the outcome
pub struct ChallengeWarning {
    signatures: Vec<String>,
}

impl ChallengeWarning {
    pub fn new(signatures: &[String]) -> Self {
        Self {
            signatures: signatures.iter().map(|s| s.to_lowercase()).collect(),
        }
    }
}

impl OutcomeStage for ChallengeWarning {
    fn name(&self) -> &'static str {
        "challenge-warning"
    }

    fn apply(&self, target: &Target, outcome: FetchOutcome) -> FetchOutcome {
        if let FetchOutcome::Success { content, .. } = &outcome {
            let lowered = content.to_lowercase();
            if let Some(sig) = self.signatures.iter().find(|s| lowered.contains(s.as_str())) {
                tracing::warn!("Challenge marker '{}' seen on {}", sig, target);
            }
        }
        outcome
    }
}

/// Turns transient server errors into network failures so they retry
/// without being counted as blocks
pub struct TransientStatus;

impl OutcomeStage for TransientStatus {
    fn name(&self) -> &'static str {
        "transient-status"
    }

    fn apply(&self, target: &Target, outcome: FetchOutcome) -> FetchOutcome {
        match outcome {
            FetchOutcome::Success { status_code, .. }
                if TRANSIENT_STATUSES.contains(&status_code) =>
            {
                tracing::debug!("Transient HTTP {} from {}", status_code, target);
                FetchOutcome::NetworkFailure {
                    reason: format!("HTTP {}", status_code),
                }
            }
            other => other,
        }
    }
}

/// An ordered list of outcome stages
#[derive(Default)]
pub struct StageChain {
    stages: Vec<Box<dyn OutcomeStage>>,
}

impl StageChain {
    pub fn new(stages: Vec<Box<dyn OutcomeStage>>) -> Self {
        Self { stages }
    }

    /// Builds the chain named in configuration
    ///
    /// # Errors
    ///
    /// `ConfigError::Validation` for a stage name that is not known
    pub fn from_names(names: &[String], detector: &DetectorConfig) -> Result<Self, ConfigError> {
        let mut stages: Vec<Box<dyn OutcomeStage>> = Vec::with_capacity(names.len());
        for name in names {
            match name.as_str() {
                "challenge-warning" => stages.push(Box::new(ChallengeWarning::new(
                    &detector.challenge_signatures,
                ))),
                "transient-status" => stages.push(Box::new(TransientStatus)),
                other => {
                    return Err(ConfigError::Validation(format!(
                        "Unknown middleware stage '{}' (known: {})",
                        other,
                        KNOWN_STAGES.join(", ")
                    )))
                }
            }
        }
        Ok(Self { stages })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn apply(&self, target: &Target, outcome: FetchOutcome) -> FetchOutcome {
        self.stages
            .iter()
            .fold(outcome, |outcome, stage| stage.apply(target, outcome))
    }
}
