//! Block detection
//!
//! Classifies a fetch outcome as clean, soft-blocked or hard-blocked. The
//! detector is pure: the same outcome always yields the same verdict.

use crate::config::DetectorConfig;
use crate::harvest::target::{BlockKind, FetchOutcome};

/// Statuses that mean the source has refused us outright
pub const HARD_BLOCK_STATUSES: [u16; 3] = [403, 429, 503];

/// Verdict of the block detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockVerdict {
    None,
    Soft,
    Hard,
}

impl From<BlockKind> for BlockVerdict {
    fn from(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Soft => Self::Soft,
            BlockKind::Hard => Self::Hard,
        }
    }
}

/// Decides whether a response is a real page or a block
#[derive(Debug, Clone)]
pub struct BlockDetector {
    /// Lowercased challenge markers
    signatures: Vec<String>,
    min_content_length: usize,
}

impl BlockDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            signatures: config
                .challenge_signatures
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            min_content_length: config.min_content_length,
        }
    }

    /// Classifies an outcome
    ///
    /// # Rules (first match wins)
    ///
    /// | Outcome | Verdict |
    /// |---------|---------|
    /// | status 403, 429 or 503 | Hard |
    /// | 2xx containing a challenge signature | Soft |
    /// | any other non-2xx status | Soft |
    /// | body shorter than `min-content-length` | Soft |
    /// | already `Blocked { kind }` | `kind` |
    /// | `NetworkFailure` | None |
    /// | otherwise | None |
    pub fn classify(&self, outcome: &FetchOutcome) -> BlockVerdict {
        match outcome {
            FetchOutcome::Success {
                content,
                status_code,
                ..
            } => {
                if HARD_BLOCK_STATUSES.contains(status_code) {
                    return BlockVerdict::Hard;
                }

                if !(200..300).contains(status_code) {
                    return BlockVerdict::Soft;
                }

                if self.find_signature(content).is_some() {
                    return BlockVerdict::Soft;
                }

                if content.len() < self.min_content_length {
                    return BlockVerdict::Soft;
                }

                BlockVerdict::None
            }
            FetchOutcome::Blocked {
                status_code: Some(code),
                ..
            } if HARD_BLOCK_STATUSES.contains(code) => BlockVerdict::Hard,
            FetchOutcome::Blocked { kind, .. } => (*kind).into(),
            FetchOutcome::NetworkFailure { .. } => BlockVerdict::None,
        }
    }

    /// Returns the first challenge signature found in `content`, if any
    pub fn find_signature(&self, content: &str) -> Option<&str> {
        let lowered = content.to_lowercase();
        self.signatures
            .iter()
            .find(|sig| lowered.contains(sig.as_str()))
            .map(String::as_str)
    }
}
