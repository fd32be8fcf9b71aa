//! Fetch targets and the outcomes reported for them

use crate::config::SourceConfig;
use crate::url::build_target_url;
use crate::UrlError;
use std::fmt;
use std::time::Duration;
use url::Url;

/// One listing page of one source for one search term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub source: String,
    pub search_term: String,
    pub page: u32,
    pub url: Url,
}

impl Target {
    /// Builds the target for `page` of `source`, filling its URL template
    pub fn new(source: &SourceConfig, search_term: &str, page: u32) -> Result<Self, UrlError> {
        let url = build_target_url(&source.url_template, search_term, page)?;
        Ok(Self {
            source: source.name.clone(),
            search_term: search_term.to_string(),
            page,
            url,
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/'{}' page {} ({})",
            self.source, self.search_term, self.page, self.url
        )
    }
}

/// Severity of a detected block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Worth retrying after a backoff (CAPTCHA page, truncated body, odd status)
    Soft,
    /// The source refuses us; retrying only makes it worse
    Hard,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Soft => "soft",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of fetching a target
///
/// A fetch strategy reports every HTTP response as `Success`, whatever its
/// status; deciding whether the response is a block is left to the detector.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success {
        content: String,
        status_code: u16,
        elapsed: Duration,
    },
    Blocked {
        kind: BlockKind,
        status_code: Option<u16>,
    },
    NetworkFailure {
        reason: String,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// HTTP status attached to the outcome, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Success { status_code, .. } => Some(*status_code),
            Self::Blocked { status_code, .. } => *status_code,
            Self::NetworkFailure { .. } => None,
        }
    }

    /// Turns this outcome into a block of the given kind, keeping its status
    pub fn into_blocked(self, kind: BlockKind) -> Self {
        Self::Blocked {
            kind,
            status_code: self.status_code(),
        }
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success {
                status_code,
                content,
                elapsed,
            } => write!(
                f,
                "HTTP {} ({} bytes in {:?})",
                status_code,
                content.len(),
                elapsed
            ),
            Self::Blocked {
                kind,
                status_code: Some(code),
            } => write!(f, "{} block (HTTP {})", kind, code),
            Self::Blocked {
                kind,
                status_code: None,
            } => write!(f, "{} block", kind),
            Self::NetworkFailure { reason } => write!(f, "network failure: {}", reason),
        }
    }
}
