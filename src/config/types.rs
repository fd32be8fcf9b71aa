use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Shelf-Scout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub governor: GovernorConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub fetch: FetchSettings,
    pub output: OutputConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Sources with `enabled = true`
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

/// What to do with a job whose pagination ends on an exhausted soft block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SoftBlockPolicy {
    /// Mark the job completed with whatever was collected so far
    #[default]
    Complete,
    /// Complete only when at least one record was collected, fail otherwise
    CompleteIfAny,
    /// Always mark the job failed
    Fail,
}

/// Run-level behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Maximum number of (source, term) pairs worked on concurrently
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    #[serde(rename = "on-soft-block", default)]
    pub on_soft_block: SoftBlockPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            on_soft_block: SoftBlockPolicy::default(),
        }
    }
}

/// Backoff bounds shared by every source; attempts are per source
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "base-backoff-ms", default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    #[serde(rename = "max-backoff-ms", default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Adaptive rate governor tuning
#[derive(Debug, Clone, Deserialize)]
pub struct GovernorConfig {
    /// Consecutive successes needed before the delay window shrinks
    #[serde(rename = "success-threshold", default = "default_success_threshold")]
    pub success_threshold: u32,

    /// Multiplier applied to the window on failure (and divisor on decay)
    #[serde(rename = "backoff-factor", default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Upper bound of the random jitter added to every delay (milliseconds)
    #[serde(rename = "jitter-ms", default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Hard cap for a widened window (milliseconds)
    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            success_threshold: default_success_threshold(),
            backoff_factor: default_backoff_factor(),
            jitter_ms: default_jitter_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Block detection rules
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Case-insensitive markers of CAPTCHA or interstitial pages
    #[serde(
        rename = "challenge-signatures",
        default = "default_challenge_signatures"
    )]
    pub challenge_signatures: Vec<String>,

    /// Bodies shorter than this are treated as soft blocks
    #[serde(rename = "min-content-length", default = "default_min_content_length")]
    pub min_content_length: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            challenge_signatures: default_challenge_signatures(),
            min_content_length: default_min_content_length(),
        }
    }
}

/// Request options handed to fetch strategies
#[derive(Debug, Clone, Deserialize)]
pub struct FetchSettings {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub proxy: Option<String>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Outcome stages, applied in this order
    #[serde(default = "default_middleware")]
    pub middleware: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            proxy: None,
            headers: BTreeMap::new(),
            middleware: default_middleware(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// One scraping source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Source identifier, unique within the config
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Listing URL with `{term}` and `{page}` placeholders
    #[serde(rename = "url-template")]
    pub url_template: String,

    #[serde(rename = "start-page", default = "default_start_page")]
    pub start_page: u32,

    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Lower bound of the delay between requests (milliseconds)
    #[serde(rename = "delay-floor-ms", default = "default_delay_floor_ms")]
    pub delay_floor_ms: u64,

    /// Upper bound of the initial delay window (milliseconds)
    #[serde(rename = "delay-ceiling-ms", default = "default_delay_ceiling_ms")]
    pub delay_ceiling_ms: u64,

    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Terms used when the run itself names none
    #[serde(rename = "search-terms", default)]
    pub search_terms: Vec<String>,

    #[serde(rename = "render-js", default)]
    pub render_js: bool,

    pub selectors: SelectorConfig,
}

impl SourceConfig {
    pub fn delay_floor(&self) -> Duration {
        Duration::from_millis(self.delay_floor_ms)
    }

    pub fn delay_ceiling(&self) -> Duration {
        Duration::from_millis(self.delay_ceiling_ms)
    }

    /// Page indices this source paginates through, in fetch order
    pub fn pages(&self) -> std::ops::Range<u32> {
        self.start_page..self.start_page.saturating_add(self.max_pages)
    }
}

/// CSS selectors locating listing fields inside a page
///
/// Every field takes one selector or a list tried in order; the first one
/// yielding a non-empty value wins.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// One match per listing; the first selector matching anything is used
    pub container: SelectorList,
    pub name: SelectorList,
    /// Attribute to read the name from instead of the element text
    #[serde(rename = "name-attr", default)]
    pub name_attr: Option<String>,
    pub price: SelectorList,
    /// Element holding the `href`
    pub link: SelectorList,
    #[serde(default)]
    pub image: Option<SelectorList>,
    #[serde(default)]
    pub availability: Option<SelectorList>,
}

/// One CSS selector, or fallbacks in priority order
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "OneOrMany")]
pub struct SelectorList(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for SelectorList {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(selector) => Self(vec![selector]),
            OneOrMany::Many(selectors) => Self(selectors),
        }
    }
}

impl From<&str> for SelectorList {
    fn from(selector: &str) -> Self {
        Self(vec![selector.to_string()])
    }
}

impl From<Vec<&str>> for SelectorList {
    fn from(selectors: Vec<&str>) -> Self {
        Self(selectors.into_iter().map(str::to_string).collect())
    }
}

impl SelectorList {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn default_true() -> bool {
    true
}

fn default_parallelism() -> usize {
    2
}

fn default_base_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_success_threshold() -> u32 {
    5
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_jitter_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_challenge_signatures() -> Vec<String> {
    [
        "captcha",
        "unusual traffic",
        "are you a robot",
        "robot check",
        "automated access",
        "request blocked",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_min_content_length() -> usize {
    512
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; shelf-scout/0.1)".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_middleware() -> Vec<String> {
    vec!["challenge-warning".to_string(), "transient-status".to_string()]
}

fn default_start_page() -> u32 {
    1
}

fn default_max_pages() -> u32 {
    1
}

fn default_delay_floor_ms() -> u64 {
    1_000
}

fn default_delay_ceiling_ms() -> u64 {
    2_000
}

fn default_max_attempts() -> u32 {
    3
}
