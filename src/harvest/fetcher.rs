//! Fetch strategies
//!
//! This module defines the capability every page fetcher provides, the
//! per-request options handed to it, the reqwest-backed HTTP strategy and a
//! registry mapping source names to strategies.

use crate::config::{FetchSettings, SourceConfig};
use crate::harvest::target::{FetchOutcome, Target};
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Options applied to a single fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub headers: BTreeMap<String, String>,
    /// Whether the page needs JavaScript rendering to show its listings
    pub render_js: bool,
    pub proxy: Option<String>,
}

impl FetchConfig {
    /// Combines the shared fetch settings with a source's own options
    pub fn for_source(settings: &FetchSettings, source: &SourceConfig) -> Self {
        Self {
            user_agent: settings.user_agent.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
            headers: settings.headers.clone(),
            render_js: source.render_js,
            proxy: settings.proxy.clone(),
        }
    }
}

/// Something that can turn a target into a fetch outcome
///
/// Implementations never fail: transport problems are reported as
/// `FetchOutcome::NetworkFailure`.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn fetch(&self, target: &Target, config: &FetchConfig) -> FetchOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    user_agent: String,
    timeout: Duration,
    proxy: Option<String>,
}

/// Plain HTTP fetch strategy built on reqwest
///
/// Clients are cached per (user agent, timeout, proxy) so connection pools are
/// reused across targets. JavaScript is never executed.
#[derive(Default)]
pub struct HttpFetcher {
    clients: Mutex<HashMap<ClientKey, Client>>,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, config: &FetchConfig) -> Result<Client, reqwest::Error> {
        let key = ClientKey {
            user_agent: config.user_agent.clone(),
            timeout: config.timeout,
            proxy: config.proxy.clone(),
        };

        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let client = build_http_client(config)?;
        clients.insert(key, client.clone());
        Ok(client)
    }
}

/// Builds an HTTP client for the given fetch options
///
/// # Arguments
///
/// * `config` - User agent, timeout and optional proxy to apply
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client (e.g. malformed proxy)
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout)
        .connect_timeout(config.timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(Proxy::all(proxy.as_str())?);
    }

    builder.build()
}

#[async_trait]
impl FetchStrategy for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, target: &Target, config: &FetchConfig) -> FetchOutcome {
        if config.render_js {
            tracing::warn!(
                "Source '{}' asks for JavaScript rendering, which the HTTP fetcher cannot do; fetching raw HTML",
                target.source
            );
        }

        let client = match self.client_for(config) {
            Ok(c) => c,
            Err(e) => {
                return FetchOutcome::NetworkFailure {
                    reason: format!("failed to build HTTP client: {}", e),
                }
            }
        };

        let mut request = client.get(target.url.clone());
        for (name, value) in &config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let started = Instant::now();
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return network_failure(e),
        };

        let status_code = response.status().as_u16();
        match response.text().await {
            Ok(content) => FetchOutcome::Success {
                content,
                status_code,
                elapsed: started.elapsed(),
            },
            Err(e) => network_failure(e),
        }
    }
}

fn network_failure(e: reqwest::Error) -> FetchOutcome {
    let reason = if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    };
    FetchOutcome::NetworkFailure { reason }
}

/// Maps source names to the strategy that fetches them
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn FetchStrategy>>,
    fallback: Option<Arc<dyn FetchStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that fetches every source over plain HTTP
    pub fn http_default() -> Self {
        Self::new().with_fallback(Arc::new(HttpFetcher::new()))
    }

    /// Sets the strategy used for sources without their own registration
    pub fn with_fallback(mut self, strategy: Arc<dyn FetchStrategy>) -> Self {
        self.fallback = Some(strategy);
        self
    }

    pub fn register(&mut self, source: impl Into<String>, strategy: Arc<dyn FetchStrategy>) {
        self.strategies.insert(source.into(), strategy);
    }

    pub fn get(&self, source: &str) -> Option<Arc<dyn FetchStrategy>> {
        self.strategies
            .get(source)
            .or(self.fallback.as_ref())
            .cloned()
    }
}
