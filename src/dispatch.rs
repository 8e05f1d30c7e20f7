use crate::agent::{InvokeError, PlatformAgent};
use crate::aggregate::{aggregate, normalize, AggregateSearchResult};
use crate::platform::{Platform, PlatformCatalog, RequestError, SearchRequest};
use crate::search::PlatformResult;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(1);
pub const DEFAULT_PLATFORM_TIMEOUT: Duration = crate::agent::DEFAULT_RUN_TIMEOUT;
pub const DEFAULT_MAX_RETRIES: u32 = 1;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(2000);
/// Extra time past `platform_timeout` before an attempt is abandoned. Agents
/// enforce the deadline themselves and need this long to close their session.
const SESSION_CLOSE_GRACE: Duration = Duration::from_secs(15);

pub const TOTAL_FAILURE_MESSAGE: &str =
    "No results found. Try adjusting your search query or selecting different platforms.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchMode {
    /// One agent run covering every requested platform.
    Combined,
    /// One agent run per platform, strictly one after another with a cooldown.
    #[default]
    PerPlatform,
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub mode: DispatchMode,
    pub cooldown: Duration,
    pub platform_timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::default(),
            cooldown: DEFAULT_COOLDOWN,
            platform_timeout: DEFAULT_PLATFORM_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

/// Why a platform contributed nothing to a search.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlatformFailure {
    pub platform: Platform,
    pub error_type: String,
    pub message: String,
}

impl PlatformFailure {
    fn new(platform: &Platform, error: &InvokeError) -> Self {
        Self {
            platform: platform.clone(),
            error_type: error.error_type().to_string(),
            message: error.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid search request: {0}")]
    InvalidRequest(#[from] RequestError),
    #[error("{}", TOTAL_FAILURE_MESSAGE)]
    TotalFailure { failures: Vec<PlatformFailure> },
}

pub struct Dispatcher {
    agent: Arc<dyn PlatformAgent>,
    catalog: PlatformCatalog,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(agent: Arc<dyn PlatformAgent>, catalog: PlatformCatalog, config: DispatchConfig) -> Self {
        Self {
            agent,
            catalog,
            config,
        }
    }

    pub fn catalog(&self) -> &PlatformCatalog {
        &self.catalog
    }

    /// Validates the query and platform names, then runs the search.
    pub async fn search<S: AsRef<str>>(
        &self,
        query: &str,
        platforms: &[S],
    ) -> Result<AggregateSearchResult, SearchError> {
        let request = SearchRequest::new(query, platforms, &self.catalog)?;
        self.dispatch(&request).await
    }

    pub async fn dispatch(
        &self,
        request: &SearchRequest,
    ) -> Result<AggregateSearchResult, SearchError> {
        info!(
            query = request.query(),
            platforms = request.platforms().len(),
            mode = ?self.config.mode,
            "search started"
        );
        let (results, failures) = match self.config.mode {
            DispatchMode::PerPlatform => self.dispatch_per_platform(request).await,
            DispatchMode::Combined => self.dispatch_combined(request).await,
        };

        let aggregate = aggregate(results);
        if aggregate.is_empty() {
            warn!(
                query = request.query(),
                failed = failures.len(),
                "search produced no results"
            );
            return Err(SearchError::TotalFailure { failures });
        }
        info!(
            query = request.query(),
            platforms = aggregate.platforms.len(),
            hits = aggregate.total_hits(),
            failed = failures.len(),
            "search finished"
        );
        Ok(aggregate)
    }

    async fn dispatch_per_platform(
        &self,
        request: &SearchRequest,
    ) -> (Vec<PlatformResult>, Vec<PlatformFailure>) {
        let mut results = Vec::new();
        let mut failures = Vec::new();
        for (index, platform) in request.platforms().iter().enumerate() {
            if index > 0 {
                debug!(cooldown = ?self.config.cooldown, "cooling down before next platform");
                tokio::time::sleep(self.config.cooldown).await;
            }
            info!(platform = %platform, "dispatching platform");
            let outcome = self
                .with_retries(platform.as_str(), || self.agent.invoke(request.query(), platform))
                .await
                .map(normalize)
                .and_then(|result| {
                    if result.hits.is_empty() {
                        Err(InvokeError::Empty)
                    } else {
                        Ok(result)
                    }
                });
            match outcome {
                Ok(result) => {
                    info!(platform = %platform, hits = result.hits.len(), "platform succeeded");
                    results.push(result);
                }
                Err(e) => {
                    warn!(platform = %platform, error = %e, "platform failed");
                    failures.push(PlatformFailure::new(platform, &e));
                }
            }
        }
        (results, failures)
    }

    async fn dispatch_combined(
        &self,
        request: &SearchRequest,
    ) -> (Vec<PlatformResult>, Vec<PlatformFailure>) {
        let platforms = request.platforms();
        let response = match self
            .with_retries("combined", || self.agent.invoke_combined(request.query(), platforms))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "combined search failed");
                let failures = platforms
                    .iter()
                    .map(|platform| PlatformFailure::new(platform, &e))
                    .collect();
                return (Vec::new(), failures);
            }
        };

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for platform in platforms {
            let block = response
                .platforms
                .iter()
                .find(|block| platform.matches(block.platform.as_str()));
            let hits = block.map(|b| b.hits.clone()).unwrap_or_default();
            let result = normalize(PlatformResult::new(platform.clone(), hits));
            if result.hits.is_empty() {
                failures.push(PlatformFailure::new(platform, &InvokeError::Empty));
            } else {
                results.push(result);
            }
        }
        (results, failures)
    }

    /// Runs `call` under the platform timeout (plus the close grace), retrying
    /// transient failures after a jittered delay, at most `max_retries` times.
    async fn with_retries<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T, InvokeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, InvokeError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let limit = self.config.platform_timeout + SESSION_CLOSE_GRACE;
            let outcome = match tokio::time::timeout(limit, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(InvokeError::Timeout(self.config.platform_timeout)),
            };
            match outcome {
                Err(e) if e.is_transient() && attempt <= self.config.max_retries => {
                    let delay = jittered(self.config.retry_base_delay);
                    warn!(run = label, attempt, error = %e, delay = ?delay, "retrying after transient failure");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

fn jittered(base: Duration) -> Duration {
    if base.is_zero() {
        return base;
    }
    let factor: f64 = rand::rng().random_range(0.5..1.5);
    base.mul_f64(factor)
}
