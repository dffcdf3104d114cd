//! Provider registry and failover engine.
//!
//! The factory owns every registered adapter together with its configuration
//! and runtime statistics, indexed by name. It is the only component that
//! mutates provider stats, and the orchestrator only ever talks to
//! upstreams through it.

mod health;
mod selection;
mod stats;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use mercato_core::connector::MercatoConnector;
use mercato_core::{
    AssetKind, CompanyProfile, HistoricalSeries, HistoryRequest, MarketOverview, MercatoError,
    ProviderResponse, Quote, SearchRequest, SearchResults, Symbol, tag_err,
};
use mercato_types::{FactoryConfig, FactoryStatus, ProviderConfig, ProviderStatus};

pub use health::HealthMonitorHandle;
use selection::Candidate;
use stats::ProviderStats;

/// Per-call overrides for timeout and failover attempts.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Per-attempt timeout; the factory default applies when `None`.
    pub timeout: Option<Duration>,
    /// Failover attempts for this call; the factory default applies when `None`.
    pub max_retries: Option<u32>,
}

/// A successful factory fetch: the payload plus everything provenance needs.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    /// The canonical payload.
    pub data: T,
    /// Provider that produced the data.
    pub provider: String,
    /// Whether the adapter served it from cache.
    pub cached: bool,
    /// Age of the cached entry, when served from cache.
    pub cache_age: Option<Duration>,
    /// Providers attempted before the serving one, in attempt order.
    pub fallback_sources: Vec<String>,
}

/// A failed factory fetch: the final error plus the providers attempted.
#[derive(Debug)]
pub struct FailoverFailure {
    /// The error surfaced to the orchestrator.
    pub error: MercatoError,
    /// Providers attempted on this call, in attempt order.
    pub attempted: Vec<String>,
}

struct ProviderEntry {
    config: ProviderConfig,
    adapter: Arc<dyn MercatoConnector>,
    stats: Mutex<ProviderStats>,
}

impl ProviderEntry {
    fn stats(&self) -> std::sync::MutexGuard<'_, ProviderStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Owns provider adapters, monitors their health, and selects + invokes the
/// right one for every request with retry and failover.
pub struct ProviderFactory {
    entries: BTreeMap<String, ProviderEntry>,
    cfg: FactoryConfig,
    rotation: AtomicUsize,
    failover_count: AtomicU64,
    total_requests: AtomicU64,
    started_at: Instant,
}

impl ProviderFactory {
    /// Build an empty factory with the given configuration.
    #[must_use]
    pub fn new(cfg: FactoryConfig) -> Self {
        Self {
            entries: BTreeMap::new(),
            cfg,
            rotation: AtomicUsize::new(0),
            failover_count: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Register a provider before initialization.
    ///
    /// # Errors
    /// Returns `InvalidArg` when the config fails validation, its name does
    /// not match the adapter's, or the name is already taken.
    pub fn register(
        &mut self,
        config: ProviderConfig,
        adapter: Arc<dyn MercatoConnector>,
    ) -> Result<(), MercatoError> {
        config.validate()?;
        if config.name != adapter.name() {
            return Err(MercatoError::invalid_arg(format!(
                "config name '{}' does not match adapter name '{}'",
                config.name,
                adapter.name()
            )));
        }
        if self.entries.contains_key(&config.name) {
            return Err(MercatoError::invalid_arg(format!(
                "provider '{}' is already registered",
                config.name
            )));
        }
        let stats = Mutex::new(ProviderStats::new(config.enabled));
        info!(
            target = "mercato::factory",
            event = "register",
            provider = %config.name,
            priority = config.priority,
            enabled = config.enabled,
            "registered provider"
        );
        self.entries.insert(
            config.name.clone(),
            ProviderEntry {
                config,
                adapter,
                stats,
            },
        );
        Ok(())
    }

    /// Number of registered providers.
    #[must_use]
    pub fn provider_count(&self) -> usize {
        self.entries.len()
    }

    /// Health-check every enabled adapter and mark it initialized. Returns
    /// name → whether the provider came up healthy.
    pub async fn initialize_all(&self) -> BTreeMap<String, bool> {
        let probes = self.entries.iter().map(|(name, entry)| async move {
            if !entry.config.enabled {
                return (name.clone(), false);
            }
            let healthy = matches!(
                tokio::time::timeout(self.cfg.global_timeout, entry.adapter.health_check()).await,
                Ok(Ok(()))
            );
            let now = Instant::now();
            let mut stats = entry.stats();
            stats.initialized = true;
            stats.last_health_check = Some(now);
            stats.status = if healthy {
                ProviderStatus::Healthy
            } else {
                ProviderStatus::Unhealthy
            };
            drop(stats);
            info!(
                target = "mercato::factory",
                event = "initialized",
                provider = %name,
                healthy = healthy,
                "provider initialized"
            );
            (name.clone(), healthy)
        });
        futures::future::join_all(probes).await.into_iter().collect()
    }

    /// Availability predicate applied over all providers not yet attempted:
    /// enabled, initialized, healthy or degraded, breaker closed.
    fn candidates(&self, attempted: &[String]) -> Vec<Candidate> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter_map(|(name, entry)| {
                if attempted.iter().any(|a| a == name) || !entry.config.enabled {
                    return None;
                }
                let mut stats = entry.stats();
                if !stats.initialized
                    || !matches!(
                        stats.status,
                        ProviderStatus::Healthy | ProviderStatus::Degraded
                    )
                    || stats.breaker_is_open(entry.config.circuit_breaker_timeout, now)
                {
                    return None;
                }
                Some(Candidate {
                    name: name.clone(),
                    priority: entry.config.priority,
                    degraded: stats.status == ProviderStatus::Degraded,
                    success_rate: stats.success_rate(),
                    avg_response_time: stats.avg_response_time,
                    requests_per_minute: stats.requests_per_minute(now),
                })
            })
            .collect()
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let secs = self.cfg.backoff_base.powi(attempt as i32).max(0.0);
        Duration::from_secs_f64(secs.min(self.cfg.backoff_cap.as_secs_f64()))
    }

    /// Core method: select providers under the configured policy and invoke
    /// `call` on each until one succeeds, honoring the per-call timeout and
    /// the failure accounting rules in [`Self::account_failure`].
    ///
    /// `call` returns `None` for providers that do not support the requested
    /// capability; those are skipped without touching their stats.
    ///
    /// # Errors
    /// Returns the last provider error once attempts are exhausted, an
    /// aggregate when several providers failed, or `NoAvailableProviders`
    /// when nothing was selectable at all.
    pub async fn get_with_failover<T, F, Fut>(
        &self,
        operation: &'static str,
        opts: &FetchOptions,
        call: F,
    ) -> Result<Fetched<T>, FailoverFailure>
    where
        T: Send,
        F: Fn(Arc<dyn MercatoConnector>) -> Option<Fut> + Send + Sync,
        Fut: Future<Output = Result<ProviderResponse<T>, MercatoError>> + Send,
    {
        let timeout = opts.timeout.unwrap_or(self.cfg.global_timeout);
        let max_retries = opts.max_retries.unwrap_or(self.cfg.max_retries).max(1);
        let mut attempted: Vec<String> = Vec::new();
        let mut errors: Vec<MercatoError> = Vec::new();

        for attempt in 0..max_retries {
            if attempt > 0 {
                let wait = self.backoff(attempt - 1);
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
            }

            let candidates = self.candidates(&attempted);
            let Some(name) = selection::select(self.cfg.policy, &candidates, &self.rotation)
            else {
                break;
            };
            let Some(entry) = self.entries.get(&name) else {
                break;
            };

            let Some(fut) = call(Arc::clone(&entry.adapter)) else {
                // Capability not supported; skip without stats impact.
                attempted.push(name);
                errors.push(MercatoError::unsupported(operation));
                continue;
            };

            attempted.push(name.clone());
            self.total_requests.fetch_add(1, Ordering::Relaxed);
            let started = Instant::now();
            entry.stats().record_request(started);

            let outcome = match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => Err(MercatoError::timeout(name.clone(), operation)),
            };

            match outcome {
                Ok(resp) => {
                    let elapsed = started.elapsed();
                    entry.stats().record_success(elapsed, Instant::now());
                    debug!(
                        target = "mercato::factory",
                        event = "served",
                        provider = %name,
                        operation = operation,
                        cached = resp.cached,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "request served"
                    );
                    let fallback_sources = attempted[..attempted.len() - 1].to_vec();
                    return Ok(Fetched {
                        data: resp.data,
                        provider: resp.provider.to_string(),
                        cached: resp.cached,
                        cache_age: resp.cache_age,
                        fallback_sources,
                    });
                }
                Err(err) => {
                    self.account_failure(&name, entry, &err);
                    errors.push(tag_err(&name, err));
                    if attempt + 1 < max_retries && !self.candidates(&attempted).is_empty() {
                        self.failover_count.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            target = "mercato::factory",
                            event = "failover",
                            from = %name,
                            operation = operation,
                            "failing over to another provider"
                        );
                    }
                }
            }
        }

        let error = match errors.len() {
            0 => MercatoError::NoAvailableProviders,
            1 => errors.remove(0),
            _ => MercatoError::AllProvidersFailed(errors),
        };
        Err(FailoverFailure { error, attempted })
    }

    /// Failure accounting: rate-limit denials and not-found misses leave
    /// health untouched; auth failures mark the provider unhealthy;
    /// transient failures and timeouts feed the circuit breaker.
    fn account_failure(&self, name: &str, entry: &ProviderEntry, err: &MercatoError) {
        let now = Instant::now();
        match err {
            MercatoError::RateLimited { retry_after, .. } => {
                debug!(
                    target = "mercato::factory",
                    event = "rate_limited",
                    provider = %name,
                    retry_after_secs = retry_after.as_secs(),
                    "provider skipped this attempt"
                );
            }
            MercatoError::NotFound { what } => {
                debug!(
                    target = "mercato::factory",
                    event = "miss",
                    provider = %name,
                    what = %what,
                    "provider-specific miss"
                );
            }
            MercatoError::Auth { .. } => {
                let mut stats = entry.stats();
                let opened =
                    stats.record_failure(entry.config.circuit_breaker_threshold, now);
                stats.status = ProviderStatus::Unhealthy;
                drop(stats);
                warn!(
                    target = "mercato::factory",
                    event = "auth_failure",
                    provider = %name,
                    breaker_opened = opened,
                    "provider marked unhealthy after authentication failure"
                );
            }
            e if e.counts_as_failure() => {
                let opened = entry
                    .stats()
                    .record_failure(entry.config.circuit_breaker_threshold, now);
                if opened {
                    warn!(
                        target = "mercato::factory",
                        event = "breaker_open",
                        provider = %name,
                        threshold = entry.config.circuit_breaker_threshold,
                        cooldown_secs = entry.config.circuit_breaker_timeout.as_secs(),
                        "circuit breaker opened"
                    );
                }
            }
            _ => {}
        }
    }

    /// Fetch an equity quote with failover.
    pub async fn get_stock_quote(
        &self,
        symbol: &Symbol,
        realtime: bool,
        opts: &FetchOptions,
    ) -> Result<Fetched<Quote>, FailoverFailure> {
        self.quote_with_kind(symbol, AssetKind::Equity, realtime, opts)
            .await
    }

    /// Fetch a crypto quote with failover.
    pub async fn get_crypto_quote(
        &self,
        symbol: &Symbol,
        realtime: bool,
        opts: &FetchOptions,
    ) -> Result<Fetched<Quote>, FailoverFailure> {
        self.quote_with_kind(symbol, AssetKind::Crypto, realtime, opts)
            .await
    }

    async fn quote_with_kind(
        &self,
        symbol: &Symbol,
        kind: AssetKind,
        realtime: bool,
        opts: &FetchOptions,
    ) -> Result<Fetched<Quote>, FailoverFailure> {
        let symbol = symbol.clone();
        self.get_with_failover("quote", opts, move |adapter| {
            if adapter.as_quote_provider().is_none() || !adapter.supports_kind(kind) {
                return None;
            }
            let symbol = symbol.clone();
            Some(async move {
                let provider = adapter
                    .as_quote_provider()
                    .ok_or_else(|| MercatoError::unsupported("quote"))?;
                provider.quote(&symbol, kind, realtime).await
            })
        })
        .await
    }

    /// Fetch a company profile with failover.
    pub async fn get_stock_profile(
        &self,
        symbol: &Symbol,
        opts: &FetchOptions,
    ) -> Result<Fetched<CompanyProfile>, FailoverFailure> {
        let symbol = symbol.clone();
        self.get_with_failover("profile", opts, move |adapter| {
            adapter.as_profile_provider()?;
            let symbol = symbol.clone();
            Some(async move {
                let provider = adapter
                    .as_profile_provider()
                    .ok_or_else(|| MercatoError::unsupported("profile"))?;
                provider.profile(&symbol).await
            })
        })
        .await
    }

    /// Fetch a historical series with failover. Providers that cannot serve
    /// the requested interval natively are skipped.
    pub async fn get_historical_data(
        &self,
        symbol: &Symbol,
        req: HistoryRequest,
        opts: &FetchOptions,
    ) -> Result<Fetched<HistoricalSeries>, FailoverFailure> {
        let symbol = symbol.clone();
        self.get_with_failover("history", opts, move |adapter| {
            let serves_interval = adapter
                .as_history_provider()
                .is_some_and(|p| p.supported_intervals(AssetKind::Equity).contains(&req.interval()));
            if !serves_interval {
                return None;
            }
            let symbol = symbol.clone();
            Some(async move {
                let provider = adapter
                    .as_history_provider()
                    .ok_or_else(|| MercatoError::unsupported("history"))?;
                provider.history(&symbol, req).await
            })
        })
        .await
    }

    /// Search securities with failover.
    pub async fn search_securities(
        &self,
        req: &SearchRequest,
        opts: &FetchOptions,
    ) -> Result<Fetched<SearchResults>, FailoverFailure> {
        let req = req.clone();
        self.get_with_failover("search", opts, move |adapter| {
            adapter.as_search_provider()?;
            let req = req.clone();
            Some(async move {
                let provider = adapter
                    .as_search_provider()
                    .ok_or_else(|| MercatoError::unsupported("search"))?;
                provider.search(&req).await
            })
        })
        .await
    }

    /// Fetch a market overview with failover.
    pub async fn get_market_overview(
        &self,
        opts: &FetchOptions,
    ) -> Result<Fetched<MarketOverview>, FailoverFailure> {
        self.get_with_failover("market-overview", opts, move |adapter| {
            adapter.as_overview_provider()?;
            Some(async move {
                let provider = adapter
                    .as_overview_provider()
                    .ok_or_else(|| MercatoError::unsupported("market-overview"))?;
                provider.market_overview().await
            })
        })
        .await
    }

    /// Declared accuracy baseline for a provider; the unknown-provider
    /// default applies to names the registry has never seen.
    #[must_use]
    pub fn accuracy_of(&self, provider: &str) -> f64 {
        self.entries
            .get(provider)
            .map_or(80.0, |e| e.config.accuracy())
    }

    /// Status of every registered provider, for provenance assembly.
    #[must_use]
    pub fn provider_health(&self) -> BTreeMap<String, ProviderStatus> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.stats().status))
            .collect()
    }

    /// Operator override for a provider's status (e.g. marking a partially
    /// functional upstream degraded). Disabled providers stay disabled.
    pub fn set_provider_status(&self, provider: &str, status: ProviderStatus) {
        if let Some(entry) = self.entries.get(provider) {
            let mut stats = entry.stats();
            if stats.status != ProviderStatus::Disabled {
                let old = stats.status;
                stats.status = status;
                drop(stats);
                info!(
                    target = "mercato::factory",
                    event = "status_override",
                    provider = provider,
                    from = %old,
                    to = %status,
                    "provider status overridden"
                );
            }
        }
    }

    /// Aggregate factory view: per-provider snapshots, policy, availability,
    /// global counters, uptime.
    #[must_use]
    pub fn factory_status(&self) -> FactoryStatus {
        let now = Instant::now();
        let providers = self
            .entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.stats().snapshot(&entry.config, now)))
            .collect();
        let available = self
            .candidates(&[])
            .into_iter()
            .map(|c| c.name)
            .collect();
        FactoryStatus {
            providers,
            policy: self.cfg.policy,
            available,
            failover_count: self.failover_count.load(Ordering::Relaxed),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            uptime_secs: now.duration_since(self.started_at).as_secs(),
        }
    }

    /// Calls where a further attempt followed a failed one.
    #[must_use]
    pub fn failover_count(&self) -> u64 {
        self.failover_count.load(Ordering::Relaxed)
    }
}
