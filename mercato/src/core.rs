//! The `Mercato` orchestrator and its builder.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use mercato_core::MercatoError;
use mercato_core::connector::MercatoConnector;
use mercato_middleware::{MarketCache, RateLimiter};
use mercato_types::{AnomalyConfig, CacheConfig, FactoryConfig, ProviderConfig};

use crate::factory::{HealthMonitorHandle, ProviderFactory};

/// Orchestrator that routes requests across registered providers and
/// attaches quality, anomaly, and provenance metadata to every response.
pub struct Mercato {
    pub(crate) factory: Arc<ProviderFactory>,
    pub(crate) cache: Arc<MarketCache>,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) anomaly_cfg: AnomalyConfig,
    monitor: Mutex<Option<HealthMonitorHandle>>,
}

/// Builder for constructing a [`Mercato`] orchestrator.
pub struct MercatoBuilder {
    connectors: Vec<(ProviderConfig, Arc<dyn MercatoConnector>)>,
    factory_cfg: FactoryConfig,
    anomaly_cfg: AnomalyConfig,
    cache: Option<Arc<MarketCache>>,
    limiter: Option<Arc<RateLimiter>>,
}

impl Default for MercatoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MercatoBuilder {
    /// Create a builder with default factory and anomaly configuration and
    /// no registered connectors.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connectors: Vec::new(),
            factory_cfg: FactoryConfig::default(),
            anomaly_cfg: AnomalyConfig::default(),
            cache: None,
            limiter: None,
        }
    }

    /// Register a provider connector with its configuration.
    #[must_use]
    pub fn with_connector(
        mut self,
        config: ProviderConfig,
        connector: Arc<dyn MercatoConnector>,
    ) -> Self {
        self.connectors.push((config, connector));
        self
    }

    /// Override the factory configuration (selection policy, timeouts,
    /// health monitoring cadence).
    #[must_use]
    pub fn factory_config(mut self, cfg: FactoryConfig) -> Self {
        self.factory_cfg = cfg;
        self
    }

    /// Override the anomaly detection thresholds.
    #[must_use]
    pub fn anomaly_config(mut self, cfg: AnomalyConfig) -> Self {
        self.anomaly_cfg = cfg;
        self
    }

    /// Share the cache the adapters were built with, so health snapshots and
    /// warming operate on the live store. A fresh default store is created
    /// when omitted.
    #[must_use]
    pub fn cache(mut self, cache: Arc<MarketCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Share the rate limiter the adapters were built with. When omitted, a
    /// limiter is assembled from the registered providers' budgets.
    #[must_use]
    pub fn limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Build the orchestrator.
    ///
    /// # Errors
    /// Returns `InvalidArg` when no connectors were registered, a config
    /// fails validation, or a config name does not match its adapter.
    pub fn build(self) -> Result<Mercato, MercatoError> {
        if self.connectors.is_empty() {
            return Err(MercatoError::invalid_arg(
                "no connectors registered; add at least one via with_connector(...)",
            ));
        }

        let limiter = match self.limiter {
            Some(limiter) => limiter,
            None => {
                let mut limiter = RateLimiter::new();
                for (config, _) in &self.connectors {
                    limiter = limiter.with_budgets(config.name.clone(), config.budgets);
                }
                Arc::new(limiter)
            }
        };
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(MarketCache::new(CacheConfig::default())));

        let mut factory = ProviderFactory::new(self.factory_cfg);
        for (config, connector) in self.connectors {
            factory.register(config, connector)?;
        }

        Ok(Mercato {
            factory: Arc::new(factory),
            cache,
            limiter,
            anomaly_cfg: self.anomaly_cfg,
            monitor: Mutex::new(None),
        })
    }
}

impl Mercato {
    /// Start building a new orchestrator.
    #[must_use]
    pub fn builder() -> MercatoBuilder {
        MercatoBuilder::new()
    }

    /// Initialize all enabled providers and start background health
    /// monitoring. Returns provider name → healthy-at-startup, and succeeds
    /// when at least one provider came up.
    ///
    /// # Errors
    /// Returns `NoAvailableProviders` when every provider failed its
    /// startup probe.
    pub async fn initialize(&self) -> Result<BTreeMap<String, bool>, MercatoError> {
        let results = self.factory.initialize_all().await;
        let healthy = results.values().filter(|ok| **ok).count();
        info!(
            target = "mercato::core",
            event = "initialized",
            healthy_providers = healthy,
            total_providers = results.len(),
            "market data service initialized"
        );
        if healthy == 0 {
            return Err(MercatoError::NoAvailableProviders);
        }
        let handle = self.factory.spawn_health_monitor();
        if let Ok(mut slot) = self.monitor.lock() {
            *slot = Some(handle);
        }
        Ok(results)
    }

    /// Stop background health monitoring. Adapters and their connection
    /// pools are dropped with the orchestrator.
    pub async fn shutdown(&self) {
        let handle = self.monitor.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
        info!(
            target = "mercato::core",
            event = "shutdown",
            "market data service shut down"
        );
    }

    /// The provider factory, for status inspection.
    #[must_use]
    pub fn factory(&self) -> &Arc<ProviderFactory> {
        &self.factory
    }
}
