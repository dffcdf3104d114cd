//! Configuration types shared across the orchestrator, factory, and middleware.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capability::Capability;

/// Configuration validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Rate budgets must satisfy `per_minute <= per_hour <= per_day`.
    #[error("rate budgets for {provider} are not monotonic: {detail}")]
    NonMonotonicBudgets {
        /// Provider whose budgets failed validation.
        provider: String,
        /// Human-readable description of the violated ordering.
        detail: String,
    },

    /// A score baseline fell outside `[0, 100]`.
    #[error("accuracy baseline {value} for {provider} is outside [0, 100]")]
    AccuracyOutOfRange {
        /// Provider whose baseline failed validation.
        provider: String,
        /// The offending value.
        value: f64,
    },

    /// An environment variable held an unparseable value.
    #[error("invalid value for {key}: {value}")]
    InvalidEnvValue {
        /// Environment key.
        key: String,
        /// The raw value that failed to parse.
        value: String,
    },
}

/// Strategy for selecting among available data providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SelectionPolicy {
    /// Pick the available provider with the lowest priority value. Deterministic.
    #[default]
    PriorityOrder,
    /// Rotate through available providers in stable alphabetical order.
    RoundRobin,
    /// Score providers on success rate and speed, pick the highest.
    HealthBased,
    /// Weighted random pick, inversely weighted by recent request volume.
    LoadBalanced,
}

impl SelectionPolicy {
    /// Stable identifier used in status reports and the environment surface.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PriorityOrder => "priority_order",
            Self::RoundRobin => "round_robin",
            Self::HealthBased => "health_based",
            Self::LoadBalanced => "load_balanced",
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "priority_order" => Ok(Self::PriorityOrder),
            "round_robin" => Ok(Self::RoundRobin),
            "health_based" => Ok(Self::HealthBased),
            "load_balanced" => Ok(Self::LoadBalanced),
            other => Err(ConfigError::InvalidEnvValue {
                key: "FAILOVER_STRATEGY".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Commercial tier of an upstream feed; drives the default accuracy baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderTier {
    /// Paid feed with contractual data quality.
    Premium,
    /// Free public feed.
    Free,
    /// Tier not declared.
    #[default]
    Unknown,
}

impl ProviderTier {
    /// Default accuracy baseline for the tier, used when a provider does not
    /// declare its own.
    #[must_use]
    pub const fn accuracy_baseline(self) -> f64 {
        match self {
            Self::Premium => 95.0,
            Self::Free => 85.0,
            Self::Unknown => 80.0,
        }
    }
}

/// Per-provider request budgets over the four sliding windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBudgets {
    /// Requests admitted per 60-second window.
    pub per_minute: u32,
    /// Requests admitted per 3600-second window.
    pub per_hour: u32,
    /// Requests admitted per 86400-second window.
    pub per_day: u32,
    /// Requests admitted per 10-second burst window.
    pub burst: u32,
}

impl RateBudgets {
    /// Budgets shipped for the premium reference feed.
    #[must_use]
    pub const fn premium_default() -> Self {
        Self {
            per_minute: 300,
            per_hour: 5_000,
            per_day: 25_000,
            burst: 10,
        }
    }

    /// Budgets shipped for the free reference feed.
    #[must_use]
    pub const fn free_default() -> Self {
        Self {
            per_minute: 100,
            per_hour: 2_000,
            per_day: 10_000,
            burst: 5,
        }
    }

    /// Enforce `per_minute <= per_hour <= per_day`.
    ///
    /// # Errors
    /// Returns `ConfigError::NonMonotonicBudgets` when the ordering is violated.
    pub fn validate(&self, provider: &str) -> Result<(), ConfigError> {
        if self.per_minute > self.per_hour || self.per_hour > self.per_day {
            return Err(ConfigError::NonMonotonicBudgets {
                provider: provider.to_string(),
                detail: format!(
                    "per_minute={} per_hour={} per_day={}",
                    self.per_minute, self.per_hour, self.per_day
                ),
            });
        }
        Ok(())
    }
}

impl Default for RateBudgets {
    fn default() -> Self {
        Self::free_default()
    }
}

/// Static configuration for one registered provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Stable provider name used for registry keys, cache keys, and logs.
    pub name: String,
    /// Disabled providers are never initialized or selected.
    pub enabled: bool,
    /// Selection priority; lower is preferred.
    pub priority: u32,
    /// Sliding-window request budgets.
    pub budgets: RateBudgets,
    /// Per-request upstream timeout.
    pub timeout: Duration,
    /// Transient-failure retries inside the adapter.
    pub max_retries: u32,
    /// Exponential backoff base (`base^attempt` seconds) between retries.
    pub backoff_base: f64,
    /// Consecutive failures that open the circuit breaker.
    pub circuit_breaker_threshold: u32,
    /// Cooldown before a breaker half-opens.
    pub circuit_breaker_timeout: Duration,
    /// Probe staleness bound for the background health monitor.
    pub health_check_interval: Duration,
    /// Operations this provider is declared to support.
    pub capabilities: Vec<Capability>,
    /// Commercial tier of the upstream.
    pub tier: ProviderTier,
    /// Declared accuracy baseline; defaults from the tier when `None`.
    pub accuracy_baseline: Option<f64>,
}

impl ProviderConfig {
    /// Build a config with the shipped defaults for the given name/tier.
    #[must_use]
    pub fn new(name: impl Into<String>, tier: ProviderTier) -> Self {
        let budgets = match tier {
            ProviderTier::Premium => RateBudgets::premium_default(),
            _ => RateBudgets::free_default(),
        };
        Self {
            name: name.into(),
            enabled: true,
            priority: 100,
            budgets,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_base: 2.0,
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout: Duration::from_secs(60),
            health_check_interval: Duration::from_secs(300),
            capabilities: vec![
                Capability::Quote,
                Capability::Profile,
                Capability::History,
                Capability::Search,
                Capability::MarketOverview,
            ],
            tier,
            accuracy_baseline: None,
        }
    }

    /// Effective accuracy baseline: declared value, else the tier default.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        self.accuracy_baseline
            .unwrap_or_else(|| self.tier.accuracy_baseline())
    }

    /// Validate invariants that cannot be expressed in the type system.
    ///
    /// # Errors
    /// Returns a `ConfigError` for non-monotonic budgets or an out-of-range
    /// accuracy baseline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.budgets.validate(&self.name)?;
        if let Some(acc) = self.accuracy_baseline
            && !(0.0..=100.0).contains(&acc)
        {
            return Err(ConfigError::AccuracyOutOfRange {
                provider: self.name.clone(),
                value: acc,
            });
        }
        Ok(())
    }
}

/// Factory-wide knobs: selection policy, health monitoring, failover pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactoryConfig {
    /// Provider selection policy, fixed at construction.
    pub policy: SelectionPolicy,
    /// Tick interval of the background health monitor.
    pub monitor_interval: Duration,
    /// Upper bound on concurrent health probes.
    pub max_concurrent_health_checks: usize,
    /// Default per-call timeout when the caller does not override it.
    pub global_timeout: Duration,
    /// Default failover attempts per call.
    pub max_retries: u32,
    /// Exponential backoff base between failover attempts.
    pub backoff_base: f64,
    /// Ceiling on a single backoff sleep.
    pub backoff_cap: Duration,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            policy: SelectionPolicy::default(),
            monitor_interval: Duration::from_secs(60),
            max_concurrent_health_checks: 4,
            global_timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_base: 2.0,
            backoff_cap: Duration::from_secs(10),
        }
    }
}

/// Anomaly detection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Master switch; when off, every report is empty with zero confidence.
    pub enabled: bool,
    /// Absolute `change_percent` beyond which a move is flagged.
    pub price_change_threshold_pct: f64,
    /// Multiple of the trailing mean volume beyond which volume is flagged.
    pub volume_spike_multiplier: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            price_change_threshold_pct: 20.0,
            volume_spike_multiplier: 5.0,
        }
    }
}

/// Cache levels with distinct TTL strategies.
///
/// The level used for an entry is determined by the endpoint class, never by
/// the provider.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CacheLevel {
    /// Real-time quote reads; 30 seconds.
    RealTime,
    /// Standard quotes; 1 minute.
    Quotes,
    /// Company profiles; 1 hour.
    Profiles,
    /// Historical series; 4 hours.
    Historical,
    /// Search results; 15 minutes.
    Search,
    /// Market overview; 5 minutes.
    MarketOverview,
    /// Model-generated insights; 30 minutes.
    AiInsights,
}

impl CacheLevel {
    /// All levels, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::RealTime,
        Self::Quotes,
        Self::Profiles,
        Self::Historical,
        Self::Search,
        Self::MarketOverview,
        Self::AiInsights,
    ];

    /// Stable identifier used inside cache keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RealTime => "real_time",
            Self::Quotes => "quotes",
            Self::Profiles => "profiles",
            Self::Historical => "historical",
            Self::Search => "search",
            Self::MarketOverview => "market_overview",
            Self::AiInsights => "ai_insights",
        }
    }

    /// Default TTL for the level.
    #[must_use]
    pub const fn default_ttl(self) -> Duration {
        match self {
            Self::RealTime => Duration::from_secs(30),
            Self::Quotes => Duration::from_secs(60),
            Self::Profiles => Duration::from_secs(3_600),
            Self::Historical => Duration::from_secs(14_400),
            Self::Search => Duration::from_secs(900),
            Self::MarketOverview => Duration::from_secs(300),
            Self::AiInsights => Duration::from_secs(1_800),
        }
    }
}

impl core::fmt::Display for CacheLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Per-level TTL overrides; absent levels use [`CacheLevel::default_ttl`].
    pub ttl_overrides: BTreeMap<CacheLevel, Duration>,
    /// Memory budget per level store, in bytes of stored payload.
    pub max_bytes_per_level: u64,
}

impl CacheConfig {
    /// Effective TTL for a level.
    #[must_use]
    pub fn ttl_for(&self, level: CacheLevel) -> Duration {
        self.ttl_overrides
            .get(&level)
            .copied()
            .unwrap_or_else(|| level.default_ttl())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_overrides: BTreeMap::new(),
            max_bytes_per_level: 64 * 1024 * 1024,
        }
    }
}
