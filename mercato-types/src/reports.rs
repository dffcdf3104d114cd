//! Report DTOs: data quality, anomaly findings, provenance, runtime status.

use core::fmt;
use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Quality bucket derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    /// Overall score >= 95.
    Excellent,
    /// Overall score >= 85.
    Good,
    /// Overall score >= 70.
    Fair,
    /// Overall score >= 50.
    Poor,
    /// Everything below 50.
    Unreliable,
}

impl QualityLevel {
    /// Highest bucket whose threshold the score meets.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 95.0 {
            Self::Excellent
        } else if score >= 85.0 {
            Self::Good
        } else if score >= 70.0 {
            Self::Fair
        } else if score >= 50.0 {
            Self::Poor
        } else {
            Self::Unreliable
        }
    }

    /// Stable identifier for logs and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::Unreliable => "unreliable",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Four-component quality assessment attached to every successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityMetrics {
    /// Share of required fields present, in `[0, 100]`.
    pub completeness_score: f64,
    /// 100 on a fresh fetch; penalized on cache hits.
    pub freshness_score: f64,
    /// Provider-declared baseline.
    pub accuracy_score: f64,
    /// Cross-provider agreement; 90 when no comparison was performed.
    pub consistency_score: f64,
    /// Weighted combination of the four components.
    pub overall_score: f64,
    /// Bucket matching `overall_score`.
    pub quality_level: QualityLevel,
}

impl DataQualityMetrics {
    const WEIGHT_COMPLETENESS: f64 = 0.3;
    const WEIGHT_FRESHNESS: f64 = 0.25;
    const WEIGHT_ACCURACY: f64 = 0.25;
    const WEIGHT_CONSISTENCY: f64 = 0.2;

    /// Combine the four sub-scores with the fixed weights.
    ///
    /// The overall score is rounded to six decimals so the declared level and
    /// the stored score stay consistent across serialization round trips.
    #[must_use]
    pub fn from_components(
        completeness: f64,
        freshness: f64,
        accuracy: f64,
        consistency: f64,
    ) -> Self {
        let overall = completeness.mul_add(
            Self::WEIGHT_COMPLETENESS,
            freshness.mul_add(
                Self::WEIGHT_FRESHNESS,
                accuracy.mul_add(
                    Self::WEIGHT_ACCURACY,
                    consistency * Self::WEIGHT_CONSISTENCY,
                ),
            ),
        );
        let overall = (overall * 1e6).round() / 1e6;
        Self {
            completeness_score: completeness,
            freshness_score: freshness,
            accuracy_score: accuracy,
            consistency_score: consistency,
            overall_score: overall,
            quality_level: QualityLevel::from_score(overall),
        }
    }

    /// All-zero metrics attached to failure envelopes.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            completeness_score: 0.0,
            freshness_score: 0.0,
            accuracy_score: 0.0,
            consistency_score: 0.0,
            overall_score: 0.0,
            quality_level: QualityLevel::Unreliable,
        }
    }
}

/// Kinds of data anomalies the orchestrator can flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum AnomalyKind {
    /// `|change_percent|` exceeded the configured threshold.
    ExtremePriceChange,
    /// Current volume exceeded a multiple of the trailing mean.
    VolumeSpike,
    /// OHLC values are mutually inconsistent.
    PriceInconsistency,
    /// A historical series carries repeated timestamps.
    DuplicateBars,
}

impl AnomalyKind {
    /// Stable identifier used as the key into the details map.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExtremePriceChange => "extreme_price_change",
            Self::VolumeSpike => "volume_spike",
            Self::PriceInconsistency => "price_inconsistency",
            Self::DuplicateBars => "duplicate_bars",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of anomaly detection over one payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    /// Whether any anomaly fired.
    pub has_anomalies: bool,
    /// The kinds that fired, in detection order.
    pub anomaly_types: Vec<AnomalyKind>,
    /// Arithmetic mean of the per-anomaly confidences, in `[0, 100]`.
    pub confidence_score: f64,
    /// Per-kind diagnostic payloads keyed by [`AnomalyKind::as_str`].
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl AnomalyReport {
    /// Report stating that nothing fired (also used when detection is off).
    #[must_use]
    pub fn none() -> Self {
        Self {
            has_anomalies: false,
            anomaly_types: Vec::new(),
            confidence_score: 0.0,
            details: serde_json::Map::new(),
        }
    }
}

/// Observed liveness of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Probes and requests are succeeding.
    Healthy,
    /// Partially functional; selectable but deprioritized.
    Degraded,
    /// Probes or requests are failing.
    Unhealthy,
    /// Disabled by configuration; terminal.
    Disabled,
    /// Not yet probed.
    Unknown,
}

impl ProviderStatus {
    /// Stable identifier for logs and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
            Self::Disabled => "disabled",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a response came from and how it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Provider that produced the returned data.
    pub primary_source: String,
    /// Providers attempted earlier on this call, in attempt order.
    pub fallback_sources: Vec<String>,
    /// Wall-clock time spent on the call.
    pub processing_time_ms: f64,
    /// Whether the payload was served from cache.
    pub cache_hit: bool,
    /// Age of the cached entry, when known.
    pub cache_age_seconds: Option<u64>,
    /// Status snapshot of every registered provider at response time.
    pub provider_health: BTreeMap<String, ProviderStatus>,
}

/// Point-in-time snapshot of one provider's runtime statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatsSnapshot {
    /// Current status.
    pub status: ProviderStatus,
    /// Seconds since the last health probe, if any ran.
    pub last_health_check_age_secs: Option<u64>,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Whether the circuit breaker currently rejects selection.
    pub circuit_open: bool,
    /// Remaining cooldown when the breaker is open.
    pub circuit_open_remaining_secs: Option<u64>,
    /// Requests routed to this provider.
    pub total_requests: u64,
    /// Requests that returned data.
    pub successful_requests: u64,
    /// Requests that failed.
    pub failed_requests: u64,
    /// Exponential moving average of response time.
    pub average_response_time_ms: f64,
    /// Seconds since this provider last served a request.
    pub last_used_age_secs: Option<u64>,
}

impl ProviderStatsSnapshot {
    /// Success ratio in `[0, 1]`; 1 when no request has been made yet.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }
}

/// Aggregate view of the provider factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactoryStatus {
    /// Per-provider snapshots keyed by provider name.
    pub providers: BTreeMap<String, ProviderStatsSnapshot>,
    /// Active selection policy.
    pub policy: super::SelectionPolicy,
    /// Providers currently passing the availability predicate.
    pub available: Vec<String>,
    /// Calls where a further attempt followed a failed one.
    pub failover_count: u64,
    /// Total calls routed through the factory.
    pub total_requests: u64,
    /// Seconds since the factory was built.
    pub uptime_secs: u64,
}

/// Sliding windows enforced by the rate limiter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RateWindow {
    /// 10-second micro-spike window.
    Burst,
    /// 60-second window.
    Minute,
    /// 3600-second window.
    Hour,
    /// 86400-second window.
    Day,
}

impl RateWindow {
    /// Windows in the order they are checked.
    pub const CHECK_ORDER: [Self; 4] = [Self::Minute, Self::Hour, Self::Day, Self::Burst];

    /// Window span.
    #[must_use]
    pub const fn span(self) -> Duration {
        match self {
            Self::Burst => Duration::from_secs(10),
            Self::Minute => Duration::from_secs(60),
            Self::Hour => Duration::from_secs(3_600),
            Self::Day => Duration::from_secs(86_400),
        }
    }

    /// Stable identifier for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Burst => "burst",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }
}

impl fmt::Display for RateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Provider the check was keyed on.
    pub provider: String,
    /// Endpoint class the check was keyed on.
    pub endpoint: String,
    /// Requests observed in each window at check time.
    pub usage: BTreeMap<RateWindow, u32>,
    /// The window that rejected the request, when denied.
    pub exceeded_window: Option<RateWindow>,
    /// Suggested wait before retrying, when denied.
    pub retry_after: Option<Duration>,
}

/// Utilization snapshot for one provider across all windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    /// Requests observed per window.
    pub usage: BTreeMap<RateWindow, u32>,
    /// Configured limit per window.
    pub limits: BTreeMap<RateWindow, u32>,
    /// `usage / limit * 100` per window.
    pub utilization_percent: BTreeMap<RateWindow, f64>,
}

/// Key-count and memory accounting for a cache scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSize {
    /// Entries currently stored.
    pub key_count: u64,
    /// Approximate memory held by stored values.
    pub memory_bytes: u64,
}

/// Counter snapshot for a cache scope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct CacheStatsReport {
    /// Reads that found a live entry.
    pub hits: u64,
    /// Reads that found nothing.
    pub misses: u64,
    /// Writes.
    pub sets: u64,
    /// Store-level failures.
    pub errors: u64,
}

impl CacheStatsReport {
    /// `hits / (hits + misses) * 100`; zero when no reads were recorded.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let reads = self.hits + self.misses;
        if reads == 0 {
            0.0
        } else {
            self.hits as f64 / reads as f64 * 100.0
        }
    }
}

/// Composite health view exposed to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Whether at least one provider is currently available.
    pub healthy: bool,
    /// Factory state.
    pub factory: FactoryStatus,
    /// Cache counters across all scopes.
    pub cache: CacheStatsReport,
    /// Cache size across all scopes.
    pub cache_size: CacheSize,
    /// Rate limiter utilization per provider.
    pub rate_limits: BTreeMap<String, RateLimitStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_score_matches_declared_level() {
        let metrics = DataQualityMetrics::from_components(100.0, 100.0, 95.0, 90.0);
        assert!((metrics.overall_score - 96.75).abs() < 1e-9);
        assert_eq!(metrics.quality_level, QualityLevel::Excellent);

        let metrics = DataQualityMetrics::from_components(50.0, 100.0, 85.0, 90.0);
        assert_eq!(
            metrics.quality_level,
            QualityLevel::from_score(metrics.overall_score)
        );
    }

    #[test]
    fn level_thresholds_are_inclusive() {
        assert_eq!(QualityLevel::from_score(95.0), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_score(94.999_999), QualityLevel::Good);
        assert_eq!(QualityLevel::from_score(70.0), QualityLevel::Fair);
        assert_eq!(QualityLevel::from_score(49.999), QualityLevel::Unreliable);
    }

    #[test]
    fn hit_rate_handles_empty_counters() {
        assert!(CacheStatsReport::default().hit_rate().abs() < f64::EPSILON);
        let stats = CacheStatsReport {
            hits: 3,
            misses: 1,
            sets: 4,
            errors: 0,
        };
        assert!((stats.hit_rate() - 75.0).abs() < f64::EPSILON);
    }
}
