//! Typed provider responses and the uniform public response envelope.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercato_types::{AnomalyReport, DataQualityMetrics, Provenance};

use crate::types::{CompanyProfile, HistoricalSeries, MarketOverview, Quote, SearchResults};

/// A successful payload from one adapter, annotated with its origin.
///
/// Failures travel as [`crate::MercatoError`]; this type only ever carries
/// data. A cached payload is indistinguishable from a fresh one except for
/// the `cached`/`cache_age` annotations, which feed provenance.
#[derive(Debug, Clone)]
pub struct ProviderResponse<T> {
    /// The canonical payload.
    pub data: T,
    /// Name of the adapter that produced it.
    pub provider: &'static str,
    /// Whether the payload was served from cache.
    pub cached: bool,
    /// Age of the cached entry, when served from cache.
    pub cache_age: Option<Duration>,
    /// Instant the response was assembled.
    pub timestamp: DateTime<Utc>,
}

impl<T> ProviderResponse<T> {
    /// Wrap a freshly fetched payload.
    pub fn fresh(data: T, provider: &'static str) -> Self {
        Self {
            data,
            provider,
            cached: false,
            cache_age: None,
            timestamp: Utc::now(),
        }
    }

    /// Wrap a payload served from cache.
    pub fn from_cache(data: T, provider: &'static str, age: Duration) -> Self {
        Self {
            data,
            provider,
            cached: true,
            cache_age: Some(age),
            timestamp: Utc::now(),
        }
    }

    /// Map the payload while preserving the origin annotations.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ProviderResponse<U> {
        ProviderResponse {
            data: f(self.data),
            provider: self.provider,
            cached: self.cached,
            cache_age: self.cache_age,
            timestamp: self.timestamp,
        }
    }
}

/// Uniform response envelope returned by every orchestrator operation.
///
/// A failed request still yields a well-formed envelope: `success = false`,
/// zeroed quality, a provenance describing what was attempted, and a
/// human-readable error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Whether the operation produced data.
    pub success: bool,
    /// The requested symbol, or the query for search operations.
    pub symbol: String,
    /// Instant the envelope was assembled.
    pub timestamp: DateTime<Utc>,
    /// The payload, present on success.
    pub data: Option<T>,
    /// Quality assessment; zeroed on failure.
    pub data_quality: DataQualityMetrics,
    /// Anomaly findings, for operations that run detection.
    pub anomaly_detection: Option<AnomalyReport>,
    /// Where the data came from and how it was produced.
    pub provenance: Provenance,
    /// Human-readable error, present on failure.
    pub error: Option<String>,
    /// Non-fatal observations (partial overview categories, flagged series).
    pub warnings: Vec<String>,
}

impl<T> Envelope<T> {
    /// Build a success envelope.
    #[must_use]
    pub fn ok(
        symbol: impl Into<String>,
        data: T,
        data_quality: DataQualityMetrics,
        anomaly_detection: Option<AnomalyReport>,
        provenance: Provenance,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            success: true,
            symbol: symbol.into(),
            timestamp: Utc::now(),
            data: Some(data),
            data_quality,
            anomaly_detection,
            provenance,
            error: None,
            warnings,
        }
    }

    /// Build a failure envelope with zeroed quality.
    #[must_use]
    pub fn failed(symbol: impl Into<String>, provenance: Provenance, error: String) -> Self {
        Self {
            success: false,
            symbol: symbol.into(),
            timestamp: Utc::now(),
            data: None,
            data_quality: DataQualityMetrics::zeroed(),
            anomaly_detection: None,
            provenance,
            error: Some(error),
            warnings: Vec::new(),
        }
    }
}

/// Envelope alias for quote operations.
pub type QuoteResponse = Envelope<Quote>;
/// Envelope alias for profile operations.
pub type ProfileResponse = Envelope<CompanyProfile>;
/// Envelope alias for historical operations.
pub type HistoricalResponse = Envelope<HistoricalSeries>;
/// Envelope alias for search operations.
pub type SearchResponse = Envelope<SearchResults>;
/// Envelope alias for market overview operations.
pub type MarketOverviewResponse = Envelope<MarketOverview>;
