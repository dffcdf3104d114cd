//! Data quality scoring. Pure computation, no suspension points.

use std::time::Duration;

use mercato_types::DataQualityMetrics;

/// Consistency baseline used when no cross-provider comparison was performed.
const CONSISTENCY_BASELINE: f64 = 90.0;

/// Inputs to one quality assessment.
pub(crate) struct QualityInput {
    /// Whether the payload class carries a price (quotes do; profiles,
    /// series, search results and overviews do not).
    pub price_bearing: bool,
    /// Whether the price field was actually present.
    pub price_present: bool,
    /// Whether the payload was served from cache.
    pub cache_hit: bool,
    /// Wall-clock time the request took.
    pub processing_time: Duration,
    /// The serving provider's declared accuracy baseline.
    pub accuracy: f64,
}

/// A cache hit never reports full freshness, even when served instantly.
const CACHED_FRESHNESS_CEILING: f64 = 99.0;

/// Score a successful payload.
///
/// Completeness counts required fields: {symbol, price} for price-bearing
/// payloads, {symbol} otherwise; the symbol is always present in a typed
/// payload. Freshness is 100 on a fresh fetch; on cache hits it decays with
/// processing time, floored at 50 and capped strictly below 100.
pub(crate) fn score(input: &QualityInput) -> DataQualityMetrics {
    let completeness = if input.price_bearing && !input.price_present {
        50.0
    } else {
        100.0
    };
    let freshness = if input.cache_hit {
        (100.0 - input.processing_time.as_secs_f64() * 10.0)
            .max(50.0)
            .min(CACHED_FRESHNESS_CEILING)
    } else {
        100.0
    };
    DataQualityMetrics::from_components(
        completeness,
        freshness,
        input.accuracy,
        CONSISTENCY_BASELINE,
    )
}
