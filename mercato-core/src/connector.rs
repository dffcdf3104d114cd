//! Connector traits implemented by provider adapter crates.
//!
//! Each upstream capability gets a focused role trait; the main
//! [`MercatoConnector`] trait exposes identity, kind support, the liveness
//! probe, and `as_*_provider` accessors that advertise a capability by
//! returning a usable trait object reference.

use async_trait::async_trait;

use crate::error::MercatoError;
use crate::response::ProviderResponse;
use crate::types::{
    AssetKind, CompanyProfile, HistoricalSeries, HistoryRequest, Interval, MarketOverview, Quote,
    SearchRequest, SearchResults, Symbol,
};

/// Focused role trait for connectors that provide point-in-time quotes.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetch a quote for an already-normalized symbol.
    ///
    /// `realtime` selects the tighter real-time cache level instead of the
    /// standard quote level; it never bypasses the cache entirely.
    async fn quote(
        &self,
        symbol: &Symbol,
        kind: AssetKind,
        realtime: bool,
    ) -> Result<ProviderResponse<Quote>, MercatoError>;
}

/// Focused role trait for connectors that provide company profiles.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// Fetch a company profile for an already-normalized symbol.
    async fn profile(
        &self,
        symbol: &Symbol,
    ) -> Result<ProviderResponse<CompanyProfile>, MercatoError>;
}

/// Focused role trait for connectors that provide OHLCV history.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Fetch historical bars for the given request.
    ///
    /// Implementations must return bars sorted ascending by date; the
    /// orchestrator rejects unsorted responses.
    async fn history(
        &self,
        symbol: &Symbol,
        req: HistoryRequest,
    ) -> Result<ProviderResponse<HistoricalSeries>, MercatoError>;

    /// REQUIRED: exact intervals this connector can natively serve.
    fn supported_intervals(&self, kind: AssetKind) -> &'static [Interval];
}

/// Focused role trait for connectors that can search instruments.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Perform a symbol search according to the provided request.
    async fn search(
        &self,
        req: &SearchRequest,
    ) -> Result<ProviderResponse<SearchResults>, MercatoError>;
}

/// Focused role trait for connectors that assemble a market overview.
#[async_trait]
pub trait OverviewProvider: Send + Sync {
    /// Fetch the provider's pre-agreed overview symbol sets.
    ///
    /// Individual symbol failures are tolerated; a category the provider
    /// cannot serve comes back empty rather than failing the call.
    async fn market_overview(&self) -> Result<ProviderResponse<MarketOverview>, MercatoError>;
}

/// Main connector trait implemented by provider crates. Exposes capability
/// discovery and the liveness probe used by the factory's health monitor.
#[async_trait]
pub trait MercatoConnector: Send + Sync {
    /// A stable identifier used in registry keys, cache keys, and logs
    /// (e.g. "fmp", "yahoo").
    fn name(&self) -> &'static str;

    /// Human-friendly vendor string.
    fn vendor(&self) -> &'static str {
        "unknown"
    }

    /// Whether this connector *claims* to support a given asset kind.
    ///
    /// Default: returns `false` for all kinds. Connectors must explicitly
    /// override this method to declare which asset kinds they support.
    fn supports_kind(&self, kind: AssetKind) -> bool {
        let _ = kind;
        false
    }

    /// Cheap upstream liveness probe.
    async fn health_check(&self) -> Result<(), MercatoError>;

    /// Advertise quote capability by returning a usable trait object reference.
    fn as_quote_provider(&self) -> Option<&dyn QuoteProvider> {
        None
    }

    /// Advertise profile capability by returning a usable trait object reference.
    fn as_profile_provider(&self) -> Option<&dyn ProfileProvider> {
        None
    }

    /// Advertise history capability by returning a usable trait object reference.
    fn as_history_provider(&self) -> Option<&dyn HistoryProvider> {
        None
    }

    /// Advertise search capability by returning a usable trait object reference.
    fn as_search_provider(&self) -> Option<&dyn SearchProvider> {
        None
    }

    /// Advertise overview capability by returning a usable trait object reference.
    fn as_overview_provider(&self) -> Option<&dyn OverviewProvider> {
        None
    }
}
