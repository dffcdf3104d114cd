//! Mock connector for CI-safe examples and tests. Provides deterministic
//! data from static fixtures; never touches the network.
//!
//! Special trigger symbols steer failure paths: `FAIL` forces an upstream
//! error, `TIMEOUT` sleeps briefly so orchestrator timeouts can fire, and
//! any unknown symbol maps to a not-found outcome.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;

use mercato_core::connector::{
    HistoryProvider, MercatoConnector, OverviewProvider, ProfileProvider, QuoteProvider,
    SearchProvider,
};
use mercato_core::{
    AssetKind, CompanyProfile, HistoricalSeries, HistoryRequest, Interval, MarketOverview,
    MercatoError, ProviderResponse, Quote, SearchRequest, SearchResults, Symbol,
};

mod fixtures;

/// Fixture-backed connector.
pub struct MockConnector;

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    /// Stable connector name.
    pub const NAME: &'static str = "mock";

    /// Build the connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    async fn maybe_fail_or_timeout(symbol: &str, capability: &'static str) -> Result<(), MercatoError> {
        match symbol {
            "FAIL" => Err(MercatoError::upstream(
                Self::NAME,
                format!("forced failure: {capability}"),
            )),
            "TIMEOUT" => {
                // Brief latency so short orchestrator timeouts can trip.
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn not_found(what: String) -> MercatoError {
        MercatoError::not_found(what)
    }
}

#[async_trait]
impl MercatoConnector for MockConnector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn vendor(&self) -> &'static str {
        "Mock"
    }

    fn supports_kind(&self, _kind: AssetKind) -> bool {
        true
    }

    async fn health_check(&self) -> Result<(), MercatoError> {
        Ok(())
    }

    fn as_quote_provider(&self) -> Option<&dyn QuoteProvider> {
        Some(self as &dyn QuoteProvider)
    }
    fn as_profile_provider(&self) -> Option<&dyn ProfileProvider> {
        Some(self as &dyn ProfileProvider)
    }
    fn as_history_provider(&self) -> Option<&dyn HistoryProvider> {
        Some(self as &dyn HistoryProvider)
    }
    fn as_search_provider(&self) -> Option<&dyn SearchProvider> {
        Some(self as &dyn SearchProvider)
    }
    fn as_overview_provider(&self) -> Option<&dyn OverviewProvider> {
        Some(self as &dyn OverviewProvider)
    }
}

#[async_trait]
impl QuoteProvider for MockConnector {
    async fn quote(
        &self,
        symbol: &Symbol,
        _kind: AssetKind,
        _realtime: bool,
    ) -> Result<ProviderResponse<Quote>, MercatoError> {
        let s = symbol.as_str();
        Self::maybe_fail_or_timeout(s, "quote").await?;
        fixtures::quotes::by_symbol(s)
            .map(|q| ProviderResponse::fresh(q, Self::NAME))
            .ok_or_else(|| Self::not_found(format!("quote for {s}")))
    }
}

#[async_trait]
impl ProfileProvider for MockConnector {
    async fn profile(
        &self,
        symbol: &Symbol,
    ) -> Result<ProviderResponse<CompanyProfile>, MercatoError> {
        let s = symbol.as_str();
        Self::maybe_fail_or_timeout(s, "profile").await?;
        fixtures::profiles::by_symbol(s)
            .map(|p| ProviderResponse::fresh(p, Self::NAME))
            .ok_or_else(|| Self::not_found(format!("profile for {s}")))
    }
}

#[async_trait]
impl HistoryProvider for MockConnector {
    async fn history(
        &self,
        symbol: &Symbol,
        req: HistoryRequest,
    ) -> Result<ProviderResponse<HistoricalSeries>, MercatoError> {
        let s = symbol.as_str();
        Self::maybe_fail_or_timeout(s, "history").await?;
        fixtures::history::by_symbol(s, req)
            .map(|h| ProviderResponse::fresh(h, Self::NAME))
            .ok_or_else(|| Self::not_found(format!("historical data for {s}")))
    }

    fn supported_intervals(&self, _kind: AssetKind) -> &'static [Interval] {
        const DAILY: &[Interval] = &[Interval::D1, Interval::W1];
        DAILY
    }
}

#[async_trait]
impl SearchProvider for MockConnector {
    async fn search(
        &self,
        req: &SearchRequest,
    ) -> Result<ProviderResponse<SearchResults>, MercatoError> {
        Self::maybe_fail_or_timeout(req.query(), "search").await?;
        Ok(ProviderResponse::fresh(fixtures::search::run(req), Self::NAME))
    }
}

#[async_trait]
impl OverviewProvider for MockConnector {
    async fn market_overview(&self) -> Result<ProviderResponse<MarketOverview>, MercatoError> {
        let mut market_status = BTreeMap::new();
        market_status.insert("NASDAQ".to_string(), "open".to_string());
        let overview = MarketOverview {
            indices: fixtures::quotes::by_symbol("SPY").into_iter().collect(),
            crypto: ["BTC-USD", "ETH-USD"]
                .iter()
                .filter_map(|s| fixtures::quotes::by_symbol(s))
                .collect(),
            commodities: Vec::new(),
            forex: Vec::new(),
            market_status,
            last_updated: Utc::now(),
        };
        Ok(ProviderResponse::fresh(overview, Self::NAME))
    }
}
