#![allow(dead_code)]
#![allow(clippy::type_complexity)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use mercato_core::connector::{
    HistoryProvider, MercatoConnector, OverviewProvider, ProfileProvider, QuoteProvider,
    SearchProvider,
};
use mercato_core::{
    AssetKind, CompanyProfile, HistoricalSeries, HistoryRequest, Interval, MarketOverview,
    MercatoError, ProviderResponse, Quote, SearchRequest, SearchResults, Symbol,
};

const DEFAULT_INTERVALS: &[Interval] = &[
    Interval::I1m,
    Interval::I5m,
    Interval::I1h,
    Interval::D1,
    Interval::W1,
];

/// Configurable in-memory connector for integration tests. Behavior per
/// capability is injected via closures; a capability with no closure is not
/// advertised.
pub struct TestConnector {
    pub name: &'static str,
    pub delay: Option<Duration>,
    pub health_ok: Arc<AtomicBool>,
    pub calls: Arc<AtomicU64>,
    pub history_intervals: &'static [Interval],

    pub quote_fn: Option<
        Arc<
            dyn Fn(&Symbol, AssetKind, bool) -> Result<ProviderResponse<Quote>, MercatoError>
                + Send
                + Sync,
        >,
    >,
    pub profile_fn: Option<
        Arc<dyn Fn(&Symbol) -> Result<ProviderResponse<CompanyProfile>, MercatoError> + Send + Sync>,
    >,
    pub history_fn: Option<
        Arc<
            dyn Fn(&Symbol, HistoryRequest) -> Result<ProviderResponse<HistoricalSeries>, MercatoError>
                + Send
                + Sync,
        >,
    >,
    pub search_fn: Option<
        Arc<dyn Fn(&SearchRequest) -> Result<ProviderResponse<SearchResults>, MercatoError> + Send + Sync>,
    >,
    pub overview_fn: Option<
        Arc<dyn Fn() -> Result<ProviderResponse<MarketOverview>, MercatoError> + Send + Sync>,
    >,
}

impl TestConnector {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            delay: None,
            health_ok: Arc::new(AtomicBool::new(true)),
            calls: Arc::new(AtomicU64::new(0)),
            history_intervals: DEFAULT_INTERVALS,
            quote_fn: None,
            profile_fn: None,
            history_fn: None,
            search_fn: None,
            overview_fn: None,
        }
    }

    /// Connector whose quote op always returns the given quote, fresh.
    pub fn with_quote(name: &'static str, quote: Quote) -> Self {
        let mut conn = Self::new(name);
        conn.quote_fn = Some(Arc::new(move |_, _, _| {
            Ok(ProviderResponse::fresh(quote.clone(), name))
        }));
        conn
    }

    /// Connector whose quote op always fails with the produced error.
    pub fn with_quote_error(
        name: &'static str,
        err: impl Fn() -> MercatoError + Send + Sync + 'static,
    ) -> Self {
        let mut conn = Self::new(name);
        conn.quote_fn = Some(Arc::new(move |_, _, _| Err(err())));
        conn
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            sleep(delay).await;
        }
    }
}

#[async_trait]
impl MercatoConnector for TestConnector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn vendor(&self) -> &'static str {
        "Test"
    }

    fn supports_kind(&self, _kind: AssetKind) -> bool {
        true
    }

    async fn health_check(&self) -> Result<(), MercatoError> {
        if self.health_ok.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(MercatoError::upstream(self.name, "health probe failed"))
        }
    }

    fn as_quote_provider(&self) -> Option<&dyn QuoteProvider> {
        self.quote_fn.as_ref().map(|_| self as &dyn QuoteProvider)
    }
    fn as_profile_provider(&self) -> Option<&dyn ProfileProvider> {
        self.profile_fn.as_ref().map(|_| self as &dyn ProfileProvider)
    }
    fn as_history_provider(&self) -> Option<&dyn HistoryProvider> {
        self.history_fn.as_ref().map(|_| self as &dyn HistoryProvider)
    }
    fn as_search_provider(&self) -> Option<&dyn SearchProvider> {
        self.search_fn.as_ref().map(|_| self as &dyn SearchProvider)
    }
    fn as_overview_provider(&self) -> Option<&dyn OverviewProvider> {
        self.overview_fn.as_ref().map(|_| self as &dyn OverviewProvider)
    }
}

#[async_trait]
impl QuoteProvider for TestConnector {
    async fn quote(
        &self,
        symbol: &Symbol,
        kind: AssetKind,
        realtime: bool,
    ) -> Result<ProviderResponse<Quote>, MercatoError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.pause().await;
        let f = self
            .quote_fn
            .as_ref()
            .ok_or_else(|| MercatoError::unsupported("quote"))?;
        f(symbol, kind, realtime)
    }
}

#[async_trait]
impl ProfileProvider for TestConnector {
    async fn profile(
        &self,
        symbol: &Symbol,
    ) -> Result<ProviderResponse<CompanyProfile>, MercatoError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.pause().await;
        let f = self
            .profile_fn
            .as_ref()
            .ok_or_else(|| MercatoError::unsupported("profile"))?;
        f(symbol)
    }
}

#[async_trait]
impl HistoryProvider for TestConnector {
    async fn history(
        &self,
        symbol: &Symbol,
        req: HistoryRequest,
    ) -> Result<ProviderResponse<HistoricalSeries>, MercatoError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.pause().await;
        let f = self
            .history_fn
            .as_ref()
            .ok_or_else(|| MercatoError::unsupported("history"))?;
        f(symbol, req)
    }

    fn supported_intervals(&self, _kind: AssetKind) -> &'static [Interval] {
        self.history_intervals
    }
}

#[async_trait]
impl SearchProvider for TestConnector {
    async fn search(
        &self,
        req: &SearchRequest,
    ) -> Result<ProviderResponse<SearchResults>, MercatoError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.pause().await;
        let f = self
            .search_fn
            .as_ref()
            .ok_or_else(|| MercatoError::unsupported("search"))?;
        f(req)
    }
}

#[async_trait]
impl OverviewProvider for TestConnector {
    async fn market_overview(&self) -> Result<ProviderResponse<MarketOverview>, MercatoError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.pause().await;
        let f = self
            .overview_fn
            .as_ref()
            .ok_or_else(|| MercatoError::unsupported("market-overview"))?;
        f()
    }
}
