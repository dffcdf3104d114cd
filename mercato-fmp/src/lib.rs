//! mercato-fmp
//!
//! Premium connector that implements `MercatoConnector` against the
//! Financial Modeling Prep v3 HTTP API. Authentication is a query-string API
//! key; the key never appears in cache keys or logs. Every operation follows
//! the shared adapter algorithm: rate-limit admission, cache read, upstream
//! call with timeout and backoff, shape validation, canonical translation,
//! cache write.
#![warn(missing_docs)]

mod client;
mod wire;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use url::Url;

use mercato_core::connector::{
    HistoryProvider, MercatoConnector, OverviewProvider, ProfileProvider, QuoteProvider,
    SearchProvider,
};
use mercato_core::{
    AssetKind, CompanyProfile, HistoricalSeries, HistoryRequest, Interval, MarketOverview,
    MercatoError, ProviderResponse, Quote, SearchRequest, SearchResults, Symbol,
};
use mercato_middleware::{MarketCache, RateLimiter};
use mercato_types::{Capability, CacheLevel};

use client::{FmpClient, PROVIDER};

/// Batch quote symbols used by the market overview endpoint: broad-market
/// index ETFs plus the major crypto pairs.
const OVERVIEW_BATCH: &str = "SPY,QQQ,DIA,BTC-USD,ETH-USD";
const OVERVIEW_INDICES: [&str; 3] = ["SPY", "QQQ", "DIA"];

/// Financial Modeling Prep connector.
pub struct FmpConnector {
    client: FmpClient,
    cache: Arc<MarketCache>,
}

/// Builder for [`FmpConnector`].
pub struct FmpBuilder {
    api_key: String,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    backoff_base: f64,
    cache: Option<Arc<MarketCache>>,
    limiter: Option<Arc<RateLimiter>>,
}

impl FmpBuilder {
    /// Override the API base URL (tests point this at a local mock server).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Per-request upstream timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Transient-failure retries per request.
    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Exponential backoff base between retries; zero disables the sleeps.
    #[must_use]
    pub const fn backoff_base(mut self, base: f64) -> Self {
        self.backoff_base = base;
        self
    }

    /// Shared cache collaborator.
    #[must_use]
    pub fn cache(mut self, cache: Arc<MarketCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Shared rate limiter collaborator.
    #[must_use]
    pub fn limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Build the connector.
    ///
    /// # Errors
    /// Returns `InvalidArg` for an unparseable base URL or a missing
    /// cache/limiter collaborator.
    pub fn build(self) -> Result<FmpConnector, MercatoError> {
        let mut base = self.base_url;
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| MercatoError::invalid_arg(format!("invalid base url: {e}")))?;
        let cache = self
            .cache
            .ok_or_else(|| MercatoError::invalid_arg("fmp connector requires a cache"))?;
        let limiter = self
            .limiter
            .ok_or_else(|| MercatoError::invalid_arg("fmp connector requires a rate limiter"))?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("mercato/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MercatoError::invalid_arg(format!("http client: {e}")))?;
        Ok(FmpConnector {
            client: FmpClient::new(
                http,
                base_url,
                self.api_key,
                self.timeout,
                self.max_retries,
                self.backoff_base,
                limiter,
            ),
            cache,
        })
    }
}

impl FmpConnector {
    /// Stable connector name used in registry and cache keys.
    pub const NAME: &'static str = PROVIDER;

    /// Start building a connector with the given API key.
    #[must_use]
    pub fn builder(api_key: impl Into<String>) -> FmpBuilder {
        FmpBuilder {
            api_key: api_key.into(),
            base_url: "https://financialmodelingprep.com/api/v3".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_base: 2.0,
            cache: None,
            limiter: None,
        }
    }

    /// FMP quotes crypto as `{SYM}-USD` pairs.
    fn wire_symbol(symbol: &Symbol, kind: AssetKind) -> String {
        match kind {
            AssetKind::Crypto if !symbol.as_str().ends_with("-USD") => {
                format!("{symbol}-USD")
            }
            _ => symbol.to_string(),
        }
    }
}

#[async_trait]
impl MercatoConnector for FmpConnector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn vendor(&self) -> &'static str {
        "Financial Modeling Prep"
    }

    fn supports_kind(&self, kind: AssetKind) -> bool {
        matches!(kind, AssetKind::Equity | AssetKind::Crypto | AssetKind::Index)
    }

    async fn health_check(&self) -> Result<(), MercatoError> {
        // Cheap liveness probe: a quote for SPY exercises auth and parsing.
        let spy = Symbol::parse("SPY")?;
        self.quote(&spy, AssetKind::Equity, false).await.map(|_| ())
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
impl QuoteProvider for FmpConnector {
    async fn quote(
        &self,
        symbol: &Symbol,
        kind: AssetKind,
        realtime: bool,
    ) -> Result<ProviderResponse<Quote>, MercatoError> {
        self.client.admit(Capability::Quote)?;
        let wire_symbol = Self::wire_symbol(symbol, kind);
        let level = if realtime {
            CacheLevel::RealTime
        } else {
            CacheLevel::Quotes
        };

        if let Some((quote, age)) = self
            .cache
            .get_typed::<Quote>(level, PROVIDER, &wire_symbol, None)
            .await
        {
            return Ok(ProviderResponse::from_cache(quote, Self::NAME, age));
        }

        debug!(
            target = "mercato::fmp",
            event = "fetch",
            operation = "quote",
            symbol = %wire_symbol,
            "fetching quote"
        );
        let body = self
            .client
            .get_json(&format!("quote/{wire_symbol}"), &[], "quote")
            .await?;
        wire::ensure_plausible(&body)?;
        let quote = wire::parse_quote(&body, symbol)?;
        self.cache
            .set_typed(level, PROVIDER, &wire_symbol, &quote, None, None)
            .await;
        Ok(ProviderResponse::fresh(quote, Self::NAME))
    }
}

#[async_trait]
impl ProfileProvider for FmpConnector {
    async fn profile(
        &self,
        symbol: &Symbol,
    ) -> Result<ProviderResponse<CompanyProfile>, MercatoError> {
        self.client.admit(Capability::Profile)?;
        let id = symbol.to_string();

        if let Some((profile, age)) = self
            .cache
            .get_typed::<CompanyProfile>(CacheLevel::Profiles, PROVIDER, &id, None)
            .await
        {
            return Ok(ProviderResponse::from_cache(profile, Self::NAME, age));
        }

        let body = self
            .client
            .get_json(&format!("profile/{id}"), &[], "profile")
            .await?;
        wire::ensure_plausible(&body)?;
        let profile = wire::parse_profile(&body, symbol)?;
        self.cache
            .set_typed(CacheLevel::Profiles, PROVIDER, &id, &profile, None, None)
            .await;
        Ok(ProviderResponse::fresh(profile, Self::NAME))
    }
}

#[async_trait]
impl HistoryProvider for FmpConnector {
    async fn history(
        &self,
        symbol: &Symbol,
        req: HistoryRequest,
    ) -> Result<ProviderResponse<HistoricalSeries>, MercatoError> {
        self.client.admit(Capability::History)?;
        let id = symbol.to_string();
        let mut params = BTreeMap::new();
        params.insert("period".to_string(), req.period().as_str().to_string());
        params.insert("interval".to_string(), req.interval().as_str().to_string());

        if let Some((series, age)) = self
            .cache
            .get_typed::<HistoricalSeries>(CacheLevel::Historical, PROVIDER, &id, Some(&params))
            .await
        {
            return Ok(ProviderResponse::from_cache(series, Self::NAME, age));
        }

        let mut query = Vec::new();
        if req.period() == mercato_core::Period::D5 {
            query.push(("serietype", "line".to_string()));
        }
        let body = self
            .client
            .get_json(&format!("historical-price-full/{id}"), &query, "history")
            .await?;
        wire::ensure_plausible(&body)?;
        let series = wire::parse_historical(&body, symbol, req)?;
        self.cache
            .set_typed(
                CacheLevel::Historical,
                PROVIDER,
                &id,
                &series,
                Some(&params),
                None,
            )
            .await;
        Ok(ProviderResponse::fresh(series, Self::NAME))
    }

    fn supported_intervals(&self, _kind: AssetKind) -> &'static [Interval] {
        // The v3 full-history endpoint serves daily bars only.
        const DAILY: &[Interval] = &[Interval::D1];
        DAILY
    }
}

#[async_trait]
impl SearchProvider for FmpConnector {
    async fn search(
        &self,
        req: &SearchRequest,
    ) -> Result<ProviderResponse<SearchResults>, MercatoError> {
        self.client.admit(Capability::Search)?;
        let mut params = BTreeMap::new();
        params.insert("limit".to_string(), req.limit().to_string());

        if let Some((results, age)) = self
            .cache
            .get_typed::<SearchResults>(CacheLevel::Search, PROVIDER, req.query(), Some(&params))
            .await
        {
            return Ok(ProviderResponse::from_cache(results, Self::NAME, age));
        }

        let body = self
            .client
            .get_json(
                "search",
                &[
                    ("query", req.query().to_string()),
                    ("limit", req.limit().to_string()),
                ],
                "search",
            )
            .await?;
        wire::ensure_plausible(&body)?;
        let results = wire::parse_search(&body, req)?;
        self.cache
            .set_typed(
                CacheLevel::Search,
                PROVIDER,
                req.query(),
                &results,
                Some(&params),
                None,
            )
            .await;
        Ok(ProviderResponse::fresh(results, Self::NAME))
    }
}

#[async_trait]
impl OverviewProvider for FmpConnector {
    async fn market_overview(&self) -> Result<ProviderResponse<MarketOverview>, MercatoError> {
        self.client.admit(Capability::MarketOverview)?;

        if let Some((overview, age)) = self
            .cache
            .get_typed::<MarketOverview>(CacheLevel::MarketOverview, PROVIDER, "overview", None)
            .await
        {
            return Ok(ProviderResponse::from_cache(overview, Self::NAME, age));
        }

        let body = self
            .client
            .get_json(&format!("quote/{OVERVIEW_BATCH}"), &[], "market-overview")
            .await?;
        wire::ensure_plausible(&body)?;
        let quotes = wire::parse_quote_batch(&body)?;

        let mut overview = MarketOverview {
            indices: Vec::new(),
            crypto: Vec::new(),
            commodities: Vec::new(),
            forex: Vec::new(),
            market_status: BTreeMap::new(),
            last_updated: Utc::now(),
        };
        for quote in quotes {
            let sym = quote.symbol.as_str();
            if OVERVIEW_INDICES.contains(&sym) {
                overview.indices.push(quote);
            } else if sym.ends_with("-USD") {
                overview.crypto.push(quote);
            }
        }

        self.cache
            .set_typed(
                CacheLevel::MarketOverview,
                PROVIDER,
                "overview",
                &overview,
                None,
                None,
            )
            .await;
        Ok(ProviderResponse::fresh(overview, Self::NAME))
    }
}
