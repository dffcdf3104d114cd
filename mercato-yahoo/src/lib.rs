//! mercato-yahoo
//!
//! Free-feed connector that implements `MercatoConnector` against the public
//! Yahoo Finance chart, search, and quote-summary endpoints. No credentials
//! are required. Every operation follows the shared adapter algorithm:
//! rate-limit admission, cache read, upstream call with timeout and backoff,
//! shape validation, canonical translation, cache write.
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

use client::{PROVIDER, YahooClient};

/// Crypto tickers Yahoo quotes as `-USD` pairs.
const CRYPTO_MAPPING: &[(&str, &str)] = &[
    ("BTC", "BTC-USD"),
    ("ETH", "ETH-USD"),
    ("ADA", "ADA-USD"),
    ("DOT", "DOT-USD"),
    ("LTC", "LTC-USD"),
    ("XRP", "XRP-USD"),
    ("DOGE", "DOGE-USD"),
    ("SOL", "SOL-USD"),
    ("MATIC", "MATIC-USD"),
    ("AVAX", "AVAX-USD"),
];

/// Overview symbol sets: S&P 500 / NASDAQ / Dow, the major crypto pairs,
/// gold and crude futures, and the principal currency pairs.
const OVERVIEW_INDICES: [&str; 3] = ["^GSPC", "^IXIC", "^DJI"];
const OVERVIEW_CRYPTO: [&str; 2] = ["BTC-USD", "ETH-USD"];
const OVERVIEW_COMMODITIES: [&str; 2] = ["GC=F", "CL=F"];
const OVERVIEW_FOREX: [&str; 2] = ["EURUSD=X", "GBPUSD=X"];

/// Yahoo Finance connector.
pub struct YahooConnector {
    client: YahooClient,
    cache: Arc<MarketCache>,
}

/// Builder for [`YahooConnector`].
pub struct YahooBuilder {
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    backoff_base: f64,
    cache: Option<Arc<MarketCache>>,
    limiter: Option<Arc<RateLimiter>>,
}

impl YahooBuilder {
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
    pub fn build(self) -> Result<YahooConnector, MercatoError> {
        let mut base = self.base_url;
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| MercatoError::invalid_arg(format!("invalid base url: {e}")))?;
        let cache = self
            .cache
            .ok_or_else(|| MercatoError::invalid_arg("yahoo connector requires a cache"))?;
        let limiter = self
            .limiter
            .ok_or_else(|| MercatoError::invalid_arg("yahoo connector requires a rate limiter"))?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("mercato/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MercatoError::invalid_arg(format!("http client: {e}")))?;
        Ok(YahooConnector {
            client: YahooClient::new(
                http,
                base_url,
                self.timeout,
                self.max_retries,
                self.backoff_base,
                limiter,
            ),
            cache,
        })
    }
}

impl YahooConnector {
    /// Stable connector name used in registry and cache keys.
    pub const NAME: &'static str = PROVIDER;

    /// Start building a connector against the public endpoints.
    #[must_use]
    pub fn builder() -> YahooBuilder {
        YahooBuilder {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_base: 2.0,
            cache: None,
            limiter: None,
        }
    }

    fn wire_symbol(symbol: &Symbol, kind: AssetKind) -> String {
        match kind {
            AssetKind::Crypto => {
                let s = symbol.as_str();
                if s.ends_with("-USD") {
                    s.to_string()
                } else {
                    CRYPTO_MAPPING
                        .iter()
                        .find(|(base, _)| *base == s)
                        .map_or_else(|| format!("{s}-USD"), |(_, pair)| (*pair).to_string())
                }
            }
            _ => symbol.to_string(),
        }
    }

    /// Fetch a quote via the chart meta block, without rate-limit admission;
    /// callers decide the endpoint class to charge.
    async fn fetch_chart_quote(
        &self,
        wire_symbol: &str,
        requested: &Symbol,
    ) -> Result<(Quote, Option<(String, String)>), MercatoError> {
        let body = self
            .client
            .get_json(
                &format!("v8/finance/chart/{wire_symbol}"),
                &[
                    ("range", "1d".to_string()),
                    ("interval", "1d".to_string()),
                ],
                "quote",
            )
            .await?;
        wire::parse_quote(&body, requested)
    }
}

#[async_trait]
impl MercatoConnector for YahooConnector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn vendor(&self) -> &'static str {
        "Yahoo Finance"
    }

    fn supports_kind(&self, kind: AssetKind) -> bool {
        matches!(
            kind,
            AssetKind::Equity
                | AssetKind::Crypto
                | AssetKind::Index
                | AssetKind::Commodity
                | AssetKind::Forex
        )
    }

    async fn health_check(&self) -> Result<(), MercatoError> {
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
impl QuoteProvider for YahooConnector {
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
            target = "mercato::yahoo",
            event = "fetch",
            operation = "quote",
            symbol = %wire_symbol,
            "fetching quote"
        );
        let (quote, _status) = self.fetch_chart_quote(&wire_symbol, symbol).await?;
        self.cache
            .set_typed(level, PROVIDER, &wire_symbol, &quote, None, None)
            .await;
        Ok(ProviderResponse::fresh(quote, Self::NAME))
    }
}

#[async_trait]
impl ProfileProvider for YahooConnector {
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
            .get_json(
                &format!("v10/finance/quoteSummary/{id}"),
                &[("modules", "assetProfile,price".to_string())],
                "profile",
            )
            .await?;
        let profile = wire::parse_profile(&body, symbol)?;
        self.cache
            .set_typed(CacheLevel::Profiles, PROVIDER, &id, &profile, None, None)
            .await;
        Ok(ProviderResponse::fresh(profile, Self::NAME))
    }
}

#[async_trait]
impl HistoryProvider for YahooConnector {
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

        let body = self
            .client
            .get_json(
                &format!("v8/finance/chart/{id}"),
                &[
                    ("range", req.period().as_str().to_string()),
                    ("interval", req.interval().as_str().to_string()),
                ],
                "history",
            )
            .await?;
        let series = wire::parse_history(&body, symbol, req)?;
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
        const ALL: &[Interval] = &[
            Interval::I1m,
            Interval::I2m,
            Interval::I5m,
            Interval::I15m,
            Interval::I30m,
            Interval::I60m,
            Interval::I90m,
            Interval::I1h,
            Interval::D1,
            Interval::D5,
            Interval::W1,
            Interval::Mo1,
            Interval::Mo3,
        ];
        ALL
    }
}

#[async_trait]
impl SearchProvider for YahooConnector {
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
                "v1/finance/search",
                &[
                    ("q", req.query().to_string()),
                    ("quotesCount", req.limit().to_string()),
                ],
                "search",
            )
            .await?;
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
impl OverviewProvider for YahooConnector {
    async fn market_overview(&self) -> Result<ProviderResponse<MarketOverview>, MercatoError> {
        // One admission covers the whole fan-out: the overview is a single
        // logical operation over a pre-agreed symbol set.
        self.client.admit(Capability::MarketOverview)?;

        if let Some((overview, age)) = self
            .cache
            .get_typed::<MarketOverview>(CacheLevel::MarketOverview, PROVIDER, "overview", None)
            .await
        {
            return Ok(ProviderResponse::from_cache(overview, Self::NAME, age));
        }

        let mut overview = MarketOverview {
            indices: Vec::new(),
            crypto: Vec::new(),
            commodities: Vec::new(),
            forex: Vec::new(),
            market_status: BTreeMap::new(),
            last_updated: Utc::now(),
        };

        let categories: [(&[&str], fn(&mut MarketOverview) -> &mut Vec<Quote>); 4] = [
            (&OVERVIEW_INDICES, |o| &mut o.indices),
            (&OVERVIEW_CRYPTO, |o| &mut o.crypto),
            (&OVERVIEW_COMMODITIES, |o| &mut o.commodities),
            (&OVERVIEW_FOREX, |o| &mut o.forex),
        ];

        for (symbols, bucket) in categories {
            for raw in symbols {
                let Ok(requested) = Symbol::parse(raw) else {
                    continue;
                };
                match self.fetch_chart_quote(raw, &requested).await {
                    Ok((quote, status)) => {
                        if let Some((exchange, state)) = status {
                            overview.market_status.insert(exchange, state);
                        }
                        bucket(&mut overview).push(quote);
                    }
                    Err(err) => {
                        debug!(
                            target = "mercato::yahoo",
                            event = "overview_symbol_failed",
                            symbol = %raw,
                            error = %err,
                            "skipping overview symbol"
                        );
                    }
                }
            }
        }

        if overview.is_empty() {
            return Err(MercatoError::upstream(
                PROVIDER,
                "market overview: no category could be populated",
            ));
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
