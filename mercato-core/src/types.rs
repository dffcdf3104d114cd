//! Canonical market data entities shared by every provider adapter.
//!
//! Adapters translate provider-specific payloads into these types and drop
//! everything else. Optional numeric fields stay `None` when the upstream
//! omitted them; adapters never substitute zeros for absent values.

use core::fmt;
use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::MercatoError;

/// A validated, normalized ticker symbol.
///
/// Normalization (trim + uppercase + charset check) happens exactly once at
/// the orchestrator boundary; everything downstream treats the value as
/// opaque. Resolution is the provider's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    const MAX_LEN: usize = 20;

    /// Parse and normalize a raw symbol string.
    ///
    /// # Errors
    /// Returns `InvalidArg` when the trimmed input is empty, longer than 20
    /// characters, or contains characters outside `[A-Za-z0-9.\-^=]`.
    pub fn parse(raw: &str) -> Result<Self, MercatoError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MercatoError::invalid_arg("symbol must not be empty"));
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(MercatoError::invalid_arg(format!(
                "symbol '{trimmed}' exceeds {} characters",
                Self::MAX_LEN
            )));
        }
        let upper = trimmed.to_ascii_uppercase();
        // `^` and `=` admitted for index/futures/forex tickers (^GSPC, GC=F).
        if !upper
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '^' | '='))
        {
            return Err(MercatoError::invalid_arg(format!(
                "symbol '{trimmed}' contains invalid characters"
            )));
        }
        Ok(Self(upper))
    }

    /// The normalized symbol text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Kind of tradable instrument.
///
/// Only `Equity` and `Crypto` are first-class in the reference adapters; the
/// remaining kinds appear in market-overview categories and search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum AssetKind {
    /// Common stock or fund share.
    Equity,
    /// Cryptocurrency pair.
    Crypto,
    /// Broad-market index.
    Index,
    /// Commodity future.
    Commodity,
    /// Currency pair.
    Forex,
}

impl AssetKind {
    /// Stable identifier for logs and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equity => "equity",
            Self::Crypto => "crypto",
            Self::Index => "index",
            Self::Commodity => "commodity",
            Self::Forex => "forex",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = MercatoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equity" | "stock" => Ok(Self::Equity),
            "crypto" => Ok(Self::Crypto),
            "index" => Ok(Self::Index),
            "commodity" => Ok(Self::Commodity),
            "forex" => Ok(Self::Forex),
            other => Err(MercatoError::invalid_arg(format!(
                "unknown asset kind '{other}'"
            ))),
        }
    }
}

/// Point-in-time quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Normalized symbol.
    pub symbol: Symbol,
    /// Instrument display name, when the provider exposes one.
    pub name: Option<String>,
    /// Last traded price.
    pub price: Option<Decimal>,
    /// Absolute change since previous close.
    pub change: Option<Decimal>,
    /// Percentage change since previous close.
    pub change_percent: Option<Decimal>,
    /// Previous session close.
    pub previous_close: Option<Decimal>,
    /// Session open.
    pub open: Option<Decimal>,
    /// Session high.
    pub high: Option<Decimal>,
    /// Session low.
    pub low: Option<Decimal>,
    /// Session volume.
    pub volume: Option<u64>,
    /// Market capitalization.
    pub market_cap: Option<Decimal>,
    /// Trailing price/earnings ratio.
    pub pe_ratio: Option<Decimal>,
    /// Best bid.
    pub bid: Option<Decimal>,
    /// Best ask.
    pub ask: Option<Decimal>,
    /// Quote currency code.
    pub currency: String,
    /// Listing exchange, when known.
    pub exchange: Option<String>,
    /// Exchange timezone name.
    pub timezone: String,
    /// Instant the quote was produced.
    pub last_updated: DateTime<Utc>,
}

/// Company or fund profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    /// Normalized symbol.
    pub symbol: Symbol,
    /// Legal or display company name.
    pub company_name: String,
    /// Business description.
    pub description: Option<String>,
    /// Industry classification.
    pub industry: Option<String>,
    /// Sector classification.
    pub sector: Option<String>,
    /// Country of incorporation.
    pub country: Option<String>,
    /// Corporate website.
    pub website: Option<String>,
    /// Market capitalization.
    pub market_cap: Option<Decimal>,
    /// Full-time employee count.
    pub employees: Option<u64>,
    /// Listing exchange.
    pub exchange: Option<String>,
    /// Reporting currency code.
    pub currency: Option<String>,
    /// Chief executive, when disclosed.
    pub ceo: Option<String>,
    /// Founding year.
    pub founded: Option<i32>,
    /// Headquarters location.
    pub headquarters: Option<String>,
    /// Instant the profile was produced.
    pub last_updated: DateTime<Utc>,
}

/// One OHLCV bar of a historical series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar timestamp.
    pub date: DateTime<Utc>,
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price.
    pub close: Decimal,
    /// Traded volume, when reported.
    pub volume: Option<u64>,
}

/// Historical OHLCV series, strictly ordered ascending by date.
///
/// Duplicates and gaps are reported via anomaly flags rather than repaired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    /// Normalized symbol.
    pub symbol: Symbol,
    /// Requested lookback period.
    pub period: Period,
    /// Requested bar cadence.
    pub interval: Interval,
    /// Timestamp of the first bar.
    pub start_date: Option<DateTime<Utc>>,
    /// Timestamp of the last bar.
    pub end_date: Option<DateTime<Utc>>,
    /// Number of bars.
    pub count: usize,
    /// Price currency code.
    pub currency: String,
    /// Exchange timezone name.
    pub timezone: String,
    /// The bars, ascending by date.
    pub bars: Vec<Bar>,
    /// Instant the series was produced.
    pub last_updated: DateTime<Utc>,
}

impl HistoricalSeries {
    /// Build a series from unordered bars, sorting ascending and filling the
    /// derived `count`/`start_date`/`end_date` fields.
    #[must_use]
    pub fn from_bars(
        symbol: Symbol,
        period: Period,
        interval: Interval,
        currency: impl Into<String>,
        timezone: impl Into<String>,
        mut bars: Vec<Bar>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        bars.sort_by_key(|b| b.date);
        Self {
            symbol,
            period,
            interval,
            start_date: bars.first().map(|b| b.date),
            end_date: bars.last().map(|b| b.date),
            count: bars.len(),
            currency: currency.into(),
            timezone: timezone.into(),
            bars,
            last_updated,
        }
    }

    /// Whether the bars are in strictly non-descending date order.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.bars.windows(2).all(|w| w[0].date <= w[1].date)
    }

    /// Number of bars sharing a date with their predecessor.
    #[must_use]
    pub fn duplicate_dates(&self) -> usize {
        self.bars
            .windows(2)
            .filter(|w| w[0].date == w[1].date)
            .count()
    }

    /// Whether the derived fields agree with the bar collection.
    #[must_use]
    pub fn boundaries_consistent(&self) -> bool {
        self.count == self.bars.len()
            && self.start_date == self.bars.first().map(|b| b.date)
            && self.end_date == self.bars.last().map(|b| b.date)
    }
}

/// One search match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Provider-reported symbol.
    pub symbol: String,
    /// Instrument display name.
    pub name: String,
    /// Instrument kind.
    pub kind: AssetKind,
    /// Listing exchange, when reported.
    pub exchange: Option<String>,
    /// Trading currency, when reported.
    pub currency: Option<String>,
    /// Country, when reported.
    pub country: Option<String>,
    /// Industry, when reported.
    pub industry: Option<String>,
    /// Market capitalization, when reported.
    pub market_cap: Option<Decimal>,
    /// Match strength in `[0, 100]`.
    pub relevance_score: f64,
}

/// Ordered search result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// The query that produced these results.
    pub query: String,
    /// Matches, ordered by relevance.
    pub results: Vec<SearchHit>,
    /// Number of matches returned.
    pub total_count: usize,
    /// Provider-side processing time.
    pub processing_time_ms: f64,
    /// Instant the result set was produced.
    pub last_updated: DateTime<Utc>,
}

/// Score how well a hit matches a query, for providers that do not report a
/// relevance of their own. Exact symbol matches dominate, prefix matches come
/// next, then name substrings, decaying with result position.
#[must_use]
pub fn relevance(query: &str, symbol: &str, name: &str, index: usize) -> f64 {
    let q = query.trim().to_ascii_uppercase();
    let sym = symbol.to_ascii_uppercase();
    let positional_decay = (index as f64 * 2.0).min(40.0);
    let base = if sym == q {
        100.0
    } else if sym.starts_with(&q) {
        85.0
    } else if name.to_ascii_uppercase().contains(&q) {
        70.0
    } else {
        55.0
    };
    (base - positional_decay).max(0.0)
}

/// Aggregated market overview across asset categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOverview {
    /// Broad-market index quotes.
    pub indices: Vec<Quote>,
    /// Major cryptocurrency quotes.
    pub crypto: Vec<Quote>,
    /// Commodity future quotes.
    pub commodities: Vec<Quote>,
    /// Currency pair quotes.
    pub forex: Vec<Quote>,
    /// Exchange name to market state ("open", "closed", ...).
    pub market_status: BTreeMap<String, String>,
    /// Instant the overview was assembled.
    pub last_updated: DateTime<Utc>,
}

impl MarketOverview {
    /// Whether every category came back empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
            && self.crypto.is_empty()
            && self.commodities.is_empty()
            && self.forex.is_empty()
    }

    /// Names of categories that came back empty.
    #[must_use]
    pub fn empty_categories(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.indices.is_empty() {
            out.push("indices");
        }
        if self.crypto.is_empty() {
            out.push("crypto");
        }
        if self.commodities.is_empty() {
            out.push("commodities");
        }
        if self.forex.is_empty() {
            out.push("forex");
        }
        out
    }
}

/// Lookback period for historical requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// One day.
    D1,
    /// Five days.
    D5,
    /// One month.
    M1,
    /// Three months.
    M3,
    /// Six months.
    M6,
    /// One year.
    Y1,
    /// Two years.
    Y2,
    /// Five years.
    Y5,
    /// Ten years.
    Y10,
    /// Year to date.
    Ytd,
    /// Full available range.
    Max,
}

impl Period {
    /// Wire-format token shared by the reference upstreams.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::D1 => "1d",
            Self::D5 => "5d",
            Self::M1 => "1mo",
            Self::M3 => "3mo",
            Self::M6 => "6mo",
            Self::Y1 => "1y",
            Self::Y2 => "2y",
            Self::Y5 => "5y",
            Self::Y10 => "10y",
            Self::Ytd => "ytd",
            Self::Max => "max",
        }
    }

    /// Whether the period is short enough for intraday cadences.
    #[must_use]
    pub const fn supports_intraday(self) -> bool {
        matches!(self, Self::D1 | Self::D5)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = MercatoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1d" => Ok(Self::D1),
            "5d" => Ok(Self::D5),
            "1m" | "1mo" => Ok(Self::M1),
            "3m" | "3mo" => Ok(Self::M3),
            "6m" | "6mo" => Ok(Self::M6),
            "1y" => Ok(Self::Y1),
            "2y" => Ok(Self::Y2),
            "5y" => Ok(Self::Y5),
            "10y" => Ok(Self::Y10),
            "ytd" => Ok(Self::Ytd),
            "max" => Ok(Self::Max),
            other => Err(MercatoError::invalid_arg(format!(
                "unknown period '{other}'"
            ))),
        }
    }
}

/// Bar cadence for historical requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    /// One minute.
    I1m,
    /// Two minutes.
    I2m,
    /// Five minutes.
    I5m,
    /// Fifteen minutes.
    I15m,
    /// Thirty minutes.
    I30m,
    /// Sixty minutes.
    I60m,
    /// Ninety minutes.
    I90m,
    /// One hour.
    I1h,
    /// One day.
    D1,
    /// Five days.
    D5,
    /// One week.
    W1,
    /// One month.
    Mo1,
    /// Three months.
    Mo3,
}

impl Interval {
    /// Wire-format token shared by the reference upstreams.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::I1m => "1m",
            Self::I2m => "2m",
            Self::I5m => "5m",
            Self::I15m => "15m",
            Self::I30m => "30m",
            Self::I60m => "60m",
            Self::I90m => "90m",
            Self::I1h => "1h",
            Self::D1 => "1d",
            Self::D5 => "5d",
            Self::W1 => "1wk",
            Self::Mo1 => "1mo",
            Self::Mo3 => "3mo",
        }
    }

    /// Whether the cadence is finer than one day.
    #[must_use]
    pub const fn is_intraday(self) -> bool {
        matches!(
            self,
            Self::I1m
                | Self::I2m
                | Self::I5m
                | Self::I15m
                | Self::I30m
                | Self::I60m
                | Self::I90m
                | Self::I1h
        )
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = MercatoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Self::I1m),
            "2m" => Ok(Self::I2m),
            "5m" => Ok(Self::I5m),
            "15m" => Ok(Self::I15m),
            "30m" => Ok(Self::I30m),
            "60m" => Ok(Self::I60m),
            "90m" => Ok(Self::I90m),
            "1h" => Ok(Self::I1h),
            "1d" => Ok(Self::D1),
            "5d" => Ok(Self::D5),
            "1wk" => Ok(Self::W1),
            "1mo" => Ok(Self::Mo1),
            "3mo" => Ok(Self::Mo3),
            other => Err(MercatoError::invalid_arg(format!(
                "unknown interval '{other}'"
            ))),
        }
    }
}

/// Validated (period, interval) pair for a historical request.
///
/// Intraday intervals are only accepted with the 1d/5d periods; everything
/// else is rejected at construction, before any adapter is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryRequest {
    period: Period,
    interval: Interval,
}

impl HistoryRequest {
    /// Validate and build a request.
    ///
    /// # Errors
    /// Returns `InvalidArg` when an intraday interval is combined with a
    /// period longer than five days.
    pub fn new(period: Period, interval: Interval) -> Result<Self, MercatoError> {
        if interval.is_intraday() && !period.supports_intraday() {
            return Err(MercatoError::invalid_arg(format!(
                "intraday interval {interval} requires period 1d or 5d, got {period}"
            )));
        }
        Ok(Self { period, interval })
    }

    /// The lookback period.
    #[must_use]
    pub const fn period(self) -> Period {
        self.period
    }

    /// The bar cadence.
    #[must_use]
    pub const fn interval(self) -> Interval {
        self.interval
    }
}

/// Validated free-text search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    query: String,
    kinds: Vec<AssetKind>,
    limit: usize,
}

impl SearchRequest {
    const MAX_LIMIT: usize = 50;
    const DEFAULT_LIMIT: usize = 10;

    /// Validate and build a request. A `limit` of zero selects the default.
    ///
    /// # Errors
    /// Returns `InvalidArg` when the trimmed query is empty.
    pub fn new(
        query: impl Into<String>,
        kinds: Vec<AssetKind>,
        limit: usize,
    ) -> Result<Self, MercatoError> {
        let query = query.into().trim().to_string();
        if query.is_empty() {
            return Err(MercatoError::invalid_arg("search query must not be empty"));
        }
        let limit = match limit {
            0 => Self::DEFAULT_LIMIT,
            n => n.min(Self::MAX_LIMIT),
        };
        Ok(Self {
            query,
            kinds,
            limit,
        })
    }

    /// The trimmed query text.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Requested kind filter; empty means all kinds.
    #[must_use]
    pub fn kinds(&self) -> &[AssetKind] {
        &self.kinds
    }

    /// Maximum results to return.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }
}
