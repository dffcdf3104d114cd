//! Wire-format payloads for the public Yahoo Finance chart, search, and
//! quote-summary endpoints, and their translation into canonical entities.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use mercato_core::{
    Bar, CompanyProfile, HistoricalSeries, HistoryRequest, MercatoError, Quote, SearchHit,
    SearchRequest, SearchResults, Symbol, relevance, types::AssetKind,
};

use crate::client::PROVIDER;

#[derive(Debug, Deserialize)]
pub(crate) struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChartMeta {
    symbol: Option<String>,
    currency: Option<String>,
    exchange_name: Option<String>,
    full_exchange_name: Option<String>,
    exchange_timezone_name: Option<String>,
    market_state: Option<String>,
    short_name: Option<String>,
    long_name: Option<String>,
    regular_market_price: Option<Decimal>,
    regular_market_day_high: Option<Decimal>,
    regular_market_day_low: Option<Decimal>,
    regular_market_volume: Option<u64>,
    previous_close: Option<Decimal>,
    chart_previous_close: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    open: Option<Vec<Option<Decimal>>>,
    high: Option<Vec<Option<Decimal>>>,
    low: Option<Vec<Option<Decimal>>>,
    close: Option<Vec<Option<Decimal>>>,
    volume: Option<Vec<Option<u64>>>,
}

fn chart_result(
    body: &serde_json::Value,
    requested: &Symbol,
) -> Result<ChartResult, MercatoError> {
    let envelope: ChartEnvelope = serde_json::from_value(body.clone())
        .map_err(|e| MercatoError::data(format!("chart payload: {e}")))?;
    if let Some(err) = envelope.chart.error {
        let code = err.code.unwrap_or_default();
        if code.eq_ignore_ascii_case("not found") {
            return Err(MercatoError::not_found(format!("data for {requested}")));
        }
        return Err(MercatoError::upstream(
            PROVIDER,
            err.description.unwrap_or(code),
        ));
    }
    envelope
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
        .ok_or_else(|| MercatoError::not_found(format!("data for {requested}")))
}

impl ChartMeta {
    fn display_name(&self) -> Option<String> {
        self.long_name.clone().or_else(|| self.short_name.clone())
    }

    fn effective_previous_close(&self) -> Option<Decimal> {
        self.previous_close.or(self.chart_previous_close)
    }

    /// Exchange name plus market state, for the overview status map.
    pub(crate) fn market_status(&self) -> Option<(String, String)> {
        let exchange = self
            .full_exchange_name
            .clone()
            .or_else(|| self.exchange_name.clone())?;
        let state = self
            .market_state
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        Some((exchange, state.to_ascii_lowercase()))
    }

    fn into_quote(self, requested: &Symbol) -> Quote {
        let symbol = self
            .symbol
            .as_deref()
            .and_then(|s| Symbol::parse(s).ok())
            .unwrap_or_else(|| requested.clone());
        let price = self.regular_market_price;
        let previous_close = self.effective_previous_close();
        let change = match (price, previous_close) {
            (Some(p), Some(pc)) => Some(p - pc),
            _ => None,
        };
        let change_percent = match (change, previous_close) {
            (Some(c), Some(pc)) if !pc.is_zero() => Some(c / pc * Decimal::ONE_HUNDRED),
            _ => None,
        };
        Quote {
            name: self.display_name(),
            price,
            change,
            change_percent,
            previous_close,
            open: None,
            high: self.regular_market_day_high,
            low: self.regular_market_day_low,
            volume: self.regular_market_volume,
            market_cap: None,
            pe_ratio: None,
            bid: None,
            ask: None,
            currency: self.currency.unwrap_or_else(|| "USD".to_string()),
            exchange: self.full_exchange_name.or(self.exchange_name),
            timezone: self
                .exchange_timezone_name
                .unwrap_or_else(|| "America/New_York".to_string()),
            last_updated: Utc::now(),
            symbol,
        }
    }
}

/// Parse a chart payload into a quote (the meta block carries the regular
/// market fields). Also returns the exchange market-state pair when present.
pub(crate) fn parse_quote(
    body: &serde_json::Value,
    requested: &Symbol,
) -> Result<(Quote, Option<(String, String)>), MercatoError> {
    let result = chart_result(body, requested)?;
    if result.meta.regular_market_price.is_none() {
        return Err(MercatoError::not_found(format!("quote for {requested}")));
    }
    let status = result.meta.market_status();
    Ok((result.meta.into_quote(requested), status))
}

/// Parse a chart payload into a historical series. The predicate is a result
/// carrying parallel timestamp/indicator arrays; rows with missing OHLC
/// values are dropped rather than zero-filled.
pub(crate) fn parse_history(
    body: &serde_json::Value,
    requested: &Symbol,
    req: HistoryRequest,
) -> Result<HistoricalSeries, MercatoError> {
    let result = chart_result(body, requested)?;
    let currency = result
        .meta
        .currency
        .clone()
        .unwrap_or_else(|| "USD".to_string());
    let timezone = result
        .meta
        .exchange_timezone_name
        .clone()
        .unwrap_or_else(|| "America/New_York".to_string());

    let timestamps = result.timestamp.unwrap_or_default();
    let block = result
        .indicators
        .and_then(|mut i| {
            if i.quote.is_empty() {
                None
            } else {
                Some(i.quote.remove(0))
            }
        })
        .ok_or_else(|| MercatoError::not_found(format!("historical data for {requested}")))?;

    let opens = block.open.unwrap_or_default();
    let highs = block.high.unwrap_or_default();
    let lows = block.low.unwrap_or_default();
    let closes = block.close.unwrap_or_default();
    let volumes = block.volume.unwrap_or_default();

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let Some(date) = DateTime::from_timestamp(*ts, 0) else {
            continue;
        };
        let (Some(open), Some(high), Some(low), Some(close)) = (
            opens.get(i).copied().flatten(),
            highs.get(i).copied().flatten(),
            lows.get(i).copied().flatten(),
            closes.get(i).copied().flatten(),
        ) else {
            continue;
        };
        bars.push(Bar {
            date,
            open,
            high,
            low,
            close,
            volume: volumes.get(i).copied().flatten(),
        });
    }

    Ok(HistoricalSeries::from_bars(
        requested.clone(),
        req.period(),
        req.interval(),
        currency,
        timezone,
        bars,
        Utc::now(),
    ))
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    quotes: Option<Vec<SearchQuote>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchQuote {
    symbol: Option<String>,
    shortname: Option<String>,
    longname: Option<String>,
    quote_type: Option<String>,
    exchange: Option<String>,
    exch_disp: Option<String>,
}

fn kind_from_quote_type(quote_type: Option<&str>) -> AssetKind {
    match quote_type.map(str::to_ascii_uppercase).as_deref() {
        Some("CRYPTOCURRENCY") => AssetKind::Crypto,
        Some("INDEX") => AssetKind::Index,
        Some("FUTURE") => AssetKind::Commodity,
        Some("CURRENCY") => AssetKind::Forex,
        _ => AssetKind::Equity,
    }
}

/// Well-known symbols served when the upstream search returns nothing; keeps
/// the free feed useful for the most common lookups.
const COMMON_SYMBOLS: &[(&str, &str, AssetKind)] = &[
    ("AAPL", "Apple Inc.", AssetKind::Equity),
    ("GOOGL", "Alphabet Inc.", AssetKind::Equity),
    ("MSFT", "Microsoft Corporation", AssetKind::Equity),
    ("AMZN", "Amazon.com Inc.", AssetKind::Equity),
    ("TSLA", "Tesla Inc.", AssetKind::Equity),
    ("NVDA", "NVIDIA Corporation", AssetKind::Equity),
    ("BTC-USD", "Bitcoin USD", AssetKind::Crypto),
    ("ETH-USD", "Ethereum USD", AssetKind::Crypto),
];

fn common_symbol_hits(req: &SearchRequest) -> Vec<SearchHit> {
    let needle = req.query().to_ascii_uppercase();
    COMMON_SYMBOLS
        .iter()
        .filter(|(sym, name, _)| {
            sym.contains(&needle) || name.to_ascii_uppercase().contains(&needle)
        })
        .enumerate()
        .map(|(index, (sym, name, kind))| SearchHit {
            symbol: (*sym).to_string(),
            name: (*name).to_string(),
            kind: *kind,
            exchange: None,
            currency: Some("USD".to_string()),
            country: Some("US".to_string()),
            industry: None,
            market_cap: None,
            relevance_score: relevance(req.query(), sym, name, index),
        })
        .collect()
}

/// Parse a `/v1/finance/search` payload, applying the request's kind filter
/// and limit. Falls back to the common-symbol table when the upstream
/// returns nothing.
pub(crate) fn parse_search(
    body: &serde_json::Value,
    req: &SearchRequest,
) -> Result<SearchResults, MercatoError> {
    let envelope: SearchEnvelope = serde_json::from_value(body.clone())
        .map_err(|e| MercatoError::data(format!("search payload: {e}")))?;

    let mut results = Vec::new();
    for (index, row) in envelope
        .quotes
        .unwrap_or_default()
        .into_iter()
        .enumerate()
    {
        let Some(symbol) = row.symbol.filter(|s| !s.is_empty()) else {
            continue;
        };
        let kind = kind_from_quote_type(row.quote_type.as_deref());
        if !req.kinds().is_empty() && !req.kinds().contains(&kind) {
            continue;
        }
        let name = row
            .longname
            .or(row.shortname)
            .unwrap_or_else(|| symbol.clone());
        let score = relevance(req.query(), &symbol, &name, index);
        results.push(SearchHit {
            symbol,
            name,
            kind,
            exchange: row.exch_disp.or(row.exchange),
            currency: None,
            country: None,
            industry: None,
            market_cap: None,
            relevance_score: score,
        });
        if results.len() >= req.limit() {
            break;
        }
    }

    if results.is_empty() {
        results = common_symbol_hits(req);
        results.truncate(req.limit());
    }

    let total_count = results.len();
    Ok(SearchResults {
        query: req.query().to_string(),
        results,
        total_count,
        processing_time_ms: 0.0,
        last_updated: Utc::now(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryEnvelope {
    quote_summary: SummaryBody,
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    result: Option<Vec<SummaryResult>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResult {
    asset_profile: Option<AssetProfile>,
    price: Option<PriceModule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetProfile {
    long_business_summary: Option<String>,
    industry: Option<String>,
    sector: Option<String>,
    country: Option<String>,
    website: Option<String>,
    full_time_employees: Option<u64>,
    city: Option<String>,
    state: Option<String>,
    company_officers: Option<Vec<Officer>>,
}

#[derive(Debug, Deserialize)]
struct Officer {
    name: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
    currency: Option<String>,
    exchange_name: Option<String>,
    market_cap: Option<RawNumber>,
}

#[derive(Debug, Deserialize)]
struct RawNumber {
    raw: Option<Decimal>,
}

/// Parse a `quoteSummary` payload into a company profile.
pub(crate) fn parse_profile(
    body: &serde_json::Value,
    requested: &Symbol,
) -> Result<CompanyProfile, MercatoError> {
    let envelope: SummaryEnvelope = serde_json::from_value(body.clone())
        .map_err(|e| MercatoError::data(format!("profile payload: {e}")))?;
    if let Some(err) = envelope.quote_summary.error {
        let code = err.code.unwrap_or_default();
        if code.eq_ignore_ascii_case("not found") {
            return Err(MercatoError::not_found(format!("profile for {requested}")));
        }
        return Err(MercatoError::upstream(
            PROVIDER,
            err.description.unwrap_or(code),
        ));
    }
    let result = envelope
        .quote_summary
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
        .ok_or_else(|| MercatoError::not_found(format!("profile for {requested}")))?;

    let profile = result.asset_profile;
    let price = result.price;

    let ceo = profile.as_ref().and_then(|p| {
        p.company_officers.as_ref().and_then(|officers| {
            officers
                .iter()
                .find(|o| {
                    o.title
                        .as_deref()
                        .is_some_and(|t| t.to_ascii_uppercase().contains("CEO"))
                })
                .and_then(|o| o.name.clone())
        })
    });
    let headquarters = profile.as_ref().and_then(|p| match (&p.city, &p.state) {
        (Some(city), Some(state)) => Some(format!("{city}, {state}")),
        (Some(city), None) => Some(city.clone()),
        (None, Some(state)) => Some(state.clone()),
        (None, None) => None,
    });

    let company_name = price
        .as_ref()
        .and_then(|p| p.long_name.clone())
        .unwrap_or_else(|| requested.to_string());

    Ok(CompanyProfile {
        symbol: requested.clone(),
        company_name,
        description: profile.as_ref().and_then(|p| p.long_business_summary.clone()),
        industry: profile.as_ref().and_then(|p| p.industry.clone()),
        sector: profile.as_ref().and_then(|p| p.sector.clone()),
        country: profile.as_ref().and_then(|p| p.country.clone()),
        website: profile.as_ref().and_then(|p| p.website.clone()),
        market_cap: price.as_ref().and_then(|p| p.market_cap.as_ref()?.raw),
        employees: profile.as_ref().and_then(|p| p.full_time_employees),
        exchange: price.as_ref().and_then(|p| p.exchange_name.clone()),
        currency: price.as_ref().and_then(|p| p.currency.clone()),
        ceo,
        founded: None,
        headquarters,
        last_updated: Utc::now(),
    })
}
