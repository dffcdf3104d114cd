//! Wire-format payloads for the Financial Modeling Prep v3 API and their
//! translation into canonical entities. Provider-specific fields are dropped
//! here; missing optionals stay missing.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use mercato_core::{
    Bar, CompanyProfile, HistoricalSeries, HistoryRequest, MercatoError, Quote, SearchHit,
    SearchRequest, SearchResults, Symbol, relevance, types::AssetKind,
};

use crate::client::PROVIDER;

/// FMP is a US-market feed; quotes carry no currency or timezone of their own.
pub(crate) const CURRENCY: &str = "USD";
pub(crate) const TIMEZONE: &str = "America/New_York";

/// Most-recent bars retained from a historical payload.
const HISTORY_CAP: usize = 100;

/// Reject error bodies that come back with HTTP 200: explicit error messages
/// and the "API call frequency" throttle note.
pub(crate) fn ensure_plausible(body: &serde_json::Value) -> Result<(), MercatoError> {
    if let Some(obj) = body.as_object() {
        if obj.contains_key("Error Message") || obj.contains_key("error") {
            return Err(MercatoError::data(format!(
                "upstream error body: {}",
                serde_json::to_string(body).unwrap_or_default()
            )));
        }
        if let Some(note) = obj.get("Note").and_then(|n| n.as_str())
            && note.contains("API call frequency")
        {
            return Err(MercatoError::upstream(PROVIDER, "upstream throttle note"));
        }
    }
    Ok(())
}

/// FMP reports some integers (employee counts) as strings.
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Text(String),
        Other(serde_json::Value),
    }
    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Num(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct FmpQuote {
    symbol: Option<String>,
    name: Option<String>,
    price: Option<Decimal>,
    change: Option<Decimal>,
    #[serde(rename = "changesPercentage")]
    changes_percentage: Option<Decimal>,
    #[serde(rename = "previousClose")]
    previous_close: Option<Decimal>,
    open: Option<Decimal>,
    #[serde(rename = "dayHigh")]
    day_high: Option<Decimal>,
    #[serde(rename = "dayLow")]
    day_low: Option<Decimal>,
    volume: Option<u64>,
    #[serde(rename = "marketCap")]
    market_cap: Option<Decimal>,
    pe: Option<Decimal>,
    exchange: Option<String>,
}

impl FmpQuote {
    pub(crate) fn into_quote(self, requested: &Symbol) -> Quote {
        let symbol = self
            .symbol
            .as_deref()
            .and_then(|s| Symbol::parse(s).ok())
            .unwrap_or_else(|| requested.clone());
        Quote {
            symbol,
            name: self.name,
            price: self.price,
            change: self.change,
            change_percent: self.changes_percentage,
            previous_close: self.previous_close,
            open: self.open,
            high: self.day_high,
            low: self.day_low,
            volume: self.volume,
            market_cap: self.market_cap,
            pe_ratio: self.pe,
            bid: None,
            ask: None,
            currency: CURRENCY.to_string(),
            exchange: self.exchange,
            timezone: TIMEZONE.to_string(),
            last_updated: Utc::now(),
        }
    }
}

/// Parse a `/quote/{symbol}` payload. The predicate for this endpoint is a
/// non-empty array; an empty one means the symbol is unknown upstream.
pub(crate) fn parse_quote(
    body: &serde_json::Value,
    requested: &Symbol,
) -> Result<Quote, MercatoError> {
    let rows: Vec<FmpQuote> = serde_json::from_value(body.clone())
        .map_err(|e| MercatoError::data(format!("quote payload: {e}")))?;
    let first = rows
        .into_iter()
        .next()
        .ok_or_else(|| MercatoError::not_found(format!("quote for {requested}")))?;
    Ok(first.into_quote(requested))
}

/// Parse a batch `/quote/{a,b,c}` payload into per-symbol quotes.
pub(crate) fn parse_quote_batch(body: &serde_json::Value) -> Result<Vec<Quote>, MercatoError> {
    let rows: Vec<FmpQuote> = serde_json::from_value(body.clone())
        .map_err(|e| MercatoError::data(format!("batch quote payload: {e}")))?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(raw) = row.symbol.as_deref() else {
            continue;
        };
        let Ok(symbol) = Symbol::parse(raw) else {
            continue;
        };
        out.push(row.into_quote(&symbol));
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
pub(crate) struct FmpProfile {
    symbol: Option<String>,
    #[serde(rename = "companyName")]
    company_name: Option<String>,
    description: Option<String>,
    industry: Option<String>,
    sector: Option<String>,
    country: Option<String>,
    website: Option<String>,
    #[serde(rename = "mktCap")]
    mkt_cap: Option<Decimal>,
    #[serde(rename = "fullTimeEmployees", default, deserialize_with = "lenient_u64")]
    full_time_employees: Option<u64>,
    #[serde(rename = "exchangeShortName")]
    exchange_short_name: Option<String>,
    currency: Option<String>,
    ceo: Option<String>,
    #[serde(rename = "foundingYear")]
    founding_year: Option<i32>,
    city: Option<String>,
    state: Option<String>,
}

impl FmpProfile {
    fn into_profile(self, requested: &Symbol) -> CompanyProfile {
        let symbol = self
            .symbol
            .as_deref()
            .and_then(|s| Symbol::parse(s).ok())
            .unwrap_or_else(|| requested.clone());
        let headquarters = match (self.city, self.state) {
            (Some(city), Some(state)) => Some(format!("{city}, {state}")),
            (Some(city), None) => Some(city),
            (None, Some(state)) => Some(state),
            (None, None) => None,
        };
        CompanyProfile {
            symbol,
            company_name: self.company_name.unwrap_or_default(),
            description: self.description,
            industry: self.industry,
            sector: self.sector,
            country: self.country,
            website: self.website,
            market_cap: self.mkt_cap,
            employees: self.full_time_employees,
            exchange: self.exchange_short_name,
            currency: self.currency,
            ceo: self.ceo,
            founded: self.founding_year,
            headquarters,
            last_updated: Utc::now(),
        }
    }
}

/// Parse a `/profile/{symbol}` payload (non-empty array predicate).
pub(crate) fn parse_profile(
    body: &serde_json::Value,
    requested: &Symbol,
) -> Result<CompanyProfile, MercatoError> {
    let rows: Vec<FmpProfile> = serde_json::from_value(body.clone())
        .map_err(|e| MercatoError::data(format!("profile payload: {e}")))?;
    let first = rows
        .into_iter()
        .next()
        .ok_or_else(|| MercatoError::not_found(format!("profile for {requested}")))?;
    Ok(first.into_profile(requested))
}

#[derive(Debug, Deserialize)]
struct FmpBar {
    date: String,
    open: Option<Decimal>,
    high: Option<Decimal>,
    low: Option<Decimal>,
    close: Option<Decimal>,
    volume: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FmpHistorical {
    historical: Vec<FmpBar>,
}

/// Parse a `/historical-price-full/{symbol}` payload. The predicate is an
/// object carrying a `historical` collection; FMP returns bars newest-first,
/// so the most recent `HISTORY_CAP` rows are kept and re-sorted ascending.
pub(crate) fn parse_historical(
    body: &serde_json::Value,
    requested: &Symbol,
    req: HistoryRequest,
) -> Result<HistoricalSeries, MercatoError> {
    if body.get("historical").is_none() {
        return Err(MercatoError::not_found(format!(
            "historical data for {requested}"
        )));
    }
    let payload: FmpHistorical = serde_json::from_value(body.clone())
        .map_err(|e| MercatoError::data(format!("historical payload: {e}")))?;

    let mut bars = Vec::new();
    for row in payload.historical.into_iter().take(HISTORY_CAP) {
        let Ok(date) = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d") else {
            continue;
        };
        let (Some(open), Some(high), Some(low), Some(close)) =
            (row.open, row.high, row.low, row.close)
        else {
            continue;
        };
        let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
            continue;
        };
        bars.push(Bar {
            date: midnight.and_utc(),
            open,
            high,
            low,
            close,
            volume: row.volume,
        });
    }

    Ok(HistoricalSeries::from_bars(
        requested.clone(),
        req.period(),
        req.interval(),
        CURRENCY,
        TIMEZONE,
        bars,
        Utc::now(),
    ))
}

#[derive(Debug, Deserialize)]
struct FmpSearchItem {
    symbol: Option<String>,
    name: Option<String>,
    #[serde(rename = "stockExchange")]
    stock_exchange: Option<String>,
    currency: Option<String>,
}

/// Parse a `/search` payload. An empty array is a valid empty result set.
pub(crate) fn parse_search(
    body: &serde_json::Value,
    req: &SearchRequest,
) -> Result<SearchResults, MercatoError> {
    let rows: Vec<FmpSearchItem> = serde_json::from_value(body.clone())
        .map_err(|e| MercatoError::data(format!("search payload: {e}")))?;

    let mut results = Vec::new();
    for (index, row) in rows.into_iter().take(req.limit()).enumerate() {
        let Some(symbol) = row.symbol.filter(|s| !s.is_empty()) else {
            continue;
        };
        let name = row.name.unwrap_or_default();
        let score = relevance(req.query(), &symbol, &name, index);
        results.push(SearchHit {
            symbol,
            name,
            // FMP search primarily covers listed equities.
            kind: AssetKind::Equity,
            exchange: row.stock_exchange,
            currency: row.currency,
            country: None,
            industry: None,
            market_cap: None,
            relevance_score: score,
        });
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
