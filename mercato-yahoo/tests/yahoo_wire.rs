use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;

use mercato_core::connector::{
    HistoryProvider, MercatoConnector, OverviewProvider, ProfileProvider, QuoteProvider,
    SearchProvider,
};
use mercato_core::{AssetKind, HistoryRequest, Interval, MercatoError, Period, SearchRequest, Symbol};
use mercato_middleware::{MarketCache, RateLimiter};
use mercato_types::{CacheConfig, RateBudgets};
use mercato_yahoo::YahooConnector;

fn dec(s: &str) -> Decimal {
    s.parse().expect("decimal literal")
}

fn connector(server: &MockServer) -> YahooConnector {
    let cache = Arc::new(MarketCache::new(CacheConfig::default()));
    let limiter = Arc::new(RateLimiter::new().with_budgets("yahoo", RateBudgets::free_default()));
    YahooConnector::builder()
        .base_url(server.base_url())
        .timeout(Duration::from_secs(2))
        .max_retries(1)
        .backoff_base(0.0)
        .cache(cache)
        .limiter(limiter)
        .build()
        .expect("connector builds")
}

fn chart_meta_body(symbol: &str, price: f64, previous_close: f64) -> serde_json::Value {
    json!({
        "chart": {
            "result": [{
                "meta": {
                    "symbol": symbol,
                    "currency": "USD",
                    "exchangeName": "NMS",
                    "fullExchangeName": "NasdaqGS",
                    "exchangeTimezoneName": "America/New_York",
                    "marketState": "REGULAR",
                    "regularMarketPrice": price,
                    "regularMarketDayHigh": price + 1.0,
                    "regularMarketDayLow": price - 2.0,
                    "regularMarketVolume": 42_000_000u64,
                    "previousClose": previous_close
                },
                "timestamp": [],
                "indicators": {"quote": [{}]}
            }],
            "error": null
        }
    })
}

#[tokio::test]
async fn quote_derives_change_from_the_chart_meta() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v8/finance/chart/AAPL")
                .query_param("range", "1d");
            then.status(200)
                .json_body(chart_meta_body("AAPL", 150.25, 147.75));
        })
        .await;

    let conn = connector(&server);
    let symbol = Symbol::parse("AAPL").unwrap();
    let resp = conn
        .as_quote_provider()
        .unwrap()
        .quote(&symbol, AssetKind::Equity, false)
        .await
        .expect("quote succeeds");
    let q = &resp.data;
    assert_eq!(q.price, Some(dec("150.25")));
    assert_eq!(q.previous_close, Some(dec("147.75")));
    assert_eq!(q.change, Some(dec("2.50")));
    assert_eq!(q.exchange.as_deref(), Some("NasdaqGS"));
    assert_eq!(q.timezone, "America/New_York");
    // change_percent = 2.5 / 147.75 * 100
    let pct = q.change_percent.expect("derived percent");
    assert!((pct - dec("1.6920")).abs() < dec("0.001"));
}

#[tokio::test]
async fn chart_not_found_maps_to_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v8/finance/chart/ZZZQ");
            then.status(200).json_body(json!({
                "chart": {
                    "result": null,
                    "error": {"code": "Not Found", "description": "No data found"}
                }
            }));
        })
        .await;

    let conn = connector(&server);
    let symbol = Symbol::parse("ZZZQ").unwrap();
    let err = conn
        .as_quote_provider()
        .unwrap()
        .quote(&symbol, AssetKind::Equity, false)
        .await
        .expect_err("unknown symbol");
    assert!(matches!(err, MercatoError::NotFound { .. }));
}

#[tokio::test]
async fn crypto_tickers_use_the_mapping_table() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v8/finance/chart/BTC-USD");
            then.status(200)
                .json_body(chart_meta_body("BTC-USD", 67_000.0, 66_000.0));
        })
        .await;

    let conn = connector(&server);
    let symbol = Symbol::parse("BTC").unwrap();
    let resp = conn
        .as_quote_provider()
        .unwrap()
        .quote(&symbol, AssetKind::Crypto, false)
        .await
        .expect("crypto quote");
    assert_eq!(resp.data.symbol.as_str(), "BTC-USD");
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn history_drops_null_rows_and_sorts() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v8/finance/chart/AAPL")
                .query_param("range", "1mo")
                .query_param("interval", "1d");
            then.status(200).json_body(json!({
                "chart": {
                    "result": [{
                        "meta": {
                            "symbol": "AAPL",
                            "currency": "USD",
                            "exchangeTimezoneName": "America/New_York",
                            "regularMarketPrice": 150.0
                        },
                        "timestamp": [1_704_412_800i64, 1_704_240_000i64, 1_704_326_400i64],
                        "indicators": {"quote": [{
                            "open":   [149.0, 147.0, null],
                            "high":   [151.0, 149.0, 150.0],
                            "low":    [148.0, 146.0, 147.0],
                            "close":  [150.0, 148.0, 149.0],
                            "volume": [1000u64, 900u64, 950u64]
                        }]}
                    }],
                    "error": null
                }
            }));
        })
        .await;

    let conn = connector(&server);
    let symbol = Symbol::parse("AAPL").unwrap();
    let req = HistoryRequest::new(Period::M1, Interval::D1).unwrap();
    let resp = conn
        .as_history_provider()
        .unwrap()
        .history(&symbol, req)
        .await
        .expect("history succeeds");
    let series = &resp.data;
    // The all-null third row is dropped; remaining bars are sorted ascending.
    assert_eq!(series.count, 2);
    assert!(series.is_sorted());
    assert_eq!(series.bars[0].close, dec("148.0"));
    assert_eq!(series.bars[1].close, dec("150.0"));
}

#[tokio::test]
async fn search_applies_kind_filter() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/finance/search").query_param("q", "bitcoin");
            then.status(200).json_body(json!({
                "quotes": [
                    {"symbol": "BTC-USD", "shortname": "Bitcoin USD", "quoteType": "CRYPTOCURRENCY", "exchange": "CCC"},
                    {"symbol": "MSTR", "shortname": "MicroStrategy", "quoteType": "EQUITY", "exchange": "NMS"}
                ]
            }));
        })
        .await;

    let conn = connector(&server);
    let req = SearchRequest::new("bitcoin", vec![AssetKind::Crypto], 10).unwrap();
    let resp = conn
        .as_search_provider()
        .unwrap()
        .search(&req)
        .await
        .expect("search succeeds");
    assert_eq!(resp.data.total_count, 1);
    assert_eq!(resp.data.results[0].symbol, "BTC-USD");
    assert_eq!(resp.data.results[0].kind, AssetKind::Crypto);
}

#[tokio::test]
async fn empty_search_falls_back_to_common_symbols() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/finance/search");
            then.status(200).json_body(json!({"quotes": []}));
        })
        .await;

    let conn = connector(&server);
    let req = SearchRequest::new("apple", vec![], 10).unwrap();
    let resp = conn
        .as_search_provider()
        .unwrap()
        .search(&req)
        .await
        .expect("search succeeds");
    assert_eq!(resp.data.results[0].symbol, "AAPL");
}

#[tokio::test]
async fn profile_parses_the_quote_summary_modules() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v10/finance/quoteSummary/AAPL")
                .query_param("modules", "assetProfile,price");
            then.status(200).json_body(json!({
                "quoteSummary": {
                    "result": [{
                        "assetProfile": {
                            "longBusinessSummary": "Designs consumer electronics.",
                            "industry": "Consumer Electronics",
                            "sector": "Technology",
                            "country": "United States",
                            "website": "https://www.apple.com",
                            "fullTimeEmployees": 164_000u64,
                            "city": "Cupertino",
                            "state": "CA",
                            "companyOfficers": [
                                {"name": "Timothy Cook", "title": "CEO & Director"},
                                {"name": "Luca Maestri", "title": "CFO"}
                            ]
                        },
                        "price": {
                            "longName": "Apple Inc.",
                            "currency": "USD",
                            "exchangeName": "NasdaqGS",
                            "marketCap": {"raw": 2_400_000_000_000u64, "fmt": "2.4T"}
                        }
                    }],
                    "error": null
                }
            }));
        })
        .await;

    let conn = connector(&server);
    let symbol = Symbol::parse("AAPL").unwrap();
    let resp = conn
        .as_profile_provider()
        .unwrap()
        .profile(&symbol)
        .await
        .expect("profile succeeds");
    let p = &resp.data;
    assert_eq!(p.company_name, "Apple Inc.");
    assert_eq!(p.ceo.as_deref(), Some("Timothy Cook"));
    assert_eq!(p.employees, Some(164_000));
    assert_eq!(p.sector.as_deref(), Some("Technology"));
    assert_eq!(p.headquarters.as_deref(), Some("Cupertino, CA"));
}

#[tokio::test]
async fn overview_tolerates_individual_symbol_failures() {
    let server = MockServer::start_async().await;
    // Only the S&P 500 probe answers; every other symbol goes unmatched and
    // fails, which the overview tolerates.
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path_matches("GSPC");
            then.status(200)
                .json_body(chart_meta_body("^GSPC", 5_200.0, 5_150.0));
        })
        .await;

    let conn = connector(&server);
    let resp = conn
        .as_overview_provider()
        .unwrap()
        .market_overview()
        .await
        .expect("partial overview succeeds");
    let overview = &resp.data;
    assert_eq!(overview.indices.len(), 1);
    assert!(overview.crypto.is_empty());
    assert!(overview.forex.is_empty());
    assert_eq!(
        overview.market_status.get("NasdaqGS").map(String::as_str),
        Some("regular")
    );
}

#[tokio::test]
async fn fully_failed_overview_is_an_upstream_error() {
    // No mocks registered: every probe fails, no category populates.
    let server = MockServer::start_async().await;
    let conn = connector(&server);
    let err = conn
        .as_overview_provider()
        .unwrap()
        .market_overview()
        .await
        .expect_err("nothing populated");
    assert!(matches!(err, MercatoError::Upstream { .. }));
}
