use chrono::Utc;

use mercato_core::{AssetKind, SearchHit, SearchRequest, SearchResults, relevance};

const TABLE: &[(&str, &str, AssetKind)] = &[
    ("AAPL", "Apple Inc.", AssetKind::Equity),
    ("MSFT", "Microsoft Corp", AssetKind::Equity),
    ("GOOGL", "Alphabet Inc. Class A", AssetKind::Equity),
    ("SPY", "SPDR S&P 500 ETF", AssetKind::Equity),
    ("BTC-USD", "Bitcoin USD", AssetKind::Crypto),
    ("ETH-USD", "Ethereum USD", AssetKind::Crypto),
];

pub fn run(req: &SearchRequest) -> SearchResults {
    let needle = req.query().to_ascii_uppercase();
    let results: Vec<SearchHit> = TABLE
        .iter()
        .filter(|(sym, name, kind)| {
            (req.kinds().is_empty() || req.kinds().contains(kind))
                && (sym.contains(&needle) || name.to_ascii_uppercase().contains(&needle))
        })
        .take(req.limit())
        .enumerate()
        .map(|(index, (sym, name, kind))| SearchHit {
            symbol: (*sym).to_string(),
            name: (*name).to_string(),
            kind: *kind,
            exchange: Some("NASDAQ".to_string()),
            currency: Some("USD".to_string()),
            country: Some("US".to_string()),
            industry: None,
            market_cap: None,
            relevance_score: relevance(req.query(), sym, name, index),
        })
        .collect();

    let total_count = results.len();
    SearchResults {
        query: req.query().to_string(),
        results,
        total_count,
        processing_time_ms: 0.0,
        last_updated: Utc::now(),
    }
}
