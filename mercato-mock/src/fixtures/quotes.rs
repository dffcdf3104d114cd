use chrono::Utc;
use rust_decimal::Decimal;

use mercato_core::{Quote, Symbol};

pub fn by_symbol(s: &str) -> Option<Quote> {
    match s {
        "AAPL" => Some(q("AAPL", "Apple Inc.", "190.00", "188.00", Some("NASDAQ"))),
        "MSFT" => Some(q("MSFT", "Microsoft Corp", "420.00", "418.00", Some("NASDAQ"))),
        "GOOGL" => Some(q(
            "GOOGL",
            "Alphabet Inc. Class A",
            "150.00",
            "148.00",
            Some("NASDAQ"),
        )),
        "SPY" => Some(q("SPY", "SPDR S&P 500 ETF", "520.00", "518.00", Some("NYSEArca"))),
        "BTC-USD" | "BTC" => Some(q("BTC-USD", "Bitcoin USD", "65000.00", "64000.00", None)),
        "ETH-USD" | "ETH" => Some(q("ETH-USD", "Ethereum USD", "3200.00", "3150.00", None)),
        _ => None,
    }
}

fn d(s: &str) -> Decimal {
    s.parse().expect("fixture decimal")
}

fn q(sym: &str, name: &str, px: &str, prev: &str, exchange: Option<&str>) -> Quote {
    let price = d(px);
    let previous_close = d(prev);
    let change = price - previous_close;
    Quote {
        symbol: Symbol::parse(sym).expect("fixture symbol"),
        name: Some(name.to_string()),
        price: Some(price),
        change: Some(change),
        change_percent: Some(change / previous_close * Decimal::ONE_HUNDRED),
        previous_close: Some(previous_close),
        open: Some(previous_close),
        high: Some(price + Decimal::ONE),
        low: Some(previous_close - Decimal::ONE),
        volume: Some(50_000_000),
        market_cap: None,
        pe_ratio: None,
        bid: None,
        ask: None,
        currency: "USD".to_string(),
        exchange: exchange.map(str::to_string),
        timezone: "America/New_York".to_string(),
        last_updated: Utc::now(),
    }
}
