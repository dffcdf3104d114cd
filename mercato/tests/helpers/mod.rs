#![allow(dead_code)]

pub mod mock_connector;

use chrono::Utc;
use rust_decimal::Decimal;

use mercato_core::{Quote, Symbol};
use mercato_types::{FactoryConfig, ProviderConfig, ProviderTier};

pub const AAPL: &str = "AAPL";

pub fn dec(s: &str) -> Decimal {
    s.parse().expect("decimal literal")
}

/// A quote with sane session values and no anomalies.
pub fn quote(symbol: &str, price: &str) -> Quote {
    let price = dec(price);
    Quote {
        symbol: Symbol::parse(symbol).expect("test symbol"),
        name: Some(format!("{symbol} Test Co")),
        price: Some(price),
        change: Some(dec("2.5")),
        change_percent: Some(dec("1.69")),
        previous_close: Some(dec("147.75")),
        open: Some(dec("148.0")),
        high: Some(price + Decimal::ONE),
        low: Some(price - Decimal::TWO),
        volume: Some(50_000_000),
        market_cap: None,
        pe_ratio: None,
        bid: None,
        ask: None,
        currency: "USD".to_string(),
        exchange: Some("NASDAQ".to_string()),
        timezone: "America/New_York".to_string(),
        last_updated: Utc::now(),
    }
}

/// The reference happy-path quote: price 150.25 with consistent OHLC.
pub fn reference_quote(symbol: &str) -> Quote {
    let mut q = quote(symbol, "150.25");
    q.high = Some(dec("151.0"));
    q.low = Some(dec("147.5"));
    q
}

/// Factory config tuned for tests: no backoff sleeps, small retry budget.
pub fn fast_factory_config() -> FactoryConfig {
    FactoryConfig {
        backoff_base: 0.0,
        ..FactoryConfig::default()
    }
}

/// Provider config with a short breaker and test-friendly defaults.
pub fn provider_config(name: &str, tier: ProviderTier, priority: u32) -> ProviderConfig {
    let mut config = ProviderConfig::new(name, tier);
    config.priority = priority;
    config
}
