use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use mercato_core::{Bar, HistoricalSeries, HistoryRequest, Symbol};

pub fn by_symbol(s: &str, req: HistoryRequest) -> Option<HistoricalSeries> {
    let closes: &[(&str, i64)] = match s {
        "AAPL" => &[("188.00", 1), ("189.00", 2), ("190.00", 3)],
        "MSFT" => &[("418.00", 1), ("419.00", 2), ("420.00", 3)],
        _ => return None,
    };

    let base = 1_704_067_200i64; // 2024-01-01T00:00:00Z
    let bars = closes
        .iter()
        .map(|(close, day)| {
            let close: Decimal = close.parse().expect("fixture decimal");
            Bar {
                date: DateTime::from_timestamp(base + day * 86_400, 0).expect("fixture date"),
                open: close - Decimal::ONE,
                high: close + Decimal::ONE,
                low: close - Decimal::TWO,
                close,
                volume: Some(1_000_000),
            }
        })
        .collect();

    Some(HistoricalSeries::from_bars(
        Symbol::parse(s).expect("fixture symbol"),
        req.period(),
        req.interval(),
        "USD",
        "America/New_York",
        bars,
        Utc::now(),
    ))
}
