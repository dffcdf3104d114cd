//! Anomaly detection over normalized payloads. Pure computation, no
//! suspension points; a disabled detector returns an empty report.

use rust_decimal::prelude::ToPrimitive;
use serde_json::json;

use mercato_core::{Bar, HistoricalSeries, Quote};
use mercato_types::{AnomalyConfig, AnomalyKind, AnomalyReport};

/// Trailing bars considered for the volume baseline.
const VOLUME_LOOKBACK: usize = 30;

struct Findings {
    kinds: Vec<AnomalyKind>,
    confidences: Vec<f64>,
    details: serde_json::Map<String, serde_json::Value>,
}

impl Findings {
    fn new() -> Self {
        Self {
            kinds: Vec::new(),
            confidences: Vec::new(),
            details: serde_json::Map::new(),
        }
    }

    fn push(&mut self, kind: AnomalyKind, confidence: f64, detail: serde_json::Value) {
        self.kinds.push(kind);
        self.confidences.push(confidence);
        self.details.insert(kind.as_str().to_string(), detail);
    }

    fn into_report(self) -> AnomalyReport {
        let confidence_score = if self.confidences.is_empty() {
            0.0
        } else {
            self.confidences.iter().sum::<f64>() / self.confidences.len() as f64
        };
        AnomalyReport {
            has_anomalies: !self.kinds.is_empty(),
            anomaly_types: self.kinds,
            confidence_score,
            details: self.details,
        }
    }
}

fn mean_volume(bars: &[Bar]) -> Option<f64> {
    let tail: Vec<u64> = bars
        .iter()
        .rev()
        .take(VOLUME_LOOKBACK)
        .filter_map(|b| b.volume)
        .collect();
    if tail.is_empty() {
        return None;
    }
    Some(tail.iter().sum::<u64>() as f64 / tail.len() as f64)
}

/// Inspect a quote, optionally against recent history for the volume
/// baseline.
pub(crate) fn detect_quote(
    quote: &Quote,
    history: Option<&[Bar]>,
    cfg: &AnomalyConfig,
) -> AnomalyReport {
    if !cfg.enabled {
        return AnomalyReport::none();
    }
    let mut findings = Findings::new();

    if let Some(change_percent) = quote.change_percent.and_then(|d| d.to_f64()) {
        let magnitude = change_percent.abs();
        if magnitude > cfg.price_change_threshold_pct {
            let confidence = (magnitude / cfg.price_change_threshold_pct * 50.0).min(100.0);
            findings.push(
                AnomalyKind::ExtremePriceChange,
                confidence,
                json!({
                    "change_percent": change_percent,
                    "threshold": cfg.price_change_threshold_pct,
                }),
            );
        }
    }

    if let (Some(volume), Some(bars)) = (quote.volume, history)
        && let Some(avg) = mean_volume(bars)
        && avg > 0.0
    {
        let current = volume as f64;
        if current > avg * cfg.volume_spike_multiplier {
            let ratio = current / avg;
            let confidence = (ratio / cfg.volume_spike_multiplier * 50.0).min(100.0);
            findings.push(
                AnomalyKind::VolumeSpike,
                confidence,
                json!({
                    "current_volume": volume,
                    "average_volume": avg,
                    "spike_ratio": ratio,
                }),
            );
        }
    }

    if let (Some(price), Some(open), Some(high), Some(low)) =
        (quote.price, quote.open, quote.high, quote.low)
    {
        let within = low <= price && price <= high && low <= open && open <= high;
        if !within {
            findings.push(
                AnomalyKind::PriceInconsistency,
                90.0,
                json!({
                    "price": price.to_f64(),
                    "open": open.to_f64(),
                    "high": high.to_f64(),
                    "low": low.to_f64(),
                }),
            );
        }
    }

    findings.into_report()
}

/// Inspect a historical series: repeated dates are flagged, not repaired,
/// and the most recent bar's volume is checked against the trailing mean.
pub(crate) fn detect_series(series: &HistoricalSeries, cfg: &AnomalyConfig) -> AnomalyReport {
    if !cfg.enabled {
        return AnomalyReport::none();
    }
    let mut findings = Findings::new();

    let duplicates = series.duplicate_dates();
    if duplicates > 0 {
        findings.push(
            AnomalyKind::DuplicateBars,
            75.0,
            json!({
                "duplicate_count": duplicates,
                "bar_count": series.count,
            }),
        );
    }

    if let Some((last, rest)) = series.bars.split_last()
        && let Some(volume) = last.volume
        && let Some(avg) = mean_volume(rest)
        && avg > 0.0
    {
        let current = volume as f64;
        if current > avg * cfg.volume_spike_multiplier {
            let ratio = current / avg;
            let confidence = (ratio / cfg.volume_spike_multiplier * 50.0).min(100.0);
            findings.push(
                AnomalyKind::VolumeSpike,
                confidence,
                json!({
                    "current_volume": volume,
                    "average_volume": avg,
                    "spike_ratio": ratio,
                }),
            );
        }
    }

    findings.into_report()
}
