//! Quote operation: validate, fetch with failover, score, inspect, wrap.

use tokio::time::Instant;
use tracing::debug;

use mercato_core::{AssetKind, Envelope, QuoteResponse, Symbol};
use mercato_middleware::WarmStats;

use crate::anomaly;
use crate::core::Mercato;
use crate::factory::FetchOptions;
use crate::quality::{self, QualityInput};

/// Options for quote operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuoteOptions {
    /// Route through the tighter real-time cache level instead of the
    /// standard quote level. The cache is still consulted.
    pub realtime: bool,
    /// Per-call timeout and retry overrides.
    pub fetch: FetchOptions,
}

impl Mercato {
    /// Fetch a quality-scored quote.
    ///
    /// The raw symbol is normalized here, exactly once; a malformed symbol
    /// never reaches an adapter.
    pub async fn quote(&self, symbol: &str, kind: AssetKind, opts: &QuoteOptions) -> QuoteResponse {
        let started = Instant::now();
        let normalized = match Symbol::parse(symbol) {
            Ok(s) => s,
            Err(err) => return self.validation_envelope(symbol.trim(), started, &err),
        };

        let result = match kind {
            AssetKind::Crypto => {
                self.factory
                    .get_crypto_quote(&normalized, opts.realtime, &opts.fetch)
                    .await
            }
            _ => {
                self.factory
                    .get_stock_quote(&normalized, opts.realtime, &opts.fetch)
                    .await
            }
        };

        match result {
            Ok(fetched) => {
                let data_quality = quality::score(&QualityInput {
                    price_bearing: true,
                    price_present: fetched.data.price.is_some(),
                    cache_hit: fetched.cached,
                    processing_time: started.elapsed(),
                    accuracy: self.factory.accuracy_of(&fetched.provider),
                });
                let report = anomaly::detect_quote(&fetched.data, None, &self.anomaly_cfg);
                let provenance = self.provenance_success(&fetched, started);
                Envelope::ok(
                    normalized.as_str(),
                    fetched.data,
                    data_quality,
                    Some(report),
                    provenance,
                    Vec::new(),
                )
            }
            Err(failure) => {
                debug!(
                    target = "mercato::service",
                    event = "quote_failed",
                    symbol = %normalized,
                    error = %failure.error,
                    "quote request failed"
                );
                self.failure_envelope(normalized.as_str(), started, failure)
            }
        }
    }

    /// Pre-populate the quote cache for a list of symbols. Symbols that are
    /// already cached are skipped and never overwritten; fetch failures are
    /// simply not counted.
    pub async fn warm_quotes(&self, symbols: &[&str]) -> WarmStats {
        let mut stats = WarmStats::default();
        for raw in symbols {
            let Ok(symbol) = Symbol::parse(raw) else {
                continue;
            };
            match self
                .factory
                .get_stock_quote(&symbol, false, &FetchOptions::default())
                .await
            {
                Ok(fetched) if fetched.cached => stats.skipped += 1,
                Ok(_) => stats.seeded += 1,
                Err(_) => {}
            }
        }
        debug!(
            target = "mercato::service",
            event = "warmed",
            seeded = stats.seeded,
            skipped = stats.skipped,
            "quote cache warming completed"
        );
        stats
    }
}
