//! Historical series operation.

use tokio::time::Instant;

use mercato_core::{
    Envelope, HistoricalResponse, HistoryRequest, Interval, MercatoError, Period, Symbol,
};

use crate::anomaly;
use crate::core::Mercato;
use crate::factory::FetchOptions;
use crate::quality::{self, QualityInput};

impl Mercato {
    /// Fetch a quality-scored historical series.
    ///
    /// The period/interval combination is validated before any adapter is
    /// consulted, and a series whose ordering or derived boundaries are
    /// inconsistent is rejected rather than repaired.
    pub async fn historical(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
        opts: &FetchOptions,
    ) -> HistoricalResponse {
        let started = Instant::now();
        let normalized = match Symbol::parse(symbol) {
            Ok(s) => s,
            Err(err) => return self.validation_envelope(symbol.trim(), started, &err),
        };
        let req = match HistoryRequest::new(period, interval) {
            Ok(req) => req,
            Err(err) => return self.validation_envelope(normalized.as_str(), started, &err),
        };

        match self.factory.get_historical_data(&normalized, req, opts).await {
            Ok(fetched) => {
                if !fetched.data.is_sorted() || !fetched.data.boundaries_consistent() {
                    let err = MercatoError::data(format!(
                        "historical series for {normalized} is not strictly ordered"
                    ));
                    let mut attempted = fetched.fallback_sources;
                    attempted.push(fetched.provider);
                    let provenance = self.provenance_failure(attempted, started);
                    return Envelope::failed(normalized.as_str(), provenance, err.to_string());
                }

                let data_quality = quality::score(&QualityInput {
                    price_bearing: false,
                    price_present: false,
                    cache_hit: fetched.cached,
                    processing_time: started.elapsed(),
                    accuracy: self.factory.accuracy_of(&fetched.provider),
                });
                let report = anomaly::detect_series(&fetched.data, &self.anomaly_cfg);
                let mut warnings = Vec::new();
                if report.has_anomalies {
                    warnings.push(format!(
                        "series anomalies detected: {}",
                        report
                            .anomaly_types
                            .iter()
                            .map(|k| k.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ));
                }
                let provenance = self.provenance_success(&fetched, started);
                Envelope::ok(
                    normalized.as_str(),
                    fetched.data,
                    data_quality,
                    Some(report),
                    provenance,
                    warnings,
                )
            }
            Err(failure) => self.failure_envelope(normalized.as_str(), started, failure),
        }
    }
}
