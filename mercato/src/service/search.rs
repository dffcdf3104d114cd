//! Symbol search operation.

use tokio::time::Instant;

use mercato_core::{AssetKind, Envelope, SearchRequest, SearchResponse};

use crate::core::Mercato;
use crate::factory::FetchOptions;
use crate::quality::{self, QualityInput};

impl Mercato {
    /// Search securities across providers. The envelope's `symbol` field
    /// carries the query.
    pub async fn search(
        &self,
        query: &str,
        kinds: Vec<AssetKind>,
        limit: usize,
        opts: &FetchOptions,
    ) -> SearchResponse {
        let started = Instant::now();
        let req = match SearchRequest::new(query, kinds, limit) {
            Ok(req) => req,
            Err(err) => return self.validation_envelope(query.trim(), started, &err),
        };

        match self.factory.search_securities(&req, opts).await {
            Ok(mut fetched) => {
                // The wall clock is authoritative for the result set's
                // processing time, not whatever the adapter left behind.
                fetched.data.processing_time_ms = started.elapsed().as_secs_f64() * 1_000.0;
                let data_quality = quality::score(&QualityInput {
                    price_bearing: false,
                    price_present: false,
                    cache_hit: fetched.cached,
                    processing_time: started.elapsed(),
                    accuracy: self.factory.accuracy_of(&fetched.provider),
                });
                let mut warnings = Vec::new();
                if fetched.data.results.is_empty() {
                    warnings.push(format!("no results for '{}'", req.query()));
                }
                let provenance = self.provenance_success(&fetched, started);
                Envelope::ok(
                    req.query(),
                    fetched.data,
                    data_quality,
                    None,
                    provenance,
                    warnings,
                )
            }
            Err(failure) => self.failure_envelope(req.query(), started, failure),
        }
    }
}
