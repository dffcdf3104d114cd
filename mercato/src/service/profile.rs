//! Profile operation.

use tokio::time::Instant;

use mercato_core::{Envelope, ProfileResponse, Symbol};

use crate::core::Mercato;
use crate::factory::FetchOptions;
use crate::quality::{self, QualityInput};

impl Mercato {
    /// Fetch a quality-scored company profile.
    pub async fn profile(&self, symbol: &str, opts: &FetchOptions) -> ProfileResponse {
        let started = Instant::now();
        let normalized = match Symbol::parse(symbol) {
            Ok(s) => s,
            Err(err) => return self.validation_envelope(symbol.trim(), started, &err),
        };

        match self.factory.get_stock_profile(&normalized, opts).await {
            Ok(fetched) => {
                let data_quality = quality::score(&QualityInput {
                    price_bearing: false,
                    price_present: false,
                    cache_hit: fetched.cached,
                    processing_time: started.elapsed(),
                    accuracy: self.factory.accuracy_of(&fetched.provider),
                });
                let provenance = self.provenance_success(&fetched, started);
                Envelope::ok(
                    normalized.as_str(),
                    fetched.data,
                    data_quality,
                    None,
                    provenance,
                    Vec::new(),
                )
            }
            Err(failure) => self.failure_envelope(normalized.as_str(), started, failure),
        }
    }
}
