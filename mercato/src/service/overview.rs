//! Market overview operation.

use tokio::time::Instant;

use mercato_core::{Envelope, MarketOverviewResponse};

use crate::core::Mercato;
use crate::factory::FetchOptions;
use crate::quality::{self, QualityInput};

/// Subject recorded in overview envelopes, which have no single symbol.
const OVERVIEW_SUBJECT: &str = "MARKET_OVERVIEW";

impl Mercato {
    /// Fetch an aggregated market overview.
    ///
    /// Partial success is success: categories an adapter could not populate
    /// come back empty and are reported as warnings.
    pub async fn market_overview(&self, opts: &FetchOptions) -> MarketOverviewResponse {
        let started = Instant::now();

        match self.factory.get_market_overview(opts).await {
            Ok(fetched) => {
                let data_quality = quality::score(&QualityInput {
                    price_bearing: false,
                    price_present: false,
                    cache_hit: fetched.cached,
                    processing_time: started.elapsed(),
                    accuracy: self.factory.accuracy_of(&fetched.provider),
                });
                let warnings: Vec<String> = fetched
                    .data
                    .empty_categories()
                    .iter()
                    .map(|category| format!("category '{category}' is empty"))
                    .collect();
                let provenance = self.provenance_success(&fetched, started);
                Envelope::ok(
                    OVERVIEW_SUBJECT,
                    fetched.data,
                    data_quality,
                    None,
                    provenance,
                    warnings,
                )
            }
            Err(failure) => self.failure_envelope(OVERVIEW_SUBJECT, started, failure),
        }
    }
}
