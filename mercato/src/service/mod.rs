//! Public orchestrator operations, one module per capability, plus the
//! shared envelope/provenance assembly helpers.

mod health;
mod history;
mod overview;
mod profile;
mod quote;
mod search;

pub use quote::QuoteOptions;

use tokio::time::Instant;

use mercato_core::{Envelope, MercatoError};
use mercato_types::Provenance;

use crate::core::Mercato;
use crate::factory::{FailoverFailure, Fetched};

/// Source recorded in provenance when no provider produced data.
pub(crate) const FALLBACK_SOURCE: &str = "fallback";

impl Mercato {
    pub(crate) fn provenance_success<T>(&self, fetched: &Fetched<T>, started: Instant) -> Provenance {
        Provenance {
            primary_source: fetched.provider.clone(),
            fallback_sources: fetched.fallback_sources.clone(),
            processing_time_ms: started.elapsed().as_secs_f64() * 1_000.0,
            cache_hit: fetched.cached,
            cache_age_seconds: fetched.cache_age.map(|age| age.as_secs()),
            provider_health: self.factory.provider_health(),
        }
    }

    pub(crate) fn provenance_failure(
        &self,
        attempted: Vec<String>,
        started: Instant,
    ) -> Provenance {
        Provenance {
            primary_source: FALLBACK_SOURCE.to_string(),
            fallback_sources: attempted,
            processing_time_ms: started.elapsed().as_secs_f64() * 1_000.0,
            cache_hit: false,
            cache_age_seconds: None,
            provider_health: self.factory.provider_health(),
        }
    }

    /// Envelope for a request that failed after reaching the factory.
    pub(crate) fn failure_envelope<T>(
        &self,
        subject: impl Into<String>,
        started: Instant,
        failure: FailoverFailure,
    ) -> Envelope<T> {
        let provenance = self.provenance_failure(failure.attempted, started);
        Envelope::failed(subject, provenance, failure.error.to_string())
    }

    /// Envelope for a request rejected before any adapter was consulted.
    pub(crate) fn validation_envelope<T>(
        &self,
        subject: impl Into<String>,
        started: Instant,
        error: &MercatoError,
    ) -> Envelope<T> {
        let provenance = self.provenance_failure(Vec::new(), started);
        Envelope::failed(subject, provenance, error.to_string())
    }
}
