use std::time::Duration;

use thiserror::Error;

/// Unified error type for the mercato workspace.
///
/// Adapters convert transport failures into these variants, the factory
/// pattern-matches on them to decide retry vs failover vs give-up, and the
/// orchestrator folds the final failure into a response envelope. Nothing
/// below the orchestrator surfaces a panic to its caller.
#[derive(Debug, Error, Clone)]
pub enum MercatoError {
    /// Invalid input argument; rejected before any adapter is consulted.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Our own rate limiter denied the call. Not a provider health failure.
    #[error("rate limited: {provider} ({endpoint}), retry after {retry_after:?}")]
    RateLimited {
        /// Provider whose budget was exhausted.
        provider: String,
        /// Endpoint class the denial applies to.
        endpoint: String,
        /// Minimum suggested wait before retrying.
        retry_after: Duration,
    },

    /// Upstream rejected our credentials. Fatal for that provider on that call.
    #[error("authentication failed for {provider}")]
    Auth {
        /// Provider that rejected the credentials.
        provider: String,
    },

    /// Transient upstream failure: connectivity, 5xx, malformed body.
    #[error("{provider} failed: {msg}")]
    Upstream {
        /// Provider that failed.
        provider: String,
        /// Human-readable error message.
        msg: String,
    },

    /// An individual provider call exceeded the configured timeout.
    #[error("provider timed out: {operation} via {provider}")]
    Timeout {
        /// Provider that timed out.
        provider: String,
        /// Capability label (e.g. "quote", "history").
        operation: &'static str,
    },

    /// A symbol or resource is unknown to the provider. A miss, not a failure.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing resource, e.g. "quote for AAPL".
        what: String,
    },

    /// Issues with the returned or expected data (shape, ordering, ranges).
    #[error("data issue: {0}")]
    Data(String),

    /// The requested capability is not implemented by the target connector.
    #[error("unsupported capability: {capability}")]
    Unsupported {
        /// Capability label describing what was requested.
        capability: &'static str,
    },

    /// No provider passed the availability predicate.
    #[error("no available providers")]
    NoAvailableProviders,

    /// All selected providers were exhausted; contains the individual failures.
    #[error("all providers failed: {0:?}")]
    AllProvidersFailed(Vec<MercatoError>),
}

impl MercatoError {
    /// Helper: build an `InvalidArg` error.
    pub fn invalid_arg(msg: impl Into<String>) -> Self {
        Self::InvalidArg(msg.into())
    }

    /// Helper: build a `RateLimited` error.
    pub fn rate_limited(
        provider: impl Into<String>,
        endpoint: impl Into<String>,
        retry_after: Duration,
    ) -> Self {
        Self::RateLimited {
            provider: provider.into(),
            endpoint: endpoint.into(),
            retry_after,
        }
    }

    /// Helper: build an `Auth` error.
    pub fn auth(provider: impl Into<String>) -> Self {
        Self::Auth {
            provider: provider.into(),
        }
    }

    /// Helper: build an `Upstream` error with the provider name and message.
    pub fn upstream(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Upstream {
            provider: provider.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `Timeout` error.
    pub fn timeout(provider: impl Into<String>, operation: &'static str) -> Self {
        Self::Timeout {
            provider: provider.into(),
            operation,
        }
    }

    /// Helper: build a `NotFound` error for a description of the missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Helper: build a `Data` error.
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    /// Helper: build an `Unsupported` error for a capability string.
    #[must_use]
    pub const fn unsupported(capability: &'static str) -> Self {
        Self::Unsupported { capability }
    }

    /// Whether this error counts toward a provider's consecutive-failure
    /// streak (and therefore its circuit breaker).
    ///
    /// Rate-limit denials and not-found misses are deliberate exclusions: the
    /// first is our own throttling, the second a data gap.
    #[must_use]
    pub const fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            Self::Upstream { .. } | Self::Timeout { .. } | Self::Data(_) | Self::Auth { .. }
        )
    }

    /// Whether the same provider may be retried for this error.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Timeout { .. } | Self::Data(_))
    }
}

/// Tag an otherwise-anonymous error with the provider it came from.
///
/// Errors that already carry provider identity or aggregate semantics pass
/// through unchanged.
#[must_use]
pub fn tag_err(provider: &str, e: MercatoError) -> MercatoError {
    match e {
        e @ (MercatoError::RateLimited { .. }
        | MercatoError::Auth { .. }
        | MercatoError::Upstream { .. }
        | MercatoError::Timeout { .. }
        | MercatoError::NotFound { .. }
        | MercatoError::NoAvailableProviders
        | MercatoError::AllProvidersFailed(_)) => e,
        other => MercatoError::Upstream {
            provider: provider.to_string(),
            msg: other.to_string(),
        },
    }
}

impl From<mercato_types::ConfigError> for MercatoError {
    fn from(e: mercato_types::ConfigError) -> Self {
        Self::InvalidArg(e.to_string())
    }
}
