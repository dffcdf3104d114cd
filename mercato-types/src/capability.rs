use core::fmt;
use serde::{Deserialize, Serialize};

/// High-level capability labels for routing, errors, and telemetry.
///
/// These map one-to-one with the orchestrator's public operations and allow
/// consistent Display formatting and match-exhaustive handling when adding
/// new capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Capability {
    /// Point-in-time quote for a single symbol.
    Quote,
    /// Company or fund profile.
    Profile,
    /// Historical OHLCV bars.
    History,
    /// Free-text symbol search.
    Search,
    /// Aggregated market overview (indices, crypto, commodities, forex).
    MarketOverview,
    /// Provider liveness probe.
    HealthCheck,
}

impl Capability {
    /// Stable, kebab-case identifier for logs/errors and rate-limit keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Profile => "profile",
            Self::History => "history",
            Self::Search => "search",
            Self::MarketOverview => "market-overview",
            Self::HealthCheck => "health-check",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
