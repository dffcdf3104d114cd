//! Core types, connector traits, and response envelopes for the mercato
//! market data ecosystem.
//!
//! Provider adapter crates implement the traits in [`connector`]; the
//! orchestrator crate consumes them through the factory. Canonical entities
//! live in [`types`], and every public operation returns the uniform
//! [`Envelope`].

pub mod connector;
pub mod error;
pub mod response;
pub mod types;

pub use connector::{
    HistoryProvider, MercatoConnector, OverviewProvider, ProfileProvider, QuoteProvider,
    SearchProvider,
};
pub use error::{MercatoError, tag_err};
pub use response::{
    Envelope, HistoricalResponse, MarketOverviewResponse, ProfileResponse, ProviderResponse,
    QuoteResponse, SearchResponse,
};
pub use types::{
    AssetKind, Bar, CompanyProfile, HistoricalSeries, HistoryRequest, Interval, MarketOverview,
    Period, Quote, SearchHit, SearchRequest, SearchResults, Symbol, relevance,
};
