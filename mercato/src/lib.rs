//! mercato
//!
//! High-level, pluggable market data orchestration for Rust with
//! multi-provider failover, per-provider rate budgets, multi-level caching,
//! data quality scoring, anomaly detection, and provenance on every
//! response.
//!
//! Construct a [`Mercato`] with the builder, registering one connector per
//! upstream feed, then call the public operations:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mercato::{Mercato, QuoteOptions};
//! use mercato_core::AssetKind;
//! use mercato_types::{ProviderConfig, ProviderTier};
//!
//! let mercato = Mercato::builder()
//!     .with_connector(
//!         ProviderConfig::new("mock", ProviderTier::Free),
//!         Arc::new(mercato_mock::MockConnector::new()),
//!     )
//!     .build()?;
//! mercato.initialize().await?;
//!
//! let response = mercato
//!     .quote("AAPL", AssetKind::Equity, &QuoteOptions::default())
//!     .await;
//! assert!(response.success);
//! ```
#![warn(missing_docs)]

mod anomaly;
mod core;
mod quality;

pub mod env;
pub mod factory;
pub mod service;

pub use core::{Mercato, MercatoBuilder};
pub use env::MercatoConfig;
pub use factory::{FailoverFailure, FetchOptions, Fetched, HealthMonitorHandle, ProviderFactory};
pub use service::QuoteOptions;
