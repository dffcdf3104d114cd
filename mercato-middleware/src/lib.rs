//! Shared collaborators injected into every provider adapter: the
//! multi-level TTL cache and the sliding-window rate limiter.
//!
//! Both are constructed once at startup, wrapped in `Arc`, and handed to the
//! adapters and the orchestrator. Their internal state is their own; callers
//! never perform read-modify-write against them.

pub mod cache;
pub mod rate_limit;

pub use cache::{CachedValue, MarketCache, WarmEntry, WarmStats};
pub use rate_limit::RateLimiter;
