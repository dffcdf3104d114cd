//! Per-provider runtime statistics and the circuit breaker.
//!
//! One `ProviderStats` lives behind a mutex per registered provider; the
//! factory is its only writer. Readers take the same lock, so status,
//! breaker state, and counters are always observed as one consistent
//! snapshot.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use mercato_types::{ProviderConfig, ProviderStatsSnapshot, ProviderStatus};

/// Smoothing factor of the response-time exponential moving average.
const EMA_ALPHA: f64 = 0.1;

/// Window used for the load-balanced policy's requests-per-minute weight.
const RPM_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub(crate) struct ProviderStats {
    pub(crate) status: ProviderStatus,
    pub(crate) initialized: bool,
    pub(crate) last_health_check: Option<Instant>,
    pub(crate) consecutive_failures: u32,
    pub(crate) circuit_opened_at: Option<Instant>,
    pub(crate) total_requests: u64,
    pub(crate) successful_requests: u64,
    pub(crate) failed_requests: u64,
    /// EMA of response time, in seconds. Zero until the first success.
    pub(crate) avg_response_time: f64,
    pub(crate) last_used: Option<Instant>,
    recent_requests: VecDeque<Instant>,
}

impl ProviderStats {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            status: if enabled {
                ProviderStatus::Unknown
            } else {
                ProviderStatus::Disabled
            },
            initialized: false,
            last_health_check: None,
            consecutive_failures: 0,
            circuit_opened_at: None,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            avg_response_time: 0.0,
            last_used: None,
            recent_requests: VecDeque::new(),
        }
    }

    /// Breaker state as a function of (opened_at, now, timeout). Reading an
    /// expired breaker closes it and zeroes the failure streak: the next
    /// request is the half-open probe.
    pub(crate) fn breaker_is_open(&mut self, timeout: Duration, now: Instant) -> bool {
        match self.circuit_opened_at {
            Some(opened_at) if now.duration_since(opened_at) < timeout => true,
            Some(_) => {
                self.circuit_opened_at = None;
                self.consecutive_failures = 0;
                false
            }
            None => false,
        }
    }

    pub(crate) fn record_request(&mut self, now: Instant) {
        self.total_requests += 1;
        self.recent_requests.push_back(now);
        while self
            .recent_requests
            .front()
            .is_some_and(|t| now.duration_since(*t) >= RPM_WINDOW)
        {
            self.recent_requests.pop_front();
        }
    }

    pub(crate) fn record_success(&mut self, elapsed: Duration, now: Instant) {
        self.successful_requests += 1;
        self.consecutive_failures = 0;
        self.last_used = Some(now);
        let sample = elapsed.as_secs_f64();
        self.avg_response_time = if self.successful_requests == 1 {
            sample
        } else {
            self.avg_response_time * (1.0 - EMA_ALPHA) + sample * EMA_ALPHA
        };
    }

    /// Count a failure; returns true when this failure opens the breaker.
    pub(crate) fn record_failure(&mut self, threshold: u32, now: Instant) -> bool {
        self.failed_requests += 1;
        self.consecutive_failures += 1;
        if self.consecutive_failures >= threshold && self.circuit_opened_at.is_none() {
            self.circuit_opened_at = Some(now);
            true
        } else {
            false
        }
    }

    /// Requests observed in the last minute, for the load-balanced weight.
    pub(crate) fn requests_per_minute(&mut self, now: Instant) -> usize {
        while self
            .recent_requests
            .front()
            .is_some_and(|t| now.duration_since(*t) >= RPM_WINDOW)
        {
            self.recent_requests.pop_front();
        }
        self.recent_requests.len()
    }

    /// Success ratio in `[0, 1]`; optimistic before any request was made.
    pub(crate) fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }

    pub(crate) fn snapshot(&mut self, config: &ProviderConfig, now: Instant) -> ProviderStatsSnapshot {
        let circuit_open = self.breaker_is_open(config.circuit_breaker_timeout, now);
        let circuit_open_remaining_secs = self.circuit_opened_at.map(|opened_at| {
            config
                .circuit_breaker_timeout
                .saturating_sub(now.duration_since(opened_at))
                .as_secs()
        });
        ProviderStatsSnapshot {
            status: self.status,
            last_health_check_age_secs: self
                .last_health_check
                .map(|t| now.duration_since(t).as_secs()),
            consecutive_failures: self.consecutive_failures,
            circuit_open,
            circuit_open_remaining_secs,
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
            average_response_time_ms: self.avg_response_time * 1_000.0,
            last_used_age_secs: self.last_used.map(|t| now.duration_since(t).as_secs()),
        }
    }
}
