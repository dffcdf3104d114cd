//! Sliding-window request admission, keyed by (provider, endpoint class).
//!
//! Four windows are enforced per key: minute, hour, day, and a short burst
//! window that smooths micro-spikes. A single mutex guards the whole window
//! map, so the evict+count+append sequence for one `is_allowed` call is
//! atomic: concurrent callers can never observe a half-applied update that
//! admits more than the configured limit.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use tokio::time::Instant;
use tracing::{debug, warn};

use mercato_types::{RateBudgets, RateDecision, RateLimitStatus, RateWindow};

/// Timestamps observed per window for one (provider, endpoint) key.
#[derive(Default)]
struct WindowSet {
    minute: VecDeque<Instant>,
    hour: VecDeque<Instant>,
    day: VecDeque<Instant>,
    burst: VecDeque<Instant>,
}

impl WindowSet {
    fn deque_mut(&mut self, window: RateWindow) -> &mut VecDeque<Instant> {
        match window {
            RateWindow::Minute => &mut self.minute,
            RateWindow::Hour => &mut self.hour,
            RateWindow::Day => &mut self.day,
            RateWindow::Burst => &mut self.burst,
        }
    }
}

const fn budget_for(budgets: &RateBudgets, window: RateWindow) -> u32 {
    match window {
        RateWindow::Minute => budgets.per_minute,
        RateWindow::Hour => budgets.per_hour,
        RateWindow::Day => budgets.per_day,
        RateWindow::Burst => budgets.burst,
    }
}

/// Authoritative per-(provider, endpoint-class) request admission.
pub struct RateLimiter {
    budgets: HashMap<String, RateBudgets>,
    windows: Mutex<HashMap<(String, String), WindowSet>>,
}

impl RateLimiter {
    /// Limiter with no registered budgets; every provider is admitted until
    /// budgets are registered via [`RateLimiter::with_budgets`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            budgets: HashMap::new(),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Limiter preloaded with the shipped budgets for the reference feeds.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new()
            .with_budgets("fmp", RateBudgets::premium_default())
            .with_budgets("yahoo", RateBudgets::free_default())
    }

    /// Register (or override) a provider's budgets.
    #[must_use]
    pub fn with_budgets(mut self, provider: impl Into<String>, budgets: RateBudgets) -> Self {
        self.budgets.insert(provider.into(), budgets);
        self
    }

    /// Check whether a request may proceed, and record it if so.
    ///
    /// On denial nothing is recorded; the decision names the exceeded window
    /// and the minimum wait. Unknown providers are admitted with empty
    /// diagnostics.
    pub fn is_allowed(&self, provider: &str, endpoint: &str) -> RateDecision {
        let Some(budgets) = self.budgets.get(provider) else {
            warn!(
                target = "mercato::middleware::rate_limit",
                event = "unknown_provider",
                provider = provider,
                "no budgets registered; admitting"
            );
            return RateDecision {
                allowed: true,
                provider: provider.to_string(),
                endpoint: endpoint.to_string(),
                usage: BTreeMap::new(),
                exceeded_window: None,
                retry_after: None,
            };
        };

        let now = Instant::now();
        let mut usage = BTreeMap::new();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let set = windows
            .entry((provider.to_string(), endpoint.to_string()))
            .or_default();

        for window in RateWindow::CHECK_ORDER {
            let span = window.span();
            let deque = set.deque_mut(window);
            while deque.front().is_some_and(|t| now.duration_since(*t) >= span) {
                deque.pop_front();
            }
            let count = u32::try_from(deque.len()).unwrap_or(u32::MAX);
            usage.insert(window, count);
            let limit = budget_for(budgets, window);
            if count >= limit {
                warn!(
                    target = "mercato::middleware::rate_limit",
                    event = "denied",
                    provider = provider,
                    endpoint = endpoint,
                    window = %window,
                    current = count,
                    limit = limit,
                    "rate limit exceeded"
                );
                return RateDecision {
                    allowed: false,
                    provider: provider.to_string(),
                    endpoint: endpoint.to_string(),
                    usage,
                    exceeded_window: Some(window),
                    retry_after: Some(span),
                };
            }
        }

        for window in RateWindow::CHECK_ORDER {
            set.deque_mut(window).push_back(now);
        }
        debug!(
            target = "mercato::middleware::rate_limit",
            event = "admitted",
            provider = provider,
            endpoint = endpoint,
            "rate limit check passed"
        );
        RateDecision {
            allowed: true,
            provider: provider.to_string(),
            endpoint: endpoint.to_string(),
            usage,
            exceeded_window: None,
            retry_after: None,
        }
    }

    /// Current utilization for a provider, aggregated across endpoints.
    #[must_use]
    pub fn status(&self, provider: &str) -> Option<RateLimitStatus> {
        let budgets = self.budgets.get(provider)?;
        let now = Instant::now();
        let mut usage: BTreeMap<RateWindow, u32> = BTreeMap::new();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        for ((p, _endpoint), set) in windows.iter_mut() {
            if p != provider {
                continue;
            }
            for window in RateWindow::CHECK_ORDER {
                let span = window.span();
                let deque = set.deque_mut(window);
                while deque.front().is_some_and(|t| now.duration_since(*t) >= span) {
                    deque.pop_front();
                }
                *usage.entry(window).or_insert(0) +=
                    u32::try_from(deque.len()).unwrap_or(u32::MAX);
            }
        }
        for window in RateWindow::CHECK_ORDER {
            usage.entry(window).or_insert(0);
        }

        let mut limits = BTreeMap::new();
        let mut utilization = BTreeMap::new();
        for window in RateWindow::CHECK_ORDER {
            let limit = budget_for(budgets, window);
            limits.insert(window, limit);
            let used = f64::from(*usage.get(&window).unwrap_or(&0));
            let pct = if limit == 0 {
                0.0
            } else {
                used / f64::from(limit) * 100.0
            };
            utilization.insert(window, pct);
        }
        Some(RateLimitStatus {
            usage,
            limits,
            utilization_percent: utilization,
        })
    }

    /// Utilization for every registered provider.
    #[must_use]
    pub fn status_all(&self) -> BTreeMap<String, RateLimitStatus> {
        self.budgets
            .keys()
            .filter_map(|p| self.status(p).map(|s| (p.clone(), s)))
            .collect()
    }

    /// Drop all recorded usage for a provider. Returns false for providers
    /// with no registered budgets.
    pub fn reset(&self, provider: &str) -> bool {
        if !self.budgets.contains_key(provider) {
            return false;
        }
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows.retain(|(p, _), _| p != provider);
        debug!(
            target = "mercato::middleware::rate_limit",
            event = "reset",
            provider = provider,
            "rate limits reset"
        );
        true
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
