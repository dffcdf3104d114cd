//! Low-level HTTP plumbing for the public Yahoo Finance endpoints.
//!
//! Yahoo requires no credentials; the retry/backoff discipline mirrors the
//! premium adapter so both feeds share failure semantics.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use mercato_core::MercatoError;
use mercato_middleware::RateLimiter;
use mercato_types::Capability;

pub(crate) const PROVIDER: &str = "yahoo";

pub(crate) struct YahooClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    max_retries: u32,
    backoff_base: f64,
    limiter: Arc<RateLimiter>,
}

impl YahooClient {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: Url,
        timeout: Duration,
        max_retries: u32,
        backoff_base: f64,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            http,
            base_url,
            timeout,
            max_retries,
            backoff_base,
            limiter,
        }
    }

    /// Consult the shared rate limiter for this endpoint class.
    pub(crate) fn admit(&self, capability: Capability) -> Result<(), MercatoError> {
        let decision = self.limiter.is_allowed(PROVIDER, capability.as_str());
        if decision.allowed {
            Ok(())
        } else {
            Err(MercatoError::rate_limited(
                PROVIDER,
                capability.as_str(),
                decision.retry_after.unwrap_or(Duration::from_secs(60)),
            ))
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let secs = self.backoff_base.powi(attempt as i32).max(0.0);
        Duration::from_secs_f64(secs.min(30.0))
    }

    /// Issue a GET with timeout and retry on transient failures. Yahoo
    /// answers 401/403 for blocked clients; that is fatal for the call.
    pub(crate) async fn get_json(
        &self,
        path: &str,
        params: &[(&str, String)],
        operation: &'static str,
    ) -> Result<serde_json::Value, MercatoError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| MercatoError::invalid_arg(format!("bad endpoint {path}: {e}")))?;

        let mut last_error = MercatoError::upstream(PROVIDER, "request never attempted");
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let wait = self.backoff(attempt - 1);
                debug!(
                    target = "mercato::yahoo",
                    event = "retry",
                    operation = operation,
                    attempt = attempt,
                    backoff_ms = wait.as_millis() as u64,
                    "retrying request"
                );
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
            }

            let result = self
                .http
                .get(url.clone())
                .query(params)
                .timeout(self.timeout)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        warn!(
                            target = "mercato::yahoo",
                            event = "auth_failed",
                            operation = operation,
                            status = status.as_u16(),
                            "request rejected; not retrying"
                        );
                        return Err(MercatoError::auth(PROVIDER));
                    }
                    if status.is_success() {
                        match resp.json::<serde_json::Value>().await {
                            Ok(body) => return Ok(body),
                            Err(e) => {
                                last_error =
                                    MercatoError::data(format!("malformed body: {e}"));
                            }
                        }
                    } else {
                        last_error = MercatoError::upstream(
                            PROVIDER,
                            format!("http status {status}"),
                        );
                    }
                }
                Err(e) if e.is_timeout() => {
                    last_error = MercatoError::timeout(PROVIDER, operation);
                }
                Err(e) => {
                    last_error = MercatoError::upstream(PROVIDER, e.to_string());
                }
            }
        }

        warn!(
            target = "mercato::yahoo",
            event = "exhausted",
            operation = operation,
            attempts = self.max_retries + 1,
            error = %last_error,
            "request failed after all attempts"
        );
        Err(last_error)
    }
}
