//! Low-level HTTP plumbing for the Financial Modeling Prep API.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use mercato_core::MercatoError;
use mercato_middleware::RateLimiter;
use mercato_types::Capability;

pub(crate) const PROVIDER: &str = "fmp";

/// Thin wrapper around one `reqwest` connection pool, holding the credential
/// and the retry policy. The API key travels only in the outgoing query
/// string; it is never part of a cache key or a log line.
pub(crate) struct FmpClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    timeout: Duration,
    max_retries: u32,
    backoff_base: f64,
    limiter: Arc<RateLimiter>,
}

impl FmpClient {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: Url,
        api_key: String,
        timeout: Duration,
        max_retries: u32,
        backoff_base: f64,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            http,
            base_url,
            api_key,
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

    /// Issue a GET with authentication, timeout, and retry on transient
    /// failures. Authentication failures are never retried.
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
                    target = "mercato::fmp",
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
                .query(&[("apikey", self.api_key.as_str())])
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
                            target = "mercato::fmp",
                            event = "auth_failed",
                            operation = operation,
                            status = status.as_u16(),
                            "authentication rejected; not retrying"
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
            target = "mercato::fmp",
            event = "exhausted",
            operation = operation,
            attempts = self.max_retries + 1,
            error = %last_error,
            "request failed after all attempts"
        );
        Err(last_error)
    }
}
