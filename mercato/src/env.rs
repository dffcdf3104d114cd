//! Environment-backed configuration loading.
//!
//! This is the boundary to the deployment environment: every key documented
//! here is optional and falls back to the shipped defaults.

use std::str::FromStr;
use std::time::Duration;

use mercato_core::MercatoError;
use mercato_types::{
    AnomalyConfig, ConfigError, FactoryConfig, ProviderConfig, ProviderTier, SelectionPolicy,
};

/// Top-level service configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct MercatoConfig {
    /// `FMP_API_KEY`; the premium provider is registered only when present.
    pub fmp_api_key: Option<String>,
    /// `FMP_BASE_URL` override.
    pub fmp_base_url: Option<String>,
    /// `YAHOO_BASE_URL` override.
    pub yahoo_base_url: Option<String>,
    /// `FMP_RATE_LIMIT_PER_MINUTE` override.
    pub fmp_rate_limit_per_minute: Option<u32>,
    /// `YAHOO_RATE_LIMIT_PER_MINUTE` override.
    pub yahoo_rate_limit_per_minute: Option<u32>,
    /// `FMP_PRIORITY`; lower is preferred.
    pub fmp_priority: u32,
    /// `YAHOO_PRIORITY`; lower is preferred.
    pub yahoo_priority: u32,
    /// Factory knobs (`FAILOVER_STRATEGY`, `GLOBAL_TIMEOUT_SECONDS`,
    /// `MAX_CONCURRENT_HEALTH_CHECKS`).
    pub factory: FactoryConfig,
    /// Anomaly knobs (`ANOMALY_DETECTION_ENABLED`,
    /// `PRICE_CHANGE_ANOMALY_THRESHOLD_PCT`, `VOLUME_SPIKE_MULTIPLIER`).
    pub anomaly: AnomalyConfig,
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match var(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}

fn parse_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match var(key) {
        None => Ok(None),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidEnvValue {
                key: key.to_string(),
                value: raw,
            }),
        },
    }
}

impl MercatoConfig {
    /// Load the configuration surface from the process environment.
    ///
    /// # Errors
    /// Returns `InvalidArg` when a present variable fails to parse.
    pub fn from_env() -> Result<Self, MercatoError> {
        let mut factory = FactoryConfig::default();
        if let Some(secs) = parse_var::<u64>("GLOBAL_TIMEOUT_SECONDS")? {
            factory.global_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = parse_var::<usize>("MAX_CONCURRENT_HEALTH_CHECKS")? {
            factory.max_concurrent_health_checks = n;
        }
        if let Some(raw) = var("FAILOVER_STRATEGY") {
            factory.policy = SelectionPolicy::from_str(raw.trim())?;
        }

        let mut anomaly = AnomalyConfig::default();
        if let Some(enabled) = parse_bool("ANOMALY_DETECTION_ENABLED")? {
            anomaly.enabled = enabled;
        }
        if let Some(pct) = parse_var::<f64>("PRICE_CHANGE_ANOMALY_THRESHOLD_PCT")? {
            anomaly.price_change_threshold_pct = pct;
        }
        if let Some(mult) = parse_var::<f64>("VOLUME_SPIKE_MULTIPLIER")? {
            anomaly.volume_spike_multiplier = mult;
        }

        Ok(Self {
            fmp_api_key: var("FMP_API_KEY"),
            fmp_base_url: var("FMP_BASE_URL"),
            yahoo_base_url: var("YAHOO_BASE_URL"),
            fmp_rate_limit_per_minute: parse_var("FMP_RATE_LIMIT_PER_MINUTE")?,
            yahoo_rate_limit_per_minute: parse_var("YAHOO_RATE_LIMIT_PER_MINUTE")?,
            fmp_priority: parse_var("FMP_PRIORITY")?.unwrap_or(10),
            yahoo_priority: parse_var("YAHOO_PRIORITY")?.unwrap_or(20),
            factory,
            anomaly,
        })
    }

    /// Provider configs for the reference feeds: the premium feed only when
    /// a credential is configured, the free feed always.
    #[must_use]
    pub fn provider_configs(&self) -> Vec<ProviderConfig> {
        let mut out = Vec::new();
        if self.fmp_api_key.is_some() {
            let mut fmp = ProviderConfig::new("fmp", ProviderTier::Premium);
            fmp.priority = self.fmp_priority;
            if let Some(per_minute) = self.fmp_rate_limit_per_minute {
                fmp.budgets.per_minute = per_minute;
            }
            out.push(fmp);
        }
        let mut yahoo = ProviderConfig::new("yahoo", ProviderTier::Free);
        yahoo.priority = self.yahoo_priority;
        if let Some(per_minute) = self.yahoo_rate_limit_per_minute {
            yahoo.budgets.per_minute = per_minute;
        }
        out.push(yahoo);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment mutation is process-global, so everything lives in one
    // test to avoid cross-test interference.
    #[test]
    fn from_env_reads_overrides_and_defaults() {
        unsafe {
            std::env::set_var("FMP_API_KEY", "secret");
            std::env::set_var("GLOBAL_TIMEOUT_SECONDS", "12");
            std::env::set_var("FAILOVER_STRATEGY", "health_based");
            std::env::set_var("ANOMALY_DETECTION_ENABLED", "false");
            std::env::set_var("FMP_RATE_LIMIT_PER_MINUTE", "42");
        }
        let cfg = MercatoConfig::from_env().expect("parse env");
        assert_eq!(cfg.fmp_api_key.as_deref(), Some("secret"));
        assert_eq!(cfg.factory.global_timeout, Duration::from_secs(12));
        assert_eq!(cfg.factory.policy, SelectionPolicy::HealthBased);
        assert!(!cfg.anomaly.enabled);
        assert_eq!(cfg.yahoo_priority, 20);

        let configs = cfg.provider_configs();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].name, "fmp");
        assert_eq!(configs[0].budgets.per_minute, 42);

        unsafe {
            std::env::set_var("GLOBAL_TIMEOUT_SECONDS", "not-a-number");
        }
        assert!(MercatoConfig::from_env().is_err());
        unsafe {
            std::env::remove_var("GLOBAL_TIMEOUT_SECONDS");
            std::env::remove_var("FMP_API_KEY");
            std::env::remove_var("FAILOVER_STRATEGY");
            std::env::remove_var("ANOMALY_DETECTION_ENABLED");
            std::env::remove_var("FMP_RATE_LIMIT_PER_MINUTE");
        }
    }
}
