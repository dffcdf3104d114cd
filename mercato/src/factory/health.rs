//! Background health monitoring.
//!
//! A single tokio task ticks at the configured interval and probes every
//! enabled provider whose last check has gone stale, bounded by a semaphore
//! so at most `max_concurrent_health_checks` probes run in parallel. The
//! monitor never blocks request handling; it stops via a watch channel.

use std::sync::Arc;

use tokio::sync::{Semaphore, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use mercato_types::ProviderStatus;

use super::{ProviderEntry, ProviderFactory};

/// Handle to the background monitor task.
pub struct HealthMonitorHandle {
    stop: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl HealthMonitorHandle {
    /// Signal the monitor to stop and wait for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}

impl ProviderFactory {
    /// Spawn the background health monitor for this factory.
    #[must_use]
    pub fn spawn_health_monitor(self: &Arc<Self>) -> HealthMonitorHandle {
        let (stop, mut stopped) = watch::channel(false);
        let factory = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(factory.cfg.monitor_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so freshly
            // initialized providers are not probed twice at startup.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        factory.run_health_checks().await;
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            debug!(
                                target = "mercato::factory::health",
                                event = "stopped",
                                "health monitor stopped"
                            );
                            break;
                        }
                    }
                }
            }
        });
        HealthMonitorHandle { stop, task }
    }

    /// Probe every enabled provider whose last check is older than its
    /// configured interval.
    pub async fn run_health_checks(&self) {
        let now = Instant::now();
        let due: Vec<(&String, &ProviderEntry)> = self
            .entries
            .iter()
            .filter(|(_, entry)| {
                if !entry.config.enabled {
                    return false;
                }
                let stats = entry.stats();
                stats.status != ProviderStatus::Disabled
                    && stats
                        .last_health_check
                        .is_none_or(|t| now.duration_since(t) >= entry.config.health_check_interval)
            })
            .collect();
        if due.is_empty() {
            return;
        }

        let semaphore = Semaphore::new(self.cfg.max_concurrent_health_checks.max(1));
        let probes = due.into_iter().map(|(name, entry)| {
            let semaphore = &semaphore;
            async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                self.probe(name, entry).await;
            }
        });
        futures::future::join_all(probes).await;
    }

    async fn probe(&self, name: &str, entry: &ProviderEntry) {
        let healthy = matches!(
            tokio::time::timeout(self.cfg.global_timeout, entry.adapter.health_check()).await,
            Ok(Ok(()))
        );
        let now = Instant::now();
        let mut stats = entry.stats();
        stats.last_health_check = Some(now);
        let old = stats.status;
        // Degraded is operator-owned; the monitor only moves providers
        // between healthy and unhealthy.
        let new = match (old, healthy) {
            (ProviderStatus::Degraded | ProviderStatus::Disabled, _) => old,
            (_, true) => ProviderStatus::Healthy,
            (_, false) => ProviderStatus::Unhealthy,
        };
        stats.status = new;
        drop(stats);

        if old == new {
            debug!(
                target = "mercato::factory::health",
                event = "probe",
                provider = name,
                status = %new,
                "health probe completed"
            );
        } else if healthy {
            info!(
                target = "mercato::factory::health",
                event = "transition",
                provider = name,
                from = %old,
                to = %new,
                "provider recovered"
            );
        } else {
            warn!(
                target = "mercato::factory::health",
                event = "transition",
                provider = name,
                from = %old,
                to = %new,
                "provider became unhealthy"
            );
        }
    }
}
