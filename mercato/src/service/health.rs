//! System health snapshot.

use mercato_types::HealthSnapshot;

use crate::core::Mercato;

impl Mercato {
    /// Composite system health: factory status, cache counters and size,
    /// rate limiter utilization.
    pub async fn system_health(&self) -> HealthSnapshot {
        let factory = self.factory.factory_status();
        HealthSnapshot {
            healthy: !factory.available.is_empty(),
            cache: self.cache.stats(None, None),
            cache_size: self.cache.size(None, None).await,
            rate_limits: self.limiter.status_all(),
            factory,
        }
    }
}
