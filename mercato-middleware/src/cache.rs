//! Multi-level TTL cache shared by every provider adapter.
//!
//! One moka store per [`CacheLevel`], each with the level's default TTL and
//! an independent capacity bound. Keys follow the
//! `cache:{level}:{provider}:{identifier}[_{param_hash}]` schema so pattern
//! invalidation and per-provider statistics can operate on the key text.
//! Values are canonical JSON; adapters round-trip their typed payloads
//! through [`MarketCache::get_typed`] / [`MarketCache::set_typed`].

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use moka::future::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use mercato_types::{CacheConfig, CacheLevel, CacheSize, CacheStatsReport};

/// Stored entry: canonical JSON plus the metadata needed for per-entry TTL
/// and age reporting.
#[derive(Clone)]
struct CacheEntry {
    value: Arc<serde_json::Value>,
    stored_at: Instant,
    ttl: Duration,
    weight: u32,
}

/// Expiry policy reading each entry's own TTL, so `ttl_override` works
/// without a store per override value. Overwrites restart the clock.
struct EntryTtl;

impl moka::Expiry<String, CacheEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// A value served from cache, with its age for provenance.
#[derive(Debug, Clone)]
pub struct CachedValue {
    /// The stored JSON payload.
    pub value: Arc<serde_json::Value>,
    /// Time since the entry was written.
    pub age: Duration,
}

/// Statistics counters for one (level, provider) scope, reset every 24 hours.
struct StatWindow {
    counters: CacheStatsReport,
    window_start: Instant,
}

impl StatWindow {
    const WINDOW: Duration = Duration::from_secs(86_400);

    fn fresh() -> Self {
        Self {
            counters: CacheStatsReport::default(),
            window_start: Instant::now(),
        }
    }

    fn current(&mut self) -> &mut CacheStatsReport {
        if self.window_start.elapsed() >= Self::WINDOW {
            *self = Self::fresh();
        }
        &mut self.counters
    }
}

/// Outcome of a cache-warming pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmStats {
    /// Entries written because nothing was cached yet.
    pub seeded: u64,
    /// Entries skipped because a live value already existed.
    pub skipped: u64,
}

/// One entry of a warming plan.
#[derive(Debug, Clone)]
pub struct WarmEntry {
    /// Target cache level.
    pub level: CacheLevel,
    /// Provider scope of the key.
    pub provider: String,
    /// Identifier portion of the key (symbol, endpoint, ...).
    pub identifier: String,
    /// Value to seed.
    pub value: serde_json::Value,
}

/// Multi-level key/value store with per-level TTLs and statistics.
pub struct MarketCache {
    stores: BTreeMap<CacheLevel, Cache<String, CacheEntry>>,
    stats: Mutex<HashMap<(CacheLevel, String), StatWindow>>,
    cfg: CacheConfig,
}

impl MarketCache {
    /// Build the per-level stores from the configuration.
    #[must_use]
    pub fn new(cfg: CacheConfig) -> Self {
        let mut stores = BTreeMap::new();
        for level in CacheLevel::ALL {
            // With a weigher installed, moka's capacity is the total weight,
            // i.e. the stored payload bytes.
            let store = Cache::builder()
                .max_capacity(cfg.max_bytes_per_level)
                .expire_after(EntryTtl)
                .weigher(|_k: &String, v: &CacheEntry| v.weight)
                .build();
            debug!(
                target = "mercato::middleware::cache",
                event = "store_init",
                level = %level,
                ttl_secs = cfg.ttl_for(level).as_secs(),
                max_bytes = cfg.max_bytes_per_level,
                "initialized cache level store"
            );
            stores.insert(level, store);
        }
        Self {
            stores,
            stats: Mutex::new(HashMap::new()),
            cfg,
        }
    }

    fn store(&self, level: CacheLevel) -> &Cache<String, CacheEntry> {
        // All levels are populated in `new`.
        &self.stores[&level]
    }

    /// Canonical cache key. The param hash is a deterministic digest of the
    /// sorted parameter map; credentials must never be part of `params`.
    #[must_use]
    pub fn make_key(
        level: CacheLevel,
        provider: &str,
        identifier: &str,
        params: Option<&BTreeMap<String, String>>,
    ) -> String {
        let mut key = format!("cache:{level}:{provider}:{identifier}");
        if let Some(params) = params
            && !params.is_empty()
        {
            let canonical =
                serde_json::to_string(params).unwrap_or_else(|_| String::from("{}"));
            let mut hasher = DefaultHasher::new();
            canonical.hash(&mut hasher);
            key.push('_');
            key.push_str(&format!("{:016x}", hasher.finish()));
        }
        key
    }

    fn bump<F: FnOnce(&mut CacheStatsReport)>(&self, level: CacheLevel, provider: &str, f: F) {
        if let Ok(mut stats) = self.stats.lock() {
            let window = stats
                .entry((level, provider.to_string()))
                .or_insert_with(StatWindow::fresh);
            f(window.current());
        }
    }

    /// Read a cached value. Increments the hit or miss counter.
    pub async fn get(
        &self,
        level: CacheLevel,
        provider: &str,
        identifier: &str,
        params: Option<&BTreeMap<String, String>>,
    ) -> Option<CachedValue> {
        let key = Self::make_key(level, provider, identifier, params);
        match self.store(level).get(&key).await {
            Some(entry) => {
                self.bump(level, provider, |c| c.hits += 1);
                debug!(
                    target = "mercato::middleware::cache",
                    event = "hit",
                    key = %key,
                    "cache hit"
                );
                Some(CachedValue {
                    value: Arc::clone(&entry.value),
                    age: entry.stored_at.elapsed(),
                })
            }
            None => {
                self.bump(level, provider, |c| c.misses += 1);
                debug!(
                    target = "mercato::middleware::cache",
                    event = "miss",
                    key = %key,
                    "cache miss"
                );
                None
            }
        }
    }

    /// Write a value with TTL = `ttl_override` or the level default.
    /// Overwrites any existing entry.
    pub async fn set(
        &self,
        level: CacheLevel,
        provider: &str,
        identifier: &str,
        value: serde_json::Value,
        params: Option<&BTreeMap<String, String>>,
        ttl_override: Option<Duration>,
    ) {
        let key = Self::make_key(level, provider, identifier, params);
        let ttl = ttl_override.unwrap_or_else(|| self.cfg.ttl_for(level));
        let weight = u32::try_from(value.to_string().len()).unwrap_or(u32::MAX);
        let entry = CacheEntry {
            value: Arc::new(value),
            stored_at: Instant::now(),
            ttl,
            weight,
        };
        self.store(level).insert(key.clone(), entry).await;
        self.bump(level, provider, |c| c.sets += 1);
        debug!(
            target = "mercato::middleware::cache",
            event = "insert",
            key = %key,
            ttl_secs = ttl.as_secs(),
            size_bytes = weight,
            "cache set"
        );
    }

    /// Whether a live entry exists, without touching the counters.
    #[must_use]
    pub fn contains(
        &self,
        level: CacheLevel,
        provider: &str,
        identifier: &str,
        params: Option<&BTreeMap<String, String>>,
    ) -> bool {
        let key = Self::make_key(level, provider, identifier, params);
        self.store(level).contains_key(&key)
    }

    /// Remove one entry. Returns true when a key was removed.
    pub async fn delete(
        &self,
        level: CacheLevel,
        provider: &str,
        identifier: &str,
        params: Option<&BTreeMap<String, String>>,
    ) -> bool {
        let key = Self::make_key(level, provider, identifier, params);
        self.store(level).remove(&key).await.is_some()
    }

    /// Remove all keys under (level, provider) whose identifier portion
    /// matches the pattern (`*` wildcards permitted). Returns the count
    /// removed.
    pub async fn invalidate_pattern(
        &self,
        level: CacheLevel,
        provider: &str,
        identifier_pattern: &str,
    ) -> u64 {
        let pattern = format!("cache:{level}:{provider}:{identifier_pattern}");
        let store = self.store(level);
        let matching: Vec<String> = store
            .iter()
            .filter(|(k, _)| wildcard_match(&pattern, k))
            .map(|(k, _)| (*k).clone())
            .collect();
        let mut removed = 0u64;
        for key in matching {
            if store.remove(&key).await.is_some() {
                removed += 1;
            }
        }
        debug!(
            target = "mercato::middleware::cache",
            event = "invalidate",
            pattern = %pattern,
            removed = removed,
            "cache invalidation"
        );
        removed
    }

    /// Key-count and approximate memory for the selected scope. `None`
    /// selects all levels / all providers.
    pub async fn size(&self, level: Option<CacheLevel>, provider: Option<&str>) -> CacheSize {
        let mut key_count = 0u64;
        let mut memory_bytes = 0u64;
        let levels: Vec<CacheLevel> = match level {
            Some(l) => vec![l],
            None => CacheLevel::ALL.to_vec(),
        };
        for l in levels {
            let store = self.store(l);
            store.run_pending_tasks().await;
            match provider {
                None => {
                    key_count += store.entry_count();
                    memory_bytes += store.weighted_size();
                }
                Some(p) => {
                    let prefix = format!("cache:{l}:{p}:");
                    for (k, v) in store.iter() {
                        if k.starts_with(&prefix) {
                            key_count += 1;
                            memory_bytes += u64::from(v.weight);
                        }
                    }
                }
            }
        }
        CacheSize {
            key_count,
            memory_bytes,
        }
    }

    /// Record a store-level error (e.g. a stored payload that failed to
    /// decode back into its canonical type).
    pub fn record_error(&self, level: CacheLevel, provider: &str) {
        self.bump(level, provider, |c| c.errors += 1);
    }

    /// Aggregated counters for the selected scope.
    #[must_use]
    pub fn stats(&self, level: Option<CacheLevel>, provider: Option<&str>) -> CacheStatsReport {
        let mut out = CacheStatsReport::default();
        if let Ok(mut stats) = self.stats.lock() {
            for ((l, p), window) in stats.iter_mut() {
                if level.is_some_and(|want| want != *l) {
                    continue;
                }
                if provider.is_some_and(|want| want != p.as_str()) {
                    continue;
                }
                let c = window.current();
                out.hits += c.hits;
                out.misses += c.misses;
                out.sets += c.sets;
                out.errors += c.errors;
            }
        }
        out
    }

    /// `hits / (hits + misses) * 100` for the selected scope.
    #[must_use]
    pub fn hit_rate(&self, level: Option<CacheLevel>, provider: Option<&str>) -> f64 {
        self.stats(level, provider).hit_rate()
    }

    /// Pre-populate entries that are not already cached. Existing keys are
    /// skipped, never overwritten.
    pub async fn warm<I>(&self, entries: I) -> WarmStats
    where
        I: IntoIterator<Item = WarmEntry>,
    {
        let mut out = WarmStats::default();
        for entry in entries {
            if self.contains(entry.level, &entry.provider, &entry.identifier, None) {
                out.skipped += 1;
                continue;
            }
            self.set(
                entry.level,
                &entry.provider,
                &entry.identifier,
                entry.value,
                None,
                None,
            )
            .await;
            out.seeded += 1;
        }
        debug!(
            target = "mercato::middleware::cache",
            event = "warm",
            seeded = out.seeded,
            skipped = out.skipped,
            "cache warming completed"
        );
        out
    }

    /// Typed read: deserialize the stored JSON back into `T`. A payload that
    /// no longer decodes counts as an error and a miss.
    pub async fn get_typed<T: DeserializeOwned>(
        &self,
        level: CacheLevel,
        provider: &str,
        identifier: &str,
        params: Option<&BTreeMap<String, String>>,
    ) -> Option<(T, Duration)> {
        let cached = self.get(level, provider, identifier, params).await?;
        match serde_json::from_value::<T>((*cached.value).clone()) {
            Ok(value) => Some((value, cached.age)),
            Err(err) => {
                warn!(
                    target = "mercato::middleware::cache",
                    event = "decode_error",
                    level = %level,
                    provider = provider,
                    %err,
                    "cached payload failed to decode"
                );
                self.record_error(level, provider);
                None
            }
        }
    }

    /// Typed write: serialize `T` to canonical JSON and store it.
    pub async fn set_typed<T: Serialize>(
        &self,
        level: CacheLevel,
        provider: &str,
        identifier: &str,
        value: &T,
        params: Option<&BTreeMap<String, String>>,
        ttl_override: Option<Duration>,
    ) {
        match serde_json::to_value(value) {
            Ok(json) => {
                self.set(level, provider, identifier, json, params, ttl_override)
                    .await;
            }
            Err(err) => {
                warn!(
                    target = "mercato::middleware::cache",
                    event = "encode_error",
                    level = %level,
                    provider = provider,
                    %err,
                    "payload failed to encode for caching"
                );
                self.record_error(level, provider);
            }
        }
    }
}

/// Match `text` against `pattern` where `*` matches any (possibly empty)
/// run of characters. Two-pointer scan with backtracking to the last star.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let (mut star, mut star_ti) = (None::<usize>, 0usize);

    while ti < t.len() {
        if pi < p.len() && (p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            star_ti = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            star_ti += 1;
            ti = star_ti;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
