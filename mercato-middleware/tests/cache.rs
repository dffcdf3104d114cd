use std::time::Duration;

use serde_json::json;

use mercato_middleware::cache::{MarketCache, WarmEntry};
use mercato_types::{CacheConfig, CacheLevel};

fn cache() -> MarketCache {
    MarketCache::new(CacheConfig::default())
}

#[tokio::test]
async fn get_returns_value_within_ttl_and_miss_after() {
    let cache = cache();
    cache
        .set(
            CacheLevel::Quotes,
            "fmp",
            "AAPL",
            json!({"price": "150.25"}),
            None,
            Some(Duration::from_millis(300)),
        )
        .await;

    let hit = cache.get(CacheLevel::Quotes, "fmp", "AAPL", None).await;
    let hit = hit.expect("entry should be live within its ttl");
    assert_eq!(hit.value["price"], "150.25");
    assert!(hit.age < Duration::from_millis(300));

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert!(
        cache
            .get(CacheLevel::Quotes, "fmp", "AAPL", None)
            .await
            .is_none()
    );
}

#[tokio::test]
async fn overwrite_replaces_value_and_restarts_ttl() {
    let cache = cache();
    cache
        .set(CacheLevel::Quotes, "fmp", "AAPL", json!({"v": 1}), None, None)
        .await;
    cache
        .set(CacheLevel::Quotes, "fmp", "AAPL", json!({"v": 2}), None, None)
        .await;

    let hit = cache
        .get(CacheLevel::Quotes, "fmp", "AAPL", None)
        .await
        .expect("live entry");
    assert_eq!(hit.value["v"], 2);
}

#[tokio::test]
async fn delete_reports_whether_a_key_was_removed() {
    let cache = cache();
    cache
        .set(CacheLevel::Profiles, "fmp", "AAPL", json!({}), None, None)
        .await;
    assert!(cache.delete(CacheLevel::Profiles, "fmp", "AAPL", None).await);
    assert!(!cache.delete(CacheLevel::Profiles, "fmp", "AAPL", None).await);
}

#[tokio::test]
async fn pattern_invalidation_removes_matching_keys_only() {
    let cache = cache();
    for sym in ["AAPL", "AMZN", "MSFT"] {
        cache
            .set(CacheLevel::Quotes, "fmp", sym, json!({}), None, None)
            .await;
    }
    cache
        .set(CacheLevel::Quotes, "yahoo", "AAPL", json!({}), None, None)
        .await;

    let removed = cache.invalidate_pattern(CacheLevel::Quotes, "fmp", "A*").await;
    assert_eq!(removed, 2);
    assert!(cache.get(CacheLevel::Quotes, "fmp", "MSFT", None).await.is_some());
    assert!(cache.get(CacheLevel::Quotes, "yahoo", "AAPL", None).await.is_some());

    let removed_all = cache.invalidate_pattern(CacheLevel::Quotes, "yahoo", "*").await;
    assert_eq!(removed_all, 1);
}

#[tokio::test]
async fn stats_track_hits_misses_and_sets_per_scope() {
    let cache = cache();
    cache
        .set(CacheLevel::Quotes, "fmp", "AAPL", json!({}), None, None)
        .await;

    cache.get(CacheLevel::Quotes, "fmp", "AAPL", None).await;
    cache.get(CacheLevel::Quotes, "fmp", "AAPL", None).await;
    cache.get(CacheLevel::Quotes, "fmp", "MSFT", None).await;

    let fmp = cache.stats(Some(CacheLevel::Quotes), Some("fmp"));
    assert_eq!(fmp.hits, 2);
    assert_eq!(fmp.misses, 1);
    assert_eq!(fmp.sets, 1);
    assert!((cache.hit_rate(Some(CacheLevel::Quotes), Some("fmp")) - 66.666).abs() < 0.01);

    // Other scopes are untouched.
    let yahoo = cache.stats(None, Some("yahoo"));
    assert_eq!(yahoo.hits + yahoo.misses + yahoo.sets, 0);
}

#[tokio::test]
async fn size_accounts_keys_and_memory() {
    let cache = cache();
    cache
        .set(CacheLevel::Quotes, "fmp", "AAPL", json!({"price": 1}), None, None)
        .await;
    cache
        .set(CacheLevel::Profiles, "fmp", "AAPL", json!({"name": "Apple"}), None, None)
        .await;

    let all = cache.size(None, None).await;
    assert_eq!(all.key_count, 2);
    assert!(all.memory_bytes > 0);

    let quotes_only = cache.size(Some(CacheLevel::Quotes), None).await;
    assert_eq!(quotes_only.key_count, 1);

    let fmp_quotes = cache.size(Some(CacheLevel::Quotes), Some("fmp")).await;
    assert_eq!(fmp_quotes.key_count, 1);
    let yahoo_quotes = cache.size(Some(CacheLevel::Quotes), Some("yahoo")).await;
    assert_eq!(yahoo_quotes.key_count, 0);
}

#[tokio::test]
async fn warming_seeds_only_absent_keys() {
    let cache = cache();
    cache
        .set(CacheLevel::Quotes, "fmp", "AAPL", json!({"seeded": false}), None, None)
        .await;

    let plan = ["AAPL", "MSFT", "BTC-USD"].into_iter().map(|sym| WarmEntry {
        level: CacheLevel::Quotes,
        provider: "fmp".to_string(),
        identifier: sym.to_string(),
        value: json!({"seeded": true}),
    });
    let stats = cache.warm(plan).await;
    assert_eq!(stats.seeded, 2);
    assert_eq!(stats.skipped, 1);

    // The pre-existing entry was not overwritten.
    let hit = cache
        .get(CacheLevel::Quotes, "fmp", "AAPL", None)
        .await
        .expect("live entry");
    assert_eq!(hit.value["seeded"], false);
}

#[tokio::test]
async fn typed_round_trip_and_decode_errors() {
    #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
    struct Payload {
        price: u32,
    }

    let cache = cache();
    cache
        .set_typed(CacheLevel::Quotes, "fmp", "AAPL", &Payload { price: 7 }, None, None)
        .await;
    let (value, age) = cache
        .get_typed::<Payload>(CacheLevel::Quotes, "fmp", "AAPL", None)
        .await
        .expect("typed read");
    assert_eq!(value, Payload { price: 7 });
    assert!(age < Duration::from_secs(1));

    // A shape-incompatible entry decodes to None and counts as an error.
    cache
        .set(CacheLevel::Quotes, "fmp", "MSFT", json!({"price": "not-a-number"}), None, None)
        .await;
    assert!(
        cache
            .get_typed::<Payload>(CacheLevel::Quotes, "fmp", "MSFT", None)
            .await
            .is_none()
    );
    assert_eq!(cache.stats(Some(CacheLevel::Quotes), Some("fmp")).errors, 1);
}

#[tokio::test]
async fn params_scope_distinct_entries() {
    let cache = cache();
    let mut yearly = std::collections::BTreeMap::new();
    yearly.insert("period".to_string(), "1y".to_string());
    let mut monthly = std::collections::BTreeMap::new();
    monthly.insert("period".to_string(), "1mo".to_string());

    cache
        .set(CacheLevel::Historical, "fmp", "AAPL", json!({"span": "1y"}), Some(&yearly), None)
        .await;
    cache
        .set(CacheLevel::Historical, "fmp", "AAPL", json!({"span": "1mo"}), Some(&monthly), None)
        .await;

    let y = cache
        .get(CacheLevel::Historical, "fmp", "AAPL", Some(&yearly))
        .await
        .expect("yearly entry");
    assert_eq!(y.value["span"], "1y");
    let m = cache
        .get(CacheLevel::Historical, "fmp", "AAPL", Some(&monthly))
        .await
        .expect("monthly entry");
    assert_eq!(m.value["span"], "1mo");
}
