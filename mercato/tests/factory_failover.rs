mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::mock_connector::TestConnector;
use helpers::{fast_factory_config, provider_config, reference_quote};

use mercato::factory::{FetchOptions, ProviderFactory};
use mercato_core::{MercatoError, ProviderResponse, Symbol};
use mercato_types::{FactoryConfig, ProviderStatus, ProviderTier, SelectionPolicy};

async fn factory_with(
    cfg: FactoryConfig,
    connectors: Vec<(mercato_types::ProviderConfig, Arc<TestConnector>)>,
) -> Arc<ProviderFactory> {
    let mut factory = ProviderFactory::new(cfg);
    for (config, connector) in connectors {
        factory
            .register(config, connector as Arc<dyn mercato_core::connector::MercatoConnector>)
            .expect("register");
    }
    let factory = Arc::new(factory);
    factory.initialize_all().await;
    factory
}

fn sym(s: &str) -> Symbol {
    Symbol::parse(s).expect("test symbol")
}

#[tokio::test(start_paused = true)]
async fn failover_moves_to_the_next_provider_on_transient_failure() {
    let premium = Arc::new(TestConnector::with_quote_error("premium", || {
        MercatoError::upstream("premium", "connection reset")
    }));
    let free = Arc::new(TestConnector::with_quote("free", reference_quote("AAPL")));

    let factory = factory_with(
        fast_factory_config(),
        vec![
            (provider_config("premium", ProviderTier::Premium, 10), Arc::clone(&premium)),
            (provider_config("free", ProviderTier::Free, 20), Arc::clone(&free)),
        ],
    )
    .await;

    let fetched = factory
        .get_stock_quote(&sym("AAPL"), false, &FetchOptions::default())
        .await
        .expect("free provider serves");
    assert_eq!(fetched.provider, "free");
    assert_eq!(fetched.fallback_sources, vec!["premium".to_string()]);
    assert_eq!(factory.failover_count(), 1);

    let status = factory.factory_status();
    assert_eq!(status.providers["premium"].consecutive_failures, 1);
    assert_eq!(status.providers["premium"].failed_requests, 1);
    assert_eq!(status.providers["free"].successful_requests, 1);
}

#[tokio::test(start_paused = true)]
async fn success_updates_stats_for_exactly_the_serving_provider() {
    let premium = Arc::new(TestConnector::with_quote("premium", reference_quote("AAPL")));
    let factory = factory_with(
        fast_factory_config(),
        vec![(provider_config("premium", ProviderTier::Premium, 10), Arc::clone(&premium))],
    )
    .await;

    let fetched = factory
        .get_stock_quote(&sym("AAPL"), false, &FetchOptions::default())
        .await
        .expect("quote served");
    assert_eq!(fetched.provider, "premium");

    let status = factory.factory_status();
    let stats = &status.providers["premium"];
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.successful_requests, 1);
    assert_eq!(stats.failed_requests, 0);
    assert_eq!(stats.last_used_age_secs, Some(0));
}

#[tokio::test(start_paused = true)]
async fn circuit_breaker_opens_after_threshold_and_half_opens_after_cooldown() {
    let mut config = provider_config("premium", ProviderTier::Premium, 10);
    config.circuit_breaker_threshold = 5;
    config.circuit_breaker_timeout = Duration::from_secs(60);
    let premium = Arc::new(TestConnector::with_quote_error("premium", || {
        MercatoError::upstream("premium", "boom")
    }));

    let factory = factory_with(fast_factory_config(), vec![(config, Arc::clone(&premium))]).await;
    let opts = FetchOptions {
        max_retries: Some(1),
        ..FetchOptions::default()
    };

    for _ in 0..5 {
        let failure = factory
            .get_stock_quote(&sym("AAPL"), false, &opts)
            .await
            .expect_err("provider fails");
        assert_eq!(failure.attempted, vec!["premium".to_string()]);
    }

    let status = factory.factory_status();
    assert!(status.providers["premium"].circuit_open);
    assert!(!status.available.contains(&"premium".to_string()));

    // While the breaker is open the provider is skipped entirely.
    let failure = factory
        .get_stock_quote(&sym("AAPL"), false, &opts)
        .await
        .expect_err("no available providers");
    assert!(failure.attempted.is_empty());
    assert!(matches!(failure.error, MercatoError::NoAvailableProviders));
    assert_eq!(premium.call_count(), 5);

    // After the cooldown the next request may probe the provider again.
    tokio::time::advance(Duration::from_secs(61)).await;
    let status = factory.factory_status();
    assert!(!status.providers["premium"].circuit_open);
    assert!(status.available.contains(&"premium".to_string()));
    let _ = factory.get_stock_quote(&sym("AAPL"), false, &opts).await;
    assert_eq!(premium.call_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_denials_do_not_damage_provider_health() {
    let premium = Arc::new(TestConnector::with_quote_error("premium", || {
        MercatoError::rate_limited("premium", "quote", Duration::from_secs(60))
    }));
    let free = Arc::new(TestConnector::with_quote("free", reference_quote("AAPL")));

    let factory = factory_with(
        fast_factory_config(),
        vec![
            (provider_config("premium", ProviderTier::Premium, 10), Arc::clone(&premium)),
            (provider_config("free", ProviderTier::Free, 20), Arc::clone(&free)),
        ],
    )
    .await;

    let fetched = factory
        .get_stock_quote(&sym("AAPL"), false, &FetchOptions::default())
        .await
        .expect("failover satisfies the request");
    assert_eq!(fetched.provider, "free");

    let status = factory.factory_status();
    let premium_stats = &status.providers["premium"];
    assert_eq!(premium_stats.status, ProviderStatus::Healthy);
    assert_eq!(premium_stats.consecutive_failures, 0);
    assert_eq!(premium_stats.failed_requests, 0);
    assert!(!premium_stats.circuit_open);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_denial_with_no_alternative_surfaces_retry_after() {
    let premium = Arc::new(TestConnector::with_quote_error("premium", || {
        MercatoError::rate_limited("premium", "quote", Duration::from_secs(60))
    }));
    let factory = factory_with(
        fast_factory_config(),
        vec![(provider_config("premium", ProviderTier::Premium, 10), premium)],
    )
    .await;

    let failure = factory
        .get_stock_quote(&sym("AAPL"), false, &FetchOptions::default())
        .await
        .expect_err("nothing can serve");
    match failure.error {
        MercatoError::RateLimited { retry_after, .. } => {
            assert!(retry_after > Duration::ZERO);
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn auth_failures_mark_the_provider_unhealthy_and_fail_over() {
    let premium = Arc::new(TestConnector::with_quote_error("premium", || {
        MercatoError::auth("premium")
    }));
    let free = Arc::new(TestConnector::with_quote("free", reference_quote("AAPL")));

    let factory = factory_with(
        fast_factory_config(),
        vec![
            (provider_config("premium", ProviderTier::Premium, 10), Arc::clone(&premium)),
            (provider_config("free", ProviderTier::Free, 20), free),
        ],
    )
    .await;

    let fetched = factory
        .get_stock_quote(&sym("AAPL"), false, &FetchOptions::default())
        .await
        .expect("free provider serves");
    assert_eq!(fetched.provider, "free");
    assert_eq!(
        factory.factory_status().providers["premium"].status,
        ProviderStatus::Unhealthy
    );
    assert_eq!(premium.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn timeouts_count_toward_the_breaker() {
    let mut slow = TestConnector::with_quote("premium", reference_quote("AAPL"));
    slow.delay = Some(Duration::from_millis(500));
    let factory = factory_with(
        fast_factory_config(),
        vec![(provider_config("premium", ProviderTier::Premium, 10), Arc::new(slow))],
    )
    .await;

    let opts = FetchOptions {
        timeout: Some(Duration::from_millis(50)),
        max_retries: Some(1),
    };
    let failure = factory
        .get_stock_quote(&sym("AAPL"), false, &opts)
        .await
        .expect_err("times out");
    assert!(matches!(failure.error, MercatoError::Timeout { .. }));

    let status = factory.factory_status();
    assert_eq!(status.providers["premium"].failed_requests, 1);
    assert_eq!(status.providers["premium"].consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn misses_everywhere_aggregate_without_health_damage() {
    let premium = Arc::new(TestConnector::with_quote_error("premium", || {
        MercatoError::not_found("quote for ZZZQ")
    }));
    let free = Arc::new(TestConnector::with_quote_error("free", || {
        MercatoError::not_found("quote for ZZZQ")
    }));

    let factory = factory_with(
        fast_factory_config(),
        vec![
            (provider_config("premium", ProviderTier::Premium, 10), premium),
            (provider_config("free", ProviderTier::Free, 20), free),
        ],
    )
    .await;

    let failure = factory
        .get_stock_quote(&sym("ZZZQ"), false, &FetchOptions::default())
        .await
        .expect_err("nobody knows the symbol");
    assert_eq!(failure.attempted.len(), 2);
    assert!(matches!(failure.error, MercatoError::AllProvidersFailed(_)));

    let status = factory.factory_status();
    assert_eq!(status.providers["premium"].consecutive_failures, 0);
    assert_eq!(status.providers["free"].consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn round_robin_rotates_across_requests() {
    let a = Arc::new(TestConnector::with_quote("alpha", reference_quote("AAPL")));
    let b = Arc::new(TestConnector::with_quote("beta", reference_quote("AAPL")));
    let cfg = FactoryConfig {
        policy: SelectionPolicy::RoundRobin,
        ..fast_factory_config()
    };
    let factory = factory_with(
        cfg,
        vec![
            (provider_config("alpha", ProviderTier::Free, 10), a),
            (provider_config("beta", ProviderTier::Free, 10), b),
        ],
    )
    .await;

    let mut served = Vec::new();
    for _ in 0..4 {
        let fetched = factory
            .get_stock_quote(&sym("AAPL"), false, &FetchOptions::default())
            .await
            .expect("quote served");
        served.push(fetched.provider);
    }
    assert_eq!(served, ["alpha", "beta", "alpha", "beta"]);
}

#[tokio::test(start_paused = true)]
async fn providers_without_the_capability_are_skipped_silently() {
    // "quoteless" advertises no quote capability at all.
    let quoteless = Arc::new(TestConnector::new("quoteless"));
    let free = Arc::new(TestConnector::with_quote("free", reference_quote("AAPL")));

    let factory = factory_with(
        fast_factory_config(),
        vec![
            (provider_config("quoteless", ProviderTier::Premium, 1), Arc::clone(&quoteless)),
            (provider_config("free", ProviderTier::Free, 20), free),
        ],
    )
    .await;

    let fetched = factory
        .get_stock_quote(&sym("AAPL"), false, &FetchOptions::default())
        .await
        .expect("capable provider serves");
    assert_eq!(fetched.provider, "free");
    assert_eq!(quoteless.call_count(), 0);
    // Skipping for capability is not a failure.
    assert_eq!(
        factory.factory_status().providers["quoteless"].failed_requests,
        0
    );
}

#[tokio::test(start_paused = true)]
async fn history_skips_providers_that_cannot_serve_the_interval() {
    use chrono::Utc;
    use mercato_core::{Bar, HistoricalSeries, HistoryRequest, Interval, Period};
    use rust_decimal::Decimal;

    let make_series = |symbol: &Symbol, req: HistoryRequest| {
        HistoricalSeries::from_bars(
            symbol.clone(),
            req.period(),
            req.interval(),
            "USD",
            "America/New_York",
            vec![Bar {
                date: Utc::now(),
                open: Decimal::ONE,
                high: Decimal::TWO,
                low: Decimal::ONE,
                close: Decimal::ONE,
                volume: Some(1),
            }],
            Utc::now(),
        )
    };

    let mut daily_only = TestConnector::new("premium");
    daily_only.history_intervals = &[Interval::D1];
    daily_only.history_fn = Some(Arc::new(move |symbol, req| {
        Ok(ProviderResponse::fresh(make_series(symbol, req), "premium"))
    }));
    let daily_only = Arc::new(daily_only);

    let mut weekly = TestConnector::new("free");
    weekly.history_intervals = &[Interval::D1, Interval::W1];
    weekly.history_fn = Some(Arc::new(move |symbol, req| {
        Ok(ProviderResponse::fresh(
            HistoricalSeries::from_bars(
                symbol.clone(),
                req.period(),
                req.interval(),
                "USD",
                "America/New_York",
                Vec::new(),
                Utc::now(),
            ),
            "free",
        ))
    }));
    let weekly = Arc::new(weekly);

    let factory = factory_with(
        fast_factory_config(),
        vec![
            (provider_config("premium", ProviderTier::Premium, 10), Arc::clone(&daily_only)),
            (provider_config("free", ProviderTier::Free, 20), weekly),
        ],
    )
    .await;

    let req = HistoryRequest::new(Period::Y1, Interval::W1).expect("valid request");
    let fetched = factory
        .get_historical_data(&sym("AAPL"), req, &FetchOptions::default())
        .await
        .expect("weekly-capable provider serves");
    assert_eq!(fetched.provider, "free");
    assert_eq!(daily_only.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn health_monitor_transitions_status_both_ways() {
    let premium = Arc::new(TestConnector::with_quote("premium", reference_quote("AAPL")));
    let health_flag = Arc::clone(&premium.health_ok);

    let mut config = provider_config("premium", ProviderTier::Premium, 10);
    config.health_check_interval = Duration::ZERO;
    let factory = factory_with(fast_factory_config(), vec![(config, premium)]).await;

    assert_eq!(
        factory.factory_status().providers["premium"].status,
        ProviderStatus::Healthy
    );

    health_flag.store(false, std::sync::atomic::Ordering::Relaxed);
    factory.run_health_checks().await;
    assert_eq!(
        factory.factory_status().providers["premium"].status,
        ProviderStatus::Unhealthy
    );
    assert!(factory.factory_status().available.is_empty());

    health_flag.store(true, std::sync::atomic::Ordering::Relaxed);
    factory.run_health_checks().await;
    assert_eq!(
        factory.factory_status().providers["premium"].status,
        ProviderStatus::Healthy
    );
}

#[tokio::test(start_paused = true)]
async fn background_monitor_probes_on_its_own_and_stops_cleanly() {
    let premium = Arc::new(TestConnector::with_quote("premium", reference_quote("AAPL")));
    let health_flag = Arc::clone(&premium.health_ok);

    let mut provider = provider_config("premium", ProviderTier::Premium, 10);
    provider.health_check_interval = Duration::ZERO;
    let cfg = FactoryConfig {
        monitor_interval: Duration::from_secs(5),
        ..fast_factory_config()
    };
    let factory = factory_with(cfg, vec![(provider, premium)]).await;

    let handle = factory.spawn_health_monitor();
    health_flag.store(false, std::sync::atomic::Ordering::Relaxed);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(
        factory.factory_status().providers["premium"].status,
        ProviderStatus::Unhealthy
    );
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn degraded_providers_serve_only_when_nothing_healthy_remains() {
    let degraded = Arc::new(TestConnector::with_quote("premium", reference_quote("AAPL")));
    let healthy = Arc::new(TestConnector::with_quote("free", reference_quote("AAPL")));

    let factory = factory_with(
        fast_factory_config(),
        vec![
            (provider_config("premium", ProviderTier::Premium, 1), degraded),
            (provider_config("free", ProviderTier::Free, 99), healthy),
        ],
    )
    .await;
    factory.set_provider_status("premium", ProviderStatus::Degraded);

    // Despite the better priority, the degraded provider loses to a healthy one.
    let fetched = factory
        .get_stock_quote(&sym("AAPL"), false, &FetchOptions::default())
        .await
        .expect("healthy provider serves");
    assert_eq!(fetched.provider, "free");

    factory.set_provider_status("free", ProviderStatus::Unhealthy);
    let fetched = factory
        .get_stock_quote(&sym("AAPL"), false, &FetchOptions::default())
        .await
        .expect("degraded provider still serves");
    assert_eq!(fetched.provider, "premium");
}
