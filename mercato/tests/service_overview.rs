mod helpers;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use helpers::mock_connector::TestConnector;
use helpers::{fast_factory_config, provider_config, reference_quote};

use mercato::{FetchOptions, Mercato};
use mercato_core::{MarketOverview, MercatoError, ProviderResponse};
use mercato_types::{ProviderTier, QualityLevel, RateWindow};

fn partial_overview() -> MarketOverview {
    let mut market_status = BTreeMap::new();
    market_status.insert("NasdaqGS".to_string(), "regular".to_string());
    MarketOverview {
        indices: vec![reference_quote("SPY")],
        crypto: vec![reference_quote("BTC-USD")],
        commodities: Vec::new(),
        forex: Vec::new(),
        market_status,
        last_updated: Utc::now(),
    }
}

async fn service_with(connector: TestConnector) -> Mercato {
    let mercato = Mercato::builder()
        .factory_config(fast_factory_config())
        .with_connector(
            provider_config("premium", ProviderTier::Premium, 10),
            Arc::new(connector),
        )
        .build()
        .expect("builds");
    mercato.initialize().await.expect("initializes");
    mercato
}

#[tokio::test(start_paused = true)]
async fn partial_overview_is_success_with_warnings() {
    let mut conn = TestConnector::new("premium");
    conn.overview_fn = Some(Arc::new(|| {
        Ok(ProviderResponse::fresh(partial_overview(), "premium"))
    }));
    let mercato = service_with(conn).await;

    let response = mercato.market_overview(&FetchOptions::default()).await;
    assert!(response.success);
    assert_eq!(response.symbol, "MARKET_OVERVIEW");
    let overview = response.data.expect("payload present");
    assert_eq!(overview.indices.len(), 1);
    assert_eq!(overview.crypto.len(), 1);
    assert!(overview.commodities.is_empty());
    assert_eq!(
        response.warnings,
        vec![
            "category 'commodities' is empty".to_string(),
            "category 'forex' is empty".to_string(),
        ]
    );
    assert_eq!(
        overview.market_status.get("NasdaqGS").map(String::as_str),
        Some("regular")
    );
}

#[tokio::test(start_paused = true)]
async fn overview_failure_produces_a_failure_envelope() {
    let mut conn = TestConnector::new("premium");
    conn.overview_fn = Some(Arc::new(|| {
        Err(MercatoError::upstream("premium", "all categories failed"))
    }));
    let mercato = service_with(conn).await;

    let response = mercato.market_overview(&FetchOptions::default()).await;
    assert!(!response.success);
    assert_eq!(response.data_quality.quality_level, QualityLevel::Unreliable);
    assert_eq!(response.provenance.primary_source, "fallback");
}

#[tokio::test(start_paused = true)]
async fn system_health_composes_factory_cache_and_rate_state() {
    let mut conn = TestConnector::new("premium");
    conn.overview_fn = Some(Arc::new(|| {
        Ok(ProviderResponse::fresh(partial_overview(), "premium"))
    }));
    let quote = reference_quote("AAPL");
    conn.quote_fn = Some(Arc::new(move |_, _, _| {
        Ok(ProviderResponse::fresh(quote.clone(), "premium"))
    }));
    let mercato = service_with(conn).await;

    let _ = mercato.market_overview(&FetchOptions::default()).await;
    let health = mercato.system_health().await;
    assert!(health.healthy);
    assert!(health.factory.providers.contains_key("premium"));
    assert!(health.factory.available.contains(&"premium".to_string()));
    assert_eq!(health.factory.total_requests, 1);
    // The builder assembled the limiter from the registered budgets.
    let limits = health.rate_limits.get("premium").expect("limiter entry");
    assert_eq!(limits.limits[&RateWindow::Minute], 300);
}
