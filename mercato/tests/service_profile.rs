mod helpers;

use std::sync::Arc;

use chrono::Utc;

use helpers::mock_connector::TestConnector;
use helpers::{fast_factory_config, provider_config};

use mercato::{FetchOptions, Mercato};
use mercato_core::{CompanyProfile, MercatoError, ProviderResponse, Symbol};
use mercato_types::{ProviderTier, QualityLevel};

fn profile(symbol: &Symbol) -> CompanyProfile {
    CompanyProfile {
        symbol: symbol.clone(),
        company_name: "Apple Inc.".to_string(),
        description: Some("Designs consumer electronics.".to_string()),
        industry: Some("Consumer Electronics".to_string()),
        sector: Some("Technology".to_string()),
        country: Some("US".to_string()),
        website: Some("https://www.apple.com".to_string()),
        market_cap: None,
        employees: Some(164_000),
        exchange: Some("NASDAQ".to_string()),
        currency: Some("USD".to_string()),
        ceo: Some("Timothy Cook".to_string()),
        founded: None,
        headquarters: Some("Cupertino, CA".to_string()),
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
async fn profile_envelope_carries_quality_without_anomaly_detection() {
    let mut conn = TestConnector::new("premium");
    conn.profile_fn = Some(Arc::new(|symbol| {
        Ok(ProviderResponse::fresh(profile(symbol), "premium"))
    }));
    let mercato = service_with(conn).await;

    let response = mercato.profile("AAPL", &FetchOptions::default()).await;
    assert!(response.success);
    assert_eq!(response.symbol, "AAPL");
    let data = response.data.expect("payload present");
    assert_eq!(data.company_name, "Apple Inc.");
    assert_eq!(data.employees, Some(164_000));
    // Profiles are not price-bearing: completeness only requires the symbol.
    assert!((response.data_quality.completeness_score - 100.0).abs() < f64::EPSILON);
    assert_eq!(response.data_quality.quality_level, QualityLevel::Excellent);
    // No anomaly pass runs for profiles.
    assert!(response.anomaly_detection.is_none());
    assert_eq!(response.provenance.primary_source, "premium");
}

#[tokio::test(start_paused = true)]
async fn unknown_symbols_surface_as_not_found_failures() {
    let mut conn = TestConnector::new("premium");
    conn.profile_fn = Some(Arc::new(|symbol| {
        Err(MercatoError::not_found(format!("profile for {symbol}")))
    }));
    let mercato = service_with(conn).await;

    let response = mercato.profile("ZZZQ", &FetchOptions::default()).await;
    assert!(!response.success);
    assert!(response.error.expect("error present").contains("not found"));
    assert_eq!(response.data_quality.quality_level, QualityLevel::Unreliable);

    // A miss does not damage the provider's health.
    let status = mercato.factory().factory_status();
    assert_eq!(status.providers["premium"].consecutive_failures, 0);
}
