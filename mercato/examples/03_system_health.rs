//! Inspect the composite health snapshot after a few requests.
//!
//! Run with: `cargo run --example 03_system_health`

use std::sync::Arc;

use mercato::{Mercato, QuoteOptions};
use mercato_core::AssetKind;
use mercato_mock::MockConnector;
use mercato_types::{ProviderConfig, ProviderTier};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mercato = Mercato::builder()
        .with_connector(
            ProviderConfig::new("mock", ProviderTier::Free),
            Arc::new(MockConnector::new()),
        )
        .build()?;
    mercato.initialize().await?;

    for symbol in ["AAPL", "MSFT", "ZZZQ"] {
        let response = mercato
            .quote(symbol, AssetKind::Equity, &QuoteOptions::default())
            .await;
        println!("{symbol}: success={}", response.success);
    }

    let health = mercato.system_health().await;
    println!("healthy:        {}", health.healthy);
    println!("available:      {:?}", health.factory.available);
    println!("total requests: {}", health.factory.total_requests);
    println!("failovers:      {}", health.factory.failover_count);
    for (name, stats) in &health.factory.providers {
        println!(
            "{name}: status={} ok={} failed={}",
            stats.status, stats.successful_requests, stats.failed_requests
        );
    }

    mercato.shutdown().await;
    Ok(())
}
