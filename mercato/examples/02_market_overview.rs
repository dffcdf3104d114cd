//! Aggregate a market overview and inspect per-category results.
//!
//! Run with: `cargo run --example 02_market_overview`

use std::sync::Arc;

use mercato::{FetchOptions, Mercato};
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

    let response = mercato.market_overview(&FetchOptions::default()).await;
    if let Some(overview) = &response.data {
        println!("indices:     {}", overview.indices.len());
        println!("crypto:      {}", overview.crypto.len());
        println!("commodities: {}", overview.commodities.len());
        println!("forex:       {}", overview.forex.len());
        for (exchange, state) in &overview.market_status {
            println!("{exchange}: {state}");
        }
    }
    for warning in &response.warnings {
        println!("warning: {warning}");
    }

    mercato.shutdown().await;
    Ok(())
}
