//! Fetch a single quality-scored quote from the fixture connector.
//!
//! Run with: `cargo run --example 01_simple_quote`

use std::sync::Arc;

use mercato::{Mercato, QuoteOptions};
use mercato_core::AssetKind;
use mercato_mock::MockConnector;
use mercato_types::{ProviderConfig, ProviderTier};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mercato = Mercato::builder()
        .with_connector(
            ProviderConfig::new("mock", ProviderTier::Free),
            Arc::new(MockConnector::new()),
        )
        .build()?;
    mercato.initialize().await?;

    let response = mercato
        .quote("AAPL", AssetKind::Equity, &QuoteOptions::default())
        .await;

    println!("success:   {}", response.success);
    if let Some(quote) = &response.data {
        println!("price:     {:?}", quote.price);
        println!("change %:  {:?}", quote.change_percent);
    }
    println!("quality:   {}", response.data_quality.quality_level);
    println!("source:    {}", response.provenance.primary_source);
    println!("elapsed:   {:.1}ms", response.provenance.processing_time_ms);

    mercato.shutdown().await;
    Ok(())
}
