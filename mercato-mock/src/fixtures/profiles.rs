use chrono::Utc;

use mercato_core::{CompanyProfile, Symbol};

pub fn by_symbol(s: &str) -> Option<CompanyProfile> {
    match s {
        "AAPL" => Some(p(
            "AAPL",
            "Apple Inc.",
            "Consumer Electronics",
            "Technology",
            "Timothy Cook",
            "Cupertino, CA",
        )),
        "MSFT" => Some(p(
            "MSFT",
            "Microsoft Corp",
            "Software - Infrastructure",
            "Technology",
            "Satya Nadella",
            "Redmond, WA",
        )),
        _ => None,
    }
}

fn p(
    sym: &str,
    name: &str,
    industry: &str,
    sector: &str,
    ceo: &str,
    headquarters: &str,
) -> CompanyProfile {
    CompanyProfile {
        symbol: Symbol::parse(sym).expect("fixture symbol"),
        company_name: name.to_string(),
        description: Some(format!("{name} fixture profile.")),
        industry: Some(industry.to_string()),
        sector: Some(sector.to_string()),
        country: Some("US".to_string()),
        website: None,
        market_cap: None,
        employees: Some(100_000),
        exchange: Some("NASDAQ".to_string()),
        currency: Some("USD".to_string()),
        ceo: Some(ceo.to_string()),
        founded: None,
        headquarters: Some(headquarters.to_string()),
        last_updated: Utc::now(),
    }
}
