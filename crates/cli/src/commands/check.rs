use anyhow::{anyhow, Context, Result};
use sentinel_core::model::Identity;
use sentinel_core::portal::{Connector, HttpConnector, Navigator, PortalUrls};
use sentinel_core::render;

use crate::{normalize_fiscal_code, normalize_health_insurance_number};

/// Run one check for a single identity and print the result.
pub fn check_command(
    ulss: u8,
    fiscal_code: &str,
    health_insurance_number: &str,
    base_url: Option<String>,
) -> Result<()> {
    let fiscal_code = normalize_fiscal_code(fiscal_code)
        .ok_or_else(|| anyhow!("Invalid fiscal code: expected 16 alphanumeric characters"))?;
    let health_insurance_number = normalize_health_insurance_number(health_insurance_number)
        .ok_or_else(|| {
            anyhow!("Invalid health-insurance number: expected the card's last six digits")
        })?;

    let urls = match base_url {
        Some(base) => PortalUrls::new(base),
        None => PortalUrls::default(),
    };
    let identity = Identity::new(ulss, fiscal_code, health_insurance_number);

    let mut session = HttpConnector
        .open_session()
        .context("Failed to build the HTTP client")?;
    let report = Navigator::new(&mut session, &urls)
        .check(&identity)
        .context("Check against the portal failed")?;

    println!("Outcome: {}", report.outcome.as_str());

    let available = render::render(&report.available, 0);
    println!("Available locations:");
    println!("{}", if available.is_empty() { "  (none)" } else { available.as_str() });

    let unavailable = render::render(&report.unavailable, 0);
    println!("Unavailable locations:");
    println!("{}", if unavailable.is_empty() { "  (none)" } else { unavailable.as_str() });

    Ok(())
}
