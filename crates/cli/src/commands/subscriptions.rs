use anyhow::{anyhow, Context, Result};
use chrono::DateTime;
use sentinel_core::db::WatchContext;

use crate::{canonicalize_or_current, normalize_fiscal_code, normalize_health_insurance_number};

/// Register a subscription in the watcher database.
pub fn add_command(
    home: &str,
    contact: &str,
    ulss: u8,
    fiscal_code: &str,
    health_insurance_number: &str,
) -> Result<()> {
    let fiscal_code = normalize_fiscal_code(fiscal_code)
        .ok_or_else(|| anyhow!("Invalid fiscal code: expected 16 alphanumeric characters"))?;
    let health_insurance_number = normalize_health_insurance_number(health_insurance_number)
        .ok_or_else(|| {
            anyhow!("Invalid health-insurance number: expected the card's last six digits")
        })?;

    let ctx = WatchContext::from_root(canonicalize_or_current(home)?)?;
    let id = ctx
        .db
        .insert(
            contact,
            Some(ulss),
            Some(fiscal_code.as_str()),
            Some(health_insurance_number.as_str()),
        )
        .context("Failed to insert subscription")?;

    println!("Added subscription:");
    println!("  Id: {}", id);
    println!("  Contact: {}", contact);
    println!("  ULSS: {}", ulss);
    println!("  Fiscal code: {}", fiscal_code);
    println!("  DB: {}", ctx.db_path.display());

    Ok(())
}

/// List all subscriptions registered in the watcher database.
pub fn list_command(home: &str, json: bool) -> Result<()> {
    let ctx = WatchContext::from_root(canonicalize_or_current(home)?)?;
    let subscriptions = ctx.db.list().context("Failed to list subscriptions")?;

    if json {
        let serialized = serde_json::to_string_pretty(&subscriptions)
            .context("Failed to serialize subscriptions to JSON")?;
        println!("{}", serialized);
        return Ok(());
    }

    println!("Subscriptions ({}):", subscriptions.len());
    if subscriptions.is_empty() {
        println!("  (none)");
        return Ok(());
    }

    for subscription in subscriptions {
        let ulss = subscription
            .ulss_id
            .map(|u| u.to_string())
            .unwrap_or_else(|| "-".to_string());
        let fiscal_code = subscription.fiscal_code.as_deref().unwrap_or("-");
        let last_check = subscription
            .last_check
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "  - {} [{}] ulss={} cf={} contact={} last_check={}",
            subscription.id,
            subscription.outcome.as_str(),
            ulss,
            fiscal_code,
            subscription.contact,
            last_check
        );
    }

    Ok(())
}

/// Delete a subscription by id.
pub fn remove_command(home: &str, id: i64) -> Result<()> {
    let ctx = WatchContext::from_root(canonicalize_or_current(home)?)?;
    let affected = ctx.db.delete(id).context("Failed to delete subscription")?;
    if affected == 0 {
        return Err(anyhow!("No subscription with id {id}"));
    }
    println!("Removed subscription {id}");
    Ok(())
}
