use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use sentinel_core::db::{SubscriptionRecord, WatchContext};
use sentinel_core::model::Outcome;
use sentinel_core::portal::{HttpConnector, PortalUrls};
use sentinel_core::watch::{Notifier, Watcher};

use crate::canonicalize_or_current;

/// Console notifier: prints what a chat transport would deliver and routes
/// operator alerts to the log.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn locations_changed(
        &mut self,
        subscription: &SubscriptionRecord,
        outcome: Outcome,
        rendered: &str,
    ) {
        println!(
            "[{}] locations changed ({}):",
            subscription.contact,
            outcome.as_str()
        );
        println!("{rendered}");
    }

    fn outcome_settled(&mut self, subscription: &SubscriptionRecord, outcome: Outcome) {
        println!(
            "[{}] outcome settled: {}",
            subscription.contact,
            outcome.as_str()
        );
    }

    fn operator_alert(&mut self, context: &str, detail: &str) {
        tracing::error!(context, detail, "operator alert");
    }
}

/// Run the polling loop: one cycle, a fixed sleep, repeat.
pub fn watch_command(home: &str, cycles: Option<u64>) -> Result<()> {
    let ctx = WatchContext::from_root(canonicalize_or_current(home)?)?;
    let urls = PortalUrls::new(&ctx.config.base_url);
    let connector = HttpConnector;
    let mut notifier = ConsoleNotifier;
    let mut watcher = Watcher::new(&ctx.db, &connector, urls, &mut notifier)
        .with_reports_dir(ctx.layout.reports_dir.clone());

    let pause = Duration::from_secs(ctx.config.cycle_seconds);
    tracing::info!(
        db = %ctx.db_path.display(),
        portal = %ctx.config.base_url,
        every_seconds = ctx.config.cycle_seconds,
        "watching"
    );

    let mut completed: u64 = 0;
    loop {
        let now = Utc::now().timestamp();
        let stats = watcher.run_cycle(now).context("Polling cycle failed")?;
        if stats.selected > 0 {
            tracing::info!(
                selected = stats.selected,
                checked = stats.checked,
                notified = stats.notified,
                transport_failures = stats.transport_failures,
                unknown_pages = stats.unknown_pages,
                "cycle complete"
            );
        }

        completed += 1;
        if let Some(limit) = cycles {
            if completed >= limit {
                break;
            }
        }
        thread::sleep(pause);
    }

    Ok(())
}
