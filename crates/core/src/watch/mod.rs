//! Polling scheduler and change notification.
//!
//! One `Watcher` pass selects every due subscription, shuffles them, and
//! checks each in turn over a fresh portal session. Results are persisted
//! after every successful check; a notification goes out only when the set
//! of bookable locations changed and is non-empty, so an identity quietly
//! losing all its slots stays quiet.

use std::path::PathBuf;

use rand::seq::SliceRandom;
use sha2::{Digest, Sha256};

use crate::db::{StoreResult, SubscriptionDb, SubscriptionRecord};
use crate::model::{CheckReport, Identity, LocationTree, Outcome};
use crate::portal::{Connector, Navigator, PortalError, PortalResult, PortalUrls};
use crate::render;

/// Attempts per scheduled check before a transport failure is given up on
/// for the cycle. The subscription keeps its stored state and is retried
/// next cycle.
const MAX_ATTEMPTS: u32 = 3;

/// Byte budget for one outbound rendering.
const MESSAGE_LIMIT: usize = 1024;

/// Seconds after which an outcome is due for a re-check, or `None` for
/// outcomes that are never automatically revisited.
pub fn recheck_interval(outcome: Outcome) -> Option<i64> {
    match outcome {
        Outcome::Eligible | Outcome::EligibleSpecial => Some(30 * 60),
        Outcome::NotEligible => Some(4 * 60 * 60),
        Outcome::AlreadyBooked => Some(24 * 60 * 60),
        // Rows that never completed a check are picked up right away.
        Outcome::Unknown => Some(0),
        Outcome::NotRegistered
        | Outcome::WrongHealthInsuranceNumber
        | Outcome::AlreadyVaccinated => None,
    }
}

/// Whether a subscription is due at `now`.
///
/// Strictly greater-than: a row checked exactly one interval ago waits for
/// the next cycle. Never-checked rows are always due.
pub fn is_due(outcome: Outcome, last_check: Option<i64>, now: i64) -> bool {
    let Some(last) = last_check else {
        return true;
    };
    match recheck_interval(outcome) {
        Some(interval) => now - last > interval,
        None => false,
    }
}

/// Outbound decision surface. Transports (chat, console) live behind this;
/// the watcher only decides *that* something should be said.
pub trait Notifier {
    /// The set of bookable locations changed and is non-empty.
    fn locations_changed(
        &mut self,
        subscription: &SubscriptionRecord,
        outcome: Outcome,
        rendered: &str,
    );

    /// The wizard hit an outcome it cannot progress past. Emitted once, on
    /// the transition into it.
    fn outcome_settled(&mut self, subscription: &SubscriptionRecord, outcome: Outcome);

    /// Something needs human eyes: transport exhaustion or an unrecognized
    /// page.
    fn operator_alert(&mut self, context: &str, detail: &str);
}

/// Tallies for one polling cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleStats {
    /// Subscriptions that were due this cycle.
    pub selected: usize,
    /// Checks that completed (successfully classified).
    pub checked: usize,
    /// User notifications emitted.
    pub notified: usize,
    /// Checks abandoned after exhausting transport retries.
    pub transport_failures: usize,
    /// Checks abandoned on an unrecognized page.
    pub unknown_pages: usize,
}

/// Sequentially polls due subscriptions against the portal.
pub struct Watcher<'a, C: Connector, N: Notifier> {
    db: &'a SubscriptionDb,
    connector: &'a C,
    urls: PortalUrls,
    notifier: &'a mut N,
    /// Where unrecognized pages are dumped for diagnosis, if anywhere.
    reports_dir: Option<PathBuf>,
}

impl<'a, C: Connector, N: Notifier> Watcher<'a, C, N> {
    pub fn new(
        db: &'a SubscriptionDb,
        connector: &'a C,
        urls: PortalUrls,
        notifier: &'a mut N,
    ) -> Self {
        Self {
            db,
            connector,
            urls,
            notifier,
            reports_dir: None,
        }
    }

    /// Dump unrecognized portal pages under `dir`, named by content hash.
    pub fn with_reports_dir(mut self, dir: PathBuf) -> Self {
        self.reports_dir = Some(dir);
        self
    }

    /// Run one cycle: select due subscriptions, shuffle, check each in
    /// turn.
    ///
    /// Shuffling avoids biasing portal load and notification latency by
    /// insertion order. Checks run strictly sequentially so the portal sees
    /// a bounded request rate and never two concurrent sessions for the
    /// same identity.
    pub fn run_cycle(&mut self, now: i64) -> StoreResult<CycleStats> {
        let mut due: Vec<SubscriptionRecord> = self
            .db
            .select_checkable()?
            .into_iter()
            .filter(|s| is_due(s.outcome, s.last_check, now))
            .collect();
        due.shuffle(&mut rand::thread_rng());

        let mut stats = CycleStats {
            selected: due.len(),
            ..CycleStats::default()
        };
        for subscription in &due {
            self.check_one(subscription, now, &mut stats)?;
        }
        Ok(stats)
    }

    fn check_one(
        &mut self,
        subscription: &SubscriptionRecord,
        now: i64,
        stats: &mut CycleStats,
    ) -> StoreResult<()> {
        // select_checkable already filters incomplete rows.
        let Some(identity) = subscription.identity() else {
            return Ok(());
        };

        let report = match self.run_check(&identity) {
            Ok(report) => report,
            Err(err) if err.is_transient() => {
                stats.transport_failures += 1;
                self.db.record_event("http-error", Some(identity.ulss_id))?;
                tracing::error!(
                    subscription = subscription.id,
                    ulss = identity.ulss_id,
                    error = %err,
                    "transport failure, giving up for this cycle"
                );
                self.notifier.operator_alert(
                    "transport failure",
                    &format!(
                        "subscription {} on ULSS {}: {}",
                        subscription.id, identity.ulss_id, err
                    ),
                );
                return Ok(());
            }
            Err(err) => {
                // Unrecognized page: report with full context and leave the
                // row untouched so the next cycle retries naturally.
                stats.unknown_pages += 1;
                self.db
                    .record_event("application-error", Some(identity.ulss_id))?;
                let dump = self.dump_unknown_page(&err);
                tracing::error!(
                    subscription = subscription.id,
                    ulss = identity.ulss_id,
                    error = %err,
                    "unrecognized portal page"
                );
                let mut detail = format!(
                    "subscription {} on ULSS {}: {}",
                    subscription.id, identity.ulss_id, err
                );
                if let Some(path) = dump {
                    detail.push_str(&format!(" (page saved to {})", path.display()));
                }
                self.notifier.operator_alert("unrecognized portal page", &detail);
                return Ok(());
            }
        };
        stats.checked += 1;

        let old_tree: LocationTree =
            serde_json::from_str(&subscription.locations).unwrap_or_default();
        let should_notify =
            render::changed(&old_tree, &report.available) && !report.available.is_empty();

        if should_notify {
            stats.notified += 1;
            self.db.record_event("notification", Some(identity.ulss_id))?;
            let rendered = render::render_limited(&report.available, 0, MESSAGE_LIMIT);
            self.notifier
                .locations_changed(subscription, report.outcome, &rendered);
        }
        if report.outcome != subscription.outcome && report.outcome.is_settled() {
            self.notifier.outcome_settled(subscription, report.outcome);
        }

        let locations_json = serde_json::to_string(&report.available)
            .expect("location trees always serialize");
        self.db
            .record_check(subscription.id, report.outcome, &locations_json, now)?;

        tracing::info!(
            subscription = subscription.id,
            ulss = identity.ulss_id,
            outcome = report.outcome.as_str(),
            notified = should_notify,
            "check complete"
        );
        Ok(())
    }

    /// One scheduled check: a fresh session per attempt, retrying transient
    /// transport failures up to [`MAX_ATTEMPTS`] times.
    fn run_check(&self, identity: &Identity) -> PortalResult<CheckReport> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self.connector.open_session().and_then(|mut session| {
                Navigator::new(&mut session, &self.urls).check(identity)
            });
            match result {
                Err(err) if err.is_transient() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(attempt, error = %err, "transient portal failure, retrying");
                }
                other => return other,
            }
        }
    }

    fn dump_unknown_page(&self, err: &PortalError) -> Option<PathBuf> {
        let PortalError::UnknownPayload { body, .. } = err else {
            return None;
        };
        let dir = self.reports_dir.as_ref()?;
        if let Err(err) = std::fs::create_dir_all(dir) {
            tracing::warn!(error = %err, "failed to create reports dir");
            return None;
        }

        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        let path = dir.join(format!("page-{}.html", &digest[..16]));

        match std::fs::write(&path, body) {
            Ok(()) => Some(path),
            Err(err) => {
                tracing::warn!(error = %err, "failed to write page dump");
                None
            }
        }
    }
}
