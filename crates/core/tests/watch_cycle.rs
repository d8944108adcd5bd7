use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use tempfile::tempdir;

use sentinel_core::db::{SubscriptionDb, SubscriptionRecord};
use sentinel_core::model::Outcome;
use sentinel_core::portal::{Connector, PortalError, PortalResult, PortalUrls, Session};
use sentinel_core::watch::{is_due, recheck_interval, Notifier, Watcher};

/// Portal double: canned pages by URL, with an optional budget of requests
/// that fail with a 503 before the portal "recovers". Sessions share the
/// budget so retries across fresh sessions observe the recovery.
#[derive(Default, Clone)]
struct StubPortal {
    pages: HashMap<String, String>,
    failing_requests: Rc<Cell<u32>>,
}

impl StubPortal {
    fn new() -> Self {
        Self::default()
    }

    fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    fn failing(self, requests: u32) -> Self {
        self.failing_requests.set(requests);
        self
    }
}

impl Connector for StubPortal {
    type Session = StubSession;

    fn open_session(&self) -> PortalResult<StubSession> {
        Ok(StubSession {
            pages: self.pages.clone(),
            failing_requests: Rc::clone(&self.failing_requests),
        })
    }
}

struct StubSession {
    pages: HashMap<String, String>,
    failing_requests: Rc<Cell<u32>>,
}

impl StubSession {
    fn fetch(&mut self, url: &str) -> PortalResult<String> {
        let remaining = self.failing_requests.get();
        if remaining > 0 {
            self.failing_requests.set(remaining - 1);
            return Err(PortalError::Status(503));
        }
        Ok(self.pages.get(url).cloned().unwrap_or_default())
    }
}

impl Session for StubSession {
    fn get(&mut self, url: &str) -> PortalResult<String> {
        self.fetch(url)
    }

    fn post(&mut self, url: &str, _form: &[(&str, &str)]) -> PortalResult<String> {
        self.fetch(url)
    }
}

#[derive(Default)]
struct RecordingNotifier {
    location_changes: Vec<(i64, Outcome, String)>,
    settled: Vec<(i64, Outcome)>,
    alerts: Vec<String>,
}

impl Notifier for RecordingNotifier {
    fn locations_changed(
        &mut self,
        subscription: &SubscriptionRecord,
        outcome: Outcome,
        rendered: &str,
    ) {
        self.location_changes
            .push((subscription.id, outcome, rendered.to_string()));
    }

    fn outcome_settled(&mut self, subscription: &SubscriptionRecord, outcome: Outcome) {
        self.settled.push((subscription.id, outcome));
    }

    fn operator_alert(&mut self, context: &str, _detail: &str) {
        self.alerts.push(context.to_string());
    }
}

const ALREADY_BOOKED_PAGE: &str =
    "Per il codice fiscale inserito &egrave; gi&agrave; registrata una prenotazione.";

fn store_with_subscription() -> (SubscriptionDb, i64) {
    let db = SubscriptionDb::open_in_memory().expect("open store");
    let id = db
        .insert("chat:1", Some(0), Some("XXXXXXXXXXXXXXXX"), Some("123456"))
        .expect("insert");
    (db, id)
}

fn eligible_portal(open_location: bool) -> StubPortal {
    let urls = PortalUrls::default();
    let location_page = if open_location {
        r#"<button type="button">Dolo PALAZZETTO</button> <button disabled type="button">Mirano  [ESAURITA]</button>"#
    } else {
        r#"<button disabled type="button">Dolo PALAZZETTO  [ESAURITA]</button> <button disabled type="button">Mirano  [ESAURITA]</button>"#
    };
    StubPortal::new()
        .page(&urls.submit_identity(0), "<script>act_step(2,178)</script> ")
        .page(&urls.select_service(0, "178"), location_page)
}

#[test]
fn due_test_is_strictly_greater_than_the_interval() {
    let now = 10_000_000;
    let interval = recheck_interval(Outcome::Eligible).expect("eligible interval");
    assert_eq!(interval, 30 * 60);

    assert!(!is_due(Outcome::Eligible, Some(now - interval + 1), now));
    assert!(!is_due(Outcome::Eligible, Some(now - interval), now));
    assert!(is_due(Outcome::Eligible, Some(now - interval - 1), now));
}

#[test]
fn never_checked_rows_are_always_due() {
    assert!(is_due(Outcome::Unknown, None, 0));
    assert!(is_due(Outcome::Eligible, None, 0));
    assert!(is_due(Outcome::AlreadyVaccinated, None, 0));
}

#[test]
fn outcomes_without_an_interval_are_never_rechecked() {
    let now = 10_000_000;
    assert!(!is_due(Outcome::AlreadyVaccinated, Some(0), now));
    assert!(!is_due(Outcome::NotRegistered, Some(0), now));
    assert!(!is_due(Outcome::WrongHealthInsuranceNumber, Some(0), now));
    assert_eq!(recheck_interval(Outcome::AlreadyVaccinated), None);
}

#[test]
fn interval_table_matches_the_watch_policy() {
    assert_eq!(recheck_interval(Outcome::EligibleSpecial), Some(30 * 60));
    assert_eq!(recheck_interval(Outcome::NotEligible), Some(4 * 60 * 60));
    assert_eq!(recheck_interval(Outcome::AlreadyBooked), Some(24 * 60 * 60));
    assert_eq!(recheck_interval(Outcome::Unknown), Some(0));
}

#[test]
fn first_check_notifies_and_persists() {
    let (db, id) = store_with_subscription();
    let portal = eligible_portal(true);
    let mut notifier = RecordingNotifier::default();
    let now = 1_620_000_000;

    let stats = Watcher::new(&db, &portal, PortalUrls::default(), &mut notifier)
        .run_cycle(now)
        .expect("cycle");

    assert_eq!(stats.selected, 1);
    assert_eq!(stats.checked, 1);
    assert_eq!(stats.notified, 1);
    assert_eq!(stats.transport_failures, 0);
    assert_eq!(stats.unknown_pages, 0);

    assert_eq!(notifier.location_changes.len(), 1);
    let (notified_id, outcome, rendered) = &notifier.location_changes[0];
    assert_eq!(*notified_id, id);
    assert_eq!(*outcome, Outcome::Eligible);
    assert!(rendered.contains("- Dolo PALAZZETTO"));

    let row = db.by_id(id).expect("by_id").expect("row");
    assert_eq!(row.outcome, Outcome::Eligible);
    assert_eq!(row.last_check, Some(now));
    assert!(row.locations.contains("Dolo PALAZZETTO"));
    assert_eq!(db.count_events("notification").expect("count"), 1);
}

#[test]
fn unchanged_locations_stay_silent() {
    let (db, id) = store_with_subscription();
    let now = 1_620_000_000;

    let mut first = RecordingNotifier::default();
    let portal = eligible_portal(true);
    Watcher::new(&db, &portal, PortalUrls::default(), &mut first)
        .run_cycle(now)
        .expect("first cycle");

    // Same portal answer half an hour and a second later: due again, but
    // nothing new to say.
    let mut second = RecordingNotifier::default();
    let portal = eligible_portal(true);
    let stats = Watcher::new(&db, &portal, PortalUrls::default(), &mut second)
        .run_cycle(now + 30 * 60 + 1)
        .expect("second cycle");

    assert_eq!(stats.checked, 1);
    assert_eq!(stats.notified, 0);
    assert!(second.location_changes.is_empty());

    let row = db.by_id(id).expect("by_id").expect("row");
    assert_eq!(row.last_check, Some(now + 30 * 60 + 1));
}

#[test]
fn losing_every_slot_is_not_reported() {
    let (db, id) = store_with_subscription();
    let now = 1_620_000_000;

    let mut first = RecordingNotifier::default();
    let portal = eligible_portal(true);
    Watcher::new(&db, &portal, PortalUrls::default(), &mut first)
        .run_cycle(now)
        .expect("first cycle");

    let mut second = RecordingNotifier::default();
    let portal = eligible_portal(false);
    let stats = Watcher::new(&db, &portal, PortalUrls::default(), &mut second)
        .run_cycle(now + 30 * 60 + 1)
        .expect("second cycle");

    // The rendering changed (slots vanished) but the available set is
    // empty, so nobody is woken up; the baseline still advances.
    assert_eq!(stats.notified, 0);
    assert!(second.location_changes.is_empty());
    let row = db.by_id(id).expect("by_id").expect("row");
    assert_eq!(row.locations, "[]");
}

#[test]
fn transport_exhaustion_leaves_the_row_untouched() {
    let (db, id) = store_with_subscription();
    let portal = eligible_portal(true).failing(1000);
    let mut notifier = RecordingNotifier::default();

    let stats = Watcher::new(&db, &portal, PortalUrls::default(), &mut notifier)
        .run_cycle(1_620_000_000)
        .expect("cycle");

    assert_eq!(stats.selected, 1);
    assert_eq!(stats.checked, 0);
    assert_eq!(stats.transport_failures, 1);
    assert_eq!(notifier.alerts, vec!["transport failure"]);

    let row = db.by_id(id).expect("by_id").expect("row");
    assert_eq!(row.outcome, Outcome::Unknown);
    assert_eq!(row.last_check, None);
    assert_eq!(db.count_events("http-error").expect("count"), 1);
}

#[test]
fn transient_failures_are_retried_within_one_check() {
    let (db, id) = store_with_subscription();
    // The first two requests fail; the third attempt gets through.
    let portal = eligible_portal(true).failing(2);
    let mut notifier = RecordingNotifier::default();

    let stats = Watcher::new(&db, &portal, PortalUrls::default(), &mut notifier)
        .run_cycle(1_620_000_000)
        .expect("cycle");

    assert_eq!(stats.checked, 1);
    assert_eq!(stats.transport_failures, 0);
    assert!(notifier.alerts.is_empty());
    assert_eq!(
        db.by_id(id).expect("by_id").expect("row").outcome,
        Outcome::Eligible
    );
}

#[test]
fn unrecognized_pages_alert_the_operator_and_change_nothing() {
    let (db, id) = store_with_subscription();
    let urls = PortalUrls::default();
    let body = "<html><body>Pagina completamente nuova</body></html>";
    let portal = StubPortal::new().page(&urls.submit_identity(0), body);
    let mut notifier = RecordingNotifier::default();
    let reports = tempdir().expect("tempdir");

    let stats = Watcher::new(&db, &portal, PortalUrls::default(), &mut notifier)
        .with_reports_dir(reports.path().to_path_buf())
        .run_cycle(1_620_000_000)
        .expect("cycle");

    assert_eq!(stats.checked, 0);
    assert_eq!(stats.unknown_pages, 1);
    assert_eq!(notifier.alerts, vec!["unrecognized portal page"]);

    // The row is untouched so the next cycle retries naturally.
    let row = db.by_id(id).expect("by_id").expect("row");
    assert_eq!(row.outcome, Outcome::Unknown);
    assert_eq!(row.last_check, None);
    assert_eq!(db.count_events("application-error").expect("count"), 1);

    // The offending page was dumped for diagnosis.
    let dumps: Vec<_> = std::fs::read_dir(reports.path())
        .expect("read reports dir")
        .map(|entry| entry.expect("entry").path())
        .collect();
    assert_eq!(dumps.len(), 1);
    let dumped = std::fs::read_to_string(&dumps[0]).expect("read dump");
    assert_eq!(dumped, body);
}

#[test]
fn settling_outcomes_notify_once_on_the_transition() {
    let (db, id) = store_with_subscription();
    let urls = PortalUrls::default();
    let now = 1_620_000_000;

    let portal = StubPortal::new().page(&urls.submit_identity(0), ALREADY_BOOKED_PAGE);
    let mut first = RecordingNotifier::default();
    Watcher::new(&db, &portal, PortalUrls::default(), &mut first)
        .run_cycle(now)
        .expect("first cycle");
    assert_eq!(first.settled, vec![(id, Outcome::AlreadyBooked)]);

    // A day later the booking still exists: due again, no new transition.
    let portal = StubPortal::new().page(&urls.submit_identity(0), ALREADY_BOOKED_PAGE);
    let mut second = RecordingNotifier::default();
    let stats = Watcher::new(&db, &portal, PortalUrls::default(), &mut second)
        .run_cycle(now + 24 * 60 * 60 + 1)
        .expect("second cycle");
    assert_eq!(stats.checked, 1);
    assert!(second.settled.is_empty());
}

#[test]
fn incomplete_subscriptions_never_reach_the_portal() {
    let db = SubscriptionDb::open_in_memory().expect("open store");
    db.insert("chat:9", Some(0), None, None).expect("insert");
    let portal = StubPortal::new();
    let mut notifier = RecordingNotifier::default();

    let stats = Watcher::new(&db, &portal, PortalUrls::default(), &mut notifier)
        .run_cycle(1_620_000_000)
        .expect("cycle");

    assert_eq!(stats.selected, 0);
    assert!(notifier.alerts.is_empty());
}
