//! Response-page classification.
//!
//! The portal's pages carry no machine-readable markers, so classification
//! is exact-substring matching against known Italian phrases plus a pair of
//! script-call patterns. Those phrases are the de facto wire contract with
//! the portal: when none of them matches, the page is reported as unknown
//! instead of guessed at.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::model::{Identity, Outcome};

use super::{PortalError, PortalResult, PortalUrls};

/// Redirect to step 2 carrying a service id. The portal pads the script
/// call with spaces inconsistently, so the body is matched with internal
/// spaces stripped.
static SERVICE_REDIRECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"act_step\(2,(\d+)").expect("service redirect pattern"));

/// Complete `act_step(2,<id>)` call, as found on service buttons.
static SERVICE_BUTTON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"act_step\(2,(\d+)\)").expect("service button pattern"));

/// `inviacf(<id>)` call, as found on cohort self-certification buttons.
static COHORT_BUTTON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"inviacf\((\d+)\)").expect("cohort button pattern"));

/// Outcome plus the page to fetch next, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub outcome: Outcome,
    /// `None` for terminal outcomes; otherwise the service location page or
    /// the cohort chooser.
    pub follow_up: Option<String>,
}

/// Where a marker rule sends the navigator next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextPage {
    Terminal,
    CohortChooser,
}

/// One row of the classification table: every entry of `required` must
/// match, where an entry matches if any of its alternative spellings is a
/// substring of the body. Alternatives exist because the portal emits some
/// phrases both HTML-entity-encoded and decoded.
struct MarkerRule {
    outcome: Outcome,
    required: &'static [&'static [&'static str]],
    next: NextPage,
}

const NOT_REGISTERED_MARKER: &[&str] =
    &["codice fiscale inserito non risulta tra quelli registrati presso questa ULSS"];

const WRONG_NUMBER_MARKER: &[&str] =
    &["Il numero tessera non risulta valido per il codice fiscale indicato"];

const ALREADY_VACCINATED_MARKER: &[&str] = &[
    "Per il codice fiscale inserito &egrave; gi&agrave; iniziato il percorso vaccinale",
    "Per il codice fiscale inserito è già iniziato il percorso vaccinale",
];

const ALREADY_BOOKED_MARKER: &[&str] = &[
    "Per il codice fiscale inserito &egrave; gi&agrave; registrata una prenotazione",
    "Per il codice fiscale inserito è già registrata una prenotazione",
];

const OUTSIDE_CATEGORIES_MARKER: &[&str] =
    &["Attenzione non appartieni alle categorie che attualmente possono prenotare"];

const COHORT_AFFORDANCE_MARKER: &[&str] = &["javascript:sceglicorte()"];

/// Back-to-start control; the ineligibility page without a cohort
/// affordance carries only this.
const BACK_TO_START_MARKER: &[&str] = &["act_step(1)"];

/// Rules 2–7 of the classification table, in priority order. Rule 1 (the
/// service redirect) needs a regex and is handled inline in [`classify`];
/// rule 8 is the fall-through failure.
const MARKER_RULES: &[MarkerRule] = &[
    MarkerRule {
        outcome: Outcome::NotRegistered,
        required: &[NOT_REGISTERED_MARKER],
        next: NextPage::Terminal,
    },
    MarkerRule {
        outcome: Outcome::WrongHealthInsuranceNumber,
        required: &[WRONG_NUMBER_MARKER],
        next: NextPage::Terminal,
    },
    MarkerRule {
        outcome: Outcome::AlreadyVaccinated,
        required: &[ALREADY_VACCINATED_MARKER],
        next: NextPage::Terminal,
    },
    MarkerRule {
        outcome: Outcome::AlreadyBooked,
        required: &[ALREADY_BOOKED_MARKER],
        next: NextPage::Terminal,
    },
    MarkerRule {
        outcome: Outcome::EligibleSpecial,
        required: &[OUTSIDE_CATEGORIES_MARKER, COHORT_AFFORDANCE_MARKER],
        next: NextPage::CohortChooser,
    },
    MarkerRule {
        outcome: Outcome::NotEligible,
        required: &[OUTSIDE_CATEGORIES_MARKER, BACK_TO_START_MARKER],
        next: NextPage::Terminal,
    },
];

/// Classify the response to an identity submission.
///
/// Rules apply in a fixed priority order and the first match wins, because
/// pages legitimately contain text that would satisfy a later rule as
/// incidental copy. A page matching no rule is an `UnknownPayload` error
/// carrying the body and the identity, never a silent outcome.
pub fn classify(
    body: &str,
    identity: &Identity,
    urls: &PortalUrls,
) -> PortalResult<Classification> {
    // Rule 1: exactly one act_step(2,<id> call means the identity went
    // straight through to a service.
    let stripped = body.replace(' ', "");
    let service_ids: Vec<String> = SERVICE_REDIRECT
        .captures_iter(&stripped)
        .map(|caps| caps[1].to_string())
        .collect();
    if service_ids.len() == 1 {
        return Ok(Classification {
            outcome: Outcome::Eligible,
            follow_up: Some(urls.select_service(identity.ulss_id, &service_ids[0])),
        });
    }

    for rule in MARKER_RULES {
        let matched = rule
            .required
            .iter()
            .all(|alternatives| alternatives.iter().any(|marker| body.contains(marker)));
        if matched {
            let follow_up = match rule.next {
                NextPage::Terminal => None,
                NextPage::CohortChooser => Some(urls.cohort_chooser(identity.ulss_id)),
            };
            return Ok(Classification {
                outcome: rule.outcome,
                follow_up,
            });
        }
    }

    Err(PortalError::UnknownPayload {
        body: body.to_string(),
        fiscal_code: identity.fiscal_code.clone(),
        ulss_id: identity.ulss_id,
    })
}

/// Collect every navigable affordance on a choice page, in page order.
///
/// Three kinds merge into one list: a leading redirect script (empty
/// label), service buttons (`act_step(2,<id>)`), and cohort
/// self-certification buttons (`inviacf(<id>)`). URLs are built
/// deterministically from the ULSS and the captured numeric id, so the
/// resulting trees compare stably across runs.
pub fn extract_branches(body: &str, ulss_id: u8, urls: &PortalUrls) -> Vec<(String, String)> {
    let mut branches = Vec::new();

    let stripped = body.replace(' ', "");
    if stripped.starts_with("<script>act_step(2,") {
        if let Some(caps) = SERVICE_BUTTON.captures(&stripped) {
            branches.push((
                urls.select_service(ulss_id, &caps[1]),
                String::new(),
            ));
        }
    }

    let document = Html::parse_document(body);
    let Ok(buttons) = Selector::parse("button") else {
        return branches;
    };

    for button in document.select(&buttons) {
        let onclick = button.value().attr("onclick").unwrap_or("").replace(' ', "");
        if let Some(caps) = SERVICE_BUTTON.captures(&onclick) {
            branches.push((
                urls.select_service(ulss_id, &caps[1]),
                button.text().collect(),
            ));
        }
    }

    for button in document.select(&buttons) {
        let onclick = button.value().attr("onclick").unwrap_or("").replace(' ', "");
        if let Some(caps) = COHORT_BUTTON.captures(&onclick) {
            branches.push((
                urls.select_cohort(ulss_id, &caps[1]),
                button.text().collect(),
            ));
        }
    }

    branches
}
