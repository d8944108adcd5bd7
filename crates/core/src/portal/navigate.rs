//! Depth-bounded resolution of the portal's wizard tree.

use std::collections::BTreeMap;

use crate::model::{CheckReport, Identity, LocationTree, Outcome};

use super::classify::{classify, extract_branches};
use super::extract::extract_locations;
use super::{PortalError, PortalResult, PortalUrls, Session};

/// Hard ceiling on recursion into branch pages.
///
/// The remote structure is not trusted to terminate: a restructured portal
/// could otherwise walk the navigator through choice pages indefinitely.
const MAX_DEPTH: u32 = 5;

/// A wizard page to resolve: somewhere to go, or a body already in hand.
enum Page {
    Url(String),
    Body(String),
}

/// Drives one session through the portal wizard for one identity.
pub struct Navigator<'a, S: Session> {
    session: &'a mut S,
    urls: &'a PortalUrls,
}

impl<'a, S: Session> Navigator<'a, S> {
    pub fn new(session: &'a mut S, urls: &'a PortalUrls) -> Self {
        Self { session, urls }
    }

    /// Run the full wizard: acquire a cookie, submit the identity, classify
    /// the response, and resolve any follow-up pages into location trees.
    pub fn check(&mut self, identity: &Identity) -> PortalResult<CheckReport> {
        let ulss = identity.ulss_id;

        self.session.get(&self.urls.ulss_home(ulss))?;

        let body = self.session.post(
            &self.urls.submit_identity(ulss),
            &[
                ("cod_fiscale", identity.fiscal_code.as_str()),
                ("num_tessera", identity.health_insurance_number.as_str()),
            ],
        )?;

        match classify(&body, identity, self.urls) {
            Ok(classification) => {
                let (available, unavailable) = match classification.follow_up {
                    Some(url) => self.resolve(Page::Url(url), ulss, MAX_DEPTH)?,
                    None => (LocationTree::empty(), LocationTree::empty()),
                };
                Ok(CheckReport {
                    outcome: classification.outcome,
                    available,
                    unavailable,
                })
            }
            Err(err @ PortalError::UnknownPayload { .. }) => {
                self.entry_page_fallback(&body, ulss, err)
            }
            Err(err) => Err(err),
        }
    }

    /// At least one portal variant skips the entry classification step and
    /// answers the identity form with choice or location content directly.
    /// Try to read the page that way before giving up; accept only if a
    /// location entry was actually found, so genuinely unknown pages still
    /// fail loudly.
    fn entry_page_fallback(
        &mut self,
        body: &str,
        ulss: u8,
        original: PortalError,
    ) -> PortalResult<CheckReport> {
        let (available, unavailable) = self.resolve(Page::Body(body.to_string()), ulss, MAX_DEPTH)?;
        if !available.is_empty() || !unavailable.is_empty() {
            return Ok(CheckReport {
                outcome: Outcome::EligibleSpecial,
                available,
                unavailable,
            });
        }

        let (direct_available, direct_unavailable) = extract_locations(body);
        if !direct_available.is_empty() || !direct_unavailable.is_empty() {
            return Ok(CheckReport {
                outcome: Outcome::EligibleSpecial,
                available: LocationTree::List(direct_available),
                unavailable: LocationTree::List(direct_unavailable),
            });
        }

        Err(original)
    }

    /// Resolve one wizard page into (available, unavailable) trees.
    fn resolve(
        &mut self,
        page: Page,
        ulss: u8,
        depth: u32,
    ) -> PortalResult<(LocationTree, LocationTree)> {
        if depth == 0 {
            return Ok((LocationTree::empty(), LocationTree::empty()));
        }

        let (url, body) = match page {
            Page::Url(url) => {
                let body = self.session.post(&url, &[])?;
                (Some(url), body)
            }
            Page::Body(body) => (None, body),
        };

        // Location-selection pages are the leaves of the wizard.
        if url.as_deref().map_or(false, |u| u.contains("sceglisede")) {
            let (available, unavailable) = extract_locations(&body);
            return Ok((
                LocationTree::List(available),
                LocationTree::List(unavailable),
            ));
        }

        let mut available = BTreeMap::new();
        let mut unavailable = BTreeMap::new();
        for (branch_url, label) in extract_branches(&body, ulss, self.urls) {
            let (sub_available, sub_unavailable) =
                self.resolve(Page::Url(branch_url), ulss, depth - 1)?;
            if !sub_available.is_empty() {
                available.insert(label.clone(), sub_available);
            }
            if !sub_unavailable.is_empty() {
                unavailable.insert(label, sub_unavailable);
            }
        }

        Ok((collapse(available), collapse(unavailable)))
    }
}

/// A single branch under the empty label is the common redirect-only case;
/// unwrapping it keeps single-path identities rendering as flat lists
/// instead of a spurious one-key mapping.
fn collapse(mut branches: BTreeMap<String, LocationTree>) -> LocationTree {
    if branches.is_empty() {
        return LocationTree::empty();
    }
    if branches.len() == 1 {
        if let Some(tree) = branches.remove("") {
            return tree;
        }
    }
    LocationTree::Branches(branches)
}
