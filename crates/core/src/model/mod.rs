//! Core data model: identities, check outcomes, and location trees.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The credential tuple addressing one person's booking eligibility on one
/// regional health unit's portal.
///
/// Field formats are validated at the frontend boundary before an identity
/// reaches the core; everything here treats the strings as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Regional health unit number (one portal instance per unit).
    pub ulss_id: u8,
    pub fiscal_code: String,
    /// Last six digits of the health-insurance card.
    pub health_insurance_number: String,
}

impl Identity {
    pub fn new(
        ulss_id: u8,
        fiscal_code: impl Into<String>,
        health_insurance_number: impl Into<String>,
    ) -> Self {
        Self {
            ulss_id,
            fiscal_code: fiscal_code.into(),
            health_insurance_number: health_insurance_number.into(),
        }
    }
}

/// Terminal classification of one full wizard run for one identity.
///
/// Classification is total over recognized pages: a page matching no rule is
/// an error (`PortalError::UnknownPayload`), never an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The identity can book; the portal redirected straight to a service.
    Eligible,
    /// Booking is possible only through a self-certified cohort.
    EligibleSpecial,
    /// Outside the categories that can currently book.
    NotEligible,
    /// The fiscal code is not registered with this health unit.
    NotRegistered,
    /// The insurance number does not match the fiscal code.
    WrongHealthInsuranceNumber,
    /// Vaccination already started for this identity.
    AlreadyVaccinated,
    /// A booking already exists for this identity.
    AlreadyBooked,
    /// No check completed yet.
    Unknown,
}

impl Outcome {
    /// Stable string form used in the subscription store.
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Eligible => "eligible",
            Outcome::EligibleSpecial => "eligible_special",
            Outcome::NotEligible => "not_eligible",
            Outcome::NotRegistered => "not_registered",
            Outcome::WrongHealthInsuranceNumber => "wrong_health_insurance_number",
            Outcome::AlreadyVaccinated => "already_vaccinated",
            Outcome::AlreadyBooked => "already_booked",
            Outcome::Unknown => "unknown",
        }
    }

    /// Parse the stored string form.
    ///
    /// Unrecognized values degrade to `Unknown` so rows written under a
    /// newer or older vocabulary never wedge the scheduler.
    pub fn parse(s: &str) -> Self {
        match s {
            "eligible" => Outcome::Eligible,
            "eligible_special" | "maybe_eligible" => Outcome::EligibleSpecial,
            "not_eligible" => Outcome::NotEligible,
            "not_registered" => Outcome::NotRegistered,
            "wrong_health_insurance_number" => Outcome::WrongHealthInsuranceNumber,
            "already_vaccinated" => Outcome::AlreadyVaccinated,
            "already_booked" => Outcome::AlreadyBooked,
            _ => Outcome::Unknown,
        }
    }

    /// Outcomes the wizard cannot progress past: a human has to act, or
    /// there is nothing left to do for this identity.
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            Outcome::NotRegistered
                | Outcome::WrongHealthInsuranceNumber
                | Outcome::AlreadyVaccinated
                | Outcome::AlreadyBooked
        )
    }
}

/// Nested venue data discovered under one identity.
///
/// Either a flat ordered list of location names, or a mapping from a
/// cohort/service label to a nested subtree. Serialized untagged so the
/// stored JSON is a plain array or object, matching what earlier
/// deployments of the watcher wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocationTree {
    List(Vec<String>),
    Branches(BTreeMap<String, LocationTree>),
}

impl LocationTree {
    /// Canonical empty tree.
    pub fn empty() -> Self {
        LocationTree::List(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            LocationTree::List(names) => names.is_empty(),
            LocationTree::Branches(branches) => branches.is_empty(),
        }
    }
}

impl Default for LocationTree {
    fn default() -> Self {
        Self::empty()
    }
}

/// Result of one full wizard run: the outcome plus the location trees
/// reachable under the identity, split into available and unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub outcome: Outcome,
    pub available: LocationTree,
    pub unavailable: LocationTree,
}

impl CheckReport {
    /// A report with no location data, for terminal outcomes.
    pub fn bare(outcome: Outcome) -> Self {
        Self {
            outcome,
            available: LocationTree::empty(),
            unavailable: LocationTree::empty(),
        }
    }
}
