//! Record types stored in the subscription database.

use serde::{Deserialize, Serialize};

use crate::model::{Identity, Outcome};

/// One tracked identity and the state of its last completed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: i64,
    /// Opaque address the outbound dispatcher delivers notifications to
    /// (a chat id in the original deployment).
    pub contact: String,
    pub ulss_id: Option<u8>,
    pub fiscal_code: Option<String>,
    pub health_insurance_number: Option<String>,
    /// Outcome of the last completed check; `Unknown` until one happens.
    pub outcome: Outcome,
    /// JSON form of the last observed available tree, the baseline for
    /// change detection.
    pub locations: String,
    /// Unix seconds of the last completed check; `None` = never checked.
    pub last_check: Option<i64>,
}

impl SubscriptionRecord {
    /// The identity, if every field needed to drive the portal is present.
    ///
    /// Users enter fields one at a time through the chat frontend, so
    /// partially-filled rows are normal: not an error, just not checkable
    /// yet.
    pub fn identity(&self) -> Option<Identity> {
        Some(Identity {
            ulss_id: self.ulss_id?,
            fiscal_code: self.fiscal_code.clone()?,
            health_insurance_number: self.health_insurance_number.clone()?,
        })
    }
}
