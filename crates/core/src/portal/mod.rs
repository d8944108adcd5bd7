//! Portal access: URL construction, the HTTP session carrier, and the
//! error taxonomy shared by the classifier, extractor, and navigator.
//!
//! The portal has no API. Its only interface is a multi-step HTML wizard
//! keyed on a session cookie, so everything here is built around driving
//! one cookie-carrying conversation per check and reading the pages that
//! come back.

pub mod classify;
pub mod extract;
pub mod navigate;

use std::time::Duration;

use thiserror::Error;

pub use classify::{classify, extract_branches, Classification};
pub use extract::extract_locations;
pub use navigate::Navigator;

/// Production portal deployment.
pub const DEFAULT_BASE_URL: &str = "https://vaccinicovid.regione.veneto.it";

/// Per-request timeout. The portal has no cancellation story beyond this.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for portal operations.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Connection-level failure talking to the portal.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The portal answered with a non-success status code.
    #[error("portal returned HTTP status {0}")]
    Status(u16),

    /// The response page matched none of the known shapes.
    ///
    /// Never folded into an outcome: the raw body and the identity stay
    /// attached for operator diagnosis.
    #[error("unrecognized portal page for {fiscal_code} on ULSS {ulss_id}")]
    UnknownPayload {
        body: String,
        fiscal_code: String,
        ulss_id: u8,
    },
}

impl PortalError {
    /// Transient failures are worth retrying within the same scheduled
    /// check; an unrecognized page is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, PortalError::Http(_) | PortalError::Status(_))
    }
}

/// Convenience result type for portal operations.
pub type PortalResult<T> = Result<T, PortalError>;

/// Deterministic URL builders for one portal deployment.
///
/// The wizard's step URLs are the de facto wire contract; building them in
/// one place keeps branch resolution and the tests honest about it.
#[derive(Debug, Clone)]
pub struct PortalUrls {
    base: String,
}

impl PortalUrls {
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self { base }
    }

    /// Landing page of one health unit; fetched first to acquire the
    /// session cookie.
    pub fn ulss_home(&self, ulss_id: u8) -> String {
        format!("{}/ulss{}", self.base, ulss_id)
    }

    /// Identity form submission.
    pub fn submit_identity(&self, ulss_id: u8) -> String {
        format!("{}/ulss{}/azione/controllocf", self.base, ulss_id)
    }

    /// Cohort self-certification chooser page.
    pub fn cohort_chooser(&self, ulss_id: u8) -> String {
        format!("{}/ulss{}/azione/sceglicorte/", self.base, ulss_id)
    }

    /// Submission of one self-certified cohort.
    pub fn select_cohort(&self, ulss_id: u8, cohort_id: &str) -> String {
        format!(
            "{}/ulss{}/azione/controllocf/corte/{}",
            self.base, ulss_id, cohort_id
        )
    }

    /// Location list for one service.
    pub fn select_service(&self, ulss_id: u8, service_id: &str) -> String {
        format!(
            "{}/ulss{}/azione/sceglisede/servizio/{}",
            self.base, ulss_id, service_id
        )
    }
}

impl Default for PortalUrls {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// One cookie-carrying conversation with the portal.
///
/// The portal keys wizard progress on its session cookie, so a full check
/// must run every round-trip through the same `Session`.
pub trait Session {
    /// GET a page, returning the body on any success status.
    fn get(&mut self, url: &str) -> PortalResult<String>;

    /// POST a form, returning the body on any success status.
    fn post(&mut self, url: &str, form: &[(&str, &str)]) -> PortalResult<String>;
}

/// Hands out a fresh session (fresh cookie jar) per check.
pub trait Connector {
    type Session: Session;

    fn open_session(&self) -> PortalResult<Self::Session>;
}

/// `reqwest`-backed session with an in-memory cookie jar.
pub struct HttpSession {
    client: reqwest::blocking::Client,
}

impl HttpSession {
    pub fn new() -> PortalResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("slot-sentinel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    fn read_body(response: reqwest::blocking::Response) -> PortalResult<String> {
        let status = response.status();
        if !status.is_success() {
            return Err(PortalError::Status(status.as_u16()));
        }
        Ok(response.text()?)
    }
}

impl Session for HttpSession {
    fn get(&mut self, url: &str) -> PortalResult<String> {
        tracing::debug!(url, "GET");
        Self::read_body(self.client.get(url).send()?)
    }

    fn post(&mut self, url: &str, form: &[(&str, &str)]) -> PortalResult<String> {
        tracing::debug!(url, "POST");
        Self::read_body(self.client.post(url).form(form).send()?)
    }
}

/// Default connector: one new cookie jar per check, so concurrent-session
/// state on the portal side never bleeds between identities.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl Connector for HttpConnector {
    type Session = HttpSession;

    fn open_session(&self) -> PortalResult<HttpSession> {
        HttpSession::new()
    }
}
