//! Identity check delegate
//!
//! The state machine never validates credentials itself. It hands each step
//! to an [`IdentityVerifier`] and maps the answer onto a state transition.

use crate::SessionResult;
use async_trait::async_trait;
use authflow_core::TwoFactorMethod;
use std::fmt;

/// Credentials submitted for one session
#[derive(Clone)]
pub struct CredentialAttempt {
    pub session_id: String,
    pub account: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for CredentialAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialAttempt")
            .field("session_id", &self.session_id)
            .field("account", &self.account)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The pending second-factor challenge of a session
#[derive(Debug, Clone)]
pub struct Challenge {
    pub session_id: String,
    pub account: String,
    pub username: String,
    /// Set for code challenges, unset for mobile approvals
    pub method: Option<TwoFactorMethod>,
}

/// Answer to a credential submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialCheck {
    /// No second factor needed; `username` is the server-resolved login
    Authenticated { username: String },
    TwoFactorRequired { method: TwoFactorMethod },
    MobileApprovalRequired { verification_code: Option<String> },
    /// A challenge such as a captcha that needs a human in an interactive flow
    ManualInterventionRequired { message: String },
    Rejected { message: String },
}

/// Answer to a two-factor code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeCheck {
    Authenticated { username: String },
    /// Wrong code, the session may retry
    Rejected { message: String },
    /// The challenge can no longer succeed
    Failed { message: String },
}

/// Answer to one poll of the mobile approval signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalCheck {
    Approved { username: String },
    Pending,
    Denied { message: String },
}

/// Opaque identity check behind the login state machine
///
/// Any retry cap, rate limiting or upstream automation lives in the
/// implementation. Errors returned here terminate the session as failed.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn check_credentials(&self, attempt: &CredentialAttempt) -> SessionResult<CredentialCheck>;

    async fn check_code(&self, challenge: &Challenge, code: &str) -> SessionResult<CodeCheck>;

    /// Must return promptly; the state machine does the waiting
    async fn check_approval(&self, challenge: &Challenge) -> SessionResult<ApprovalCheck>;

    /// Drop any per-session resources once a session is finished or cancelled
    async fn release(&self, _session_id: &str) {}
}
