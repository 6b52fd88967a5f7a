//! Login session record

use crate::{SessionError, SessionResult};
use authflow_core::{SessionSnapshot, SessionState, TwoFactorMethod};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Mutable state of one authentication attempt
#[derive(Debug, Clone)]
pub struct LoginSession {
    /// Unique session identifier
    pub id: String,
    /// Account label this session authenticates
    pub account: String,
    pub state: SessionState,
    /// Set once credentials are submitted
    pub username: Option<String>,
    /// Present only while awaiting a code
    pub twofa_method: Option<TwoFactorMethod>,
    /// Present only while awaiting a mobile approval
    pub verification_code: Option<String>,
    /// Present only once failed
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LoginSession {
    /// Create a fresh session in `initialized`
    pub fn new(id: String, account: String, ttl: Duration) -> Self {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);

        Self {
            id,
            account,
            state: SessionState::Initialized,
            username: None,
            twofa_method: None,
            verification_code: None,
            last_error: None,
            created_at: now,
            updated_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Reject `operation` unless the session is in `expected`
    pub fn expect_state(&self, expected: SessionState, operation: &'static str) -> SessionResult<()> {
        if self.state == expected {
            Ok(())
        } else if self.state.is_terminal() {
            Err(SessionError::Finished {
                session_id: self.id.clone(),
                state: self.state,
            })
        } else {
            Err(SessionError::InvalidState {
                session_id: self.id.clone(),
                state: self.state,
                operation,
            })
        }
    }

    /// Move along one edge of the transition graph
    ///
    /// Challenge data belonging to the previous state is dropped so a session
    /// never carries both a two-factor method and a verification code.
    fn transition(&mut self, next: SessionState, operation: &'static str) -> SessionResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::InvalidState {
                session_id: self.id.clone(),
                state: self.state,
                operation,
            });
        }

        self.state = next;
        self.twofa_method = None;
        self.verification_code = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn begin_credential_check(&mut self, username: String) -> SessionResult<()> {
        self.transition(
            SessionState::AwaitingCredentialsResult,
            "submit_credentials",
        )?;
        self.username = Some(username);
        Ok(())
    }

    pub fn await_two_factor(&mut self, method: TwoFactorMethod) -> SessionResult<()> {
        self.transition(SessionState::AwaitingTwoFactor, "await_two_factor")?;
        self.twofa_method = Some(method);
        Ok(())
    }

    pub fn await_mobile_approval(&mut self, verification_code: Option<String>) -> SessionResult<()> {
        self.transition(SessionState::AwaitingMobileApproval, "await_mobile_approval")?;
        self.verification_code = verification_code;
        Ok(())
    }

    pub fn succeed(&mut self, username: String) -> SessionResult<()> {
        self.transition(SessionState::Succeeded, "succeed")?;
        self.username = Some(username);
        Ok(())
    }

    pub fn fail<S: Into<String>>(&mut self, message: S) -> SessionResult<()> {
        self.transition(SessionState::Failed, "fail")?;
        self.last_error = Some(message.into());
        Ok(())
    }

    pub fn cancel(&mut self) -> SessionResult<()> {
        if self.state.is_terminal() {
            return Err(SessionError::Finished {
                session_id: self.id.clone(),
                state: self.state,
            });
        }
        self.transition(SessionState::Cancelled, "cancel")
    }

    /// Serializable view for callers
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            account: self.account.clone(),
            status: self.state,
            username: self.username.clone(),
            twofa_method: self.twofa_method,
            verification_code: self.verification_code.clone(),
            error: self.last_error.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            expires_at: self.expires_at,
        }
    }
}
