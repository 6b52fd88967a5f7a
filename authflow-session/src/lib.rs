//! Authflow Session - server-held login sessions
//!
//! This crate owns the authoritative login protocol:
//!
//! - [`SessionStore`]: live sessions keyed by an opaque random id
//! - [`SessionStateMachine`]: credential intake, two-factor dispatch, mobile
//!   approval waits, cancellation and terminal outcomes
//! - [`IdentityVerifier`]: the opaque identity check the machine delegates to
//! - [`AccountRegistry`]: which accounts currently hold an authenticated login

pub mod machine;
pub mod registry;
pub mod static_verifier;
pub mod store;
pub mod types;
pub mod verifier;

pub use machine::SessionStateMachine;
pub use registry::{AccountRecord, AccountRegistry};
pub use static_verifier::StaticIdentityVerifier;
pub use store::{SessionEnd, SessionHandle, SessionStore};
pub use types::LoginSession;
pub use verifier::{
    ApprovalCheck, Challenge, CodeCheck, CredentialAttempt, CredentialCheck, IdentityVerifier,
};

use authflow_core::SessionState;

/// Session-level error type
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {session_id}")]
    NotFound { session_id: String },

    #[error("Session {session_id} is {state}, {operation} is not allowed")]
    InvalidState {
        session_id: String,
        state: SessionState,
        operation: &'static str,
    },

    #[error("Session {session_id} already finished as {state}")]
    Finished {
        session_id: String,
        state: SessionState,
    },

    #[error("Identity check failed: {message}")]
    Verifier {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    /// Create a not found error
    pub fn not_found<S: Into<String>>(session_id: S) -> Self {
        Self::NotFound {
            session_id: session_id.into(),
        }
    }

    /// Create a verifier error
    pub fn verifier<S: Into<String>>(message: S) -> Self {
        Self::Verifier {
            message: message.into(),
            source: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::NotFound { .. })
    }
}
