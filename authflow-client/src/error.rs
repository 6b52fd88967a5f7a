//! Client error type

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The server no longer knows the session; the login must start over
    #[error("Login session expired or unknown, start over")]
    SessionExpired,

    #[error("No login session in progress")]
    NoSession,

    /// A session for another account is still held
    #[error("A login for account '{held}' is in progress; cancel it before logging in to '{requested}'")]
    AccountMismatch { held: String, requested: String },

    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Non-404 error reply with the server's `{error, message}` body
    #[error("Server returned {status} ({code}): {message}")]
    Server {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Unexpected response: {0}")]
    Protocol(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn transport<E>(message: &str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport {
            message: format!("{}: {}", message, source),
            source: Some(Box::new(source)),
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ClientError::SessionExpired)
    }
}
