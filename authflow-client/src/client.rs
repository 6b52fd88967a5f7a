//! Session driver
//!
//! [`SessionClient`] remembers the server-issued session id between calls,
//! starts a session lazily on the first credential submission and forgets
//! the id once the session is gone from the server.

use crate::error::{ClientError, ClientResult};
use crate::transport::LoginApi;
use authflow_core::{LoginOutcome, SessionSnapshot, DEFAULT_ACCOUNT};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What the client remembers about the login in progress
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: Option<String>,
    pub account: String,
    pub last_outcome: Option<LoginOutcome>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            session_id: None,
            account: DEFAULT_ACCOUNT.to_string(),
            last_outcome: None,
        }
    }
}

impl SessionContext {
    pub fn is_active(&self) -> bool {
        self.session_id.is_some()
    }

    fn forget(&mut self) {
        self.session_id = None;
    }
}

pub struct SessionClient {
    api: Arc<dyn LoginApi>,
    context: SessionContext,
}

impl SessionClient {
    pub fn new(api: Arc<dyn LoginApi>) -> Self {
        Self {
            api,
            context: SessionContext::default(),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn session_id(&self) -> Option<&str> {
        self.context.session_id.as_deref()
    }

    /// Submit credentials, starting a session first when none is held
    ///
    /// A held session belongs to one account; naming a different one is
    /// rejected with [`ClientError::AccountMismatch`] until that session is
    /// cancelled or finished.
    pub async fn login(
        &mut self,
        account: Option<&str>,
        username: &str,
        password: &str,
    ) -> ClientResult<LoginOutcome> {
        let account = account.unwrap_or(DEFAULT_ACCOUNT);
        let session_id = match self.context.session_id.clone() {
            Some(_) if self.context.account != account => {
                return Err(ClientError::AccountMismatch {
                    held: self.context.account.clone(),
                    requested: account.to_string(),
                });
            }
            Some(id) => id,
            None => {
                let reply = self.api.start(account).await?;
                info!("Started login session for account '{}'", reply.account);
                self.context = SessionContext {
                    session_id: Some(reply.session_id.clone()),
                    account: reply.account,
                    last_outcome: None,
                };
                reply.session_id
            }
        };

        let result = self.api.credentials(&session_id, username, password).await;
        self.settle(result).await
    }

    pub async fn submit_two_factor(&mut self, code: &str) -> ClientResult<LoginOutcome> {
        let session_id = self.require_session()?;
        let result = self.api.two_factor(&session_id, code).await;
        self.settle(result).await
    }

    /// Wait for the push approval; `None` leaves the duration to the server
    pub async fn wait_for_mobile(
        &mut self,
        timeout: Option<Duration>,
    ) -> ClientResult<LoginOutcome> {
        let session_id = self.require_session()?;
        let result = self.api.mobile_wait(&session_id, timeout).await;
        self.settle(result).await
    }

    /// Abandon the login in progress; a no-op when nothing is held
    ///
    /// On a transport or server failure the id is kept so the cancel can be
    /// retried.
    pub async fn cancel(&mut self) -> ClientResult<()> {
        let Some(session_id) = self.context.session_id.clone() else {
            return Ok(());
        };

        match self.api.cancel(&session_id).await {
            Ok(()) => {
                info!("Cancelled login session {}", session_id);
                self.context.forget();
                self.context.last_outcome = Some(LoginOutcome::Cancelled);
                Ok(())
            }
            // Already gone on the server
            Err(ClientError::SessionExpired) => {
                self.context.forget();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn status(&mut self) -> ClientResult<SessionSnapshot> {
        let session_id = self.require_session()?;
        match self.api.status(&session_id).await {
            Ok(snapshot) => {
                if snapshot.status.is_terminal() {
                    self.context.forget();
                }
                Ok(snapshot)
            }
            Err(e) => Err(self.forget_if_expired(e)),
        }
    }

    pub async fn needs_login(&self, account: Option<&str>) -> ClientResult<bool> {
        self.api
            .needs_login(account.unwrap_or(DEFAULT_ACCOUNT))
            .await
    }

    fn require_session(&self) -> ClientResult<String> {
        self.context.session_id.clone().ok_or(ClientError::NoSession)
    }

    fn forget_if_expired(&mut self, error: ClientError) -> ClientError {
        if error.is_session_expired() {
            debug!("Server no longer knows the session, forgetting it");
            self.context.forget();
        }
        error
    }

    async fn settle(&mut self, result: ClientResult<LoginOutcome>) -> ClientResult<LoginOutcome> {
        let outcome = result.map_err(|e| self.forget_if_expired(e))?;

        if outcome.is_terminal() {
            self.context.forget();
        }

        if let LoginOutcome::Success { username } = &outcome {
            info!("Logged in as {}", username);
            self.reload_account().await;
        }

        self.context.last_outcome = Some(outcome.clone());
        Ok(outcome)
    }

    /// Ask the server to pick up the new login; failures only warn
    async fn reload_account(&self) {
        match self.api.reload(&self.context.account).await {
            Ok(reply) => debug!(
                "Reloaded account '{}' (active: {})",
                reply.account, reply.active
            ),
            Err(e) => warn!("Login succeeded but reload failed: {}", e),
        }
    }
}
