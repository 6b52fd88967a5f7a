//! Login state machine
//!
//! Drives one session at a time through
//! `initialized → awaiting_credentials_result → {awaiting_2fa | awaiting_mobile_approval} → terminal`.
//! Every step that reaches the identity verifier races against the session's
//! end signal, so `cancel` can interrupt it without taking the operation lock.
//! A session that expires mid-step reports NotFound rather than `cancelled`.

use crate::registry::{AccountRecord, AccountRegistry};
use crate::store::{SessionEnd, SessionHandle, SessionStore};
use crate::verifier::{
    ApprovalCheck, Challenge, CodeCheck, CredentialAttempt, CredentialCheck, IdentityVerifier,
};
use crate::{SessionError, SessionResult};
use authflow_core::{
    LoginOutcome, SessionSettings, SessionSnapshot, SessionState, TwoFactorMethod,
    DEFAULT_ACCOUNT,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

pub struct SessionStateMachine {
    store: Arc<SessionStore>,
    verifier: Arc<dyn IdentityVerifier>,
    registry: Arc<AccountRegistry>,
    settings: SessionSettings,
}

impl SessionStateMachine {
    pub fn new(
        verifier: Arc<dyn IdentityVerifier>,
        registry: Arc<AccountRegistry>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            store: Arc::new(SessionStore::new(settings.session_ttl())),
            verifier,
            registry,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<AccountRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Open a new session for `account` (or the default account)
    pub async fn start(&self, account: Option<&str>) -> SessionSnapshot {
        let account = normalize_account(account);
        let handle = self.store.create(&account).await;
        let snapshot = handle.record().await.snapshot();
        snapshot
    }

    /// Hand credentials to the identity verifier
    ///
    /// Valid only from `initialized`; a second submission is rejected with
    /// `InvalidState` (or `Finished` once the session is terminal).
    pub async fn submit_credentials(
        &self,
        session_id: &str,
        username: &str,
        password: &str,
    ) -> SessionResult<LoginOutcome> {
        let handle = self.store.get(session_id).await?;
        let _operation = handle.begin_operation().await;

        let attempt = {
            let mut session = handle.record().await;
            session.expect_state(SessionState::Initialized, "submit_credentials")?;
            session.begin_credential_check(username.to_string())?;
            CredentialAttempt {
                session_id: session.id.clone(),
                account: session.account.clone(),
                username: username.to_string(),
                password: password.to_string(),
            }
        };

        info!("Checking credentials for session {}", session_id);

        let check = tokio::select! {
            biased;
            reason = handle.ended() => return ended(session_id, reason),
            check = self.verifier.check_credentials(&attempt) => check,
        };

        let outcome = {
            let mut session = handle.record().await;
            if let Some(reason) = handle.end_reason() {
                return ended(session_id, reason);
            }
            if session.state != SessionState::AwaitingCredentialsResult {
                return Ok(LoginOutcome::Cancelled);
            }

            match check {
                Ok(CredentialCheck::Authenticated { username }) => {
                    session.succeed(username.clone())?;
                    LoginOutcome::Success { username }
                }
                Ok(CredentialCheck::TwoFactorRequired { method }) => {
                    session.await_two_factor(method)?;
                    LoginOutcome::WaitingTwoFactor {
                        twofa_method: method,
                        error: None,
                    }
                }
                Ok(CredentialCheck::MobileApprovalRequired { verification_code }) => {
                    session.await_mobile_approval(verification_code.clone())?;
                    LoginOutcome::WaitingMobile { verification_code }
                }
                Ok(CredentialCheck::ManualInterventionRequired { message }) => {
                    session.fail(message.clone())?;
                    LoginOutcome::CaptchaRequired { error: message }
                }
                Ok(CredentialCheck::Rejected { message }) => {
                    session.fail(message.clone())?;
                    LoginOutcome::Error { error: message }
                }
                Err(e) => {
                    warn!("Credential check for session {} errored: {}", session_id, e);
                    let message = e.to_string();
                    session.fail(message.clone())?;
                    LoginOutcome::Error { error: message }
                }
            }
        };

        self.settle(&handle, &attempt.account, &outcome).await;
        Ok(outcome)
    }

    /// Verify a TOTP/SMS code; a wrong code keeps the session in `awaiting_2fa`
    pub async fn submit_code(&self, session_id: &str, code: &str) -> SessionResult<LoginOutcome> {
        let handle = self.store.get(session_id).await?;
        let _operation = handle.begin_operation().await;

        let (challenge, method) = {
            let session = handle.record().await;
            session.expect_state(SessionState::AwaitingTwoFactor, "submit_code")?;
            let method = session.twofa_method.unwrap_or(TwoFactorMethod::Totp);
            (challenge_for(&session, Some(method)), method)
        };

        let check = tokio::select! {
            biased;
            reason = handle.ended() => return ended(session_id, reason),
            check = self.verifier.check_code(&challenge, code) => check,
        };

        let outcome = {
            let mut session = handle.record().await;
            if let Some(reason) = handle.end_reason() {
                return ended(session_id, reason);
            }
            if session.state != SessionState::AwaitingTwoFactor {
                return Ok(LoginOutcome::Cancelled);
            }

            match check {
                Ok(CodeCheck::Authenticated { username }) => {
                    session.succeed(username.clone())?;
                    LoginOutcome::Success { username }
                }
                Ok(CodeCheck::Rejected { message }) => {
                    debug!("Rejected {} code for session {}", method, session_id);
                    session.await_two_factor(method)?;
                    LoginOutcome::WaitingTwoFactor {
                        twofa_method: method,
                        error: Some(message),
                    }
                }
                Ok(CodeCheck::Failed { message }) => {
                    session.fail(message.clone())?;
                    LoginOutcome::Error { error: message }
                }
                Err(e) => {
                    warn!("Code check for session {} errored: {}", session_id, e);
                    let message = e.to_string();
                    session.fail(message.clone())?;
                    LoginOutcome::Error { error: message }
                }
            }
        };

        self.settle(&handle, &challenge.account, &outcome).await;
        Ok(outcome)
    }

    /// Wait up to `timeout` for the mobile approval signal
    ///
    /// Running out of time is not an error: the result is `WaitingMobile` and
    /// the session stays in `awaiting_mobile_approval` for another wait.
    pub async fn wait_approval(
        &self,
        session_id: &str,
        timeout: Duration,
    ) -> SessionResult<LoginOutcome> {
        let handle = self.store.get(session_id).await?;
        let _operation = handle.begin_operation().await;

        let challenge = {
            let session = handle.record().await;
            session.expect_state(SessionState::AwaitingMobileApproval, "wait_approval")?;
            challenge_for(&session, None)
        };

        debug!(
            "Waiting up to {:?} for mobile approval of session {}",
            timeout, session_id
        );

        // Never wait past the session's own lifetime
        let deadline = (Instant::now() + timeout).min(handle.expires_at());
        let poll_interval = self.settings.approval_poll_interval();

        let check = loop {
            let check = tokio::select! {
                biased;
                reason = handle.ended() => return ended(session_id, reason),
                check = self.verifier.check_approval(&challenge) => check,
                _ = sleep_until(deadline) => Ok(ApprovalCheck::Pending),
            };

            if !matches!(check, Ok(ApprovalCheck::Pending)) {
                break check;
            }

            let now = Instant::now();
            if now >= deadline {
                break Ok(ApprovalCheck::Pending);
            }

            tokio::select! {
                biased;
                reason = handle.ended() => return ended(session_id, reason),
                _ = sleep(poll_interval.min(deadline - now)) => {}
            }
        };

        if matches!(check, Ok(ApprovalCheck::Pending)) && handle.is_expired() {
            debug!("Session {} expired while waiting for approval", session_id);
            self.store.delete(session_id).await;
            return Err(SessionError::not_found(session_id));
        }

        let outcome = {
            let mut session = handle.record().await;
            if let Some(reason) = handle.end_reason() {
                return ended(session_id, reason);
            }
            if session.state != SessionState::AwaitingMobileApproval {
                return Ok(LoginOutcome::Cancelled);
            }

            match check {
                Ok(ApprovalCheck::Approved { username }) => {
                    session.succeed(username.clone())?;
                    LoginOutcome::Success { username }
                }
                Ok(ApprovalCheck::Pending) => {
                    debug!("Mobile approval for session {} still pending", session_id);
                    LoginOutcome::WaitingMobile {
                        verification_code: session.verification_code.clone(),
                    }
                }
                Ok(ApprovalCheck::Denied { message }) => {
                    session.fail(message.clone())?;
                    LoginOutcome::Error { error: message }
                }
                Err(e) => {
                    warn!("Approval check for session {} errored: {}", session_id, e);
                    let message = e.to_string();
                    session.fail(message.clone())?;
                    LoginOutcome::Error { error: message }
                }
            }
        };

        self.settle(&handle, &challenge.account, &outcome).await;
        Ok(outcome)
    }

    /// Cancel a non-terminal session and drop it from the store
    ///
    /// Interrupts any in-flight credential check or approval wait, which then
    /// resolves to [`LoginOutcome::Cancelled`].
    pub async fn cancel(&self, session_id: &str) -> SessionResult<SessionSnapshot> {
        let handle = self.store.get(session_id).await?;

        let snapshot = {
            let mut session = handle.record().await;
            if session.state == SessionState::Cancelled {
                // Lost a race with another cancel
                return Err(SessionError::not_found(session_id));
            }
            session.cancel()?;
            handle.end(SessionEnd::Cancelled);
            session.snapshot()
        };

        self.store.delete(session_id).await;
        self.verifier.release(session_id).await;

        info!("Cancelled login session {}", session_id);
        Ok(snapshot)
    }

    /// Read-only snapshot
    ///
    /// Handing out a terminal snapshot is the final read of that session, so
    /// the session leaves the store afterwards.
    pub async fn status(&self, session_id: &str) -> SessionResult<SessionSnapshot> {
        let handle = self.store.get(session_id).await?;
        let snapshot = handle.record().await.snapshot();

        if snapshot.status.is_terminal() {
            self.store.delete(session_id).await;
            debug!(
                "Delivered final status {} of session {}",
                snapshot.status, session_id
            );
        }

        Ok(snapshot)
    }

    /// Whether `account` lacks an authenticated login; returns the resolved label too
    pub async fn needs_login(&self, account: Option<&str>) -> (String, bool) {
        let account = normalize_account(account);
        let needs_login = self.registry.needs_login(&account).await;
        (account, needs_login)
    }

    /// Refresh the registry from disk and return the account's active login
    pub async fn reload(&self, account: Option<&str>) -> SessionResult<(String, Option<AccountRecord>)> {
        let account = normalize_account(account);
        self.registry.reload().await?;
        let record = self.registry.get(&account).await;
        Ok((account, record))
    }

    /// Side effects of a finished step
    async fn settle(&self, handle: &SessionHandle, account: &str, outcome: &LoginOutcome) {
        match outcome {
            LoginOutcome::Success { username } => {
                info!(
                    "Login session {} succeeded for account {}",
                    handle.id(),
                    account
                );
                if let Err(e) = self.registry.record(account, username).await {
                    warn!("Failed to record login for account {}: {}", account, e);
                }
            }
            LoginOutcome::Error { error } | LoginOutcome::CaptchaRequired { error } => {
                info!("Login session {} failed: {}", handle.id(), error);
            }
            _ => return,
        }

        self.verifier.release(handle.id()).await;
    }
}

/// Result of a call whose session ended while it was in flight
fn ended(session_id: &str, reason: SessionEnd) -> SessionResult<LoginOutcome> {
    match reason {
        SessionEnd::Cancelled => Ok(LoginOutcome::Cancelled),
        SessionEnd::Evicted => {
            debug!("Session {} was evicted mid-operation", session_id);
            Err(SessionError::not_found(session_id))
        }
    }
}

fn normalize_account(account: Option<&str>) -> String {
    account
        .map(str::trim)
        .filter(|account| !account.is_empty())
        .unwrap_or(DEFAULT_ACCOUNT)
        .to_string()
}

fn challenge_for(session: &crate::LoginSession, method: Option<TwoFactorMethod>) -> Challenge {
    Challenge {
        session_id: session.id.clone(),
        account: session.account.clone(),
        username: session.username.clone().unwrap_or_default(),
        method,
    }
}
