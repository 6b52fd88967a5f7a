//! Application state shared by every handler

use crate::{site_auth::SiteAuth, WebConfig, WebError, WebResult};
use authflow_session::{
    AccountRegistry, IdentityVerifier, SessionStateMachine, StaticIdentityVerifier,
};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: WebConfig,
    /// The login state machine and its session store
    pub machine: Arc<SessionStateMachine>,
    /// Site password gate; `None` when disabled
    pub site_auth: Option<Arc<SiteAuth>>,
}

impl AppState {
    /// Create state backed by the config-driven identity verifier
    pub async fn new(config: WebConfig) -> WebResult<Self> {
        let verifier = Arc::new(StaticIdentityVerifier::new(config.accounts.clone()));
        Self::with_verifier(config, verifier)
    }

    /// Create state around any identity verifier
    pub fn with_verifier(
        config: WebConfig,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> WebResult<Self> {
        let registry = AccountRegistry::open(&config.auth_state_dir).map_err(|e| {
            WebError::Config(format!(
                "Failed to open account registry in {}: {}",
                config.auth_state_dir.display(),
                e
            ))
        })?;

        let machine = SessionStateMachine::new(
            verifier,
            Arc::new(registry),
            config.sessions.clone(),
        );

        let site_auth = match &config.site_password {
            Some(password) if config.site_gate_enabled() => {
                info!("Site password gate enabled");
                Some(Arc::new(SiteAuth::open(&config.auth_state_dir, password)?))
            }
            _ => None,
        };

        Ok(Self {
            config,
            machine: Arc::new(machine),
            site_auth,
        })
    }

    /// Drop expired login sessions
    pub async fn purge_expired_sessions(&self) -> usize {
        let purged = self.machine.store().purge_expired().await;
        if purged > 0 {
            debug!("Reaper removed {} expired login sessions", purged);
        }
        purged
    }
}
