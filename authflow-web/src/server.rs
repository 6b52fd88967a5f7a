//! Authflow Web Server
//!
//! Main web server implementation using Axum.

use crate::{create_app, AppState, WebConfig, WebError, WebResult};
use authflow_core::{SessionSettings, StaticAccount};
use axum::serve;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Main authflow web server
pub struct AuthflowServer {
    config: WebConfig,
    state: AppState,
}

impl AuthflowServer {
    /// Create a new server with the config-driven identity verifier
    pub async fn new(config: WebConfig) -> WebResult<Self> {
        let state = AppState::new(config.clone()).await?;

        Ok(Self { config, state })
    }

    /// Start the web server
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.address();

        info!("Starting authflow web server");
        info!("Server address: http://{}", address);
        info!("Site password gate: {}", self.config.site_gate_enabled());

        let app = create_app(self.state.clone());

        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("Server listening on http://{}", address);

        // Reap expired login sessions
        let reaper_state = self.state.clone();
        let reaper_interval = self.config.sessions.reaper_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(reaper_interval);
            loop {
                interval.tick().await;
                reaper_state.purge_expired_sessions().await;
            }
        });

        if let Err(e) = serve(listener, app).await {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Builder for AuthflowServer
pub struct AuthflowServerBuilder {
    config: WebConfig,
}

impl AuthflowServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self {
            config: WebConfig::default(),
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: WebConfig) -> Self {
        Self { config }
    }

    /// Set the server host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the auth-state directory
    pub fn auth_state_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.auth_state_dir = dir.into();
        self
    }

    /// Protect the site with a shared password
    pub fn site_password<S: Into<String>>(mut self, password: S) -> Self {
        self.config.site_password = Some(password.into());
        self
    }

    /// Bypass the site password gate
    pub fn test_mode(mut self, test_mode: bool) -> Self {
        self.config.test_mode = test_mode;
        self
    }

    pub fn sessions(mut self, sessions: SessionSettings) -> Self {
        self.config.sessions = sessions;
        self
    }

    pub fn accounts(mut self, accounts: Vec<StaticAccount>) -> Self {
        self.config.accounts = accounts;
        self
    }

    /// Build the server
    pub async fn build(self) -> WebResult<AuthflowServer> {
        AuthflowServer::new(self.config).await
    }
}

impl Default for AuthflowServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
