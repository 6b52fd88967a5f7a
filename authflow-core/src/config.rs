//! Configuration management

use crate::error::{AuthflowError, AuthflowResult, ErrorContext};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration, usually read from `authflow.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthflowConfig {
    pub server: ServerConfig,
    pub sessions: SessionSettings,
    pub logging: LoggingConfig,
    /// Accounts known to the config-driven identity verifier
    pub accounts: Vec<StaticAccount>,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding the site secret and the account registry
    pub auth_state_dir: PathBuf,
    /// Shared password protecting the whole site; gate disabled when unset
    pub site_password: Option<String>,
    /// Bypasses the site password gate
    pub test_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            auth_state_dir: PathBuf::from("auth_state"),
            site_password: None,
            test_mode: false,
        }
    }
}

impl ServerConfig {
    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Timing knobs for login sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Sessions older than this are treated as absent
    pub session_ttl_seconds: u64,
    /// Mobile wait used when the caller does not give a timeout
    pub default_wait_seconds: u64,
    /// Upper bound applied to caller-supplied mobile wait timeouts
    pub max_wait_seconds: u64,
    /// Delay between two polls of the approval signal
    pub approval_poll_interval_ms: u64,
    /// How often the server purges expired sessions
    pub reaper_interval_seconds: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_ttl_seconds: 300,
            default_wait_seconds: 30,
            max_wait_seconds: 120,
            approval_poll_interval_ms: 1000,
            reaper_interval_seconds: 60,
        }
    }
}

impl SessionSettings {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    pub fn approval_poll_interval(&self) -> Duration {
        Duration::from_millis(self.approval_poll_interval_ms)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_seconds)
    }

    /// Resolve a caller-supplied wait timeout against the configured bounds
    pub fn wait_timeout(&self, requested_seconds: Option<f64>) -> Duration {
        let requested = requested_seconds
            .filter(|s| s.is_finite() && *s >= 0.0)
            .unwrap_or(self.default_wait_seconds as f64);
        Duration::from_secs_f64(requested.min(self.max_wait_seconds as f64))
    }
}

/// An account accepted by the config-driven verifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticAccount {
    pub username: String,
    pub password: String,
    /// Canonical login reported on success; defaults to `username`
    #[serde(default)]
    pub resolved_username: Option<String>,
    #[serde(default)]
    pub second_factor: SecondFactor,
}

/// What happens after the password is accepted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecondFactor {
    #[default]
    None,
    Totp {
        code: String,
    },
    Sms {
        code: String,
    },
    Mobile {
        #[serde(default)]
        verification_code: Option<String>,
        /// Approve automatically once this many seconds have passed
        #[serde(default)]
        approve_after_seconds: Option<u64>,
        /// Deny instead of approving
        #[serde(default)]
        deny: bool,
    },
    /// The upstream provider asks for a captcha
    Captcha,
}

impl AuthflowConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AuthflowResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AuthflowError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: AuthflowConfig =
            toml::from_str(&content).map_err(|e| AuthflowError::Config {
                message: format!("Failed to parse config: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config")
                    .with_operation("parse_toml")
                    .with_suggestion("Check TOML syntax in config file"),
            })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> AuthflowResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| AuthflowError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| AuthflowError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Load from `path`, or from `AUTHFLOW_CONFIG`, or fall back to defaults,
    /// then apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> AuthflowResult<Self> {
        let env_path = std::env::var("AUTHFLOW_CONFIG").ok().map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override server settings from `AUTHFLOW_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("AUTHFLOW_HOST") {
            self.server.host = host;
        }
        if let Some(port) = std::env::var("AUTHFLOW_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
        {
            self.server.port = port;
        }
        if let Ok(dir) = std::env::var("AUTHFLOW_AUTH_STATE_DIR") {
            self.server.auth_state_dir = PathBuf::from(dir);
        }
        if let Ok(password) = std::env::var("AUTHFLOW_SITE_PASSWORD") {
            if !password.is_empty() {
                self.server.site_password = Some(password);
            }
        }
        if std::env::var("AUTHFLOW_TEST_MODE").as_deref() == Ok("1") {
            self.server.test_mode = true;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> AuthflowResult<()> {
        if self.server.host.is_empty() {
            return Err(invalid(
                "server.host",
                "server.host must not be empty",
                "Set server.host",
            ));
        }

        if self.sessions.session_ttl_seconds == 0 {
            return Err(invalid(
                "sessions.session_ttl_seconds",
                "sessions.session_ttl_seconds must be greater than 0",
                "Set sessions.session_ttl_seconds to a positive value",
            ));
        }

        if self.sessions.approval_poll_interval_ms == 0 {
            return Err(invalid(
                "sessions.approval_poll_interval_ms",
                "sessions.approval_poll_interval_ms must be greater than 0",
                "Set sessions.approval_poll_interval_ms to a positive value",
            ));
        }

        if self.sessions.default_wait_seconds > self.sessions.max_wait_seconds {
            return Err(invalid(
                "sessions.default_wait_seconds",
                "sessions.default_wait_seconds exceeds sessions.max_wait_seconds",
                "Lower default_wait_seconds or raise max_wait_seconds",
            ));
        }

        for account in &self.accounts {
            if account.username.is_empty() {
                return Err(invalid(
                    "accounts.username",
                    "accounts entries need a username",
                    "Give every [[accounts]] entry a username",
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str, suggestion: &str) -> AuthflowError {
    AuthflowError::Validation {
        message: message.to_string(),
        field: Some(field.to_string()),
        context: ErrorContext::new("config")
            .with_operation("validate")
            .with_suggestion(suggestion),
    }
}
