//! Core data type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Account label used when a caller does not name one
pub const DEFAULT_ACCOUNT: &str = "default";

/// Lifecycle state of a login session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum SessionState {
    /// Created, waiting for credentials
    #[serde(rename = "initialized")]
    Initialized,
    /// Credentials handed to the identity check, result not yet known
    #[serde(rename = "awaiting_credentials_result")]
    AwaitingCredentialsResult,
    /// Waiting for a TOTP or SMS code
    #[serde(rename = "awaiting_2fa")]
    AwaitingTwoFactor,
    /// Waiting for a push approval from the companion app
    #[serde(rename = "awaiting_mobile_approval")]
    AwaitingMobileApproval,
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Initialized => "initialized",
            SessionState::AwaitingCredentialsResult => "awaiting_credentials_result",
            SessionState::AwaitingTwoFactor => "awaiting_2fa",
            SessionState::AwaitingMobileApproval => "awaiting_mobile_approval",
            SessionState::Succeeded => "succeeded",
            SessionState::Failed => "failed",
            SessionState::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further mutating calls
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Succeeded | SessionState::Failed | SessionState::Cancelled
        )
    }

    /// Whether the transition graph has an edge from `self` to `next`
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (_, Cancelled) => !self.is_terminal(),
            (Initialized, AwaitingCredentialsResult) => true,
            (AwaitingCredentialsResult, AwaitingTwoFactor)
            | (AwaitingCredentialsResult, AwaitingMobileApproval)
            | (AwaitingCredentialsResult, Succeeded)
            | (AwaitingCredentialsResult, Failed) => true,
            (AwaitingTwoFactor, AwaitingTwoFactor)
            | (AwaitingTwoFactor, Succeeded)
            | (AwaitingTwoFactor, Failed) => true,
            (AwaitingMobileApproval, AwaitingMobileApproval)
            | (AwaitingMobileApproval, Succeeded)
            | (AwaitingMobileApproval, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Code-based second factor kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum TwoFactorMethod {
    Totp,
    Sms,
}

impl TwoFactorMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TwoFactorMethod::Totp => "totp",
            TwoFactorMethod::Sms => "sms",
        }
    }
}

impl fmt::Display for TwoFactorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TwoFactorMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            // "app" is what authenticator-app prompts are usually labelled as
            "totp" | "app" => Ok(TwoFactorMethod::Totp),
            "sms" => Ok(TwoFactorMethod::Sms),
            other => Err(format!("Unknown two-factor method: {}", other)),
        }
    }
}

/// Result of one state-machine step, as the caller sees it
///
/// Serialised with a `status` tag so the JSON body reads
/// `{"status": "waiting_2fa", "twofa_method": "totp"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(tag = "status")]
pub enum LoginOutcome {
    #[serde(rename = "success")]
    Success { username: String },
    #[serde(rename = "waiting_2fa")]
    WaitingTwoFactor {
        twofa_method: TwoFactorMethod,
        /// Set when a previous code was rejected
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "waiting_mobile")]
    WaitingMobile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        verification_code: Option<String>,
    },
    /// The provider wants a challenge this protocol cannot automate
    #[serde(rename = "captcha")]
    CaptchaRequired { error: String },
    #[serde(rename = "error")]
    Error { error: String },
    /// The call was interrupted by a concurrent cancel
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl LoginOutcome {
    /// Whether the session behind this outcome has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            LoginOutcome::WaitingTwoFactor { .. } | LoginOutcome::WaitingMobile { .. }
        )
    }

    pub fn status(&self) -> &'static str {
        match self {
            LoginOutcome::Success { .. } => "success",
            LoginOutcome::WaitingTwoFactor { .. } => "waiting_2fa",
            LoginOutcome::WaitingMobile { .. } => "waiting_mobile",
            LoginOutcome::CaptchaRequired { .. } => "captcha",
            LoginOutcome::Error { .. } => "error",
            LoginOutcome::Cancelled => "cancelled",
        }
    }
}

/// Read-only view of a session, returned by the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SessionSnapshot {
    pub session_id: String,
    pub account: String,
    pub status: SessionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twofa_method: Option<TwoFactorMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_wire_names() {
        assert_eq!(
            serde_json::to_string(&SessionState::AwaitingTwoFactor).unwrap(),
            "\"awaiting_2fa\""
        );
        assert_eq!(
            serde_json::from_str::<SessionState>("\"awaiting_mobile_approval\"").unwrap(),
            SessionState::AwaitingMobileApproval
        );
        assert_eq!(SessionState::Initialized.to_string(), "initialized");
    }

    #[test]
    fn test_transition_graph() {
        use SessionState::*;
        assert!(Initialized.can_transition_to(AwaitingCredentialsResult));
        assert!(AwaitingTwoFactor.can_transition_to(AwaitingTwoFactor));
        assert!(AwaitingMobileApproval.can_transition_to(Cancelled));
        assert!(!Succeeded.can_transition_to(Cancelled));
        assert!(!AwaitingTwoFactor.can_transition_to(Initialized));
        assert!(!Initialized.can_transition_to(Succeeded));
        assert!(!Failed.can_transition_to(AwaitingTwoFactor));
    }

    #[test]
    fn test_two_factor_method_parsing() {
        assert_eq!("totp".parse::<TwoFactorMethod>(), Ok(TwoFactorMethod::Totp));
        assert_eq!("app".parse::<TwoFactorMethod>(), Ok(TwoFactorMethod::Totp));
        assert_eq!("SMS".parse::<TwoFactorMethod>(), Ok(TwoFactorMethod::Sms));
        assert!("webauthn".parse::<TwoFactorMethod>().is_err());
    }

    #[test]
    fn test_outcome_wire_format() {
        let outcome = LoginOutcome::WaitingTwoFactor {
            twofa_method: TwoFactorMethod::Sms,
            error: None,
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"status": "waiting_2fa", "twofa_method": "sms"})
        );

        let parsed: LoginOutcome =
            serde_json::from_str(r#"{"status":"waiting_mobile"}"#).unwrap();
        assert_eq!(
            parsed,
            LoginOutcome::WaitingMobile {
                verification_code: None
            }
        );

        let parsed: LoginOutcome =
            serde_json::from_str(r#"{"status":"captcha","error":"solve it"}"#).unwrap();
        assert!(parsed.is_terminal());
        assert_eq!(parsed.status(), "captcha");
        assert_eq!(
            serde_json::to_value(LoginOutcome::Cancelled).unwrap(),
            serde_json::json!({"status": "cancelled"})
        );
    }
}
