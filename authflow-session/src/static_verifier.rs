//! Config-driven identity verifier
//!
//! Answers from the `[[accounts]]` table of the configuration file. Used by the
//! bundled server and for local end-to-end runs of the protocol.

use crate::verifier::{
    ApprovalCheck, Challenge, CodeCheck, CredentialAttempt, CredentialCheck, IdentityVerifier,
};
use crate::SessionResult;
use async_trait::async_trait;
use authflow_core::{SecondFactor, StaticAccount, TwoFactorMethod};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

pub const INVALID_CREDENTIALS: &str = "invalid credentials";
pub const INVALID_CODE: &str = "invalid code";
pub const CAPTCHA_MESSAGE: &str =
    "CAPTCHA required; complete this login in an interactive browser session";

/// Verifier backed by a fixed account table
pub struct StaticIdentityVerifier {
    accounts: HashMap<String, StaticAccount>,
    /// When each session started waiting for a mobile approval
    approval_started: RwLock<HashMap<String, Instant>>,
    /// Sessions approved out of band
    approved: RwLock<HashSet<String>>,
}

impl StaticIdentityVerifier {
    pub fn new(accounts: Vec<StaticAccount>) -> Self {
        info!("Static identity verifier loaded {} accounts", accounts.len());
        Self {
            accounts: accounts
                .into_iter()
                .map(|account| (account.username.clone(), account))
                .collect(),
            approval_started: RwLock::new(HashMap::new()),
            approved: RwLock::new(HashSet::new()),
        }
    }

    /// Approve a pending mobile challenge as if the companion app did
    pub async fn approve(&self, session_id: &str) {
        self.approved.write().await.insert(session_id.to_string());
    }

    fn resolved_username(account: &StaticAccount) -> String {
        account
            .resolved_username
            .clone()
            .unwrap_or_else(|| account.username.clone())
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn check_credentials(&self, attempt: &CredentialAttempt) -> SessionResult<CredentialCheck> {
        let account = match self.accounts.get(&attempt.username) {
            Some(account) if account.password == attempt.password => account,
            _ => {
                debug!("Rejected credentials for session {}", attempt.session_id);
                return Ok(CredentialCheck::Rejected {
                    message: INVALID_CREDENTIALS.to_string(),
                });
            }
        };

        let check = match &account.second_factor {
            SecondFactor::None => CredentialCheck::Authenticated {
                username: Self::resolved_username(account),
            },
            SecondFactor::Totp { .. } => CredentialCheck::TwoFactorRequired {
                method: TwoFactorMethod::Totp,
            },
            SecondFactor::Sms { .. } => CredentialCheck::TwoFactorRequired {
                method: TwoFactorMethod::Sms,
            },
            SecondFactor::Mobile {
                verification_code, ..
            } => {
                self.approval_started
                    .write()
                    .await
                    .insert(attempt.session_id.clone(), Instant::now());
                CredentialCheck::MobileApprovalRequired {
                    verification_code: verification_code.clone(),
                }
            }
            SecondFactor::Captcha => CredentialCheck::ManualInterventionRequired {
                message: CAPTCHA_MESSAGE.to_string(),
            },
        };

        Ok(check)
    }

    async fn check_code(&self, challenge: &Challenge, code: &str) -> SessionResult<CodeCheck> {
        let Some(account) = self.accounts.get(&challenge.username) else {
            return Ok(CodeCheck::Failed {
                message: format!("unknown account {}", challenge.username),
            });
        };

        let expected = match &account.second_factor {
            SecondFactor::Totp { code } | SecondFactor::Sms { code } => code,
            _ => {
                return Ok(CodeCheck::Failed {
                    message: "no code challenge is pending for this account".to_string(),
                })
            }
        };

        if expected.trim() == code.trim() {
            Ok(CodeCheck::Authenticated {
                username: Self::resolved_username(account),
            })
        } else {
            Ok(CodeCheck::Rejected {
                message: INVALID_CODE.to_string(),
            })
        }
    }

    async fn check_approval(&self, challenge: &Challenge) -> SessionResult<ApprovalCheck> {
        let Some(account) = self.accounts.get(&challenge.username) else {
            return Ok(ApprovalCheck::Denied {
                message: format!("unknown account {}", challenge.username),
            });
        };

        let SecondFactor::Mobile {
            approve_after_seconds,
            deny,
            ..
        } = &account.second_factor
        else {
            return Ok(ApprovalCheck::Denied {
                message: "no mobile approval is pending for this account".to_string(),
            });
        };

        if *deny {
            return Ok(ApprovalCheck::Denied {
                message: "approval denied on the mobile device".to_string(),
            });
        }

        if self.approved.read().await.contains(&challenge.session_id) {
            return Ok(ApprovalCheck::Approved {
                username: Self::resolved_username(account),
            });
        }

        let started = self
            .approval_started
            .read()
            .await
            .get(&challenge.session_id)
            .copied();
        let due = match (approve_after_seconds, started) {
            (Some(after), Some(started)) => started.elapsed().as_secs() >= *after,
            _ => false,
        };

        if due {
            Ok(ApprovalCheck::Approved {
                username: Self::resolved_username(account),
            })
        } else {
            Ok(ApprovalCheck::Pending)
        }
    }

    async fn release(&self, session_id: &str) {
        self.approval_started.write().await.remove(session_id);
        self.approved.write().await.remove(session_id);
    }
}
