//! Authflow CLI
//!
//! Walks a login session interactively: password first, then a two-factor
//! code or a push approval, whichever the server asks for.

use anyhow::{bail, Context};
use authflow_client::{ClientConfig, HttpLoginApi, SessionClient};
use authflow_core::{init_logging, LoggingConfig, LoginOutcome, DEFAULT_ACCOUNT};
use clap::{Parser, Subcommand};
use dialoguer::{theme::ColorfulTheme, Input, Password};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Parser)]
#[command(name = "authflow")]
#[command(about = "Log in through an authflow server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server base URL
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Site password, when the server is behind the password gate
    #[arg(long)]
    site_password: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in interactively
    Login {
        /// Account label
        #[arg(short, long, default_value = DEFAULT_ACCOUNT)]
        account: String,

        /// Username; prompted for when omitted
        #[arg(short, long)]
        username: Option<String>,

        /// Seconds to wait per mobile approval round
        #[arg(long, default_value = "30")]
        wait_seconds: u64,

        /// Approval rounds before giving up
        #[arg(long, default_value = "10")]
        max_waits: u32,
    },

    /// Report whether an account needs an interactive login
    NeedsLogin {
        #[arg(short, long, default_value = DEFAULT_ACCOUNT)]
        account: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&LoggingConfig::default().with_level(cli.log_level.clone()))
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let config = ClientConfig::new(cli.server.clone()).with_site_password(cli.site_password.clone());
    let api = HttpLoginApi::new(config).context("Failed to create HTTP client")?;
    let mut client = SessionClient::new(Arc::new(api));

    match cli.command {
        Commands::Login {
            account,
            username,
            wait_seconds,
            max_waits,
        } => {
            let username = match username {
                Some(username) => username,
                None => Input::with_theme(&ColorfulTheme::default())
                    .with_prompt("Username")
                    .interact_text()?,
            };
            let password = Password::with_theme(&ColorfulTheme::default())
                .with_prompt("Password")
                .interact()?;

            let outcome = client
                .login(Some(&account), &username, &password)
                .await
                .context("Credential submission failed")?;

            let username = drive(
                &mut client,
                outcome,
                Duration::from_secs(wait_seconds),
                max_waits,
            )
            .await?;
            println!("✅ Logged in as {}", username);
        }
        Commands::NeedsLogin { account } => {
            let needs = client.needs_login(Some(&account)).await?;
            if needs {
                println!("Account '{}' needs a login", account);
            } else {
                println!("Account '{}' is logged in", account);
            }
        }
    }

    Ok(())
}

/// Follow outcomes until the login settles; returns the resolved username
async fn drive(
    client: &mut SessionClient,
    mut outcome: LoginOutcome,
    wait: Duration,
    max_waits: u32,
) -> anyhow::Result<String> {
    let mut waits = 0;

    loop {
        debug!("Outcome: {}", outcome.status());
        outcome = match outcome {
            LoginOutcome::Success { username } => return Ok(username),
            LoginOutcome::WaitingTwoFactor {
                twofa_method,
                error,
            } => {
                if let Some(error) = error {
                    println!("❌ {}", error);
                }
                let code: String = Input::with_theme(&ColorfulTheme::default())
                    .with_prompt(format!("Enter {} code", twofa_method))
                    .interact_text()?;
                client.submit_two_factor(code.trim()).await?
            }
            LoginOutcome::WaitingMobile { verification_code } => {
                if waits == 0 {
                    match verification_code {
                        Some(code) => println!("📱 Approve the login on your device (code {})", code),
                        None => println!("📱 Approve the login on your device"),
                    }
                }
                if waits >= max_waits {
                    client.cancel().await?;
                    bail!("Gave up waiting for approval");
                }
                waits += 1;

                let waited = tokio::select! {
                    result = client.wait_for_mobile(Some(wait)) => Some(result),
                    _ = tokio::signal::ctrl_c() => None,
                };
                match waited {
                    Some(result) => result?,
                    None => {
                        client.cancel().await?;
                        bail!("Login cancelled");
                    }
                }
            }
            LoginOutcome::CaptchaRequired { error } => bail!("Manual step required: {}", error),
            LoginOutcome::Error { error } => bail!("Login failed: {}", error),
            LoginOutcome::Cancelled => bail!("Login was cancelled"),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["authflow", "login", "--username", "octocat"]);
        assert_eq!(cli.server, "http://127.0.0.1:8080");
        match cli.command {
            Commands::Login {
                account,
                username,
                wait_seconds,
                max_waits,
            } => {
                assert_eq!(account, "default");
                assert_eq!(username.as_deref(), Some("octocat"));
                assert_eq!(wait_seconds, 30);
                assert_eq!(max_waits, 10);
            }
            _ => panic!("expected login command"),
        }

        let cli = Cli::parse_from([
            "authflow",
            "--server",
            "http://auth.local:9000",
            "needs-login",
            "--account",
            "work",
        ]);
        assert_eq!(cli.server, "http://auth.local:9000");
        assert!(matches!(cli.command, Commands::NeedsLogin { account } if account == "work"));
    }
}
