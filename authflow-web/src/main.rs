//! Authflow Web Server
//!
//! Serves the login session protocol over HTTP.

use anyhow::Context;
use authflow_core::{AuthflowConfig, LoggingConfig};
use authflow_web::server::AuthflowServerBuilder;
use authflow_web::{init_logging, WebConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

/// Authflow Web Server - multi-step login sessions over HTTP
#[derive(Parser)]
#[command(name = "authflow-web")]
#[command(about = "HTTP gateway for authflow login sessions")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory for the site secret and account registry
    #[arg(long)]
    auth_state_dir: Option<PathBuf>,

    /// Bypass the site password gate
    #[arg(long)]
    test_mode: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    let mut config = match AuthflowConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            // No config means no logging settings yet; fall back to defaults to report it
            init_logging(&LoggingConfig::default().with_level(args.log_level)).ok();
            e.log();
            return Err(e).context("Failed to load configuration");
        }
    };

    init_logging(&config.logging.clone().with_level(args.log_level))?;

    // Command line arguments win over file and environment
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(dir) = args.auth_state_dir {
        config.server.auth_state_dir = dir;
    }
    if args.test_mode {
        config.server.test_mode = true;
    }

    let config = WebConfig::from(config);

    if config.accounts.is_empty() {
        warn!("No [[accounts]] configured; every credential submission will be rejected");
    }

    info!("Auth state directory: {}", config.auth_state_dir.display());

    let server = AuthflowServerBuilder::from_config(config)
        .build()
        .await
        .context("Failed to build server")?;

    server.start().await.context("Server failed")?;

    info!("Server shut down gracefully");
    Ok(())
}
