//! wsline binary.
//!
//! # Usage
//!
//! ```bash
//! # Plain session against a local echo server
//! wsline ws://127.0.0.1:9000/echo
//!
//! # Reconnect up to 5 times, verbose logs on stderr
//! wsline --reconnect 5 --log-level debug wss://example.com/socket
//! ```
//!
//! Exit codes: `0` end of input or peer close, `1` connection, send or
//! input failure, `2` invalid arguments or configuration.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wsline::{Endpoint, Session, SessionConfig, WebSocketTransport};

// ============================================================================
// Constants
// ============================================================================

/// Exit code for invalid arguments, endpoint or configuration.
const EXIT_USAGE: u8 = 2;

// ============================================================================
// Args
// ============================================================================

/// Interactive line-oriented WebSocket session
#[derive(Parser, Debug)]
#[command(name = "wsline")]
#[command(about = "Send stdin lines as WebSocket frames, print received frames")]
#[command(version)]
struct Args {
    /// Endpoint URL (ws:// or wss://)
    url: String,

    /// Path to a JSON session config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Handshake timeout in milliseconds
    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    /// Grace period for close confirmation in milliseconds
    #[arg(long)]
    close_grace_ms: Option<u64>,

    /// Reconnect up to N times after a failure (0 disables)
    #[arg(long, value_name = "N")]
    reconnect: Option<u32>,

    /// Initial reconnect delay in milliseconds
    #[arg(long)]
    reconnect_base_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

// ============================================================================
// Functions
// ============================================================================

/// Installs the stderr subscriber. `RUST_LOG` wins over `--log-level`.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Builds the session config from the optional file plus CLI overrides.
fn load_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => SessionConfig::new(),
    };

    if let Some(ms) = args.connect_timeout_ms {
        config = config.with_connect_timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = args.close_grace_ms {
        config = config.with_close_grace(Duration::from_millis(ms));
    }
    if let Some(attempts) = args.reconnect {
        config.reconnect.max_attempts = attempts;
    }
    if let Some(ms) = args.reconnect_base_ms {
        config.reconnect = config.reconnect.with_base_delay(Duration::from_millis(ms));
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn prepare(args: &Args) -> Result<(Endpoint, SessionConfig)> {
    let endpoint = Endpoint::parse(&args.url).context("invalid endpoint")?;
    let config = load_config(args)?;
    Ok((endpoint, config))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    let (endpoint, config) = match prepare(&args) {
        Ok(prepared) => prepared,
        Err(e) => {
            eprintln!("wsline: {e:#}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let session = Session::stdio(WebSocketTransport::new(), config.clone());
    tracing::debug!(session = %session.id(), ?config, "Starting session");

    session.run(endpoint).await.into()
}
