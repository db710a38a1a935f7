//! Relay a Webex direct-message conversation to local `claude` sessions.
//!
//! # Examples
//!
//! ```sh
//! # Credentials from the environment
//! export WEBEX_BOT_TOKEN=...
//! export WEBEX_USER_EMAIL=me@example.com
//! chatbridge
//!
//! # Faster polling, shorter CLI timeout, verbose logs
//! RUST_LOG=chatbridge=debug chatbridge --poll-interval 1 --cli-timeout 120
//! ```

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use chatbridge::api::{RequestExecutor, WebexClient};
use chatbridge::bot::Bridge;
use chatbridge::config::{
    BridgeConfig, DEFAULT_ATTACH_OVER_BYTES, DEFAULT_BASE_URL, DEFAULT_MAX_MESSAGE_BYTES,
    DEFAULT_MAX_SESSIONS_DISPLAYED, duration_from_secs,
};
use chatbridge::error::ConfigError;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Relay a Webex direct-message conversation to local Claude CLI sessions.
#[derive(Parser)]
#[command(name = "chatbridge", version)]
struct Cli {
    // ── Credentials ────────────────────────────────────────────
    /// Webex bot access token
    #[arg(long, env = "WEBEX_BOT_TOKEN", hide_env_values = true)]
    token: String,

    /// The only email address allowed to use the bridge
    #[arg(long, env = "WEBEX_USER_EMAIL")]
    user_email: String,

    // ── Platform ───────────────────────────────────────────────
    /// Webex REST API base URL
    #[arg(long, env = "WEBEX_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Byte limit per outbound message
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_BYTES)]
    max_message_bytes: usize,

    /// Replies longer than this many bytes are sent as a file attachment
    #[arg(long, default_value_t = DEFAULT_ATTACH_OVER_BYTES)]
    attach_over_bytes: usize,

    /// Seconds between polls for new messages
    #[arg(long, env = "CHATBRIDGE_POLL_INTERVAL_SECS", default_value_t = 2.5)]
    poll_interval: f64,

    /// Per-attempt HTTP timeout in seconds
    #[arg(long, default_value_t = 30.0)]
    request_timeout: f64,

    // ── Assistant ──────────────────────────────────────────────
    /// Seconds before a CLI call is killed
    #[arg(long, env = "CHATBRIDGE_CLI_TIMEOUT_SECS", default_value_t = 300.0)]
    cli_timeout: f64,

    /// Assistant data directory (default: ~/.claude)
    #[arg(long, env = "CHATBRIDGE_CLAUDE_HOME")]
    claude_home: Option<PathBuf>,

    /// Path to the claude binary (default: search PATH)
    #[arg(long, env = "CHATBRIDGE_CLAUDE_BIN")]
    claude_bin: Option<PathBuf>,

    /// Number of sessions listed by /sessions
    #[arg(long, default_value_t = DEFAULT_MAX_SESSIONS_DISPLAYED)]
    max_sessions: usize,

    /// Do not pass --dangerously-skip-permissions to the CLI
    #[arg(long)]
    no_skip_permissions: bool,
}

impl Cli {
    fn into_config(self) -> Result<BridgeConfig, ConfigError> {
        let mut config = BridgeConfig::new(self.token, self.user_email)
            .with_base_url(self.base_url)
            .with_max_message_bytes(self.max_message_bytes)
            .with_attach_over_bytes(self.attach_over_bytes)
            .with_poll_interval(duration_from_secs("poll interval", self.poll_interval)?)
            .with_request_timeout(duration_from_secs(
                "request timeout",
                self.request_timeout,
            )?)
            .with_cli_timeout(duration_from_secs("CLI timeout", self.cli_timeout)?)
            .with_skip_permissions(!self.no_skip_permissions);
        config.max_sessions_displayed = self.max_sessions;
        if let Some(home) = self.claude_home {
            config = config.with_claude_home(home);
        }
        if let Some(bin) = self.claude_bin {
            config = config.with_claude_binary(bin);
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Cli::parse().into_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };
    info!(
        "Starting bridge for {} (claude home: {})",
        config.user_email,
        config.claude_home.display()
    );

    let api = WebexClient::new(RequestExecutor::new(&config));
    let bridge = Arc::new(Bridge::new(config, api));

    let outcome = tokio::select! {
        result = Arc::clone(&bridge).run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    };
    bridge.api().executor().close();

    if let Err(e) = outcome {
        error!("Bridge stopped: {e}");
        if e.is_fatal() {
            eprintln!("Error: {e}. Check WEBEX_BOT_TOKEN.");
        }
        process::exit(1);
    }
}
