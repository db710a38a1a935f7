//! Process-wide bridge configuration.
//!
//! [`BridgeConfig`] is built once at startup (the binary fills it from CLI
//! flags and environment variables), validated, and then shared by
//! reference. Nothing reads the environment after that point.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::retry::RetryPolicy;
use crate::error::ConfigError;

/// Default Webex REST API base URL.
pub const DEFAULT_BASE_URL: &str = "https://webexapis.com/v1";

/// Largest outbound message we send. The platform limit is about 7439
/// bytes; this leaves headroom for markdown processing.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 7000;

/// Delay between polls for new direct messages.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2500);

/// Upper bound on one assistant CLI invocation.
pub const DEFAULT_CLI_TIMEOUT: Duration = Duration::from_secs(300);

/// Per-attempt HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Replies longer than this are sent as a file instead of chunks.
pub const DEFAULT_ATTACH_OVER_BYTES: usize = 4 * DEFAULT_MAX_MESSAGE_BYTES;

/// Number of sessions shown by `/sessions`.
pub const DEFAULT_MAX_SESSIONS_DISPLAYED: usize = 10;

/// Immutable bridge settings.
#[derive(Clone)]
pub struct BridgeConfig {
    /// Bot access token, sent as a bearer credential.
    pub bot_token: String,
    /// The one email address allowed to talk to the bot.
    pub user_email: String,
    /// Chat platform API base URL.
    pub base_url: String,
    /// Byte budget per outbound message.
    pub max_message_bytes: usize,
    /// Replies above this size go out as one attachment.
    pub attach_over_bytes: usize,
    /// Delay between message polls.
    pub poll_interval: Duration,
    /// Overall timeout for one assistant CLI call.
    pub cli_timeout: Duration,
    /// Timeout for one HTTP attempt.
    pub request_timeout: Duration,
    /// Retry behavior for chat-platform calls.
    pub retry: RetryPolicy,
    /// Assistant data directory (holds `history.jsonl` and `projects/`).
    pub claude_home: PathBuf,
    /// Number of sessions listed by `/sessions`.
    pub max_sessions_displayed: usize,
    /// Pass `--dangerously-skip-permissions` to the assistant CLI.
    pub skip_permissions: bool,
    /// Explicit assistant binary. `None` searches `PATH` on each call.
    pub claude_binary: Option<PathBuf>,
}

impl BridgeConfig {
    /// Create a config with the required credentials and default settings.
    pub fn new(bot_token: impl Into<String>, user_email: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            user_email: user_email.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            attach_over_bytes: DEFAULT_ATTACH_OVER_BYTES,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cli_timeout: DEFAULT_CLI_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
            claude_home: default_claude_home(),
            max_sessions_displayed: DEFAULT_MAX_SESSIONS_DISPLAYED,
            skip_permissions: true,
            claude_binary: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_max_message_bytes(mut self, bytes: usize) -> Self {
        self.max_message_bytes = bytes;
        self
    }

    pub fn with_attach_over_bytes(mut self, bytes: usize) -> Self {
        self.attach_over_bytes = bytes;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_cli_timeout(mut self, timeout: Duration) -> Self {
        self.cli_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_claude_home(mut self, dir: impl Into<PathBuf>) -> Self {
        self.claude_home = dir.into();
        self
    }

    pub fn with_skip_permissions(mut self, skip: bool) -> Self {
        self.skip_permissions = skip;
        self
    }

    pub fn with_claude_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.claude_binary = Some(path.into());
        self
    }

    /// Check the settings that would otherwise fail later and confusingly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::EmptyToken);
        }
        let email = self.user_email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ConfigError::InvalidEmail(self.user_email.clone()));
        }
        if self.max_message_bytes == 0 {
            return Err(ConfigError::ZeroMessageBytes);
        }
        Ok(())
    }
}

// The token must never reach logs.
impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("bot_token", &"<redacted>")
            .field("user_email", &self.user_email)
            .field("base_url", &self.base_url)
            .field("max_message_bytes", &self.max_message_bytes)
            .field("attach_over_bytes", &self.attach_over_bytes)
            .field("poll_interval", &self.poll_interval)
            .field("cli_timeout", &self.cli_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .field("claude_home", &self.claude_home)
            .field("max_sessions_displayed", &self.max_sessions_displayed)
            .field("skip_permissions", &self.skip_permissions)
            .field("claude_binary", &self.claude_binary)
            .finish()
    }
}

/// Convert a user-supplied number of seconds into a [`Duration`].
pub fn duration_from_secs(name: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    if secs <= 0.0 {
        return Err(ConfigError::InvalidDuration { name, value: secs });
    }
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidDuration { name, value: secs })
}

fn default_claude_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(".").to_path_buf())
        .join(".claude")
}
