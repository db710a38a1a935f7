//! Error types for the bridge.
//!
//! Each concern gets its own enum so callers can match exhaustively:
//! [`ApiError`] for chat-platform calls, [`AssistantError`] for the local
//! CLI subprocess, and [`ConfigError`] for startup validation.

use std::io;
use std::time::Duration;

use crate::api::retry::FailureKind;

/// Failure of a Request Executor call.
///
/// Retryable conditions (rate limiting, server errors, network faults) are
/// resolved inside the executor; a caller only sees them once the attempt
/// budget is spent.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// `execute` was called before `start()` or after `close()`.
    #[error("request executor not started: call start() before sending requests")]
    NotStarted,
    /// The platform rejected the bot token. Not recoverable by retrying.
    #[error("unauthorized (HTTP 401): the bot token was rejected")]
    Unauthorized,
    /// A 4xx other than 401/429. Surfaced immediately.
    #[error("client error: HTTP {status}")]
    Client { status: u16 },
    /// Every attempt ended in a retryable HTTP failure.
    #[error("retries exhausted after {attempts} attempts (last failure: {last})")]
    RetriesExhausted { attempts: u32, last: FailureKind },
    /// Transport-level fault from the final attempt, unchanged.
    #[error(transparent)]
    Network(reqwest::Error),
    /// A 2xx response whose body was not the expected JSON.
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),
    /// The HTTP client or a request could not be constructed.
    #[error("failed to build HTTP request: {0}")]
    Build(#[source] reqwest::Error),
}

impl ApiError {
    /// Whether this error should terminate the process.
    ///
    /// A rejected credential cannot heal while the bridge is running.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

/// Failure of a call to the local assistant CLI.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("'claude' CLI not found on PATH")]
    NotFound,
    #[error("failed to start CLI: {0}")]
    Spawn(#[source] io::Error),
    #[error("CLI timed out after {} seconds", format_secs(.timeout))]
    Timeout { timeout: Duration },
    #[error("CLI exited with code {code}")]
    NonZeroExit { code: i32, credentials_hint: bool },
    #[error("CLI produced no output")]
    Empty,
}

impl AssistantError {
    /// Render the failure as a chat reply, so the remote user always gets
    /// an answer.
    pub fn to_reply(&self) -> String {
        match self {
            AssistantError::NotFound => "Error: 'claude' CLI not found on PATH.".to_string(),
            AssistantError::Spawn(e) => format!("Error starting CLI: {e}"),
            AssistantError::Timeout { timeout } => {
                format!(
                    "Error: CLI timed out after {} seconds. The process was killed.",
                    format_secs(timeout)
                )
            }
            AssistantError::NonZeroExit {
                code,
                credentials_hint,
            } => {
                let mut msg = format!("CLI exited with code {code}.");
                if *credentials_hint {
                    msg.push_str(
                        "\n\nThis may be an AWS credentials issue. Check your credentials.",
                    );
                }
                msg
            }
            AssistantError::Empty => "(empty response)".to_string(),
        }
    }
}

/// Invalid startup configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("bot token must not be empty")]
    EmptyToken,
    #[error("authorized email {0:?} is not a valid address")]
    InvalidEmail(String),
    #[error("maximum message size must be at least 1 byte")]
    ZeroMessageBytes,
    #[error("{name} must be a positive, finite number of seconds (got {value})")]
    InvalidDuration { name: &'static str, value: f64 },
}

/// Whole seconds print as integers, anything else with one decimal.
fn format_secs(d: &Duration) -> String {
    if d.subsec_nanos() == 0 {
        d.as_secs().to_string()
    } else {
        format!("{:.1}", d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unauthorized_is_fatal() {
        assert!(ApiError::Unauthorized.is_fatal());
        assert!(!ApiError::NotStarted.is_fatal());
        assert!(!ApiError::Client { status: 404 }.is_fatal());
        assert!(
            !ApiError::RetriesExhausted {
                attempts: 3,
                last: FailureKind::RateLimited
            }
            .is_fatal()
        );
    }

    #[test]
    fn exhausted_error_names_last_failure() {
        let err = ApiError::RetriesExhausted {
            attempts: 3,
            last: FailureKind::ServerError,
        };
        assert!(err.to_string().ends_with("(last failure: server error)"));
        assert!(err.to_string().starts_with("retries exhausted after 3 attempts"));
    }

    #[test]
    fn timeout_reply_mentions_kill() {
        let reply = AssistantError::Timeout {
            timeout: Duration::from_secs(300),
        }
        .to_reply();
        assert_eq!(
            reply,
            "Error: CLI timed out after 300 seconds. The process was killed."
        );
        let short = AssistantError::Timeout {
            timeout: Duration::from_millis(200),
        };
        assert_eq!(short.to_string(), "CLI timed out after 0.2 seconds");
    }

    #[test]
    fn non_zero_exit_reply_includes_credentials_hint() {
        let plain = AssistantError::NonZeroExit {
            code: 2,
            credentials_hint: false,
        }
        .to_reply();
        assert_eq!(plain, "CLI exited with code 2.");

        let hinted = AssistantError::NonZeroExit {
            code: 1,
            credentials_hint: true,
        }
        .to_reply();
        assert!(hinted.starts_with("CLI exited with code 1."));
        assert!(hinted.contains("credentials"));
    }

    #[test]
    fn empty_reply_placeholder() {
        assert_eq!(AssistantError::Empty.to_reply(), "(empty response)");
    }
}
