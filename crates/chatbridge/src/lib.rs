//! Relay a Webex 1:1 conversation to local Claude CLI sessions.
//!
//! The bridge polls a bot's direct-message conversation with one authorized
//! user, forwards each message to a resumed `claude` session on this
//! machine, and posts the reply back. Replies longer than the platform's
//! message limit are split on line and character boundaries.
//!
//! # Where to find things
//!
//! - **Talking to Webex:** [`api::executor::RequestExecutor`] runs every
//!   request with retry and backoff; [`api::webex::WebexClient`] provides
//!   the typed calls on top of it.
//! - **Splitting long text:** [`chunking::split_message`].
//! - **Running the assistant:** [`assistant::AssistantCli`].
//! - **Finding sessions:** [`sessions::SessionStore`] reads the CLI's
//!   history file.
//! - **The relay loop and chat commands:** [`bot::Bridge`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Request executor, retry policy, Webex calls |
//! | [`chunking`] | UTF-8 safe message splitting |
//! | [`assistant`] | `claude` subprocess with timeout |
//! | [`sessions`] | Session history and project directories |
//! | [`bot`] | Polling loop, commands, per-room session binding |
//! | [`config`] | [`BridgeConfig`](config::BridgeConfig) and defaults |
//! | [`error`] | Typed errors for each layer |

pub mod api;
pub mod assistant;
pub mod auth;
pub mod bot;
pub mod chunking;
pub mod config;
pub mod error;
pub mod prelude;
pub mod sessions;

// ── Constants ──────────────────────────────────────────────────────

/// Longest stretch of response body or stderr copied into a log line.
pub const MAX_LOG_DETAIL_CHARS: usize = 1000;

/// Truncate to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + 3);
            out.extend(s.chars().take(max_chars));
            out.push_str("...");
            out
        }
        None => s.to_string(),
    }
}
