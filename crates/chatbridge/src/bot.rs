//! The relay loop: poll for direct messages, authorize, dispatch, reply.
//!
//! The bridge polls the 1:1 conversation with the authorized user. Every new
//! message is handled on its own task, so a slow assistant call never holds
//! up polling. Replies go out through
//! [`WebexClient::send_chunked`](crate::api::webex::WebexClient::send_chunked).
//!
//! A conversation (room) is bound to one assistant session with
//! `/connect`; plain text in a bound room is forwarded to that session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::api::webex::{ChatMessage, Target, WebexClient};
use crate::assistant::AssistantCli;
use crate::auth::is_authorized;
use crate::config::BridgeConfig;
use crate::error::ApiError;
use crate::sessions::{SessionInfo, SessionStore, relative_time};

const HELP_TEXT: &str = "\
**Commands**
- `/sessions` list recent assistant sessions
- `/connect <number|session-id>` bind this conversation to a session
- `/status` show the connected session
- `/disconnect` unbind this conversation
- `/help` show this message

Anything else is sent to the connected session.";

const READY_TEXT: &str = "Bridge is online. Send `/sessions` to pick a session, or `/help`.";

/// File name for replies too long to inline.
const REPLY_FILE_NAME: &str = "reply.txt";

const NOT_CONNECTED_TEXT: &str =
    "No session connected. Send `/sessions`, then `/connect <number>`.";

// ── Commands ───────────────────────────────────────────────────────

/// A parsed incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Sessions,
    Connect(String),
    Disconnect,
    Status,
    /// Free text for the assistant.
    Prompt(String),
}

impl Command {
    /// Parse message text. Unknown slash-words are treated as prompts so
    /// the assistant's own slash commands still reach it.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let (head, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (trimmed, ""),
        };
        match head.to_lowercase().as_str() {
            "/help" => Command::Help,
            "/sessions" => Command::Sessions,
            "/connect" => Command::Connect(rest.to_string()),
            "/disconnect" => Command::Disconnect,
            "/status" => Command::Status,
            _ => Command::Prompt(trimmed.to_string()),
        }
    }
}

/// Messages newer than `last_seen`, oldest first, excluding the bot's own.
///
/// `messages` is newest first, as the platform returns it. `None` means the
/// conversation was empty at the previous poll, so everything is new. If
/// `last_seen` is not in the page, nothing is reported: replaying a whole
/// page of old messages to the assistant is worse than missing a burst.
pub fn fresh_messages(
    messages: &[ChatMessage],
    last_seen: Option<&str>,
    bot_id: &str,
) -> Vec<ChatMessage> {
    let end = match last_seen {
        Some(seen) => match messages.iter().position(|m| m.id == seen) {
            Some(pos) => pos,
            None => return Vec::new(),
        },
        None => messages.len(),
    };
    messages[..end]
        .iter()
        .rev()
        .filter(|m| m.person_id != bot_id)
        .cloned()
        .collect()
}

// ── Bridge ─────────────────────────────────────────────────────────

/// Per-room session bindings plus the last `/sessions` listing.
#[derive(Default)]
struct Bindings {
    by_room: HashMap<String, SessionInfo>,
    last_listing: Vec<SessionInfo>,
}

/// The running bridge.
pub struct Bridge {
    config: BridgeConfig,
    api: WebexClient,
    assistant: AssistantCli,
    sessions: SessionStore,
    bindings: Mutex<Bindings>,
}

impl Bridge {
    pub fn new(config: BridgeConfig, api: WebexClient) -> Self {
        let assistant = AssistantCli::new(&config);
        let sessions = SessionStore::new(&config.claude_home);
        Self {
            config,
            api,
            assistant,
            sessions,
            bindings: Mutex::new(Bindings::default()),
        }
    }

    pub fn with_assistant(mut self, assistant: AssistantCli) -> Self {
        self.assistant = assistant;
        self
    }

    pub fn api(&self) -> &WebexClient {
        &self.api
    }

    /// Start the executor, greet the user, and poll until a fatal error.
    ///
    /// Transient polling failures are logged and retried on the next tick.
    /// Only fatal errors (a rejected token) end the loop.
    pub async fn run(self: Arc<Self>) -> Result<(), ApiError> {
        self.api.executor().start()?;

        let me = self.api.me().await?;
        info!("Connected as {} ({})", me.display_name, me.id);

        let user = Target::person(&self.config.user_email);
        if let Err(e) = self.api.post_text(&user, READY_TEXT).await {
            if e.is_fatal() {
                return Err(e);
            }
            warn!("Could not send ready message: {e}");
        }

        let (fatal_tx, mut fatal_rx) = mpsc::channel::<ApiError>(1);
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_seen: Option<String> = None;
        let mut primed = false;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                Some(err) = fatal_rx.recv() => return Err(err),
            }

            let messages = match self.api.list_direct_messages(&self.config.user_email).await {
                Ok(m) => m,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Polling failed: {e}");
                    continue;
                }
            };

            let fresh = if !primed {
                primed = true;
                Vec::new()
            } else {
                if let Some(seen) = last_seen.as_deref()
                    && !messages.iter().any(|m| m.id == seen)
                {
                    warn!("Last seen message {seen} is no longer listed; skipping this page");
                }
                fresh_messages(&messages, last_seen.as_deref(), &me.id)
            };
            if let Some(newest) = messages.first() {
                last_seen = Some(newest.id.clone());
            }

            for message in fresh {
                let bridge = Arc::clone(&self);
                let fatal_tx = fatal_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = bridge.handle_message(message).await {
                        if e.is_fatal() {
                            let _ = fatal_tx.send(e).await;
                        } else {
                            error!("Failed to send reply: {e}");
                        }
                    }
                });
            }
        }
    }

    /// Handle one incoming message end to end.
    ///
    /// Unauthorized senders get no reply. Returns the error of a failed
    /// reply send.
    pub async fn handle_message(&self, message: ChatMessage) -> Result<(), ApiError> {
        if !is_authorized(&message.person_email, &self.config.user_email) {
            return Ok(());
        }
        let text = message.text.as_deref().unwrap_or_default();
        if text.trim().is_empty() {
            debug!("Ignoring message {} without text", message.id);
            return Ok(());
        }

        let reply = self.respond(&message.room_id, Command::parse(text)).await;
        let room = Target::room(&message.room_id);
        if reply.len() > self.config.attach_over_bytes {
            let note = format!(
                "Reply is {} bytes, attached as `{REPLY_FILE_NAME}`.",
                reply.len()
            );
            self.api
                .post_file(&room, &note, REPLY_FILE_NAME, reply.into_bytes())
                .await?;
            debug!("Replied to {} with an attachment", message.id);
            return Ok(());
        }
        let sent = self
            .api
            .send_chunked(&room, &reply, self.config.max_message_bytes)
            .await?;
        debug!("Replied to {} in {sent} message(s)", message.id);
        Ok(())
    }

    /// Produce the reply text for a command in `room_id`.
    pub async fn respond(&self, room_id: &str, command: Command) -> String {
        match command {
            Command::Help => HELP_TEXT.to_string(),
            Command::Sessions => self.list_sessions().await,
            Command::Connect(arg) => self.connect(room_id, &arg).await,
            Command::Disconnect => match self.lock().by_room.remove(room_id) {
                Some(info) => format!("Disconnected from session `{}`.", info.session_id),
                None => "No session was connected.".to_string(),
            },
            Command::Status => match self.lock().by_room.get(room_id) {
                Some(info) => describe_session("Connected to", info),
                None => NOT_CONNECTED_TEXT.to_string(),
            },
            Command::Prompt(prompt) => {
                let bound = self.lock().by_room.get(room_id).cloned();
                match bound {
                    Some(info) => {
                        self.assistant
                            .reply(&info.session_id, &prompt, &info.cwd)
                            .await
                    }
                    None => NOT_CONNECTED_TEXT.to_string(),
                }
            }
        }
    }

    async fn list_sessions(&self) -> String {
        let store = self.sessions.clone();
        let limit = self.config.max_sessions_displayed;
        let listing = match tokio::task::spawn_blocking(move || store.list_recent(limit)).await {
            Ok(Ok(listing)) => listing,
            Ok(Err(e)) => {
                error!("Failed to read session history: {e}");
                return "Error: could not read session history.".to_string();
            }
            Err(e) => {
                error!("Session listing task failed: {e}");
                return "Error: could not read session history.".to_string();
            }
        };

        if listing.is_empty() {
            return "No sessions found.".to_string();
        }
        let text = format_listing(&listing);
        self.lock().last_listing = listing;
        text
    }

    async fn connect(&self, room_id: &str, arg: &str) -> String {
        if arg.is_empty() {
            return "Usage: `/connect <number|session-id>`".to_string();
        }

        let from_listing = arg.parse::<usize>().ok().and_then(|n| {
            let bindings = self.lock();
            n.checked_sub(1)
                .and_then(|i| bindings.last_listing.get(i).cloned())
        });

        let info = match from_listing {
            Some(info) => Some(info),
            None => {
                let store = self.sessions.clone();
                let id = arg.to_string();
                match tokio::task::spawn_blocking(move || store.get(&id)).await {
                    Ok(Ok(found)) => found,
                    Ok(Err(e)) => {
                        error!("Failed to look up session: {e}");
                        None
                    }
                    Err(e) => {
                        error!("Session lookup task failed: {e}");
                        None
                    }
                }
            }
        };

        match info {
            Some(info) => {
                let text = describe_session("Connected to", &info);
                info!("Room bound to session {}", info.session_id);
                self.lock().by_room.insert(room_id.to_string(), info);
                text
            }
            None => format!("Session not found: `{arg}`. Send `/sessions` to list them."),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Bindings> {
        self.bindings.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn format_listing(listing: &[SessionInfo]) -> String {
    let mut text = String::from("**Recent sessions**\n");
    for (i, info) in listing.iter().enumerate() {
        let display = if info.display.is_empty() {
            "(no prompt)"
        } else {
            info.display.as_str()
        };
        text.push_str(&format!(
            "{}. {display}\n   `{}` · {} · {}\n",
            i + 1,
            info.session_id,
            info.project,
            relative_time(info.timestamp)
        ));
    }
    text.push_str("\nReply `/connect <number>` to continue one.");
    text
}

fn describe_session(prefix: &str, info: &SessionInfo) -> String {
    format!(
        "{prefix} session `{}`\nProject: {}\nWorking directory: {}",
        info.session_id,
        info.project,
        info.cwd.display()
    )
}
