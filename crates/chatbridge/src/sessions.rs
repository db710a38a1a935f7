//! Read-only discovery of assistant sessions on disk.
//!
//! The assistant records every prompt in `history.jsonl` (one JSON object
//! per line) and keeps a transcript per session under
//! `projects/<encoded project path>/<session id>.jsonl`. The bridge only
//! reads these files; it never writes assistant state.
//!
//! Directory layout:
//! ```text
//! claude_home/
//!   history.jsonl
//!   projects/
//!     -home-me-repo/
//!       3f0c....jsonl
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

/// Maximum characters of a session's display text before truncation.
const MAX_DISPLAY_CHARS: usize = 80;

/// A resumable assistant session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    /// Project path the session was started in.
    pub project: String,
    /// Last prompt text, truncated for display.
    pub display: String,
    /// Unix epoch milliseconds of the last prompt.
    pub timestamp: i64,
    /// Working directory to run the CLI in.
    pub cwd: PathBuf,
    /// Transcript file backing the session.
    pub session_path: PathBuf,
}

/// One line of `history.jsonl`. Unknown fields are ignored.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
struct HistoryEntry {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
    project: Option<String>,
    display: Option<String>,
    timestamp: Option<i64>,
}

/// Reader over an assistant data directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    history_file: PathBuf,
    projects_dir: PathBuf,
    fallback_cwd: PathBuf,
}

impl SessionStore {
    /// Open the store rooted at `claude_home` (usually `~/.claude`).
    pub fn new(claude_home: impl AsRef<Path>) -> Self {
        let home = claude_home.as_ref();
        Self {
            history_file: home.join("history.jsonl"),
            projects_dir: home.join("projects"),
            fallback_cwd: home
                .parent()
                .map_or_else(|| home.to_path_buf(), Path::to_path_buf),
        }
    }

    /// The most recent sessions that still have a transcript, newest first.
    pub fn list_recent(&self, limit: usize) -> io::Result<Vec<SessionInfo>> {
        let Some(mut entries) = self.latest_entries()? else {
            warn!("History file not found: {}", self.history_file.display());
            return Ok(Vec::new());
        };

        // Stable: sessions with equal timestamps keep history order.
        entries.sort_by_key(|e| std::cmp::Reverse(e.timestamp.unwrap_or(0)));

        let mut results = Vec::new();
        for entry in entries {
            if results.len() >= limit {
                break;
            }
            if let Some(info) = self.resolve(entry)? {
                results.push(info);
            }
        }
        Ok(results)
    }

    /// Look up one session. `None` if it is not in the history or its
    /// transcript is gone.
    pub fn get(&self, session_id: &str) -> io::Result<Option<SessionInfo>> {
        let Some(entries) = self.latest_entries()? else {
            return Ok(None);
        };
        match entries
            .into_iter()
            .find(|e| e.session_id.as_deref() == Some(session_id))
        {
            Some(entry) => self.resolve(entry),
            None => Ok(None),
        }
    }

    /// Latest history entry per session, in first-seen order. `None` when
    /// the history file does not exist.
    fn latest_entries(&self) -> io::Result<Option<Vec<HistoryEntry>>> {
        let file = match File::open(&self.history_file) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut order: Vec<HistoryEntry> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Ok(entry) = serde_json::from_str::<HistoryEntry>(line) else {
                continue;
            };
            let Some(id) = entry.session_id.clone().filter(|id| !id.is_empty()) else {
                continue;
            };
            match positions.get(&id) {
                Some(&idx) => order[idx] = entry,
                None => {
                    positions.insert(id, order.len());
                    order.push(entry);
                }
            }
        }
        Ok(Some(order))
    }

    fn resolve(&self, entry: HistoryEntry) -> io::Result<Option<SessionInfo>> {
        let session_id = entry.session_id.unwrap_or_default();
        let project = entry.project.unwrap_or_default();
        let session_path = self
            .projects_dir
            .join(encode_project_path(&project))
            .join(format!("{session_id}.jsonl"));
        if !session_path.is_file() {
            debug!("Skipping session {session_id}: no transcript on disk");
            return Ok(None);
        }

        let cwd = self.extract_cwd(&session_path)?;
        Ok(Some(SessionInfo {
            session_id,
            project,
            display: truncate_display(&entry.display.unwrap_or_default()),
            timestamp: entry.timestamp.unwrap_or(0),
            cwd,
            session_path,
        }))
    }

    /// The `cwd` recorded on the first user message of a transcript.
    fn extract_cwd(&self, session_path: &Path) -> io::Result<PathBuf> {
        let reader = BufReader::new(File::open(session_path)?);
        for line in reader.lines() {
            let line = line?;
            let Ok(entry) = serde_json::from_str::<serde_json::Value>(line.trim()) else {
                continue;
            };
            if entry.get("type").and_then(|t| t.as_str()) == Some("user")
                && let Some(cwd) = entry.get("cwd").and_then(|c| c.as_str())
            {
                return Ok(PathBuf::from(cwd));
            }
        }
        Ok(self.fallback_cwd.clone())
    }
}

/// Project path as encoded in the projects directory (`/` becomes `-`).
pub fn encode_project_path(project: &str) -> String {
    project.replace('/', "-")
}

fn truncate_display(display: &str) -> String {
    if display.chars().count() > MAX_DISPLAY_CHARS {
        let head: String = display.chars().take(MAX_DISPLAY_CHARS - 3).collect();
        format!("{head}...")
    } else {
        display.to_string()
    }
}

// ── Relative time ──────────────────────────────────────────────────

/// Human-readable age of a millisecond timestamp ("5m ago", "2h ago").
pub fn relative_time(timestamp_ms: i64) -> String {
    relative_time_from(timestamp_ms, chrono::Utc::now().timestamp_millis())
}

/// [`relative_time`] against an explicit "now". Future timestamps read as
/// "just now".
pub fn relative_time_from(timestamp_ms: i64, now_ms: i64) -> String {
    let secs = now_ms.saturating_sub(timestamp_ms) / 1000;
    if secs < 60 {
        return "just now".to_string();
    }
    let minutes = secs / 60;
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    let days = hours / 24;
    if days < 30 {
        return format!("{days}d ago");
    }
    format!("{}mo ago", days / 30)
}
