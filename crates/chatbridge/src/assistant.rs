//! Subprocess bridge to the local assistant CLI.
//!
//! Each chat message becomes one `claude --print --resume <session>` call
//! run in the session's working directory. The call is bounded by the
//! configured timeout; on expiry the child is killed and reaped before the
//! timeout is reported, so no process outlives its request.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::config::BridgeConfig;
use crate::error::AssistantError;
use crate::{MAX_LOG_DETAIL_CHARS, truncate_chars};

/// Name of the assistant binary looked up on `PATH`.
pub const CLI_NAME: &str = "claude";

/// Environment variable the CLI uses to detect that it runs inside itself.
const NESTING_ENV_VAR: &str = "CLAUDECODE";

/// Runs prompts through the assistant CLI.
#[derive(Debug, Clone)]
pub struct AssistantCli {
    binary: Option<PathBuf>,
    timeout: Duration,
    skip_permissions: bool,
}

impl AssistantCli {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            binary: config.claude_binary.clone(),
            timeout: config.cli_timeout,
            skip_permissions: config.skip_permissions,
        }
    }

    /// Use a specific binary instead of searching `PATH`.
    pub fn with_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Locate the CLI. The lookup happens per call so installing the CLI
    /// while the bridge runs takes effect without a restart.
    pub fn discover(&self) -> Option<PathBuf> {
        self.binary
            .clone()
            .or_else(|| which::which(CLI_NAME).ok())
    }

    /// Command-line arguments for one prompt.
    pub fn build_args(&self, session_id: &str, message: &str) -> Vec<String> {
        let mut args = vec![
            "--print".to_string(),
            "--output-format".to_string(),
            "text".to_string(),
            "--resume".to_string(),
            session_id.to_string(),
        ];
        if self.skip_permissions {
            args.push("--dangerously-skip-permissions".to_string());
        }
        args.push(message.to_string());
        args
    }

    /// Send `message` to the session and return the reply text.
    pub async fn send_message(
        &self,
        session_id: &str,
        message: &str,
        cwd: &Path,
    ) -> Result<String, AssistantError> {
        let binary = self.discover().ok_or(AssistantError::NotFound)?;
        let args = self.build_args(session_id, message);

        info!(
            "Running: {} --resume {session_id} ... (cwd={})",
            binary.display(),
            cwd.display()
        );

        let mut child = Command::new(&binary)
            .args(&args)
            .current_dir(cwd)
            .env_remove(NESTING_ENV_VAR)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => AssistantError::NotFound,
                _ => AssistantError::Spawn(e),
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let finished = tokio::time::timeout(self.timeout, async {
            tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr))
        })
        .await;

        let (status, stdout, stderr) = match finished {
            Ok(parts) => parts,
            Err(_) => {
                warn!(
                    "CLI timed out after {:.1}s, killing session {session_id}",
                    self.timeout.as_secs_f64()
                );
                if let Err(e) = child.kill().await {
                    error!("Failed to kill timed-out CLI: {e}");
                }
                return Err(AssistantError::Timeout {
                    timeout: self.timeout,
                });
            }
        };
        let status = status.map_err(AssistantError::Spawn)?;

        let stdout_text = String::from_utf8_lossy(&stdout).trim().to_string();
        let stderr_text = String::from_utf8_lossy(&stderr).trim().to_string();

        if !status.success() {
            if !stderr_text.is_empty() {
                // stderr may contain secrets; it stays in the server log.
                error!(
                    "CLI stderr: {}",
                    truncate_chars(&stderr_text, MAX_LOG_DETAIL_CHARS)
                );
            }
            let lower = stderr_text.to_lowercase();
            return Err(AssistantError::NonZeroExit {
                code: status.code().unwrap_or(-1),
                credentials_hint: lower.contains("expired") || lower.contains("credential"),
            });
        }

        if stdout_text.is_empty() {
            return Err(AssistantError::Empty);
        }
        Ok(stdout_text)
    }

    /// Like [`send_message`](Self::send_message), with failures rendered as
    /// reply text.
    pub async fn reply(&self, session_id: &str, message: &str, cwd: &Path) -> String {
        match self.send_message(session_id, message, cwd).await {
            Ok(text) => text,
            Err(e) => e.to_reply(),
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe
        && let Err(e) = pipe.read_to_end(&mut buf).await
    {
        warn!("Failed to read CLI output: {e}");
    }
    buf
}
