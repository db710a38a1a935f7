//! Convenience re-exports for embedding the bridge.
//!
//! ```ignore
//! use chatbridge::prelude::*;
//! ```

pub use crate::api::{
    ChatMessage, FailureKind, OutboundRequest, RequestBody, RequestExecutor, RetryPolicy, Target,
    WebexClient,
};
pub use crate::assistant::AssistantCli;
pub use crate::bot::{Bridge, Command};
pub use crate::chunking::{split_chunks, split_message};
pub use crate::config::BridgeConfig;
pub use crate::error::{ApiError, AssistantError, ConfigError};
pub use crate::sessions::{SessionInfo, SessionStore};
