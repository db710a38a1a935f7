//! Webex REST layer: request description, retry policy, execution, typed calls.
//!
//! - [`request`] describes one outbound call ([`OutboundRequest`]) without
//!   binding it to a client, so the executor can rebuild it per attempt.
//! - [`retry`] classifies failures and decides how long to wait. Rate limits
//!   honor `Retry-After`; 5xx and connection faults wait a fixed delay;
//!   401 is fatal and other 4xx are returned immediately.
//! - [`executor`] owns the HTTP client and runs the retry loop.
//! - [`webex`] wraps the executor in the handful of Webex calls the bridge
//!   makes, including chunked sends.

pub mod executor;
pub mod request;
pub mod retry;
pub mod webex;

pub use executor::RequestExecutor;
pub use request::{MultipartField, OutboundRequest, RequestBody};
pub use retry::{FailureKind, RetryPolicy, Sleeper, TokioSleeper};
pub use webex::{ChatMessage, Person, Target, WebexClient};
