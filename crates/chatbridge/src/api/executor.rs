//! The Request Executor: every chat-platform call goes through here.
//!
//! [`RequestExecutor`] owns the HTTP client, attaches the bearer token, and
//! runs each [`OutboundRequest`] under the [`RetryPolicy`]. It knows nothing
//! about message content; chunking happens before a call reaches it.
//!
//! The client is a scoped resource: created by [`start`](RequestExecutor::start),
//! shared by all concurrent calls, and dropped by [`close`](RequestExecutor::close).
//! Calls made outside that window fail with [`ApiError::NotStarted`] without
//! touching the network.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use reqwest::header::RETRY_AFTER;
use reqwest::{Method, Response};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::api::request::{OutboundRequest, RequestBody, build_form, join_url};
use crate::api::retry::{
    FailureKind, RetryPolicy, Sleeper, TokioSleeper, classify_status, network_fault_label,
};
use crate::config::BridgeConfig;
use crate::error::ApiError;
use crate::{MAX_LOG_DETAIL_CHARS, truncate_chars};

const USER_AGENT: &str = concat!("chatbridge/", env!("CARGO_PKG_VERSION"));

/// Executes chat-platform calls with authentication and retry.
pub struct RequestExecutor {
    client: RwLock<Option<reqwest::Client>>,
    base_url: String,
    token: String,
    request_timeout: Duration,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

/// Result of a single attempt.
enum Attempt {
    Done(Value),
    Retry {
        kind: FailureKind,
        wait: Duration,
    },
    /// Transport fault while sending or while reading the body.
    Fault(reqwest::Error),
    Fail(ApiError),
}

impl RequestExecutor {
    /// Create an executor from the bridge configuration. No client exists
    /// until [`start`](Self::start) is called.
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            client: RwLock::new(None),
            base_url: config.base_url.clone(),
            token: config.bot_token.clone(),
            request_timeout: config.request_timeout,
            policy: config.retry.clone(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the sleeper used between attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Build the HTTP client. Calling it again replaces the client.
    pub fn start(&self) -> Result<(), ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.request_timeout)
            .build()
            .map_err(ApiError::Build)?;
        *self.client.write().unwrap_or_else(|e| e.into_inner()) = Some(client);
        debug!("Request executor started (base_url={})", self.base_url);
        Ok(())
    }

    /// Drop the HTTP client. In-flight calls keep their handle and finish.
    pub fn close(&self) {
        if self
            .client
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some()
        {
            debug!("Request executor closed");
        }
    }

    pub fn is_started(&self) -> bool {
        self.client
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute a call described by its parts. See [`send`](Self::send).
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: RequestBody,
    ) -> Result<Value, ApiError> {
        let request = OutboundRequest {
            method,
            path: path.to_string(),
            query: query
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            body,
        };
        self.send(&request).await
    }

    /// Execute a call, retrying transient failures, and return the parsed
    /// JSON body. An empty 2xx body yields `Value::Null`.
    ///
    /// Network faults on the final attempt are returned unchanged as
    /// [`ApiError::Network`]; exhausted 429/5xx attempts become
    /// [`ApiError::RetriesExhausted`].
    pub async fn send(&self, request: &OutboundRequest) -> Result<Value, ApiError> {
        let client = self
            .client
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(ApiError::NotStarted)?;

        let max_attempts = self.policy.attempts();
        let mut attempt = 1;
        loop {
            let is_last = attempt >= max_attempts;
            let start = Instant::now();

            let outcome = match self.build(&client, request)?.send().await {
                Ok(response) => self.on_response(request, response, attempt).await,
                Err(err) => Attempt::Fault(err),
            };
            debug!(
                "{} {} attempt {attempt} finished in {:.2}s",
                request.method,
                request.path,
                start.elapsed().as_secs_f64()
            );

            match outcome {
                Attempt::Done(value) => return Ok(value),
                Attempt::Fail(err) => return Err(err),
                Attempt::Fault(err) => {
                    warn!(
                        "{} {}: network fault ({}) on attempt {attempt}/{max_attempts}",
                        request.method,
                        request.path,
                        network_fault_label(&err),
                    );
                    if is_last {
                        return Err(ApiError::Network(err));
                    }
                    self.sleeper.sleep(self.policy.transient_delay).await;
                }
                Attempt::Retry { kind, .. } if is_last => {
                    error!(
                        "{} {}: retries exhausted after {attempt} attempts ({kind})",
                        request.method, request.path
                    );
                    return Err(ApiError::RetriesExhausted {
                        attempts: attempt,
                        last: kind,
                    });
                }
                Attempt::Retry { kind, wait } => {
                    debug!(
                        "{} {}: {kind}, waiting {:.1}s before retry",
                        request.method,
                        request.path,
                        wait.as_secs_f64()
                    );
                    self.sleeper.sleep(wait).await;
                }
            }
            attempt += 1;
        }
    }

    fn build(
        &self,
        client: &reqwest::Client,
        request: &OutboundRequest,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let url = join_url(&self.base_url, &request.path);
        let builder = client
            .request(request.method.clone(), url)
            .bearer_auth(&self.token)
            .query(&request.query);
        Ok(match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(fields) => {
                builder.multipart(build_form(fields).map_err(ApiError::Build)?)
            }
        })
    }

    async fn on_response(
        &self,
        request: &OutboundRequest,
        response: Response,
        attempt: u32,
    ) -> Attempt {
        let status = response.status();
        let Some(kind) = classify_status(status) else {
            return match response.bytes().await {
                Ok(body) => match parse_json(&body) {
                    Ok(value) => Attempt::Done(value),
                    Err(err) => Attempt::Fail(err),
                },
                Err(err) => Attempt::Fault(err),
            };
        };

        if !kind.is_retryable() {
            return match kind {
                FailureKind::AuthError => {
                    error!(
                        "{} {}: HTTP 401, bot token rejected",
                        request.method, request.path
                    );
                    Attempt::Fail(ApiError::Unauthorized)
                }
                _ => {
                    warn!(
                        "{} {}: HTTP {} (not retried)",
                        request.method,
                        request.path,
                        status.as_u16()
                    );
                    Attempt::Fail(ApiError::Client {
                        status: status.as_u16(),
                    })
                }
            };
        }

        let wait = if kind == FailureKind::RateLimited {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok());
            warn!(
                "{} {}: rate limited on attempt {attempt} (Retry-After={})",
                request.method,
                request.path,
                retry_after.map_or_else(
                    || "none".to_string(),
                    |v| truncate_chars(v, MAX_LOG_DETAIL_CHARS)
                ),
            );
            self.policy.rate_limit_wait(retry_after)
        } else {
            warn!(
                "{} {}: HTTP {} on attempt {attempt}",
                request.method,
                request.path,
                status.as_u16()
            );
            self.policy.transient_delay
        };
        Attempt::Retry { kind, wait }
    }
}

fn parse_json(bytes: &[u8]) -> Result<Value, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(ApiError::Decode)
}
