//! Retry policy for outbound chat-platform calls.
//!
//! Rate limits (429), server errors (5xx) and network faults are retried
//! within a fixed attempt budget. A 401 is never retried: a bad token cannot
//! heal inside the retry window. Other 4xx responses fail immediately.
//!
//! The wait after a 429 honors the `Retry-After` header when it holds a
//! whole number of seconds, capped so a misbehaving server cannot park the
//! bridge. HTTP-date values are treated as unparseable.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::StatusCode;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts per logical call, including the first (minimum 1).
    pub max_attempts: u32,
    /// Wait after a 429 without a usable `Retry-After` header.
    pub default_rate_limit_wait: Duration,
    /// Ceiling for any `Retry-After` value.
    pub max_rate_limit_wait: Duration,
    /// Fixed wait after a server error or network fault.
    pub transient_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            default_rate_limit_wait: Duration::from_secs(5),
            max_rate_limit_wait: Duration::from_secs(60),
            transient_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget. Uses default waits.
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Attempt budget, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// How long to wait after a 429, given the raw `Retry-After` value.
    pub fn rate_limit_wait(&self, retry_after: Option<&str>) -> Duration {
        match retry_after.and_then(parse_retry_after) {
            Some(secs) => Duration::from_secs(secs).min(self.max_rate_limit_wait),
            None => self.default_rate_limit_wait,
        }
    }
}

/// Parse a `Retry-After` value given in delta-seconds.
///
/// Returns `None` for HTTP-dates, negative numbers, and anything else that
/// is not a plain non-negative integer.
pub fn parse_retry_after(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // All digits but too large for u64: the cap applies anyway.
    Some(value.parse().unwrap_or(u64::MAX))
}

// ── Classification ─────────────────────────────────────────────────

/// Why an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    RateLimited,
    ServerError,
    NetworkError,
    AuthError,
    ClientError,
}

impl FailureKind {
    /// Whether another attempt may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            FailureKind::RateLimited | FailureKind::ServerError | FailureKind::NetworkError
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::RateLimited => write!(f, "rate limited"),
            FailureKind::ServerError => write!(f, "server error"),
            FailureKind::NetworkError => write!(f, "network error"),
            FailureKind::AuthError => write!(f, "authentication error"),
            FailureKind::ClientError => write!(f, "client error"),
        }
    }
}

/// Classify an HTTP status. `None` means success.
///
/// 1xx and 3xx never reach here in practice (the client follows redirects);
/// they are treated as client errors rather than success.
pub fn classify_status(status: StatusCode) -> Option<FailureKind> {
    if status.is_success() {
        None
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Some(FailureKind::RateLimited)
    } else if status == StatusCode::UNAUTHORIZED {
        Some(FailureKind::AuthError)
    } else if status.is_server_error() {
        Some(FailureKind::ServerError)
    } else {
        Some(FailureKind::ClientError)
    }
}

/// Short label for a transport fault, safe to log (no URL, no body).
pub fn network_fault_label(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else if err.is_body() || err.is_decode() {
        "body"
    } else if err.is_request() {
        "request"
    } else {
        "transport"
    }
}

// ── Sleeping ───────────────────────────────────────────────────────

/// Boxed future returned by [`Sleeper::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Suspends the calling task between attempts.
///
/// The executor sleeps through this trait so tests can observe (and skip)
/// backoff waits.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> SleepFuture<'_>;
}

/// Non-blocking sleep on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        Box::pin(tokio::time::sleep(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_platform_guidance() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.default_rate_limit_wait, Duration::from_secs(5));
        assert_eq!(policy.max_rate_limit_wait, Duration::from_secs(60));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        assert_eq!(RetryPolicy::with_attempts(0).attempts(), 1);
        assert_eq!(RetryPolicy::with_attempts(5).attempts(), 5);
    }

    #[test]
    fn retry_after_numeric_is_honored() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.rate_limit_wait(Some("1")), Duration::from_secs(1));
        assert_eq!(policy.rate_limit_wait(Some(" 7 ")), Duration::from_secs(7));
        assert_eq!(policy.rate_limit_wait(Some("0")), Duration::ZERO);
    }

    #[test]
    fn retry_after_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.rate_limit_wait(Some("999")), Duration::from_secs(60));
        assert_eq!(
            policy.rate_limit_wait(Some("99999999999999999999999")),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn unusable_retry_after_defaults() {
        let policy = RetryPolicy::default();
        let five = Duration::from_secs(5);
        assert_eq!(policy.rate_limit_wait(None), five);
        assert_eq!(policy.rate_limit_wait(Some("")), five);
        assert_eq!(policy.rate_limit_wait(Some("-3")), five);
        assert_eq!(policy.rate_limit_wait(Some("1.5")), five);
        assert_eq!(
            policy.rate_limit_wait(Some("Thu, 01 Jan 2026 00:00:00 GMT")),
            five
        );
    }

    #[test]
    fn statuses_are_classified() {
        assert_eq!(classify_status(StatusCode::OK), None);
        assert_eq!(classify_status(StatusCode::NO_CONTENT), None);
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Some(FailureKind::RateLimited)
        );
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED),
            Some(FailureKind::AuthError)
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY),
            Some(FailureKind::ServerError)
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND),
            Some(FailureKind::ClientError)
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN),
            Some(FailureKind::ClientError)
        );
    }

    #[test]
    fn only_transient_kinds_are_retryable() {
        assert!(FailureKind::RateLimited.is_retryable());
        assert!(FailureKind::ServerError.is_retryable());
        assert!(FailureKind::NetworkError.is_retryable());
        assert!(!FailureKind::AuthError.is_retryable());
        assert!(!FailureKind::ClientError.is_retryable());
    }

    #[tokio::test]
    async fn tokio_sleeper_waits() {
        let start = std::time::Instant::now();
        TokioSleeper.sleep(Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
