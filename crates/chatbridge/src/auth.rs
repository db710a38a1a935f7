//! Sender authorization.
//!
//! Exactly one person may use the bridge. Messages from anyone else are
//! dropped without a reply; the rejected address is logged server-side.

use tracing::warn;

/// Whether `sender` is the authorized user (case-insensitive exact match).
pub fn is_authorized(sender: &str, authorized: &str) -> bool {
    if sender.to_lowercase() == authorized.to_lowercase() {
        return true;
    }
    warn!("Unauthorized message from: {sender}");
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_is_authorized() {
        assert!(is_authorized("me@example.com", "me@example.com"));
    }

    #[test]
    fn match_ignores_case() {
        assert!(is_authorized("Me@Example.COM", "me@example.com"));
        assert!(is_authorized("me@example.com", "ME@EXAMPLE.COM"));
    }

    #[test]
    fn other_senders_are_rejected() {
        assert!(!is_authorized("intruder@example.com", "me@example.com"));
        assert!(!is_authorized("me@example.com.evil", "me@example.com"));
        assert!(!is_authorized("", "me@example.com"));
    }
}
