//! Map raw provider error signals onto retry-relevant classes.

use crate::error::ErrorClass;

const RATE_LIMIT_PATTERNS: &[&str] = &[
    "resource_exhausted",
    "resource has been exhausted",
    "too many requests",
    "rate limit",
];

const TIMEOUT_PATTERNS: &[&str] = &[
    "deadline exceeded",
    "deadline_exceeded",
    "timed out",
    "timeout",
];

const TRANSPORT_PATTERNS: &[&str] = &[
    "ssleoferror",
    "ssl",
    "tls",
    "connection reset",
    "connection closed",
    "connection refused",
    "connection aborted",
    "broken pipe",
    "unexpected eof",
];

/// Classify a provider failure from its HTTP status (if any) and message.
///
/// The status code wins when it is conclusive; otherwise the message is matched
/// case-insensitively against known patterns. Anything unrecognised is fatal.
#[must_use]
pub fn classify(status: Option<u16>, message: &str) -> ErrorClass {
    match status {
        Some(429) => return ErrorClass::RateLimited,
        Some(408 | 504) => return ErrorClass::Timeout,
        _ => {}
    }

    let lower = message.to_ascii_lowercase();
    let matches_any = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    if lower.contains("429") || matches_any(RATE_LIMIT_PATTERNS) {
        ErrorClass::RateLimited
    } else if matches_any(TIMEOUT_PATTERNS) {
        ErrorClass::Timeout
    } else if matches_any(TRANSPORT_PATTERNS) {
        ErrorClass::TransientTransport
    } else {
        ErrorClass::Fatal
    }
}
