use std::fmt;

use serde::{Deserialize, Serialize};

/// Retry-relevant category of a provider failure, independent of the provider's
/// native error representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    RateLimited,
    Timeout,
    TransientTransport,
    Fatal,
}

impl ErrorClass {
    #[must_use]
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Fatal)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::TransientTransport => "transient_transport",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failed provider invocation, already classified.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{class} error from provider: {message}")]
pub struct ProviderError {
    pub class: ErrorClass,
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    /// Classify a raw provider signal into a `ProviderError`.
    #[must_use]
    pub fn classified(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            class: crate::classify::classify(status, &message),
            status,
            message,
        }
    }

    #[must_use]
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            status: None,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        let status = e.status().map(|s| s.as_u16());
        let (message, io_cause) = error_chain(&e);
        let class = if e.is_timeout() {
            ErrorClass::Timeout
        } else if e.is_connect() || (io_cause && (e.is_request() || e.is_body())) {
            ErrorClass::TransientTransport
        } else {
            crate::classify::classify(status, &message)
        };
        Self {
            class,
            status,
            message,
        }
    }
}

/// Joins an error with its `source()` chain, and reports whether any link is
/// an I/O error. reqwest's own `Display` omits the hyper and socket causes.
fn error_chain(e: &(dyn std::error::Error + 'static)) -> (String, bool) {
    let mut message = e.to_string();
    let mut io_cause = false;
    let mut source = e.source();
    while let Some(cause) = source {
        io_cause |= cause.is::<std::io::Error>();
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    (message, io_cause)
}

/// Terminal outcome of a generation after the retry policy gave up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },

    #[error("request timed out after {attempts} attempts")]
    TimeoutExhausted { attempts: u32 },

    #[error("transport failed after {attempts} attempts: {message}")]
    TransportExhausted { attempts: u32, message: String },

    #[error("generation failed: {0}")]
    Fatal(String),
}

impl LlmError {
    /// Build the terminal error for the last classified failure.
    #[must_use]
    pub fn exhausted(last: &ProviderError, attempts: u32) -> Self {
        match last.class {
            ErrorClass::RateLimited => Self::RateLimitExhausted { attempts },
            ErrorClass::Timeout => Self::TimeoutExhausted { attempts },
            ErrorClass::TransientTransport => Self::TransportExhausted {
                attempts,
                message: last.message.clone(),
            },
            ErrorClass::Fatal => Self::Fatal(last.message.clone()),
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
