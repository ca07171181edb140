//! Document-to-test-suite generation: prompt construction, classified provider
//! errors, bounded retry with jitter, and the Gemini backend.

pub mod any;
pub mod classify;
pub mod client;
pub mod error;
pub mod gemini;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod prompt;
pub mod provider;
pub mod retry;
pub mod types;

pub use any::AnyProvider;
pub use client::GenerationClient;
pub use error::{ErrorClass, LlmError, ProviderError};
pub use provider::{CompletionProvider, SamplingParams};
pub use retry::RetryPolicy;
pub use types::{GenerationResult, GenerationStatus, TokenUsage};
