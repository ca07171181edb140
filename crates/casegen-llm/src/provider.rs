use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Sampling parameters forwarded to the provider.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            max_output_tokens: 8000,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub params: SamplingParams,
}

/// Usage counters as reported by the provider. Any of them may be absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProviderUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// A successful single invocation.
#[derive(Clone, Debug)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub usage: Option<ProviderUsage>,
}

pub trait CompletionProvider: Send + Sync {
    /// Invoke the provider once.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ProviderError`] when the call fails or the response is unusable.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<Completion, ProviderError>> + Send;

    fn name(&self) -> &str;

    /// Model identifier recorded on results, including failed ones.
    fn model(&self) -> &str;
}
