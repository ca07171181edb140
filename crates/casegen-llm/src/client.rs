use crate::error::LlmError;
use crate::prompt::PromptBuilder;
use crate::provider::CompletionProvider;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::types::{GenerationResult, GenerationStatus, TokenUsage};

/// Turns extracted document text into a generated test suite, retrying
/// transient provider failures under a bounded policy.
///
/// `generate` never returns an error: exhaustion and fatal failures are folded
/// into a [`GenerationResult`] with `status = error`.
#[derive(Debug, Clone)]
pub struct GenerationClient<P> {
    provider: P,
    policy: RetryPolicy,
    prompts: PromptBuilder,
}

impl<P: CompletionProvider> GenerationClient<P> {
    #[must_use]
    pub fn new(provider: P, policy: RetryPolicy, prompts: PromptBuilder) -> Self {
        Self {
            provider,
            policy,
            prompts,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn generate(&self, document_text: &str) -> GenerationResult {
        let request = self.prompts.build(document_text);
        let mut attempt: u32 = 0;

        loop {
            let err = match self.provider.complete(&request).await {
                Ok(completion) => {
                    let attempts = attempt + 1;
                    tracing::info!(
                        provider = self.provider.name(),
                        model = %completion.model,
                        attempts,
                        "generation succeeded"
                    );
                    return GenerationResult {
                        text: completion.text,
                        model: completion.model,
                        usage: TokenUsage::from_provider(completion.usage),
                        status: GenerationStatus::Success,
                        error: None,
                        attempts,
                    };
                }
                Err(err) => err,
            };

            match self.policy.decide(attempt, err.class) {
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        provider = self.provider.name(),
                        class = %err.class,
                        attempt = attempt + 1,
                        max_attempts = self.policy.max_attempts(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "generation attempt failed, retrying: {}",
                        err.message
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::GiveUp => {
                    let attempts = attempt + 1;
                    let terminal = LlmError::exhausted(&err, attempts);
                    tracing::error!(
                        provider = self.provider.name(),
                        class = %err.class,
                        attempts,
                        "generation failed: {terminal}"
                    );
                    return GenerationResult::failed(
                        self.provider.model(),
                        terminal.to_string(),
                        attempts,
                    );
                }
            }
        }
    }
}
