use serde::{Deserialize, Serialize};

use crate::provider::ProviderUsage;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Normalize provider counters; missing values become zero.
    #[must_use]
    pub fn from_provider(usage: Option<ProviderUsage>) -> Self {
        let usage = usage.unwrap_or_default();
        Self {
            prompt_tokens: usage.prompt_tokens.unwrap_or(0),
            completion_tokens: usage.completion_tokens.unwrap_or(0),
            total_tokens: usage.total_tokens.unwrap_or(0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Success,
    Error,
}

/// Final result of one generation, after all retry attempts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub model: String,
    pub usage: TokenUsage,
    pub status: GenerationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
}

impl GenerationResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == GenerationStatus::Success
    }

    #[must_use]
    pub fn failed(model: impl Into<String>, error: impl Into<String>, attempts: u32) -> Self {
        Self {
            text: String::new(),
            model: model.into(),
            usage: TokenUsage::default(),
            status: GenerationStatus::Error,
            error: Some(error.into()),
            attempts,
        }
    }
}
