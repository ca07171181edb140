//! Scripted provider for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{ErrorClass, ProviderError};
use crate::provider::{Completion, CompletionProvider, CompletionRequest, ProviderUsage};

type Reply = Result<String, ProviderError>;

#[derive(Debug, Clone)]
pub struct MockProvider {
    script: Arc<Mutex<VecDeque<Reply>>>,
    calls: Arc<AtomicU32>,
    pub default_response: String,
    pub model: String,
    /// Returned on every call once the script is drained, instead of `default_response`.
    pub fail_with: Option<ProviderError>,
    /// Milliseconds to sleep before answering.
    pub delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(AtomicU32::new(0)),
            default_response: "# Test Suite: mock\n\n### TC-001: mock case".into(),
            model: "mock-model".into(),
            fail_with: None,
            delay_ms: 0,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self::with_script(responses.into_iter().map(Ok).collect())
    }

    /// Replies are consumed front to back; afterwards the default behaviour applies.
    #[must_use]
    pub fn with_script(script: Vec<Reply>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing(class: ErrorClass, message: &str) -> Self {
        Self {
            fail_with: Some(ProviderError::new(class, message)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Number of `complete` invocations so far.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Reply {
        let scripted = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match (scripted, &self.fail_with) {
            (Some(reply), _) => reply,
            (None, Some(err)) => Err(err.clone()),
            (None, None) => Ok(self.default_response.clone()),
        }
    }
}

impl CompletionProvider for MockProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            let delay = std::time::Duration::from_millis(self.delay_ms);
            tokio::time::sleep(delay).await;
        }
        let text = self.next_reply()?;
        let prompt_tokens = u64::try_from(request.prompt.len() / 4).unwrap_or(u64::MAX);
        let completion_tokens = u64::try_from(text.len() / 4).unwrap_or(u64::MAX);
        Ok(Completion {
            text,
            model: self.model.clone(),
            usage: Some(ProviderUsage {
                prompt_tokens: Some(prompt_tokens),
                completion_tokens: Some(completion_tokens),
                total_tokens: Some(prompt_tokens + completion_tokens),
            }),
        })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
