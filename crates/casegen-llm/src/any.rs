use crate::error::ProviderError;
use crate::gemini::GeminiProvider;
#[cfg(any(test, feature = "mock"))]
use crate::mock::MockProvider;
use crate::provider::{Completion, CompletionProvider, CompletionRequest};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given closure for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::Gemini($p) => $expr,
            #[cfg(any(test, feature = "mock"))]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyProvider {
    Gemini(GeminiProvider),
    #[cfg(any(test, feature = "mock"))]
    Mock(MockProvider),
}

impl CompletionProvider for AnyProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        delegate_provider!(self, |p| p.complete(request).await)
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| p.name())
    }

    fn model(&self) -> &str {
        delegate_provider!(self, |p| p.model())
    }
}
