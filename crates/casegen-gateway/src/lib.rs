//! axum gateway exposing document upload, record history and artifact downloads.

pub mod error;
mod handlers;
mod router;
mod server;

pub use error::GatewayError;
pub use server::GatewayServer;

#[cfg(test)]
pub(crate) mod testing {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use casegen_core::extractor::{PageReader, PageText};
    use casegen_core::{Catalog, Extractor, IngestLimits, Orchestrator};
    use casegen_llm::mock::MockProvider;
    use casegen_llm::prompt::PromptBuilder;
    use casegen_llm::{AnyProvider, GenerationClient, RetryPolicy};
    use casegen_storage::{ArtifactStore, InMemoryObjectStore, MetadataRegistry};

    use crate::server::AppState;

    pub const GUIDELINE: &str = "Adults with a temperature above 38.5C and a heart rate above \
        90 bpm must be screened for sepsis within one hour of arrival.";

    struct Pages(Vec<String>);

    impl PageReader for Pages {
        fn read_pages(
            &self,
            _bytes: Vec<u8>,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<PageText>, String>> + Send + '_>> {
            let pages = self.0.iter().cloned().map(Ok).collect();
            Box::pin(async move { Ok(pages) })
        }
    }

    pub fn extractor(pages: &[&str]) -> Extractor {
        Extractor::new(Arc::new(Pages(pages.iter().map(|p| (*p).to_owned()).collect())))
    }

    /// State over in-memory backends with a 1 KiB upload cap.
    pub async fn state(provider: MockProvider) -> AppState {
        let artifacts = ArtifactStore::new(Arc::new(InMemoryObjectStore::new()));
        let registry = MetadataRegistry::connect(":memory:").await.unwrap();
        let generator = GenerationClient::new(
            AnyProvider::Mock(provider),
            RetryPolicy::new(2, Duration::ZERO).with_max_jitter(Duration::ZERO),
            PromptBuilder::default(),
        );
        let orchestrator = Orchestrator::new(
            extractor(&[GUIDELINE]),
            generator,
            artifacts.clone(),
            registry.clone(),
            IngestLimits {
                max_upload_bytes: 1024,
                min_text_chars: 50,
            },
        );
        AppState {
            orchestrator: Arc::new(orchestrator),
            catalog: Arc::new(Catalog::new(artifacts, registry)),
            started_at: Instant::now(),
        }
    }

    pub const BOUNDARY: &str = "casegen-test-boundary";

    /// A multipart body holding one field.
    pub fn multipart(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
             filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }
}
