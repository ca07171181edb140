use casegen_llm::{CompletionProvider, GenerationClient, GenerationResult};
use casegen_storage::{
    ArtifactKind, ArtifactRecord, ArtifactStore, MetadataRegistry, RecordDraft, RecordStatus,
    RequestId,
};
use chrono::Utc;
use serde::Serialize;
use tracing::Instrument;

use crate::error::{IngestError, human_size};
use crate::extractor::{Extractor, validate_content};

/// An uploaded document as received.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    /// Media type declared by the client, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Pipeline progress of one ingestion, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Received,
    Extracted,
    Validated,
    SourceStored,
    Generated,
    ArtifactsStored,
    MetadataPersisted,
}

impl Stage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Extracted => "extracted",
            Self::Validated => "validated",
            Self::SourceStored => "source_stored",
            Self::Generated => "generated",
            Self::ArtifactsStored => "artifacts_stored",
            Self::MetadataPersisted => "metadata_persisted",
        }
    }
}

fn enter(stage: Stage) {
    tracing::debug!(stage = stage.as_str(), "ingest stage reached");
}

#[derive(Debug, Clone, Copy)]
pub struct IngestLimits {
    pub max_upload_bytes: usize,
    pub min_text_chars: usize,
}

impl IngestLimits {
    /// The rejection for a document larger than `max_upload_bytes`.
    #[must_use]
    pub fn too_large(&self) -> IngestError {
        IngestError::TooLarge {
            limit: human_size(self.max_upload_bytes),
        }
    }
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            min_text_chars: 50,
        }
    }
}

/// What the caller learns about a completed ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub request_id: RequestId,
    pub filename: String,
    pub pages: u32,
    pub text_length: u64,
    pub status: RecordStatus,
    pub artifacts: Vec<ArtifactRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Drives one document from upload to persisted artifacts and status record.
pub struct Orchestrator<P> {
    extractor: Extractor,
    generator: GenerationClient<P>,
    artifacts: ArtifactStore,
    registry: MetadataRegistry,
    limits: IngestLimits,
}

impl<P> std::fmt::Debug for Orchestrator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

fn is_pdf_filename(filename: &str) -> bool {
    std::path::Path::new(filename)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// A declared media type in a family that can never carry a PDF. Generic
/// types such as `application/octet-stream` pass.
fn is_non_pdf_media_type(content_type: &str) -> bool {
    let top_level = content_type
        .split(['/', ';'])
        .next()
        .unwrap_or_default()
        .trim();
    ["text", "image", "audio", "video"]
        .iter()
        .any(|family| top_level.eq_ignore_ascii_case(family))
}

impl<P: CompletionProvider> Orchestrator<P> {
    #[must_use]
    pub fn new(
        extractor: Extractor,
        generator: GenerationClient<P>,
        artifacts: ArtifactStore,
        registry: MetadataRegistry,
        limits: IngestLimits,
    ) -> Self {
        Self {
            extractor,
            generator,
            artifacts,
            registry,
            limits,
        }
    }

    #[must_use]
    pub fn limits(&self) -> IngestLimits {
        self.limits
    }

    /// Run the full pipeline for one document.
    ///
    /// Generation failures and derived-artifact write failures still return `Ok`
    /// with a `partial_success` outcome. A failed status-record write is reported
    /// in `warnings`.
    ///
    /// # Errors
    ///
    /// Returns an [`IngestError`] when the document is rejected before any
    /// artifact is written, or when the source document cannot be stored.
    pub async fn ingest(&self, document: Document) -> Result<IngestOutcome, IngestError> {
        let request_id = RequestId::new();
        let span = tracing::info_span!(
            "ingest",
            %request_id,
            filename = %document.filename,
            content_type = document.content_type.as_deref()
        );
        self.run(request_id, document).instrument(span).await
    }

    async fn run(
        &self,
        request_id: RequestId,
        document: Document,
    ) -> Result<IngestOutcome, IngestError> {
        enter(Stage::Received);

        if !is_pdf_filename(&document.filename) {
            tracing::info!("rejected: unsupported file type");
            return Err(IngestError::UnsupportedType);
        }
        if let Some(content_type) = document.content_type.as_deref()
            && is_non_pdf_media_type(content_type)
        {
            tracing::info!(content_type, "rejected: declared media type is not a PDF");
            return Err(IngestError::UnsupportedType);
        }
        if document.bytes.len() > self.limits.max_upload_bytes {
            tracing::info!(size = document.bytes.len(), "rejected: too large");
            return Err(self.limits.too_large());
        }

        let extraction = self.extractor.extract(document.bytes.clone()).await;
        if !extraction.success {
            let detail = extraction
                .error
                .unwrap_or_else(|| "Failed to extract text from PDF".to_owned());
            tracing::info!("rejected: {detail}");
            return Err(IngestError::Extraction(detail));
        }
        enter(Stage::Extracted);

        if !validate_content(&extraction.text, self.limits.min_text_chars) {
            tracing::info!("rejected: insufficient text content");
            return Err(IngestError::InsufficientContent {
                min_chars: self.limits.min_text_chars,
            });
        }
        enter(Stage::Validated);

        let created_at = Utc::now();
        let draft = RecordDraft {
            id: request_id,
            filename: document.filename.clone(),
            pages: extraction.pages,
            text_length: u64::try_from(extraction.text.chars().count()).unwrap_or(u64::MAX),
            created_at,
        };

        let source = match self
            .artifacts
            .put_source(request_id, &document.filename, created_at, document.bytes)
            .await
        {
            Ok(source) => source,
            Err(e) => {
                tracing::error!("source document store failed: {e}");
                let record = draft.failed(format!("Failed to store source document: {e}"));
                if let Err(reg) = self.registry.put(&record).await {
                    tracing::warn!("failed record could not be saved: {reg}");
                }
                return Err(IngestError::Storage(e));
            }
        };
        enter(Stage::SourceStored);

        let generation = self.generator.generate(&extraction.text).await;
        enter(Stage::Generated);

        let mut artifacts = vec![source];
        let error = if generation.is_success() {
            self.store_derived(
                request_id,
                &document.filename,
                created_at,
                &generation,
                &mut artifacts,
            )
            .await
        } else {
            generation.error.clone()
        };

        let record = draft.finish(artifacts, Some(&generation), error);

        let mut warnings = Vec::new();
        match self.registry.put(&record).await {
            Ok(_) => enter(Stage::MetadataPersisted),
            Err(e) => {
                tracing::warn!("metadata registry write failed: {e}");
                warnings.push(format!("Failed to save metadata: {e}"));
            }
        }

        tracing::info!(
            status = %record.status,
            pages = record.pages,
            attempts = generation.attempts,
            "ingestion finished"
        );

        Ok(IngestOutcome {
            request_id,
            filename: record.filename,
            pages: record.pages,
            text_length: record.text_length,
            status: record.status,
            artifacts: record.artifacts,
            generation: Some(generation),
            error: record.error,
            warnings,
        })
    }

    /// Store every derived format; returns the combined failure detail, if any.
    async fn store_derived(
        &self,
        request_id: RequestId,
        filename: &str,
        created_at: chrono::DateTime<Utc>,
        generation: &GenerationResult,
        artifacts: &mut Vec<ArtifactRecord>,
    ) -> Option<String> {
        let (json, markdown) = tokio::join!(
            self.artifacts.put_derived(
                ArtifactKind::Json,
                request_id,
                filename,
                created_at,
                generation,
            ),
            self.artifacts.put_derived(
                ArtifactKind::Markdown,
                request_id,
                filename,
                created_at,
                generation,
            ),
        );

        let mut failures = Vec::new();
        for (kind, result) in [
            (ArtifactKind::Json, json),
            (ArtifactKind::Markdown, markdown),
        ] {
            match result {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => {
                    tracing::error!(%kind, "derived artifact store failed: {e}");
                    failures.push(format!("Failed to store {kind} artifact: {e}"));
                }
            }
        }
        if failures.is_empty() {
            enter(Stage::ArtifactsStored);
            None
        } else {
            Some(failures.join("; "))
        }
    }
}
