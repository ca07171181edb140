//! End-to-end pipeline runs over the filesystem store and a file-backed registry.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use casegen_core::extractor::{PageReader, PageText};
use casegen_core::{
    Catalog, CatalogError, Document, Extractor, IngestError, IngestLimits, Orchestrator,
};
use casegen_llm::mock::MockProvider;
use casegen_llm::prompt::PromptBuilder;
use casegen_llm::{AnyProvider, ErrorClass, GenerationClient, GenerationResult, RetryPolicy};
use casegen_storage::{ArtifactKind, ArtifactStore, FsObjectStore, MetadataRegistry, RecordStatus};
use tempfile::TempDir;

const GUIDELINE: &str = "Escalate to the rapid response team when systolic pressure drops \
    below 90 mmHg or lactate exceeds 4 mmol/L in an adult patient.";

struct FixedText(String);

impl PageReader for FixedText {
    fn read_pages(
        &self,
        _bytes: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PageText>, String>> + Send + '_>> {
        let page = self.0.clone();
        Box::pin(async move { Ok(vec![Ok(page)]) })
    }
}

struct Pipeline {
    orchestrator: Arc<Orchestrator<AnyProvider>>,
    catalog: Catalog,
    registry: MetadataRegistry,
    dir: TempDir,
}

async fn open_backends(root: &Path) -> (ArtifactStore, MetadataRegistry) {
    let objects = FsObjectStore::open(root.join("artifacts")).await.unwrap();
    let db = root.join("casegen.db");
    let db = db.to_str().unwrap();
    let registry = MetadataRegistry::connect(db).await.unwrap();
    (ArtifactStore::new(Arc::new(objects)), registry)
}

async fn pipeline(text: &str, provider: MockProvider) -> Pipeline {
    let dir = tempfile::tempdir().unwrap();
    let (artifacts, registry) = open_backends(dir.path()).await;
    let generator = GenerationClient::new(
        AnyProvider::Mock(provider),
        RetryPolicy::new(3, Duration::ZERO).with_max_jitter(Duration::ZERO),
        PromptBuilder::default(),
    );
    let orchestrator = Orchestrator::new(
        Extractor::new(Arc::new(FixedText(text.to_owned()))),
        generator,
        artifacts.clone(),
        registry.clone(),
        IngestLimits::default(),
    );
    Pipeline {
        orchestrator: Arc::new(orchestrator),
        catalog: Catalog::new(artifacts, registry.clone()),
        registry,
        dir,
    }
}

fn pdf(filename: &str) -> Document {
    Document {
        filename: filename.to_owned(),
        content_type: Some("application/pdf".to_owned()),
        bytes: format!("%PDF-1.7 {filename}").into_bytes(),
    }
}

#[tokio::test]
async fn text_length_boundary_at_fifty_characters() {
    let short = pipeline(&"a".repeat(49), MockProvider::default()).await;
    let err = short.orchestrator.ingest(pdf("short.pdf")).await.unwrap_err();
    assert!(matches!(err, IngestError::InsufficientContent { min_chars: 50 }));
    assert_eq!(short.catalog.list_records(None).await.count, 0);

    let exact = pipeline(&"a".repeat(50), MockProvider::default()).await;
    let outcome = exact.orchestrator.ingest(pdf("exact.pdf")).await.unwrap();
    assert_eq!(outcome.status, RecordStatus::Success);
    assert_eq!(outcome.text_length, 50);
}

#[tokio::test]
async fn concurrent_uploads_with_identical_names_stay_separate() {
    let p = pipeline(GUIDELINE, MockProvider::default()).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let orchestrator = Arc::clone(&p.orchestrator);
            tokio::spawn(async move { orchestrator.ingest(pdf("protocol.pdf")).await })
        })
        .collect();

    let mut ids = Vec::new();
    let mut source_keys = Vec::new();
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.status, RecordStatus::Success);
        source_keys.push(
            outcome
                .artifacts
                .iter()
                .find(|a| a.kind == ArtifactKind::Source)
                .unwrap()
                .key
                .clone(),
        );
        ids.push(outcome.request_id);
    }
    ids.sort();
    ids.dedup();
    source_keys.sort();
    source_keys.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(source_keys.len(), 8);
    assert_eq!(p.catalog.list_records(None).await.count, 8);
}

#[tokio::test]
async fn exhausted_rate_limit_leaves_partial_success_record() {
    let p = pipeline(
        GUIDELINE,
        MockProvider::failing(ErrorClass::RateLimited, "429 RESOURCE_EXHAUSTED"),
    )
    .await;

    let outcome = p.orchestrator.ingest(pdf("sepsis.pdf")).await.unwrap();
    assert_eq!(outcome.status, RecordStatus::PartialSuccess);
    assert_eq!(outcome.generation.as_ref().unwrap().attempts, 3);

    let record = p.catalog.get_record(outcome.request_id).await.unwrap();
    assert_eq!(record.status, RecordStatus::PartialSuccess);
    assert_eq!(
        record.error.as_deref(),
        Some("rate limit exceeded after 3 attempts")
    );
    assert_eq!(record.artifacts.len(), 1);
    assert!(record.artifact(ArtifactKind::Source).is_some());
    assert!(record.artifact(ArtifactKind::Json).is_none());

    let err = p
        .catalog
        .fetch_artifact(outcome.request_id, ArtifactKind::Markdown)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::ArtifactMissing(ArtifactKind::Markdown)));
}

#[tokio::test]
async fn listing_degrades_to_empty_when_registry_is_down() {
    let p = pipeline(GUIDELINE, MockProvider::default()).await;
    p.orchestrator.ingest(pdf("a.pdf")).await.unwrap();
    assert_eq!(p.catalog.list_records(None).await.count, 1);

    p.registry.close().await;
    let listed = p.catalog.list_records(Some(10)).await;
    assert_eq!(listed.count, 0);
    assert!(listed.records.is_empty());

    let outcome = p.orchestrator.ingest(pdf("b.pdf")).await.unwrap();
    assert_eq!(outcome.status, RecordStatus::Success);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].starts_with("Failed to save metadata"));
}

#[tokio::test]
async fn artifacts_survive_reopening_the_backends() {
    let p = pipeline(
        GUIDELINE,
        MockProvider::with_responses(vec!["# Test Suite: Shock\n\n### TC-001".into()]),
    )
    .await;
    let document = pdf("Shock Protocol.pdf");
    let uploaded = document.bytes.clone();
    let outcome = p.orchestrator.ingest(document).await.unwrap();
    let id = outcome.request_id;
    p.registry.close().await;

    let (artifacts, registry) = open_backends(p.dir.path()).await;
    let catalog = Catalog::new(artifacts, registry);

    let source = catalog
        .fetch_artifact(id, ArtifactKind::Source)
        .await
        .unwrap();
    assert_eq!(source.bytes, uploaded);
    assert_eq!(source.content_type, "application/pdf");
    assert_eq!(source.filename, "Shock Protocol.pdf");

    let json = catalog.fetch_artifact(id, ArtifactKind::Json).await.unwrap();
    assert_eq!(json.content_type, "application/json");
    assert_eq!(json.filename, format!("{id}-testcases.json"));
    let stored: GenerationResult = serde_json::from_slice(&json.bytes).unwrap();
    assert_eq!(stored.text, "# Test Suite: Shock\n\n### TC-001");
    assert_eq!(stored.model, "mock-model");

    let markdown = catalog
        .fetch_artifact(id, ArtifactKind::Markdown)
        .await
        .unwrap();
    assert_eq!(markdown.bytes, b"# Test Suite: Shock\n\n### TC-001");
    assert_eq!(markdown.filename, format!("{id}-testcases.md"));
}
