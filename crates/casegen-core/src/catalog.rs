//! Read-side access to stored records and artifacts.

use casegen_storage::registry::MAX_SCAN_LIMIT;
use casegen_storage::{ArtifactKind, ArtifactStore, MetadataRecord, MetadataRegistry, RequestId};
use serde::Serialize;

use crate::error::CatalogError;

pub const DEFAULT_LIST_LIMIT: u32 = 50;

#[derive(Debug, Clone, Serialize)]
pub struct RecordList {
    pub count: usize,
    pub records: Vec<MetadataRecord>,
}

/// Artifact bytes ready to be served as an attachment.
#[derive(Debug, Clone)]
pub struct ArtifactDownload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    artifacts: ArtifactStore,
    registry: MetadataRegistry,
}

impl Catalog {
    #[must_use]
    pub fn new(artifacts: ArtifactStore, registry: MetadataRegistry) -> Self {
        Self {
            artifacts,
            registry,
        }
    }

    /// # Errors
    ///
    /// [`CatalogError::NotFound`] for unknown ids, [`CatalogError::Storage`] when the
    /// registry cannot be read.
    pub async fn get_record(&self, id: RequestId) -> Result<MetadataRecord, CatalogError> {
        self.registry.get(id).await?.ok_or(CatalogError::NotFound)
    }

    /// Most recent records; `limit` defaults to 50 and is capped at 100.
    pub async fn list_records(&self, limit: Option<u32>) -> RecordList {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_SCAN_LIMIT);
        let records = self.registry.scan(limit).await;
        RecordList {
            count: records.len(),
            records,
        }
    }

    /// # Errors
    ///
    /// Not-found errors when the record or its reference to `kind` is missing,
    /// [`CatalogError::Storage`] when the object cannot be read.
    pub async fn fetch_artifact(
        &self,
        id: RequestId,
        kind: ArtifactKind,
    ) -> Result<ArtifactDownload, CatalogError> {
        let record = self.get_record(id).await?;
        let artifact = record
            .artifact(kind)
            .ok_or(CatalogError::ArtifactMissing(kind))?;
        let object = self.artifacts.get(&artifact.key).await.inspect_err(|e| {
            tracing::error!(%id, %kind, key = %artifact.key, "artifact read failed: {e}");
        })?;

        let filename = match kind {
            ArtifactKind::Source => record.filename.clone(),
            ArtifactKind::Json => format!("{id}-testcases.json"),
            ArtifactKind::Markdown => format!("{id}-testcases.md"),
        };
        Ok(ArtifactDownload {
            bytes: object.bytes,
            content_type: object.content_type,
            filename,
        })
    }
}
