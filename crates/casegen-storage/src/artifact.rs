use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use casegen_llm::GenerationResult;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};
use crate::object::{ObjectEntry, ObjectStore, ObjectTags, StoredObject};
use crate::record::RequestId;

pub const EMPTY_MARKDOWN_PLACEHOLDER: &str = "No test cases generated";

const MAX_FILENAME_CHARS: usize = 200;
const FALLBACK_FILENAME: &str = "document.pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Source,
    Json,
    Markdown,
}

impl ArtifactKind {
    pub const ALL: [Self; 3] = [Self::Source, Self::Json, Self::Markdown];
    pub const DERIVED: [Self; 2] = [Self::Json, Self::Markdown];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Json => "json",
            Self::Markdown => "markdown",
        }
    }

    /// Top-level key folder for this kind.
    #[must_use]
    pub fn folder(self) -> &'static str {
        match self {
            Self::Source => "sources",
            Self::Json => "derived-json",
            Self::Markdown => "derived-markdown",
        }
    }

    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Source => "application/pdf",
            Self::Json => "application/json",
            Self::Markdown => "text/markdown",
        }
    }

    /// Value of the `format` tag.
    #[must_use]
    pub fn format(self) -> &'static str {
        match self {
            Self::Source => "pdf",
            Self::Json => "json",
            Self::Markdown => "markdown",
        }
    }

    fn derived_filename(self) -> Option<&'static str> {
        match self {
            Self::Source => None,
            Self::Json => Some("testcases.json"),
            Self::Markdown => Some("testcases.md"),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "source" => Ok(Self::Source),
            "json" => Ok(Self::Json),
            "markdown" => Ok(Self::Markdown),
            other => Err(StorageError::InvalidKey(format!("unknown artifact kind: {other}"))),
        }
    }
}

/// A stored artifact as referenced from a metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub kind: ArtifactKind,
    pub key: String,
    pub url: String,
}

/// Reduce an uploaded filename to a single safe key segment.
///
/// Drops any directory part, replaces characters outside `[A-Za-z0-9._-]` with `_`,
/// strips leading dots and caps the length. Never returns an empty string.
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed: String = cleaned
        .trim_start_matches('.')
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect();
    if trimmed.is_empty() {
        FALLBACK_FILENAME.to_owned()
    } else {
        trimmed
    }
}

/// `{folder}/{YYYY}/{MM}/{DD}/{request_id}-{name}`, where `name` is the sanitized
/// original filename for sources and a fixed name for derived artifacts.
#[must_use]
pub fn artifact_key(
    kind: ArtifactKind,
    request_id: RequestId,
    filename: &str,
    created_at: DateTime<Utc>,
) -> String {
    let name = kind
        .derived_filename()
        .map_or_else(|| sanitize_filename(filename), str::to_owned);
    format!(
        "{}/{}/{request_id}-{name}",
        kind.folder(),
        created_at.format("%Y/%m/%d")
    )
}

/// Serialize a generation result into the bytes stored for a derived kind.
///
/// # Errors
///
/// Returns an error if JSON serialization fails or `kind` is not derived.
pub fn render_derived(kind: ArtifactKind, result: &GenerationResult) -> Result<Vec<u8>> {
    match kind {
        ArtifactKind::Json => Ok(serde_json::to_vec_pretty(result)?),
        ArtifactKind::Markdown => {
            let text = if result.text.trim().is_empty() {
                EMPTY_MARKDOWN_PLACEHOLDER
            } else {
                result.text.as_str()
            };
            Ok(text.as_bytes().to_vec())
        }
        ArtifactKind::Source => Err(StorageError::InvalidKey(
            "source artifacts are not rendered from generation output".into(),
        )),
    }
}

/// Typed facade over an [`ObjectStore`] that owns the key scheme and tagging.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    objects: Arc<dyn ObjectStore>,
}

impl ArtifactStore {
    #[must_use]
    pub fn new(objects: Arc<dyn ObjectStore>) -> Self {
        Self { objects }
    }

    /// Write one artifact and return its reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store rejects the write.
    pub async fn put(
        &self,
        kind: ArtifactKind,
        request_id: RequestId,
        filename: &str,
        created_at: DateTime<Utc>,
        bytes: Vec<u8>,
    ) -> Result<ArtifactRecord> {
        let key = artifact_key(kind, request_id, filename, created_at);
        let mut tags = ObjectTags::new();
        tags.insert("original-filename".into(), filename.to_owned());
        tags.insert("request-id".into(), request_id.to_string());
        tags.insert("format".into(), kind.format().to_owned());
        tags.insert(
            "created-at".into(),
            created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        );

        let size = bytes.len();
        self.objects
            .put(&key, bytes, kind.content_type(), tags)
            .await?;
        tracing::debug!(%request_id, %kind, key, size, "artifact stored");

        Ok(ArtifactRecord {
            url: self.objects.url(&key),
            kind,
            key,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the backing store rejects the write.
    pub async fn put_source(
        &self,
        request_id: RequestId,
        filename: &str,
        created_at: DateTime<Utc>,
        bytes: Vec<u8>,
    ) -> Result<ArtifactRecord> {
        self.put(
            ArtifactKind::Source,
            request_id,
            filename,
            created_at,
            bytes,
        )
        .await
    }

    /// Render `result` for a derived `kind` and store it.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or the write fails.
    pub async fn put_derived(
        &self,
        kind: ArtifactKind,
        request_id: RequestId,
        filename: &str,
        created_at: DateTime<Utc>,
        result: &GenerationResult,
    ) -> Result<ArtifactRecord> {
        let bytes = render_derived(kind, result)?;
        self.put(kind, request_id, filename, created_at, bytes)
            .await
    }

    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if nothing is stored under `key`.
    pub async fn get(&self, key: &str) -> Result<StoredObject> {
        self.objects.get(key).await
    }

    /// At most `limit` entries under `prefix`, sorted by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be listed.
    pub async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<ObjectEntry>> {
        let mut entries = self.objects.list(prefix).await?;
        entries.truncate(limit);
        Ok(entries)
    }
}
