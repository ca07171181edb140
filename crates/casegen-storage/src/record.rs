use std::fmt;
use std::str::FromStr;

use casegen_llm::{GenerationResult, TokenUsage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::{ArtifactKind, ArtifactRecord};
use crate::error::StorageError;

/// Identifier of one ingestion, fixed at receipt and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for RequestId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| StorageError::InvalidKey(format!("invalid request id {s:?}: {e}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Failed,
    PartialSuccess,
    Success,
}

impl RecordStatus {
    /// Ordering used to keep persisted status from regressing.
    #[must_use]
    pub fn rank(self) -> i64 {
        match self {
            Self::Failed => 0,
            Self::PartialSuccess => 1,
            Self::Success => 2,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Failed => "failed",
            Self::PartialSuccess => "partial_success",
            Self::Success => "success",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "failed" => Ok(Self::Failed),
            "partial_success" => Ok(Self::PartialSuccess),
            "success" => Ok(Self::Success),
            other => Err(StorageError::Corrupt(format!("unknown status {other:?}"))),
        }
    }
}

/// Status record describing the outcome of one ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub id: RequestId,
    pub filename: String,
    pub pages: u32,
    pub text_length: u64,
    pub status: RecordStatus,
    pub artifacts: Vec<ArtifactRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetadataRecord {
    #[must_use]
    pub fn artifact(&self, kind: ArtifactKind) -> Option<&ArtifactRecord> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }
}

/// Fields known before the outcome is; turned into a [`MetadataRecord`] whose
/// status is derived from what was actually stored.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub id: RequestId,
    pub filename: String,
    pub pages: u32,
    pub text_length: u64,
    pub created_at: DateTime<Utc>,
}

impl RecordDraft {
    /// No artifacts were stored.
    #[must_use]
    pub fn failed(self, error: impl Into<String>) -> MetadataRecord {
        self.into_record(RecordStatus::Failed, Vec::new(), None, Some(error.into()))
    }

    /// Derive the status from the stored artifacts and the first error seen.
    ///
    /// All three kinds and no error yield `success`. A source artifact with anything
    /// missing yields `partial_success`. Without a source artifact the record is
    /// `failed` and carries no artifacts.
    #[must_use]
    pub fn finish(
        self,
        artifacts: Vec<ArtifactRecord>,
        generation: Option<&GenerationResult>,
        error: Option<String>,
    ) -> MetadataRecord {
        let has = |kind: ArtifactKind| artifacts.iter().any(|a| a.kind == kind);
        let complete = ArtifactKind::ALL.iter().all(|&kind| has(kind));
        let has_source = has(ArtifactKind::Source);

        let (status, artifacts, error) = match (complete, has_source, error) {
            (true, _, None) => (RecordStatus::Success, artifacts, None),
            (_, true, error) => (
                RecordStatus::PartialSuccess,
                artifacts,
                Some(error.unwrap_or_else(|| "derived artifacts missing".into())),
            ),
            (_, false, error) => (
                RecordStatus::Failed,
                Vec::new(),
                Some(error.unwrap_or_else(|| "source artifact missing".into())),
            ),
        };

        self.into_record(status, artifacts, generation, error)
    }

    fn into_record(
        self,
        status: RecordStatus,
        artifacts: Vec<ArtifactRecord>,
        generation: Option<&GenerationResult>,
        error: Option<String>,
    ) -> MetadataRecord {
        MetadataRecord {
            id: self.id,
            filename: self.filename,
            pages: self.pages,
            text_length: self.text_length,
            status,
            artifacts,
            model: generation.map(|g| g.model.clone()),
            usage: generation.map(|g| g.usage),
            created_at: self.created_at,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> RecordDraft {
        RecordDraft {
            id: RequestId::new(),
            filename: "guide.pdf".into(),
            pages: 3,
            text_length: 1200,
            created_at: Utc::now(),
        }
    }

    fn artifact(kind: ArtifactKind) -> ArtifactRecord {
        ArtifactRecord {
            kind,
            key: format!("{}/k", kind.folder()),
            url: format!("memory://{}/k", kind.folder()),
        }
    }

    #[test]
    fn all_artifacts_without_error_is_success() {
        let artifacts = ArtifactKind::ALL.map(artifact).to_vec();
        let record = draft().finish(artifacts, None, None);
        assert_eq!(record.status, RecordStatus::Success);
        assert!(record.error.is_none());
        assert_eq!(record.artifacts.len(), 3);
    }

    #[test]
    fn source_only_with_error_is_partial() {
        let source = vec![artifact(ArtifactKind::Source)];
        let error = Some("rate limit exceeded after 3 attempts".into());
        let record = draft().finish(source, None, error);
        assert_eq!(record.status, RecordStatus::PartialSuccess);
        assert_eq!(record.artifacts.len(), 1);
        assert_eq!(
            record.error.as_deref(),
            Some("rate limit exceeded after 3 attempts")
        );
    }

    #[test]
    fn missing_derived_without_error_still_carries_detail() {
        let source = vec![artifact(ArtifactKind::Source)];
        let record = draft().finish(source, None, None);
        assert_eq!(record.status, RecordStatus::PartialSuccess);
        assert!(record.error.is_some());
    }

    #[test]
    fn no_source_is_failed_without_artifacts() {
        let json_only = vec![artifact(ArtifactKind::Json)];
        let record = draft().finish(json_only, None, None);
        assert_eq!(record.status, RecordStatus::Failed);
        assert!(record.artifacts.is_empty());
        assert!(record.error.is_some());

        let record = draft().failed("disk full");
        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("disk full"));
    }

    #[test]
    fn status_rank_orders_outcomes() {
        assert!(RecordStatus::Failed.rank() < RecordStatus::PartialSuccess.rank());
        assert!(RecordStatus::PartialSuccess.rank() < RecordStatus::Success.rank());
        assert_eq!(
            "partial_success".parse::<RecordStatus>().unwrap(),
            RecordStatus::PartialSuccess
        );
    }

    #[test]
    fn request_id_round_trips_through_text() {
        let id = RequestId::new();
        assert_eq!(id.to_string().parse::<RequestId>().unwrap(), id);
        assert!("not-a-uuid".parse::<RequestId>().is_err());
    }

    #[test]
    fn record_serializes_snake_case_status() {
        let record = draft().failed("boom");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "failed");
        assert!(json.get("model").is_none());
    }
}
