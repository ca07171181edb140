use casegen_storage::{ArtifactKind, StorageError};

/// Why an upload was refused or could not be processed.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(
        "Only PDF files are allowed. Please upload a file with .pdf extension."
    )]
    UnsupportedType,

    #[error("File size exceeds the maximum limit of {limit}")]
    TooLarge { limit: String },

    #[error("{0}")]
    Extraction(String),

    #[error(
        "PDF does not contain sufficient text content. Minimum {min_chars} characters required."
    )]
    InsufficientContent { min_chars: usize },

    #[error("Failed to store source document: {0}")]
    Storage(#[source] StorageError),
}

impl IngestError {
    /// Rejections caused by the uploaded document rather than the service.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("File not found")]
    NotFound,

    #[error("{} not found", artifact_label(.0))]
    ArtifactMissing(ArtifactKind),

    #[error("Download failed: {0}")]
    Storage(#[from] StorageError),
}

fn artifact_label(kind: &ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Source => "PDF",
        ArtifactKind::Json => "Test cases",
        ArtifactKind::Markdown => "Markdown test cases",
    }
}

/// Render a byte limit the way rejection messages show it.
#[must_use]
pub fn human_size(bytes: usize) -> String {
    const MIB: usize = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{bytes} bytes")
    }
}
