//! Ingestion pipeline for casegen: configuration, PDF extraction, the
//! orchestrator that drives a document to stored artifacts, and the read catalog.

pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extractor;
pub mod orchestrator;
pub mod secret;

pub use bootstrap::AppContext;
pub use catalog::{ArtifactDownload, Catalog, RecordList};
pub use config::Config;
pub use error::{CatalogError, IngestError};
pub use extractor::{ExtractionResult, Extractor, PageReader};
pub use orchestrator::{Document, IngestLimits, IngestOutcome, Orchestrator};
