//! Durable storage for casegen: artifact objects and the metadata registry.

pub mod artifact;
pub mod error;
pub mod fs;
pub mod memory;
pub mod object;
pub mod record;
pub mod registry;

pub use artifact::{ArtifactKind, ArtifactRecord, ArtifactStore};
pub use error::StorageError;
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::{ObjectEntry, ObjectStore, ObjectTags, StoredObject};
pub use record::{MetadataRecord, RecordDraft, RecordStatus, RequestId};
pub use registry::MetadataRegistry;
