use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};
use crate::object::{
    BoxFuture, DEFAULT_CONTENT_TYPE, ObjectEntry, ObjectStore, ObjectTags, StoredObject,
    validate_key,
};

const OBJECTS_DIR: &str = "objects";
const META_DIR: &str = "meta";

/// Filesystem-backed object store.
///
/// Layout: object bytes under `<root>/objects/<key>`, content type and tags in a
/// JSON sidecar under `<root>/meta/<key>.json`. Both are written to a hidden
/// temp file first and renamed into place, so readers never see a torn object.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    content_type: String,
    #[serde(default)]
    tags: ObjectTags,
}

impl FsObjectStore {
    /// Open (or create) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join(OBJECTS_DIR)).await?;
        tokio::fs::create_dir_all(root.join(META_DIR)).await?;
        let root = tokio::fs::canonicalize(&root).await?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let mut path = self.root.join(OBJECTS_DIR);
        path.extend(key.split('/'));
        path
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        let mut path = self.root.join(META_DIR);
        path.extend(key.split('/'));
        path.as_mut_os_string().push(".json");
        path
    }

    async fn put_inner(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        tags: ObjectTags,
    ) -> Result<()> {
        validate_key(key)?;
        let sidecar = serde_json::to_vec(&Sidecar {
            content_type: content_type.to_owned(),
            tags,
        })?;
        write_atomic(&self.object_path(key), &bytes).await?;
        write_atomic(&self.meta_path(key), &sidecar).await?;
        Ok(())
    }

    async fn get_inner(&self, key: &str) -> Result<StoredObject> {
        validate_key(key)?;
        let bytes = match tokio::fs::read(self.object_path(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_owned()));
            }
            Err(e) => return Err(e.into()),
        };
        let sidecar = match tokio::fs::read(self.meta_path(key)).await {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(key, "object has no metadata sidecar");
                Sidecar {
                    content_type: DEFAULT_CONTENT_TYPE.to_owned(),
                    tags: ObjectTags::new(),
                }
            }
            Err(e) => return Err(e.into()),
        };
        Ok(StoredObject {
            bytes,
            content_type: sidecar.content_type,
            tags: sidecar.tags,
        })
    }

    async fn list_inner(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        let base = self.root.join(OBJECTS_DIR);
        let mut pending = vec![base.clone()];
        let mut entries = Vec::new();

        while let Some(dir) = pending.pop() {
            let mut reader = match tokio::fs::read_dir(&dir).await {
                Ok(reader) => reader,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = reader.next_entry().await? {
                // Temp files are hidden until renamed into place.
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                if entry.file_type().await?.is_dir() {
                    pending.push(entry.path());
                    continue;
                }
                let path = entry.path();
                let relative = path.strip_prefix(&base).map_err(|_| {
                    StorageError::Corrupt(format!("{} escapes store root", path.display()))
                })?;
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if !key.starts_with(prefix) {
                    continue;
                }
                let meta = entry.metadata().await?;
                let modified_at = meta
                    .modified()
                    .map_or_else(|_| Utc::now(), DateTime::<Utc>::from);
                entries.push(ObjectEntry {
                    key,
                    size: meta.len(),
                    modified_at,
                });
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| StorageError::InvalidKey(path.display().to_string()))?;
    tokio::fs::create_dir_all(parent).await?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

impl ObjectStore for FsObjectStore {
    fn put<'a>(
        &'a self,
        key: &'a str,
        bytes: Vec<u8>,
        content_type: &'a str,
        tags: ObjectTags,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.put_inner(key, bytes, content_type, tags))
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<StoredObject>> {
        Box::pin(self.get_inner(key))
    }

    fn list<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<Vec<ObjectEntry>>> {
        Box::pin(self.list_inner(prefix))
    }

    fn url(&self, key: &str) -> String {
        format!("file://{}", self.object_path(key).display())
    }
}
