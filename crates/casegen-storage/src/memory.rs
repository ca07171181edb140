use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::error::{Result, StorageError};
use crate::object::{BoxFuture, ObjectEntry, ObjectStore, ObjectTags, StoredObject, validate_key};

pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, (StoredObject, DateTime<Utc>)>>,
}

impl InMemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("objects", &self.len())
            .finish()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn put<'a>(
        &'a self,
        key: &'a str,
        bytes: Vec<u8>,
        content_type: &'a str,
        tags: ObjectTags,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            validate_key(key)?;
            let object = StoredObject {
                bytes,
                content_type: content_type.to_owned(),
                tags,
            };
            self.objects
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key.to_owned(), (object, Utc::now()));
            Ok(())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<StoredObject>> {
        Box::pin(async move {
            self.objects
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(key)
                .map(|(object, _)| object.clone())
                .ok_or_else(|| StorageError::NotFound(key.to_owned()))
        })
    }

    fn list<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<Vec<ObjectEntry>>> {
        Box::pin(async move {
            let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
            objects
                .range(prefix.to_owned()..)
                .take_while(|(key, _)| key.starts_with(prefix))
                .map(|(key, (object, modified_at))| -> Result<ObjectEntry> {
                    Ok(ObjectEntry {
                        key: key.clone(),
                        size: u64::try_from(object.bytes.len())?,
                        modified_at: *modified_at,
                    })
                })
                .collect()
        })
    }

    fn url(&self, key: &str) -> String {
        format!("memory://{key}")
    }
}
