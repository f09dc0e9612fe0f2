use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;

use super::{ObjectBody, ObjectStore, StorageError, validate_name};

/// Object store in process memory.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, Bytes>,
}

impl MemoryObjectStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<(), StorageError> {
        validate_name(name)?;
        self.objects.insert(name.to_string(), data);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<ObjectBody, StorageError> {
        self.objects
            .get(name)
            .map(|entry| ObjectBody::Bytes(entry.value().clone()))
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.objects.remove(name);
        Ok(())
    }

    fn download_url(&self, _name: &str, _ttl: Duration) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let store = MemoryObjectStore::new();
        store
            .put("lesson-1/a.txt", Bytes::from_static(b"data"))
            .await
            .unwrap();

        let body = store.get("lesson-1/a.txt").await.unwrap();
        assert_eq!(body.len(), 4);
        assert_eq!(body.into_bytes().await.unwrap(), Bytes::from_static(b"data"));

        store.delete("lesson-1/a.txt").await.unwrap();
        assert!(matches!(
            store.get("lesson-1/a.txt").await,
            Err(StorageError::NotFound(_))
        ));
        // Deleting again is fine
        store.delete("lesson-1/a.txt").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_invalid_names() {
        let store = MemoryObjectStore::new();
        let err = store.put("../x", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidName(_)));
        assert!(store.is_empty());
    }
}
