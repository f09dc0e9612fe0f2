//! Attachment object storage.

mod filesystem;
mod memory;

use std::{sync::Arc, time::Duration};

use bytes::Bytes;

pub use filesystem::FilesystemObjectStore;
pub use memory::MemoryObjectStore;

use crate::config::{StorageBackend, StorageConfig};

/// Object storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No object under this name.
    #[error("object {0} not found")]
    NotFound(String),

    /// The name is empty, absolute or escapes the store.
    #[error("invalid object name: {0}")]
    InvalidName(String),

    /// Backend I/O failed.
    #[error("object storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stored bytes, either buffered or as an open file.
#[derive(Debug)]
pub enum ObjectBody {
    /// Buffered content.
    Bytes(Bytes),
    /// Open file positioned at the start, with its length.
    File(tokio::fs::File, u64),
}

impl ObjectBody {
    /// Content length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            Self::Bytes(bytes) => bytes.len() as u64,
            Self::File(_, len) => *len,
        }
    }

    /// True for empty objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the whole body into memory.
    pub async fn into_bytes(self) -> Result<Bytes, StorageError> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::File(mut file, len) => {
                use tokio::io::AsyncReadExt;
                let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or_default());
                file.read_to_end(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

/// Key/value store for attachment bytes.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Store `data` under `name`, replacing any previous object.
    async fn put(&self, name: &str, data: Bytes) -> Result<(), StorageError>;

    /// Open the object stored under `name`.
    async fn get(&self, name: &str) -> Result<ObjectBody, StorageError>;

    /// Remove the object under `name`. Missing objects are not an error.
    async fn delete(&self, name: &str) -> Result<(), StorageError>;

    /// Direct link to the object valid for `ttl`, when the backend can
    /// serve one. Callers fall back to the API content route.
    fn download_url(&self, name: &str, ttl: Duration) -> Option<String>;
}

/// Object store selected by `config.backend`.
pub fn from_config(config: &StorageConfig) -> Arc<dyn ObjectStore> {
    match config.backend {
        StorageBackend::Memory => Arc::new(MemoryObjectStore::new()),
        StorageBackend::Filesystem => Arc::new(FilesystemObjectStore::new(config.root.clone())),
    }
}

/// Check an object name: relative, `/`-separated, no empty, `.` or `..` segments.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    let valid = !name.is_empty()
        && !name.starts_with('/')
        && !name.contains('\\')
        && name
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nested_relative_names() {
        assert!(validate_name("lesson-3/notes.pdf").is_ok());
        assert!(validate_name("a.txt").is_ok());
    }

    #[test]
    fn rejects_escaping_names() {
        for name in ["", "/etc/passwd", "lesson-3/../../x", "lesson-3//x", "./x", "a\\b"] {
            assert!(
                matches!(validate_name(name), Err(StorageError::InvalidName(_))),
                "accepted {name:?}"
            );
        }
    }

    #[test]
    fn from_config_selects_backend() {
        let config = StorageConfig::default();
        let store = from_config(&config);
        assert!(store.download_url("x", Duration::from_secs(1)).is_none());
    }
}
