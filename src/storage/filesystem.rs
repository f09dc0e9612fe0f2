use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use bytes::Bytes;
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;
use url::Url;

use super::{ObjectBody, ObjectStore, StorageError, validate_name};

/// Object store keeping one file per object below a root directory.
///
/// Writes go to a temporary file in the root and are renamed into place,
/// so readers never observe a partially written object.
#[derive(Debug, Clone)]
pub struct FilesystemObjectStore {
    root: PathBuf,
}

impl FilesystemObjectStore {
    /// Store rooted at `root`. The directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(name.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

#[async_trait::async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<(), StorageError> {
        let target = self.path_of(name)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp = self.root.join(format!(".upload-{}", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&temp).await?;
        let written = async {
            file.write_all(&data).await?;
            file.sync_all().await
        }
        .await;
        drop(file);

        if let Err(e) = written {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(object = name, bytes = data.len(), "Stored object");
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<ObjectBody, StorageError> {
        let path = self.path_of(name)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata().await?.len();
        Ok(ObjectBody::File(file, len))
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path_of(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// `file://` URL of the object for operators on the same host.
    fn download_url(&self, name: &str, _ttl: Duration) -> Option<String> {
        let path = std::path::absolute(self.path_of(name).ok()?).ok()?;
        Url::from_file_path(path).ok().map(String::from)
    }
}
