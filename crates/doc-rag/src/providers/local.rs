//! Local filesystem file store

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::{Error, Result};

use super::file_store::FileStore;

/// File store rooted at a local uploads directory
pub struct LocalFileStore {
    /// Directory to store documents
    storage_dir: PathBuf,
}

impl LocalFileStore {
    /// Create a new local file store, creating the directory if needed
    pub fn new(storage_dir: impl Into<PathBuf>) -> Result<Self> {
        let storage_dir = storage_dir.into();
        std::fs::create_dir_all(&storage_dir)?;
        Ok(Self { storage_dir })
    }

    /// Resolve a storage name inside the root; names with path components are rejected
    fn path_for(&self, storage_name: &str) -> Result<PathBuf> {
        let valid = !storage_name.is_empty()
            && !storage_name.contains(['/', '\\'])
            && storage_name != "."
            && storage_name != "..";
        if !valid {
            return Err(Error::InvalidRequest(format!(
                "Invalid storage name: {}",
                storage_name
            )));
        }
        Ok(self.storage_dir.join(storage_name))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn store(&self, storage_name: &str, data: &[u8]) -> Result<String> {
        let path = self.path_for(storage_name)?;
        tokio::fs::write(&path, data).await?;
        tracing::debug!("Stored {} bytes at {}", data.len(), path.display());
        Ok(path.to_string_lossy().to_string())
    }

    async fn read(&self, location: &str) -> Result<Vec<u8>> {
        tokio::fs::read(location)
            .await
            .map_err(|e| Error::Internal(format!("Failed to read stored file {}: {}", location, e)))
    }

    async fn delete(&self, location: &str) -> Result<()> {
        match tokio::fs::remove_file(location).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, location: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(location).await?)
    }

    fn name(&self) -> &str {
        "local-filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().join("uploads")).unwrap();

        let location = store.store("abc.txt", b"pool rules").await.unwrap();
        assert!(location.ends_with("abc.txt"));
        assert!(store.exists(&location).await.unwrap());
        assert_eq!(store.read(&location).await.unwrap(), b"pool rules");

        store.delete(&location).await.unwrap();
        assert!(!store.exists(&location).await.unwrap());
        // second delete is a no-op
        store.delete(&location).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_components() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path()).unwrap();

        for name in ["../escape.txt", "a/b.txt", "..", ""] {
            let err = store.store(name, b"x").await.unwrap_err();
            assert!(matches!(err, Error::InvalidRequest(_)), "{}", name);
        }
    }

    #[tokio::test]
    async fn test_read_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path()).unwrap();
        let missing = dir.path().join("missing.pdf");
        assert!(store.read(&missing.to_string_lossy()).await.is_err());
    }
}
