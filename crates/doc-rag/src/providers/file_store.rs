//! File store trait for raw uploaded bytes

use async_trait::async_trait;

use crate::error::Result;

/// Trait for storing the original bytes of uploaded documents
///
/// Files are addressed by the system-assigned storage name (`<id>.<ext>`);
/// `store` returns the location recorded on the document.
///
/// Implementations:
/// - `LocalFileStore`: Local filesystem
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store bytes under `storage_name`, returning the stored location
    async fn store(&self, storage_name: &str, data: &[u8]) -> Result<String>;

    /// Read the bytes at a location returned by `store`
    async fn read(&self, location: &str) -> Result<Vec<u8>>;

    /// Remove a stored file; a missing file is not an error
    async fn delete(&self, location: &str) -> Result<()>;

    /// Check if a stored file exists
    async fn exists(&self, location: &str) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
