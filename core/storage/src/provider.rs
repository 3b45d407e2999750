//! Record store trait definition.

use async_trait::async_trait;

use gdir_common::Result;

/// Flat key/blob store holding sealed records.
///
/// Keys must pass [`gdir_common::validate_store_key`]. Implementations do
/// not interpret blob contents.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Get the store name (e.g., "local", "memory").
    fn name(&self) -> &str;

    /// Write a blob, replacing any previous blob under the same key.
    ///
    /// # Errors
    /// - Invalid key
    /// - I/O errors
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()>;

    /// Read a blob.
    ///
    /// # Returns
    /// `Ok(None)` if no blob is stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Delete a blob.
    ///
    /// # Returns
    /// Whether a blob was present.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// List all keys in lexicographic order.
    async fn list(&self) -> Result<Vec<String>>;
}
