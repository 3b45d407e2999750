//! Local filesystem record store.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::provider::BlobStore;
use gdir_common::{validate_store_key, Error, Result};

/// Local filesystem record store.
///
/// Stores each blob as one file directly under `root`. Hidden entries (for
/// example a `.git` directory used for publishing) are never listed.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a new local store with the given root directory.
    ///
    /// # Postconditions
    /// - Root directory is created (mode 0700 on unix) if it doesn't exist
    ///
    /// # Errors
    /// - Root exists but is not a directory
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Create root if it doesn't exist (sync for constructor)
        if !root.exists() {
            create_private_dir(&root)?;
        } else if !root.is_dir() {
            return Err(Error::InputValidation(format!(
                "Record store root is not a directory: {}",
                root.display()
            )));
        }

        Ok(Self { root })
    }

    /// Directory holding the blobs.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn to_fs_path(&self, key: &str) -> Result<PathBuf> {
        validate_store_key(key)?;
        Ok(self.root.join(key))
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Write `data` to `path`, readable by the owner only.
///
/// New files are created with mode 0600 on unix. An existing file is reset
/// to 0600 before it is overwritten.
#[cfg(unix)]
pub async fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    use tokio::io::AsyncWriteExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))
        .await?;
    file.write_all(data).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(not(unix))]
pub async fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).await?;
    Ok(())
}

#[async_trait]
impl BlobStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let fs_path = self.to_fs_path(key)?;

        if fs_path.is_dir() {
            return Err(Error::InputValidation(format!(
                "Cannot overwrite directory: {}",
                key
            )));
        }

        write_private(&fs_path, &data).await?;
        debug!(key, bytes = data.len(), "Stored blob");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let fs_path = self.to_fs_path(key)?;

        if !fs_path.exists() {
            return Ok(None);
        }

        if fs_path.is_dir() {
            return Err(Error::InputValidation(format!(
                "Cannot read directory: {}",
                key
            )));
        }

        Ok(Some(fs::read(&fs_path).await?))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let fs_path = self.to_fs_path(key)?;
        Ok(fs_path.is_file())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let fs_path = self.to_fs_path(key)?;

        if !fs_path.is_file() {
            return Ok(false);
        }

        fs::remove_file(&fs_path).await?;
        debug!(key, "Deleted blob");
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            keys.push(name);
        }

        keys.sort();
        Ok(keys)
    }
}
