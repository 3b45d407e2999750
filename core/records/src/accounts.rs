//! Bulk encryption of service-account credential files.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use gdir_common::{Error, Result, SensitiveBytes};
use gdir_crypto::{MasterSecret, Namespace, RecordCipher};
use gdir_storage::BlobStore;

/// Collect the credential files to encrypt.
///
/// Only non-empty regular files with a `.json` extension are accepted,
/// sorted by file name so repeated runs over the same directory assign the
/// same indices.
///
/// # Errors
/// - `source_dir` is missing or not a directory
pub async fn scan_account_sources(source_dir: &Path) -> Result<Vec<PathBuf>> {
    if !source_dir.is_dir() {
        return Err(Error::NotFound(format!(
            "Accounts JSON directory: {}",
            source_dir.display()
        )));
    }

    let mut sources = Vec::new();
    let mut entries = fs::read_dir(source_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = entry.metadata().await?;

        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        if !metadata.is_file() || !is_json {
            continue;
        }
        if metadata.len() == 0 {
            warn!(file = %path.display(), "Skipping empty account file");
            continue;
        }
        sources.push(path);
    }

    sources.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(sources)
}

/// Seal every credential file under the `account` namespace.
///
/// Blobs are written under the dense indices `"0"`, `"1"`, … in scan
/// order. Nothing else in `store` is touched, so blobs from an earlier,
/// larger run stay in place.
///
/// # Returns
/// Number of accounts stored, to be recorded as `accounts_count`.
pub async fn encrypt_accounts(
    secret: &MasterSecret,
    source_dir: &Path,
    store: &dyn BlobStore,
) -> Result<u64> {
    let sources = scan_account_sources(source_dir).await?;
    let cipher = RecordCipher::new(secret, Namespace::Account)?;

    for (index, path) in sources.iter().enumerate() {
        let plaintext = SensitiveBytes::new(fs::read(path).await?);
        let blob = cipher.seal(plaintext.as_bytes())?;
        store.put(&index.to_string(), blob).await?;
        debug!(index, file = %path.display(), "Encrypted account");
    }

    let count = sources.len() as u64;
    info!(count, store = store.name(), "Encrypted accounts");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdir_crypto::open;
    use gdir_storage::MemoryStore;
    use tempfile::TempDir;

    fn secret() -> MasterSecret {
        MasterSecret::new("s3cr3t").unwrap()
    }

    #[tokio::test]
    async fn test_dense_indices_in_name_order() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("b.json"), b"{\"b\":1}").unwrap();
        std::fs::write(temp.path().join("a.json"), b"{\"a\":1}").unwrap();
        std::fs::write(temp.path().join("empty.json"), b"").unwrap();
        std::fs::write(temp.path().join("notes.txt"), b"ignored").unwrap();
        std::fs::create_dir(temp.path().join("dir.json")).unwrap();
        std::fs::write(temp.path().join("c.json"), b"{\"c\":1}").unwrap();

        let store = MemoryStore::new();
        let count = encrypt_accounts(&secret(), temp.path(), &store)
            .await
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(store.list().await.unwrap(), vec!["0", "1", "2"]);

        let blob = store.get("0").await.unwrap().unwrap();
        assert_eq!(
            open(&secret(), Namespace::Account, &blob).unwrap(),
            b"{\"a\":1}".to_vec()
        );
        let blob = store.get("2").await.unwrap().unwrap();
        assert_eq!(
            open(&secret(), Namespace::Account, &blob).unwrap(),
            b"{\"c\":1}".to_vec()
        );
        assert!(matches!(
            open(&secret(), Namespace::User, &blob),
            Err(Error::Authentication)
        ));
    }

    #[tokio::test]
    async fn test_existing_blobs_survive_smaller_scan() {
        let first = TempDir::new().unwrap();
        std::fs::write(first.path().join("a.json"), b"{\"a\":1}").unwrap();
        std::fs::write(first.path().join("b.json"), b"{\"b\":1}").unwrap();

        let store = MemoryStore::new();
        encrypt_accounts(&secret(), first.path(), &store)
            .await
            .unwrap();

        let empty = TempDir::new().unwrap();
        let count = encrypt_accounts(&secret(), empty.path(), &store)
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(store.list().await.unwrap(), vec!["0", "1"]);

        let second = TempDir::new().unwrap();
        std::fs::write(second.path().join("c.json"), b"{\"c\":1}").unwrap();
        let count = encrypt_accounts(&secret(), second.path(), &store)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.list().await.unwrap(), vec!["0", "1"]);

        let blob = store.get("1").await.unwrap().unwrap();
        assert_eq!(
            open(&secret(), Namespace::Account, &blob).unwrap(),
            b"{\"b\":1}".to_vec()
        );
    }

    #[tokio::test]
    async fn test_missing_source_dir() {
        let temp = TempDir::new().unwrap();
        let store = MemoryStore::new();

        assert!(matches!(
            encrypt_accounts(&secret(), &temp.path().join("nope"), &store).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_dir_yields_zero() {
        let temp = TempDir::new().unwrap();
        let store = MemoryStore::new();

        let count = encrypt_accounts(&secret(), temp.path(), &store)
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert!(store.list().await.unwrap().is_empty());
    }
}
