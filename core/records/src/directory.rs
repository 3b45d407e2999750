//! Encrypted user directory.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::access::AccessUpdate;
use crate::address::{record_key, RecordKey};
use crate::user::UserRecord;
use gdir_common::{Error, Result, SensitiveBytes, Username};
use gdir_crypto::{MasterSecret, Namespace, RecordCipher};
use gdir_storage::BlobStore;

/// User records sealed under the `user` namespace, one blob per user.
pub struct UserDirectory {
    secret: MasterSecret,
    cipher: RecordCipher,
    store: Arc<dyn BlobStore>,
}

impl UserDirectory {
    /// Bind a directory to a secret and a record store.
    ///
    /// # Errors
    /// - Cipher initialization failure
    pub fn new(secret: &MasterSecret, store: Arc<dyn BlobStore>) -> Result<Self> {
        Ok(Self {
            secret: secret.clone(),
            cipher: RecordCipher::new(secret, Namespace::User)?,
            store,
        })
    }

    /// Record key for `name` under this directory's secret.
    pub fn key_for(&self, name: &Username) -> RecordKey {
        record_key(&self.secret, name)
    }

    /// Load one user.
    ///
    /// # Returns
    /// `Ok(None)` if no record is stored for `name`.
    ///
    /// # Errors
    /// - [`Error::Authentication`] if the blob does not open under this secret
    /// - [`Error::Serialization`] if it holds another user's record
    pub async fn load(&self, name: &Username) -> Result<Option<UserRecord>> {
        let key = self.key_for(name);
        match self.store.get(key.as_str()).await? {
            None => Ok(None),
            Some(blob) => {
                let record = self.open_record(&blob)?;
                if record.name != name.as_str() {
                    return Err(Error::Serialization(format!(
                        "Record {} belongs to a different user",
                        key
                    )));
                }
                debug!(user = %name, "Loaded user record");
                Ok(Some(record))
            }
        }
    }

    /// Seal and store one user, replacing any previous record.
    ///
    /// # Errors
    /// - Record fails validation
    /// - Seal or store failure
    pub async fn save(&self, record: &UserRecord) -> Result<RecordKey> {
        record.validate()?;
        let name = Username::new(record.name.clone())?;
        let key = self.key_for(&name);

        let plaintext = SensitiveBytes::new(record.to_json()?);
        let blob = self.cipher.seal(plaintext.as_bytes())?;
        self.store.put(key.as_str(), blob).await?;

        info!(user = %name, key = %key, "Saved user record");
        Ok(key)
    }

    /// Delete one user.
    ///
    /// # Returns
    /// Whether a record was present.
    pub async fn remove(&self, name: &Username) -> Result<bool> {
        let key = self.key_for(name);
        let removed = self.store.delete(key.as_str()).await?;
        if removed {
            info!(user = %name, "Removed user record");
        }
        Ok(removed)
    }

    /// Open every record in the store, sorted by user name.
    ///
    /// Entries whose name is not a record key are skipped.
    ///
    /// # Errors
    /// - Any record that fails to open or parse
    pub async fn list(&self) -> Result<Vec<UserRecord>> {
        let mut records = Vec::new();

        for entry in self.store.list().await? {
            if RecordKey::parse(&entry).is_err() {
                warn!(entry = %entry, "Skipping non-record entry");
                continue;
            }
            let Some(blob) = self.store.get(&entry).await? else {
                continue;
            };
            records.push(self.open_record(&blob)?);
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    /// Whether no user record exists yet.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self
            .store
            .list()
            .await?
            .iter()
            .all(|entry| RecordKey::parse(entry).is_err()))
    }

    /// Create or update a user.
    ///
    /// See [`UserRecord::merge`] for how old and new values combine.
    pub async fn upsert(
        &self,
        name: &Username,
        pass: Option<String>,
        update: AccessUpdate,
    ) -> Result<UserRecord> {
        let old = self.load(name).await?;
        let record = UserRecord::merge(old.as_ref(), name, pass, update)?;
        self.save(&record).await?;
        Ok(record)
    }

    fn open_record(&self, blob: &[u8]) -> Result<UserRecord> {
        let plaintext = SensitiveBytes::new(self.cipher.open(blob)?);
        UserRecord::from_json(plaintext.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessControl;
    use gdir_crypto::{open, seal};
    use gdir_storage::{LocalStore, MemoryStore};
    use tempfile::TempDir;

    fn secret() -> MasterSecret {
        MasterSecret::new("s3cr3t").unwrap()
    }

    fn user(name: &str) -> Username {
        Username::new(name).unwrap()
    }

    fn directory(store: &MemoryStore) -> UserDirectory {
        UserDirectory::new(&secret(), Arc::new(store.clone())).unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = MemoryStore::new();
        let dir = directory(&store);

        let record = UserRecord::new(&user("alice"), "p@ss").unwrap();
        let key = dir.save(&record).await.unwrap();

        assert_eq!(key, record_key(&secret(), &user("alice")));
        assert!(store.exists(key.as_str()).await.unwrap());
        assert_eq!(dir.load(&user("alice")).await.unwrap(), Some(record));
        assert_eq!(dir.load(&user("bob")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stored_blob_opens_with_free_function() {
        let store = MemoryStore::new();
        let dir = directory(&store);

        let record = UserRecord::new(&user("alice"), "p@ss").unwrap();
        let key = dir.save(&record).await.unwrap();

        let blob = store.get(key.as_str()).await.unwrap().unwrap();
        let plaintext = open(&secret(), Namespace::User, &blob).unwrap();
        assert_eq!(plaintext, br#"{"name":"alice","pass":"p@ss"}"#.to_vec());
        assert!(matches!(
            open(&secret(), Namespace::Account, &blob),
            Err(Error::Authentication)
        ));
    }

    #[tokio::test]
    async fn test_wrong_secret_fails() {
        let store = MemoryStore::new();
        directory(&store)
            .save(&UserRecord::new(&user("alice"), "p@ss").unwrap())
            .await
            .unwrap();

        // Same key file but sealed under another secret.
        let other = MasterSecret::new("other").unwrap();
        let key = record_key(&secret(), &user("alice"));
        let blob = seal(&other, Namespace::User, br#"{"name":"alice","pass":"x"}"#).unwrap();
        store.put(key.as_str(), blob).await.unwrap();

        assert!(matches!(
            directory(&store).load(&user("alice")).await,
            Err(Error::Authentication)
        ));
    }

    #[tokio::test]
    async fn test_swapped_record_detected() {
        let store = MemoryStore::new();
        let dir = directory(&store);

        let bob_key = dir
            .save(&UserRecord::new(&user("bob"), "pw").unwrap())
            .await
            .unwrap();
        let blob = store.get(bob_key.as_str()).await.unwrap().unwrap();
        store
            .put(dir.key_for(&user("alice")).as_str(), blob)
            .await
            .unwrap();

        assert!(matches!(
            dir.load(&user("alice")).await,
            Err(Error::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_upsert_merges() {
        let store = MemoryStore::new();
        let dir = directory(&store);

        assert!(dir
            .upsert(&user("alice"), None, AccessUpdate::Keep)
            .await
            .is_err());

        dir.upsert(
            &user("alice"),
            Some("pw".to_string()),
            AccessUpdate::Allow(vec!["a".into(), "b".into()]),
        )
        .await
        .unwrap();

        let updated = dir
            .upsert(&user("alice"), None, AccessUpdate::Keep)
            .await
            .unwrap();
        assert_eq!(updated.pass, "pw");
        assert_eq!(
            updated.access().unwrap(),
            AccessControl::Allow(vec!["a".into(), "b".into()])
        );

        let updated = dir
            .upsert(&user("alice"), None, AccessUpdate::Deny(vec!["x".into()]))
            .await
            .unwrap();
        assert!(updated.allow_list.is_empty());
        assert_eq!(updated.deny_list, vec!["x"]);
    }

    #[tokio::test]
    async fn test_list_and_remove() {
        let store = MemoryStore::new();
        let dir = directory(&store);
        assert!(dir.is_empty().await.unwrap());

        for name in ["carol", "alice", "bob"] {
            dir.save(&UserRecord::new(&user(name), "pw").unwrap())
                .await
                .unwrap();
        }
        store.put("README", b"not a record".to_vec()).await.unwrap();

        let names: Vec<String> = dir
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
        assert!(!dir.is_empty().await.unwrap());

        assert!(dir.remove(&user("bob")).await.unwrap());
        assert!(!dir.remove(&user("bob")).await.unwrap());
        assert_eq!(dir.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_ignores_foreign_entries() {
        let store = MemoryStore::new();
        store.put("README", b"placeholder".to_vec()).await.unwrap();
        store.put("0", vec![1]).await.unwrap();
        let dir = directory(&store);
        assert!(dir.is_empty().await.unwrap());

        dir.save(&UserRecord::new(&user("admin"), "pw").unwrap())
            .await
            .unwrap();
        assert!(!dir.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_list_fails_on_corrupt_record() {
        let store = MemoryStore::new();
        let dir = directory(&store);
        let key = dir
            .save(&UserRecord::new(&user("alice"), "pw").unwrap())
            .await
            .unwrap();

        let mut blob = store.get(key.as_str()).await.unwrap().unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        store.put(key.as_str(), blob).await.unwrap();

        assert!(matches!(dir.list().await, Err(Error::Authentication)));
    }

    #[tokio::test]
    async fn test_local_store_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::new(temp.path().join("users")).unwrap());
        let dir = UserDirectory::new(&secret(), store).unwrap();

        let record = UserRecord::new(&user("alice"), "p@ss").unwrap();
        let key = dir.save(&record).await.unwrap();

        assert!(temp.path().join("users").join(key.as_str()).is_file());
        assert_eq!(dir.load(&user("alice")).await.unwrap(), Some(record));
    }
}
