//! Authenticated encryption of records using AES-256-GCM.
//!
//! Blob layout (bit-exact, shared with the worker script):
//!
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! There is no AAD, no version byte and no length prefix. Opening needs
//! only the blob plus the (secret, namespace) pair it was sealed under.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};

use crate::keys::{derive_key, DerivedKey, MasterSecret, Namespace};
use crate::random;
use gdir_common::{Error, Result};

/// Nonce size for AES-256-GCM (12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// AES-256-GCM bound to one derived key.
///
/// Holding a `RecordCipher` avoids re-deriving the key when many blobs of
/// the same namespace are sealed in a row.
pub struct RecordCipher {
    namespace: Namespace,
    cipher: Aes256Gcm,
}

impl RecordCipher {
    /// Derive the namespace key and initialize the cipher.
    ///
    /// # Errors
    /// - [`Error::CipherInit`] if the primitive rejects the key
    pub fn new(secret: &MasterSecret, namespace: Namespace) -> Result<Self> {
        let key = derive_key(secret, namespace);
        Self::with_key(&key, namespace)
    }

    /// Initialize the cipher from an already derived key.
    pub fn with_key(key: &DerivedKey, namespace: Namespace) -> Result<Self> {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| Error::CipherInit(e.to_string()))?;
        Ok(Self { namespace, cipher })
    }

    /// Namespace this cipher was derived for.
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Seal `plaintext` under a fresh random nonce.
    ///
    /// # Postconditions
    /// - Returns nonce || ciphertext || tag
    /// - Output length is plaintext length + NONCE_SIZE + TAG_SIZE
    ///
    /// # Errors
    /// - [`Error::RandomSource`] if no nonce could be drawn
    /// - [`Error::Encryption`] if the cipher refuses the plaintext
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_SIZE];
        random::fill_buf(&mut nonce)?;

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| Error::Encryption(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Open a blob produced by [`RecordCipher::seal`].
    ///
    /// Either the exact plaintext is returned or an error; never partial
    /// output.
    ///
    /// # Errors
    /// - [`Error::MalformedBlob`] if the blob is shorter than the nonce
    /// - [`Error::Authentication`] if the tag does not verify
    pub fn open(&self, blob: &[u8]) -> Result<Vec<u8>> {
        check_blob_len(blob)?;

        let (nonce, sealed) = blob.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| Error::Authentication)
    }
}

/// Seal `plaintext` with the key derived for (`secret`, `namespace`).
pub fn seal(secret: &MasterSecret, namespace: Namespace, plaintext: &[u8]) -> Result<Vec<u8>> {
    RecordCipher::new(secret, namespace)?.seal(plaintext)
}

/// Open `blob` with the key derived for (`secret`, `namespace`).
///
/// A failure here means the record exists but cannot be trusted; callers
/// must not fall back to treating it as absent.
pub fn open(secret: &MasterSecret, namespace: Namespace, blob: &[u8]) -> Result<Vec<u8>> {
    check_blob_len(blob)?;
    RecordCipher::new(secret, namespace)?.open(blob)
}

fn check_blob_len(blob: &[u8]) -> Result<()> {
    if blob.len() < NONCE_SIZE {
        return Err(Error::MalformedBlob(format!(
            "blob is {} bytes, shorter than the {}-byte nonce",
            blob.len(),
            NONCE_SIZE
        )));
    }
    Ok(())
}
