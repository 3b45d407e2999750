//! Key types with secure memory handling.
//!
//! All key types automatically zeroize their memory on drop to prevent
//! sensitive data from persisting in memory.

use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::random;
use gdir_common::{Error, Result};

/// Length of derived keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Number of random bytes behind a generated master secret.
pub const GENERATED_SECRET_BYTES: usize = 64;

/// Operator-supplied master secret.
///
/// This secret is the root of trust: every namespaced key and every user
/// record key is derived from it. It is never logged.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret {
    secret: String,
}

impl MasterSecret {
    /// Wrap an existing secret string.
    ///
    /// # Errors
    /// - Returns error if the secret is empty
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(Error::InputValidation(
                "Master secret cannot be empty".to_string(),
            ));
        }
        Ok(Self { secret })
    }

    /// Generate a fresh secret from the OS random source.
    ///
    /// The secret is the lowercase hex encoding of
    /// [`GENERATED_SECRET_BYTES`] random bytes.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; GENERATED_SECRET_BYTES];
        random::fill_buf(&mut bytes)?;
        let secret = hex::encode(bytes);
        bytes.zeroize();
        Ok(Self { secret })
    }

    /// Get the secret bytes as fed into the hash functions.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8] {
        self.secret.as_bytes()
    }

    /// Get the secret string, e.g. for persisting it to the config file.
    pub fn expose(&self) -> &str {
        &self.secret
    }

    /// Constant-time comparison against a re-entered secret.
    pub fn matches(&self, candidate: &str) -> bool {
        self.secret.as_bytes().ct_eq(candidate.as_bytes()).into()
    }

    /// Short non-reversible identifier for showing which secret is in use.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"gdir-fingerprint:");
        hasher.update(self.secret.as_bytes());
        hex::encode(&hasher.finalize()[..4])
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterSecret([REDACTED])")
    }
}

/// Record class a key is derived for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Service-account credential blobs.
    Account,
    /// Per-user access-control records.
    User,
}

impl Namespace {
    /// Tag mixed into the key derivation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Account => "account",
            Namespace::User => "user",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "account" => Ok(Namespace::Account),
            "user" => Ok(Namespace::User),
            other => Err(Error::InputValidation(format!(
                "Unknown namespace '{}', expected 'account' or 'user'",
                other
            ))),
        }
    }
}

/// Generate a fresh master secret from the OS random source.
pub fn generate_secret() -> Result<MasterSecret> {
    MasterSecret::generate()
}

/// 256-bit key derived from a master secret for one namespace.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    /// Create a derived key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey([REDACTED])")
    }
}

/// Derive the key for `namespace` as `SHA-256(secret || ":" || namespace)`.
///
/// Deterministic: the key is recomputed on demand and never stored.
pub fn derive_key(secret: &MasterSecret, namespace: Namespace) -> DerivedKey {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b":");
    hasher.update(namespace.as_str().as_bytes());

    let mut key = [0u8; KEY_LENGTH];
    key.copy_from_slice(&hasher.finalize());
    DerivedKey::from_bytes(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> MasterSecret {
        MasterSecret::new(s).unwrap()
    }

    #[test]
    fn test_derive_key_matches_sha256_of_tagged_secret() {
        let key = derive_key(&secret("s3cr3t"), Namespace::User);
        let expected = Sha256::digest(b"s3cr3t:user");
        assert_eq!(key.as_bytes().as_slice(), expected.as_slice());
    }

    #[test]
    fn test_derive_key_deterministic() {
        let key1 = derive_key(&secret("s3cr3t"), Namespace::Account);
        let key2 = derive_key(&secret("s3cr3t"), Namespace::Account);
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_namespaces_are_independent() {
        let account = derive_key(&secret("s3cr3t"), Namespace::Account);
        let user = derive_key(&secret("s3cr3t"), Namespace::User);
        assert_ne!(account.as_bytes(), user.as_bytes());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            MasterSecret::new(""),
            Err(Error::InputValidation(_))
        ));
    }

    #[test]
    fn test_generate_secret() {
        let s1 = MasterSecret::generate().unwrap();
        let s2 = generate_secret().unwrap();

        assert_eq!(s1.expose().len(), GENERATED_SECRET_BYTES * 2);
        assert!(s1
            .expose()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_ne!(s1.expose(), s2.expose());
    }

    #[test]
    fn test_matches_and_fingerprint() {
        let s = secret("s3cr3t");
        assert!(s.matches("s3cr3t"));
        assert!(!s.matches("s3cr3"));
        assert!(!s.matches("s3cr3t "));

        assert_eq!(s.fingerprint(), secret("s3cr3t").fingerprint());
        assert_ne!(s.fingerprint(), secret("other").fingerprint());
        assert_eq!(s.fingerprint().len(), 8);
    }

    #[test]
    fn test_debug_is_redacted() {
        let s = secret("s3cr3t");
        assert!(!format!("{:?}", s).contains("s3cr3t"));
        let key = derive_key(&s, Namespace::User);
        assert_eq!(format!("{:?}", key), "DerivedKey([REDACTED])");
    }

    #[test]
    fn test_namespace_parse() {
        assert_eq!("user".parse::<Namespace>().unwrap(), Namespace::User);
        assert_eq!("account".parse::<Namespace>().unwrap(), Namespace::Account);
        assert!("pageToken".parse::<Namespace>().is_err());
        assert_eq!(Namespace::User.to_string(), "user");
    }
}
