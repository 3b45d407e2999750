//! Content-addressed names of user records.

use sha2::{Digest, Sha256};
use std::fmt;

use gdir_common::{Error, Result, Username};
use gdir_crypto::MasterSecret;

/// Length of a record key in hex characters.
pub const RECORD_KEY_LEN: usize = 64;

/// File name a user record is stored under.
///
/// The worker recomputes the same value from the login name, so the
/// derivation below cannot change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey(String);

impl RecordKey {
    /// Accept an existing file name as a record key.
    ///
    /// # Errors
    /// - Not 64 lowercase hex characters
    pub fn parse(s: &str) -> Result<Self> {
        let valid = s.len() == RECORD_KEY_LEN
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !valid {
            return Err(Error::InputValidation(format!(
                "Not a user record key: {}",
                s
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `hex(SHA-256(secret || username))`, with no separator.
pub fn record_key(secret: &MasterSecret, username: &Username) -> RecordKey {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(username.as_str().as_bytes());
    RecordKey(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn user(name: &str) -> Username {
        Username::new(name).unwrap()
    }

    #[test]
    fn test_known_vector() {
        // sha256("s3cr3talice")
        let secret = MasterSecret::new("s3cr3t").unwrap();
        let key = record_key(&secret, &user("alice"));

        let mut hasher = Sha256::new();
        hasher.update(b"s3cr3talice");
        assert_eq!(key.as_str(), hex::encode(hasher.finalize()));
        assert_eq!(key.as_str().len(), RECORD_KEY_LEN);
    }

    #[test]
    fn test_no_separator() {
        // "ab" + "c" and "a" + "bc" hash the same bytes.
        let left = record_key(&MasterSecret::new("ab").unwrap(), &user("c"));
        let right = record_key(&MasterSecret::new("a").unwrap(), &user("bc"));
        assert_eq!(left, right);
    }

    #[test]
    fn test_parse() {
        let secret = MasterSecret::new("s3cr3t").unwrap();
        let key = record_key(&secret, &user("alice"));

        assert_eq!(RecordKey::parse(key.as_str()).unwrap(), key);
        assert!(RecordKey::parse("0").is_err());
        assert!(RecordKey::parse(&key.as_str().to_uppercase()).is_err());
        assert!(RecordKey::parse(&"g".repeat(RECORD_KEY_LEN)).is_err());
    }

    proptest! {
        #[test]
        fn prop_deterministic_and_distinct(
            secret in "[ -~]{1,32}",
            a in "[a-z0-9]{1,16}",
            b in "[a-z0-9]{1,16}",
        ) {
            let secret = MasterSecret::new(secret).unwrap();
            let ka = record_key(&secret, &user(&a));
            prop_assert_eq!(&ka, &record_key(&secret, &user(&a)));
            if a != b {
                prop_assert_ne!(ka, record_key(&secret, &user(&b)));
            }
        }
    }
}
