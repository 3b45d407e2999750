//! Common types used throughout gdir.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Name of a user of the file-sharing service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Username(String);

impl Username {
    /// Create a new Username from a string.
    ///
    /// Surrounding whitespace is kept: the name is hashed byte-for-byte into
    /// the record key, so `"alice"` and `" alice"` are different users.
    ///
    /// # Errors
    /// - Returns error if name is empty
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(crate::Error::InputValidation(
                "Username cannot be empty".to_string(),
            ));
        }
        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Split a comma separated list of drive IDs.
///
/// Entries are trimmed and empty entries dropped, so `"a, b,,"` yields
/// `["a", "b"]`.
pub fn parse_drive_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Check that `key` can be used as a file name in a flat record store.
///
/// # Errors
/// - Empty keys, keys containing path separators, and dot-files
pub fn validate_store_key(key: &str) -> crate::Result<()> {
    if key.is_empty() {
        return Err(crate::Error::InputValidation(
            "Store key cannot be empty".to_string(),
        ));
    }
    if key.contains('/') || key.contains('\\') {
        return Err(crate::Error::InputValidation(format!(
            "Store key cannot contain separators: {}",
            key
        )));
    }
    if key.starts_with('.') {
        return Err(crate::Error::InputValidation(format!(
            "Store key cannot start with a dot: {}",
            key
        )));
    }
    Ok(())
}

/// Sensitive data wrapper that zeroizes on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SensitiveBytes(Vec<u8>);

impl SensitiveBytes {
    /// Create new sensitive bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SensitiveBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveBytes([REDACTED; {} bytes])", self.0.len())
    }
}
