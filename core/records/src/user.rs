//! User record payload.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::access::{merge_access_lists, AccessControl, AccessUpdate};
use gdir_common::{Error, Result, Username};

/// Plaintext of one user record, as read by the worker.
///
/// Field names and order are part of the on-disk format.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Login name.
    pub name: String,
    /// Login password.
    pub pass: String,
    /// Drives the user is restricted to.
    #[serde(
        rename = "drives_white_list",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub allow_list: Vec<String>,
    /// Drives hidden from the user.
    #[serde(
        rename = "drives_black_list",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub deny_list: Vec<String>,
}

impl UserRecord {
    /// Create an unrestricted user.
    ///
    /// # Errors
    /// - Empty password
    pub fn new(name: &Username, pass: impl Into<String>) -> Result<Self> {
        let record = Self {
            name: name.as_str().to_string(),
            pass: pass.into(),
            allow_list: Vec::new(),
            deny_list: Vec::new(),
        };
        record.validate()?;
        Ok(record)
    }

    /// Check the record invariants.
    ///
    /// # Errors
    /// - Empty name or password
    /// - Both access lists set
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InputValidation(
                "User name cannot be empty".to_string(),
            ));
        }
        if self.pass.is_empty() {
            return Err(Error::InputValidation(format!(
                "Password for user {} cannot be empty",
                self.name
            )));
        }
        if !self.allow_list.is_empty() && !self.deny_list.is_empty() {
            return Err(Error::InputValidation(format!(
                "User {} has both a white-list and a black-list",
                self.name
            )));
        }
        Ok(())
    }

    /// Resolved access control.
    ///
    /// # Errors
    /// - Both access lists set
    pub fn access(&self) -> Result<AccessControl> {
        AccessControl::from_lists(self.allow_list.clone(), self.deny_list.clone())
    }

    /// Replace both access lists.
    pub fn set_access(&mut self, control: AccessControl) {
        let (allow, deny) = control.into_lists();
        self.allow_list = allow;
        self.deny_list = deny;
    }

    /// Combine a previously stored record with new input.
    ///
    /// The old password is kept when `pass` is `None` or empty. A user
    /// without a stored record must be given a password.
    ///
    /// # Errors
    /// - New user without a password
    /// - Stored record has both lists set
    pub fn merge(
        old: Option<&UserRecord>,
        name: &Username,
        pass: Option<String>,
        update: AccessUpdate,
    ) -> Result<Self> {
        let pass = pass.filter(|p| !p.is_empty());

        let (pass, previous) = match (old, pass) {
            (_, Some(pass)) => (pass, old.map(UserRecord::access).transpose()?),
            (Some(old), None) => (old.pass.clone(), Some(old.access()?)),
            (None, None) => {
                return Err(Error::InputValidation(format!(
                    "New user {} needs a password",
                    name
                )))
            }
        };

        let mut record = Self::new(name, pass)?;
        record.set_access(merge_access_lists(
            &previous.unwrap_or_default(),
            update,
        ));
        Ok(record)
    }

    /// Serialize to the JSON payload that gets sealed.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse and validate an opened payload.
    ///
    /// # Errors
    /// - [`Error::Serialization`] if the bytes are not a user record
    /// - [`Error::InputValidation`] if the record breaks an invariant
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let record: Self = serde_json::from_slice(bytes)?;
        record.validate()?;
        Ok(record)
    }
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("name", &self.name)
            .field("pass", &"[REDACTED]")
            .field("allow_list", &self.allow_list)
            .field("deny_list", &self.deny_list)
            .finish()
    }
}
