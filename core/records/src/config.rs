//! Operator configuration file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::gist::GistId;
use gdir_common::{Error, Result};
use gdir_crypto::MasterSecret;

/// Default config file name, relative to the working directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Seconds between account candidate rotations when unset.
pub const DEFAULT_ACCOUNT_ROTATION: u64 = 60;

/// Number of account candidates when unset.
pub const DEFAULT_ACCOUNT_CANDIDATES: u64 = 10;

/// Gists the three published directories are pushed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GistIds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts: Option<GistId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<GistId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#static: Option<GistId>,
}

impl GistIds {
    fn is_empty(&self) -> bool {
        self.accounts.is_none() && self.users.is_none() && self.r#static.is_none()
    }
}

/// Persistent operator settings.
///
/// Loaded once at startup, overridden by command line flags once, then
/// passed by reference. Absent values are omitted from the file.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cf_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cf_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cf_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cf_worker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gist_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gist_user: Option<String>,
    #[serde(skip_serializing_if = "GistIds::is_empty")]
    pub gist_id: GistIds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub account_rotation: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub account_candidates: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts_json_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "is_zero")]
    pub accounts_count: u64,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

/// Values given on the command line, applied over the loaded file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub proxy: Option<String>,
    pub secret_key: Option<String>,
    pub cf_email: Option<String>,
    pub cf_key: Option<String>,
    pub cf_account: Option<String>,
    pub cf_worker: Option<String>,
    pub gist_token: Option<String>,
    pub gist_user: Option<String>,
    pub accounts_gist: Option<String>,
    pub users_gist: Option<String>,
    pub static_gist: Option<String>,
    pub account_rotation: Option<u64>,
    pub account_candidates: Option<u64>,
    pub accounts_json_dir: Option<PathBuf>,
}

impl ToolConfig {
    /// Load the config file.
    ///
    /// # Returns
    /// Defaults if `path` does not exist.
    ///
    /// # Errors
    /// - `path` is a directory
    /// - Unreadable or malformed file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        if path.is_dir() {
            return Err(Error::Config(format!(
                "Config file cannot be a directory: {}",
                path.display()
            )));
        }

        info!(path = %path.display(), "Loading existing config");
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write the config file with owner-only permissions.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        write_private(path, json.as_bytes())?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Apply command line values; anything given wins over the file.
    ///
    /// # Errors
    /// - A gist flag that is not a gist URL or ID
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<()> {
        fn set<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        fn set_gist(slot: &mut Option<GistId>, value: Option<String>) -> Result<()> {
            if let Some(value) = value {
                *slot = Some(GistId::parse(&value)?);
            }
            Ok(())
        }

        set(&mut self.proxy, overrides.proxy);
        set(&mut self.secret_key, overrides.secret_key);
        set(&mut self.cf_email, overrides.cf_email);
        set(&mut self.cf_key, overrides.cf_key);
        set(&mut self.cf_account, overrides.cf_account);
        set(&mut self.cf_worker, overrides.cf_worker);
        set(&mut self.gist_token, overrides.gist_token);
        set(&mut self.gist_user, overrides.gist_user);
        set(&mut self.accounts_json_dir, overrides.accounts_json_dir);
        set_gist(&mut self.gist_id.accounts, overrides.accounts_gist)?;
        set_gist(&mut self.gist_id.users, overrides.users_gist)?;
        set_gist(&mut self.gist_id.r#static, overrides.static_gist)?;

        if let Some(rotation) = overrides.account_rotation {
            self.account_rotation = rotation;
        }
        if let Some(candidates) = overrides.account_candidates {
            self.account_candidates = candidates;
        }
        Ok(())
    }

    /// Master secret.
    ///
    /// # Errors
    /// - No secret configured
    pub fn secret(&self) -> Result<MasterSecret> {
        match self.secret_key.as_deref() {
            Some(secret) if !secret.is_empty() => MasterSecret::new(secret),
            _ => Err(Error::Config(
                "secret_key is not set; run `gdir secret generate` first".to_string(),
            )),
        }
    }

    /// Store a new master secret.
    pub fn set_secret(&mut self, secret: &MasterSecret) {
        self.secret_key = Some(secret.expose().to_string());
    }

    /// Rotation interval, falling back to the default.
    pub fn account_rotation(&self) -> u64 {
        if self.account_rotation == 0 {
            DEFAULT_ACCOUNT_ROTATION
        } else {
            self.account_rotation
        }
    }

    /// Candidate count, falling back to the default.
    pub fn account_candidates(&self) -> u64 {
        if self.account_candidates == 0 {
            DEFAULT_ACCOUNT_CANDIDATES
        } else {
            self.account_candidates
        }
    }

    /// Names of the settings still needed to render the worker.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.secret_key.as_deref().map_or(true, str::is_empty) {
            missing.push("secret_key");
        }
        if self.cf_worker.is_none() {
            missing.push("cf_worker");
        }
        if self.gist_user.is_none() {
            missing.push("gist_user");
        }
        if self.gist_id.accounts.is_none() {
            missing.push("gist_id.accounts");
        }
        if self.gist_id.users.is_none() {
            missing.push("gist_id.users");
        }
        if self.gist_id.r#static.is_none() {
            missing.push("gist_id.static");
        }
        if self.accounts_count == 0 {
            missing.push("accounts_count");
        }
        missing
    }

    /// Whether everything needed to render the worker is set.
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

impl fmt::Debug for ToolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(value: &Option<String>) -> &'static str {
            if value.is_some() {
                "[REDACTED]"
            } else {
                "None"
            }
        }

        f.debug_struct("ToolConfig")
            .field("proxy", &self.proxy)
            .field("cf_email", &self.cf_email)
            .field("cf_key", &redact(&self.cf_key))
            .field("cf_account", &self.cf_account)
            .field("cf_worker", &self.cf_worker)
            .field("gist_token", &redact(&self.gist_token))
            .field("gist_user", &self.gist_user)
            .field("gist_id", &self.gist_id)
            .field("secret_key", &redact(&self.secret_key))
            .field("account_rotation", &self.account_rotation)
            .field("account_candidates", &self.account_candidates)
            .field("accounts_json_dir", &self.accounts_json_dir)
            .field("accounts_count", &self.accounts_count)
            .finish()
    }
}

#[cfg(unix)]
fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // An existing file keeps its old mode unless reset.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(data)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    std::fs::write(path, data)?;
    Ok(())
}
