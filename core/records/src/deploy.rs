//! Worker script rendering and deployment.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::config::ToolConfig;
use gdir_common::{Error, Result};
use gdir_storage::write_private;

/// Longest accepted worker name.
pub const MAX_WORKER_NAME_LEN: usize = 63;

/// Uploads a rendered worker script.
#[async_trait]
pub trait ScriptDeploy: Send + Sync {
    /// Deploy `script` under `name`, replacing any previous version.
    ///
    /// # Errors
    /// - [`Error::Deploy`] if the script could not be stored
    async fn deploy(&self, name: &str, script: &str) -> Result<()>;
}

/// Check a worker name: starts with a letter, ends with a letter or digit,
/// contains only letters, digits, `_` and `-`, at most 63 characters.
pub fn validate_worker_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_WORKER_NAME_LEN
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if !valid {
        return Err(Error::InputValidation(format!(
            "Invalid worker name: {:?}",
            name
        )));
    }
    Ok(())
}

/// Values substituted into the worker template.
#[derive(Clone, PartialEq, Eq)]
pub struct WorkerParams {
    pub secret: String,
    pub accounts_count: u64,
    pub account_rotation: u64,
    pub account_candidates: u64,
    pub users_url: String,
    pub static_url: String,
    pub accounts_url: String,
}

impl WorkerParams {
    /// Collect the parameters from the operator config.
    ///
    /// # Errors
    /// - [`Error::Config`] naming the missing settings
    pub fn from_config(config: &ToolConfig) -> Result<Self> {
        let secret = config.secret()?;

        let (Some(user), Some(users), Some(statics), Some(accounts)) = (
            config.gist_user.as_deref(),
            config.gist_id.users.as_ref(),
            config.gist_id.r#static.as_ref(),
            config.gist_id.accounts.as_ref(),
        ) else {
            return Err(Error::Config(
                "gist_user and gist_id.{accounts,users,static} must be set to render the worker"
                    .to_string(),
            ));
        };

        if config.accounts_count == 0 {
            warn!("accounts_count is 0; run `gdir accounts encrypt` first");
        }

        Ok(Self {
            secret: secret.expose().to_string(),
            accounts_count: config.accounts_count,
            account_rotation: config.account_rotation(),
            account_candidates: config.account_candidates(),
            users_url: users.raw_url(user),
            static_url: statics.raw_url(user),
            accounts_url: accounts.raw_url(user),
        })
    }
}

/// Worker script source with `__NAME__` placeholders.
#[derive(Debug, Clone)]
pub struct WorkerTemplate {
    source: String,
}

impl WorkerTemplate {
    /// Placeholders recognized by [`WorkerTemplate::render`].
    pub const PLACEHOLDERS: [&'static str; 7] = [
        "__SECRET__",
        "__ACCOUNTS_COUNT__",
        "__ACCOUNT_ROTATION__",
        "__ACCOUNT_CANDIDATES__",
        "__USERS_URL__",
        "__STATIC_URL__",
        "__ACCOUNTS_URL__",
    ];

    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Read a template from disk.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::NotFound(format!(
                "Worker template: {}",
                path.display()
            )));
        }
        Ok(Self::new(fs::read_to_string(path).await?))
    }

    /// Substitute every placeholder in a single pass.
    ///
    /// Substituted values are never rescanned, so a secret that happens to
    /// contain a placeholder name is inserted verbatim.
    pub fn render(&self, params: &WorkerParams) -> String {
        let values = [
            params.secret.clone(),
            params.accounts_count.to_string(),
            params.account_rotation.to_string(),
            params.account_candidates.to_string(),
            params.users_url.clone(),
            params.static_url.clone(),
            params.accounts_url.clone(),
        ];

        for placeholder in Self::PLACEHOLDERS {
            if !self.source.contains(placeholder) {
                warn!(placeholder, "Worker template has no placeholder");
            }
        }

        let mut rendered = String::with_capacity(self.source.len());
        let mut rest = self.source.as_str();

        'scan: while !rest.is_empty() {
            if rest.starts_with("__") {
                for (placeholder, value) in Self::PLACEHOLDERS.iter().zip(values.iter()) {
                    if let Some(after) = rest.strip_prefix(placeholder) {
                        rendered.push_str(value);
                        rest = after;
                        continue 'scan;
                    }
                }
            }
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                rendered.push(c);
            }
            rest = chars.as_str();
        }

        rendered
    }
}

/// Writes scripts to `<dir>/<name>.js` for manual upload.
#[derive(Debug, Clone)]
pub struct FileDeploy {
    out_dir: PathBuf,
    protected: Vec<PathBuf>,
}

impl FileDeploy {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            protected: Vec::new(),
        }
    }

    /// Refuse to write over `path`, typically the template being rendered.
    pub fn protect(mut self, path: impl Into<PathBuf>) -> Self {
        self.protected.push(path.into());
        self
    }

    /// Path a script named `name` is written to.
    pub fn script_path(&self, name: &str) -> PathBuf {
        self.out_dir.join(format!("{}.js", name))
    }

    /// Fail if `path` is the same file as a protected path.
    async fn check_protected(&self, path: &Path) -> Result<()> {
        let Ok(target) = fs::canonicalize(path).await else {
            return Ok(());
        };
        for protected in &self.protected {
            if fs::canonicalize(protected).await.ok().as_ref() == Some(&target) {
                return Err(Error::Deploy(format!(
                    "Refusing to overwrite {} with the rendered script",
                    protected.display()
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ScriptDeploy for FileDeploy {
    async fn deploy(&self, name: &str, script: &str) -> Result<()> {
        validate_worker_name(name)?;
        fs::create_dir_all(&self.out_dir)
            .await
            .map_err(|e| Error::Deploy(format!("{}: {}", self.out_dir.display(), e)))?;

        let path = self.script_path(name);
        self.check_protected(&path).await?;
        write_private(&path, script.as_bytes())
            .await
            .map_err(|e| Error::Deploy(format!("{}: {}", path.display(), e)))?;

        info!(worker = name, path = %path.display(), "Wrote worker script");
        Ok(())
    }
}
