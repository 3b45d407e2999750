//! Publishing record directories to a remote store.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use crate::gist::GistId;
use gdir_common::{Error, Result};

/// Commit identity used in publish repositories.
pub const COMMIT_USER_NAME: &str = "gdir";
pub const COMMIT_USER_EMAIL: &str = "gdir@google.com";

/// Branch the worker reads from.
pub const PUBLISH_BRANCH: &str = "master";

/// Pushes the current contents of a directory to a remote.
#[async_trait]
pub trait RemotePublish: Send + Sync {
    /// Make the remote mirror `dir`.
    ///
    /// # Errors
    /// - [`Error::Publish`] if the remote could not be updated
    async fn publish(&self, dir: &Path) -> Result<()>;
}

/// Transport for the gist remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoteProtocol {
    #[default]
    Https,
    /// Needs an SSH key registered with the gist host.
    Ssh,
}

impl fmt::Display for RemoteProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Https => write!(f, "HTTPS"),
            Self::Ssh => write!(f, "SSH"),
        }
    }
}

/// Publishes by force-pushing a local git repository.
///
/// The repository is created inside the directory on first use.
#[derive(Debug, Clone)]
pub struct GitPublisher {
    remote: String,
}

impl GitPublisher {
    /// Publish to an arbitrary git remote.
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
        }
    }

    /// Publish to a gist.
    pub fn for_gist(gist: &GistId, protocol: RemoteProtocol) -> Self {
        match protocol {
            RemoteProtocol::Https => Self::new(gist.https_remote()),
            RemoteProtocol::Ssh => Self::new(gist.ssh_remote()),
        }
    }

    /// Remote URL pushed to.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Commands that turn a plain directory into a publish repository.
    pub fn init_commands(&self) -> Vec<Vec<String>> {
        let symbolic_ref = format!("refs/heads/{}", PUBLISH_BRANCH);
        [
            vec!["init"],
            vec!["symbolic-ref", "HEAD", symbolic_ref.as_str()],
            vec!["remote", "add", "origin", self.remote.as_str()],
            vec!["config", "user.name", COMMIT_USER_NAME],
            vec!["config", "user.email", COMMIT_USER_EMAIL],
        ]
        .into_iter()
        .map(|args| args.into_iter().map(String::from).collect())
        .collect()
    }

    async fn init_repo(&self, dir: &Path) -> Result<()> {
        info!(dir = %dir.display(), remote = %self.remote, "Initializing publish repository");
        for args in self.init_commands() {
            run_git(dir, &args).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RemotePublish for GitPublisher {
    async fn publish(&self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Err(Error::NotFound(format!(
                "Publish directory: {}",
                dir.display()
            )));
        }
        if !dir.join(".git").exists() {
            self.init_repo(dir).await?;
        }

        run_git(dir, &["add", "."]).await?;

        // Nothing to commit is not an error; the push still runs.
        if let Err(e) = run_git(
            dir,
            &["commit", "--no-edit", "--allow-empty-message", "-m", ""],
        )
        .await
        {
            debug!(error = %e, "Commit skipped");
        }

        run_git(dir, &["push", "-f", "-u", "origin", PUBLISH_BRANCH]).await?;
        info!(dir = %dir.display(), "Published");
        Ok(())
    }
}

async fn run_git<S: AsRef<str>>(dir: &Path, args: &[S]) -> Result<()> {
    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    debug!(dir = %dir.display(), args = ?args, "Running git");

    let output = Command::new("git")
        .args(&args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| Error::Publish(format!("running git {}: {}", args.join(" "), e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Publish(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_gist_remotes() {
        let gist = GistId::parse("0123456789abcdef0123456789abcdef").unwrap();

        assert_eq!(
            GitPublisher::for_gist(&gist, RemoteProtocol::Https).remote(),
            "https://gist.github.com/0123456789abcdef0123456789abcdef.git"
        );
        assert_eq!(
            GitPublisher::for_gist(&gist, RemoteProtocol::Ssh).remote(),
            "git@gist.github.com:0123456789abcdef0123456789abcdef.git"
        );
    }

    #[test]
    fn test_init_commands() {
        let commands = GitPublisher::new("origin-url").init_commands();

        assert_eq!(commands[0], vec!["init"]);
        assert!(commands.contains(&vec![
            "remote".to_string(),
            "add".to_string(),
            "origin".to_string(),
            "origin-url".to_string()
        ]));
        assert!(commands.contains(&vec![
            "config".to_string(),
            "user.name".to_string(),
            COMMIT_USER_NAME.to_string()
        ]));
    }

    #[tokio::test]
    async fn test_missing_dir() {
        let temp = TempDir::new().unwrap();
        let publisher = GitPublisher::new("unused");

        assert!(matches!(
            publisher.publish(&temp.path().join("nope")).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_to_local_bare_remote() {
        if !git_available() {
            return;
        }

        let temp = TempDir::new().unwrap();
        let remote = temp.path().join("remote.git");
        let work = temp.path().join("users");
        std::fs::create_dir(&remote).unwrap();
        std::fs::create_dir(&work).unwrap();
        run_git(&remote, &["init", "--bare"]).await.unwrap();

        std::fs::write(work.join("0"), b"blob").unwrap();
        let publisher = GitPublisher::new(remote.to_string_lossy());
        publisher.publish(&work).await.unwrap();
        assert!(work.join(".git").is_dir());

        // Second run with no changes still pushes.
        publisher.publish(&work).await.unwrap();

        let output = std::process::Command::new("git")
            .args(["ls-tree", "--name-only", PUBLISH_BRANCH])
            .current_dir(&remote)
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "0");
    }
}
