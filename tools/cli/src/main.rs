//! gdir CLI - operator tool for the gdir worker.
//!
//! Manages the master secret, encrypts service accounts and user records,
//! publishes them to gists and renders the worker script.

mod prompt;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use gdir_common::{SensitiveBytes, Username};
use gdir_crypto::{generate_secret, open, Namespace};
use gdir_records::{
    encrypt_accounts, AccessControl, AccessUpdate, ConfigOverrides, FileDeploy, GistId,
    GitPublisher, RemoteProtocol, RemotePublish, ScriptDeploy, ToolConfig, UserDirectory,
    UserRecord, WorkerParams, WorkerTemplate, CONFIG_FILENAME,
};
use gdir_storage::LocalStore;

use prompt::{Prompt, Terminal};

/// Directory holding sealed account blobs.
const ACCOUNTS_DIR: &str = "accounts";
/// Directory holding sealed user records.
const USERS_DIR: &str = "users";
/// Directory holding the static site files.
const STATIC_DIR: &str = "static";

#[derive(Parser)]
#[command(name = "gdir")]
#[command(about = "gdir - operator tool for the gdir worker")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path.
    #[arg(long, global = true, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    #[command(flatten)]
    overrides: OverrideArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Settings that override the config file for this run.
#[derive(Args)]
struct OverrideArgs {
    /// Master secret key.
    #[arg(long, global = true)]
    key: Option<String>,

    /// HTTP proxy.
    #[arg(long, global = true)]
    proxy: Option<String>,

    /// Cloudflare account email.
    #[arg(long, global = true)]
    cf_email: Option<String>,

    /// Cloudflare API key.
    #[arg(long, global = true)]
    cf_key: Option<String>,

    /// Cloudflare account ID.
    #[arg(long, global = true)]
    cf_account: Option<String>,

    /// Cloudflare worker name.
    #[arg(long, global = true)]
    cf_worker: Option<String>,

    /// GitHub token for gists.
    #[arg(long, global = true)]
    gist_token: Option<String>,

    /// GitHub user owning the gists.
    #[arg(long, global = true)]
    gist_user: Option<String>,

    /// Gist URL or ID for accounts.
    #[arg(long, global = true)]
    accounts_gist: Option<String>,

    /// Gist URL or ID for users.
    #[arg(long, global = true)]
    users_gist: Option<String>,

    /// Gist URL or ID for static files.
    #[arg(long, global = true)]
    static_gist: Option<String>,

    /// Account candidates rotation interval.
    #[arg(long, global = true)]
    account_rotation: Option<u64>,

    /// Account candidates size.
    #[arg(long, global = true)]
    account_candidates: Option<u64>,

    /// Directory of service account JSON files.
    #[arg(long, global = true)]
    accounts_json_dir: Option<PathBuf>,
}

impl From<OverrideArgs> for ConfigOverrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            proxy: args.proxy,
            secret_key: args.key,
            cf_email: args.cf_email,
            cf_key: args.cf_key,
            cf_account: args.cf_account,
            cf_worker: args.cf_worker,
            gist_token: args.gist_token,
            gist_user: args.gist_user,
            accounts_gist: args.accounts_gist,
            users_gist: args.users_gist,
            static_gist: args.static_gist,
            account_rotation: args.account_rotation,
            account_candidates: args.account_candidates,
            accounts_json_dir: args.accounts_json_dir,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the master secret.
    Secret {
        #[command(subcommand)]
        action: SecretCommand,
    },

    /// Encrypt service accounts.
    Accounts {
        #[command(subcommand)]
        action: AccountsCommand,
    },

    /// Manage users.
    User {
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Inspect sealed blobs.
    Blob {
        #[command(subcommand)]
        action: BlobCommand,
    },

    /// Check the config file.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },

    /// Push a directory to its gist.
    Publish {
        /// Which directory to publish.
        target: PublishTarget,

        /// Use the SSH remote instead of HTTPS.
        #[arg(long)]
        ssh: bool,

        /// Directory to publish (default: the target name).
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Render the worker script.
    Deploy {
        /// Worker script template.
        #[arg(long, default_value = "dist/worker.js")]
        template: PathBuf,

        /// Output directory for the rendered script.
        #[arg(long, default_value = "dist/deploy")]
        out: PathBuf,

        /// Worker name (default: cf_worker from the config).
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Subcommand)]
enum SecretCommand {
    /// Generate a secure random secret.
    Generate {
        /// Replace an existing secret.
        #[arg(long)]
        force: bool,
    },

    /// Enter your own secret (not recommended).
    Set {
        /// Replace an existing secret.
        #[arg(long)]
        force: bool,
    },

    /// Show a short fingerprint of the configured secret.
    ShowFingerprint,
}

#[derive(Subcommand)]
enum AccountsCommand {
    /// Encrypt every JSON file in the accounts JSON directory.
    Encrypt {
        /// Output directory for sealed blobs.
        #[arg(long, default_value = ACCOUNTS_DIR)]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Create or update a user.
    Edit {
        /// User name.
        name: String,

        /// Set a new password (always asked for new users).
        #[arg(long)]
        pass: bool,

        /// Restrict to these drive IDs (comma separated).
        #[arg(long, conflicts_with_all = ["deny", "unrestricted"])]
        allow: Option<String>,

        /// Hide these drive IDs (comma separated).
        #[arg(long, conflicts_with = "unrestricted")]
        deny: Option<String>,

        /// Remove any access list.
        #[arg(long)]
        unrestricted: bool,

        /// Skip the interactive access list editor.
        #[arg(long)]
        no_interactive: bool,
    },

    /// Remove a user.
    Remove {
        /// User name.
        name: String,
    },

    /// List users.
    List,
}

#[derive(Subcommand)]
enum BlobCommand {
    /// Decrypt a blob and print its plaintext.
    Open {
        /// Namespace the blob was sealed under.
        #[arg(long, value_enum)]
        namespace: NamespaceArg,

        /// Blob file.
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Report settings still missing for a deploy.
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum NamespaceArg {
    Account,
    User,
}

impl From<NamespaceArg> for Namespace {
    fn from(arg: NamespaceArg) -> Self {
        match arg {
            NamespaceArg::Account => Namespace::Account,
            NamespaceArg::User => Namespace::User,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PublishTarget {
    Accounts,
    Users,
    Static,
}

impl PublishTarget {
    fn default_dir(&self) -> &'static str {
        match self {
            Self::Accounts => ACCOUNTS_DIR,
            Self::Users => USERS_DIR,
            Self::Static => STATIC_DIR,
        }
    }

    fn gist<'a>(&self, config: &'a ToolConfig) -> Option<&'a GistId> {
        match self {
            Self::Accounts => config.gist_id.accounts.as_ref(),
            Self::Users => config.gist_id.users.as_ref(),
            Self::Static => config.gist_id.r#static.as_ref(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = ToolConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    config
        .apply_overrides(cli.overrides.into())
        .context("Invalid command line setting")?;

    match cli.command {
        Commands::Secret { action } => match action {
            SecretCommand::Generate { force } => {
                cmd_secret_generate(&mut config, &cli.config, force)
            }
            SecretCommand::Set { force } => {
                cmd_secret_set(&mut config, &cli.config, force, &mut Terminal)
            }
            SecretCommand::ShowFingerprint => cmd_secret_fingerprint(&config),
        },

        Commands::Accounts {
            action: AccountsCommand::Encrypt { out },
        } => cmd_accounts_encrypt(&mut config, &cli.config, &out).await,

        Commands::User { action } => match action {
            UserCommand::Edit {
                name,
                pass,
                allow,
                deny,
                unrestricted,
                no_interactive,
            } => {
                let update =
                    AccessUpdate::from_flags(allow.as_deref(), deny.as_deref(), unrestricted)?;
                cmd_user_edit(&config, &name, pass, update, !no_interactive, &mut Terminal).await
            }
            UserCommand::Remove { name } => cmd_user_remove(&config, &name).await,
            UserCommand::List => cmd_user_list(&config).await,
        },

        Commands::Blob {
            action: BlobCommand::Open { namespace, file },
        } => cmd_blob_open(&config, namespace.into(), &file).await,

        Commands::Config {
            action: ConfigCommand::Check,
        } => cmd_config_check(&config),

        Commands::Publish { target, ssh, dir } => {
            let dir = dir.unwrap_or_else(|| PathBuf::from(target.default_dir()));
            cmd_publish(&config, target, ssh, &dir).await
        }

        Commands::Deploy {
            template,
            out,
            name,
        } => cmd_deploy(&config, &template, &out, name).await,
    }
}

fn user_directory(config: &ToolConfig) -> Result<UserDirectory> {
    let secret = config.secret()?;
    let store = LocalStore::new(USERS_DIR).context("Failed to open users directory")?;
    Ok(UserDirectory::new(&secret, Arc::new(store))?)
}

/// Generate a new master secret.
fn cmd_secret_generate(config: &mut ToolConfig, path: &Path, force: bool) -> Result<()> {
    if config.secret_key.is_some() && !force {
        bail!("A secret key is already configured; pass --force to replace it");
    }

    let secret = generate_secret().context("Failed to generate secret")?;
    config.set_secret(&secret);
    config.save(path).context("Failed to save config")?;

    info!(fingerprint = %secret.fingerprint(), "Generated new secret key");
    println!("Secret key saved to {}", path.display());
    println!("  Fingerprint: {}", secret.fingerprint());
    Ok(())
}

/// Store an operator-chosen master secret.
fn cmd_secret_set(
    config: &mut ToolConfig,
    path: &Path,
    force: bool,
    prompt: &mut impl Prompt,
) -> Result<()> {
    if config.secret_key.is_some() && !force {
        bail!("A secret key is already configured; pass --force to replace it");
    }

    let secret = prompt::new_secret(prompt)?;
    config.set_secret(&secret);
    config.save(path).context("Failed to save config")?;

    println!("Secret key saved to {}", path.display());
    println!("  Fingerprint: {}", secret.fingerprint());
    Ok(())
}

/// Show which secret is configured without revealing it.
fn cmd_secret_fingerprint(config: &ToolConfig) -> Result<()> {
    let secret = config.secret()?;
    println!("{}", secret.fingerprint());
    Ok(())
}

/// Encrypt the accounts JSON directory.
async fn cmd_accounts_encrypt(config: &mut ToolConfig, path: &Path, out: &Path) -> Result<()> {
    let secret = config.secret()?;
    let Some(source) = config.accounts_json_dir.clone() else {
        bail!("accounts_json_dir is not set; pass --accounts-json-dir");
    };

    info!(source = %source.display(), out = %out.display(), "Encrypting accounts");
    let store = LocalStore::new(out).context("Failed to open accounts output directory")?;
    let count = encrypt_accounts(&secret, &source, &store)
        .await
        .context("Failed to encrypt accounts")?;

    if count == 0 {
        bail!("No account files found in {}", source.display());
    }
    if count < config.accounts_count {
        warn!(
            previous = config.accounts_count,
            count,
            "Fewer accounts than last run; higher-numbered blobs are left in place"
        );
    }

    config.accounts_count = count;
    config.save(path).context("Failed to save config")?;

    println!("Encrypted {} accounts into {}", count, out.display());
    Ok(())
}

/// Create or update a user.
async fn cmd_user_edit(
    config: &ToolConfig,
    name: &str,
    change_pass: bool,
    update: AccessUpdate,
    interactive: bool,
    prompt: &mut impl Prompt,
) -> Result<()> {
    let name = Username::new(name)?;
    let directory = user_directory(config)?;

    let old = directory
        .load(&name)
        .await
        .with_context(|| format!("Failed to load user {}", name))?;

    let pass = if change_pass || old.is_none() {
        Some(prompt::new_password(prompt, name.as_str())?)
    } else {
        None
    };

    let first = old.is_none() && directory.is_empty().await?;
    if first {
        println!("No users exist yet; {} will be the first user.", name);
    }

    let update = match update {
        AccessUpdate::Keep if interactive => {
            let current = match &old {
                Some(record) => record.access()?,
                None => AccessControl::Unrestricted,
            };
            prompt::edit_access(prompt, name.as_str(), current)?.into()
        }
        update => update,
    };

    let record = UserRecord::merge(old.as_ref(), &name, pass, update)?;
    let key = directory
        .save(&record)
        .await
        .with_context(|| format!("Failed to save user {}", name))?;

    if first {
        info!(user = %name, "Created first user");
    }
    println!("Saved user {} to {}/{}", name, USERS_DIR, key);
    println!("  Access: {}", record.access()?);
    Ok(())
}

/// Remove a user.
async fn cmd_user_remove(config: &ToolConfig, name: &str) -> Result<()> {
    let name = Username::new(name)?;
    let directory = user_directory(config)?;

    if !directory.remove(&name).await? {
        bail!("User {} not found", name);
    }

    println!("Removed user {}", name);
    Ok(())
}

/// List users.
async fn cmd_user_list(config: &ToolConfig) -> Result<()> {
    let directory = user_directory(config)?;
    if directory.is_empty().await.context("Failed to read users")? {
        println!("No users.");
        return Ok(());
    }

    let users = directory.list().await.context("Failed to read users")?;

    for user in users {
        println!("  {}  ({})", user.name, user.access()?);
    }
    Ok(())
}

/// Decrypt a blob to stdout.
async fn cmd_blob_open(config: &ToolConfig, namespace: Namespace, file: &Path) -> Result<()> {
    let secret = config.secret()?;
    let blob = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let plaintext = SensitiveBytes::new(
        open(&secret, namespace, &blob)
            .with_context(|| format!("Failed to open {} as {}", file.display(), namespace))?,
    );
    println!("{}", String::from_utf8_lossy(plaintext.as_bytes()));
    Ok(())
}

/// Report missing settings.
fn cmd_config_check(config: &ToolConfig) -> Result<()> {
    if config.is_complete() {
        println!("Config is complete.");
        return Ok(());
    }

    println!("Missing settings:");
    for field in config.missing_fields() {
        println!("  {}", field);
    }
    Ok(())
}

/// Push a directory to its gist.
async fn cmd_publish(
    config: &ToolConfig,
    target: PublishTarget,
    ssh: bool,
    dir: &Path,
) -> Result<()> {
    let Some(gist) = target.gist(config) else {
        bail!(
            "No gist configured for {}; pass --{}-gist",
            target.default_dir(),
            target.default_dir()
        );
    };

    let protocol = if ssh {
        RemoteProtocol::Ssh
    } else {
        RemoteProtocol::Https
    };
    let publisher = GitPublisher::for_gist(gist, protocol);

    info!(dir = %dir.display(), remote = publisher.remote(), %protocol, "Publishing");
    publisher
        .publish(dir)
        .await
        .with_context(|| format!("Failed to publish {}", dir.display()))?;

    println!("Published {} to gist {}", dir.display(), gist);
    Ok(())
}

/// Render the worker script and write it out.
async fn cmd_deploy(
    config: &ToolConfig,
    template: &Path,
    out: &Path,
    name: Option<String>,
) -> Result<()> {
    let Some(name) = name.or_else(|| config.cf_worker.clone()) else {
        bail!("No worker name; pass --name or --cf-worker");
    };

    let params = WorkerParams::from_config(config)?;
    let script = WorkerTemplate::load(template)
        .await
        .context("Failed to read worker template")?
        .render(&params);

    let sink = FileDeploy::new(out).protect(template);
    sink.deploy(&name, &script)
        .await
        .context("Failed to deploy worker")?;

    println!("Worker {} written to {}", name, sink.script_path(&name).display());
    Ok(())
}
