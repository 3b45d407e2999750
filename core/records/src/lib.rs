//! User and account records for the gdir worker.
//!
//! This crate provides:
//! - The user record payload and its content-addressed file name
//! - The access-list editor state machine and non-interactive merge
//! - [`UserDirectory`]: sealed user records in a [`gdir_storage::BlobStore`]
//! - Bulk encryption of service-account credentials
//! - The operator config file, gist publishing and worker rendering

pub mod access;
pub mod accounts;
pub mod address;
pub mod config;
pub mod deploy;
pub mod directory;
pub mod gist;
pub mod publish;
pub mod user;

pub use access::{
    merge_access_lists, parse_removal_indices, AccessControl, AccessEdit, AccessEditor,
    AccessMode, AccessUpdate, MenuAction,
};
pub use accounts::{encrypt_accounts, scan_account_sources};
pub use address::{record_key, RecordKey};
pub use config::{ConfigOverrides, GistIds, ToolConfig, CONFIG_FILENAME};
pub use deploy::{validate_worker_name, FileDeploy, ScriptDeploy, WorkerParams, WorkerTemplate};
pub use directory::UserDirectory;
pub use gist::GistId;
pub use publish::{GitPublisher, RemoteProtocol, RemotePublish};
pub use user::UserRecord;
