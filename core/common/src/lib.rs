//! Common utilities and types shared across gdir modules.
//!
//! This module provides the error taxonomy and the small validated types
//! used by the crypto, storage and record crates.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{parse_drive_list, validate_store_key, SensitiveBytes, Username};
