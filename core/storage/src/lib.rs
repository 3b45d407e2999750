//! Record store abstraction for gdir.
//!
//! A record store is a flat directory of byte blobs addressed by exact file
//! name: hex digests for user records, decimal indices for account blobs.
//! It offers no query capability beyond "list" and "fetch by name", and no
//! transactional guarantees.
//!
//! # Design Principles
//! - Store isolation: no cipher or record logic in the stores
//! - Async operations: all I/O operations are async
//! - Flat keys: names are validated, never interpreted as paths

pub mod local;
pub mod memory;
pub mod provider;

pub use local::{write_private, LocalStore};
pub use memory::MemoryStore;
pub use provider::BlobStore;
