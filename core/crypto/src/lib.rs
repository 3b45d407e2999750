//! Cryptographic primitives for gdir records.
//!
//! This module provides:
//! - Namespaced key derivation from one master secret (SHA-256)
//! - Authenticated sealing/opening of records (AES-256-GCM)
//! - Master secret generation from the OS random source
//!
//! # Security Guarantees
//! - Secret and key material is zeroized on drop
//! - No secret or key material is ever logged
//! - Every seal draws a fresh random nonce

pub mod aead;
pub mod keys;
pub mod random;

pub use aead::{open, seal, RecordCipher, NONCE_SIZE, TAG_SIZE};
pub use keys::{derive_key, generate_secret, DerivedKey, MasterSecret, Namespace, KEY_LENGTH};
