//! Pluggable client-side storage for the Helios SDK.
//!
//! This crate provides:
//! - The [`ClientStorage`] trait consumed by the session core, with
//!   optional `clear` and change-notification capabilities
//! - An in-memory implementation ([`MemoryStorage`])
//! - A file-backed implementation ([`FileStorage`])
//! - A typed, best-effort [`CredentialStore`] wrapper for the refresh
//!   token and the cross-instance logout signal

mod credentials;
mod file;
mod keys;
mod memory;
mod traits;

pub use credentials::CredentialStore;
pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use traits::{ClientStorage, StorageEvent};

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The backend does not implement this operation
    #[error("Storage operation not supported: {0}")]
    Unsupported(&'static str),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
