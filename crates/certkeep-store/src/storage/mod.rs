//! Per-domain certificate storage
//!
//! A [`StorageFactory`] resolves a domain to a [`CertificateStorage`] handle
//! addressing that domain's named certificate files. Handles are resolved per
//! operation and never cached.

mod filesystem;
mod memory;

pub use filesystem::{BackupId, FilesystemStorage, FilesystemStorageFactory};
pub use memory::{MemoryStorage, MemoryStorageFactory};

use thiserror::Error;

/// Certificate storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Certificate file not found: {0}")]
    NotFound(String),

    #[error("I/O failure during {operation}: {source}")]
    Unavailable {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Invalid certificate file name: {0}")]
    InvalidName(String),

    #[error("Backup not found: {0}")]
    BackupNotFound(String),

    #[error("Storage lock poisoned")]
    Poisoned,
}

impl StorageError {
    pub fn unavailable(operation: &'static str, source: std::io::Error) -> Self {
        Self::Unavailable { operation, source }
    }
}

/// Handle over one domain's named certificate files
pub trait CertificateStorage: Send + Sync {
    /// Domain this handle addresses
    fn domain(&self) -> &str;

    /// Snapshot every stored file so an operator can restore it later.
    ///
    /// Succeeds without doing anything when nothing is stored yet.
    fn backup(&self) -> Result<(), StorageError>;

    /// Whether `name` is stored. Never fails; invalid names are reported absent.
    fn exists(&self, name: &str) -> bool;

    /// Read `name`, failing with [`StorageError::NotFound`] when absent
    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Store `content` under `name`, replacing any previous content
    fn write(&self, name: &str, content: &[u8]) -> Result<(), StorageError>;

    /// Remove `name`; removing an absent file is a no-op
    fn remove(&self, name: &str) -> Result<(), StorageError>;
}

/// Maps a domain to the storage handle addressing it.
///
/// Resolution is deterministic and performs no I/O.
pub trait StorageFactory: Send + Sync {
    fn create_certificate_storage(
        &self,
        domain: &str,
    ) -> Result<Box<dyn CertificateStorage>, StorageError>;
}

/// Validate a domain before it is used as a storage location
pub fn validate_domain(domain: &str) -> Result<(), StorageError> {
    let invalid =
        |reason: &str| Err(StorageError::InvalidDomain(format!("{}: {}", domain, reason)));

    if domain.is_empty() {
        return invalid("domain cannot be empty");
    }

    if domain.chars().any(char::is_whitespace) {
        return invalid("domain cannot contain whitespace");
    }

    if domain.starts_with('.') || domain.ends_with('.') {
        return invalid("domain cannot start or end with a dot");
    }

    if domain.contains("..") || domain.contains('/') || domain.contains('\\') {
        return invalid("domain cannot contain path separators");
    }

    Ok(())
}

/// Validate a certificate file name
///
/// Names starting with a dot are reserved for in-flight temporary files.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(StorageError::InvalidName(name.to_string()));
    }

    Ok(())
}
