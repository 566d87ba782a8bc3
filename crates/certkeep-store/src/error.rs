//! Repository and format errors

use thiserror::Error;

use crate::storage::StorageError;

/// Encoding or decoding failure inside a formatter or parser
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Failed to encode {format}: {reason}")]
    Encode { format: String, reason: String },

    #[error("Failed to decode {format}: {reason}")]
    Decode { format: String, reason: String },
}

impl FormatError {
    pub fn encode(format: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Encode {
            format: format.into(),
            reason: reason.into(),
        }
    }

    pub fn decode(format: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            format: format.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by repository operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] StorageError),

    #[error("Certificate file '{name}' not found for domain {domain}")]
    BlobNotFound { domain: String, name: String },

    #[error("Format '{name}' failed: {source}")]
    Format {
        name: String,
        #[source]
        source: FormatError,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RepositoryError {
    /// Classify a storage failure for the given domain
    pub fn from_storage(domain: &str, error: StorageError) -> Self {
        match error {
            StorageError::NotFound(name) => Self::BlobNotFound {
                domain: domain.to_string(),
                name,
            },
            StorageError::InvalidDomain(_) | StorageError::InvalidName(_) => {
                Self::Configuration(error.to_string())
            }
            other => Self::StorageUnavailable(other),
        }
    }

    pub fn format(name: impl Into<String>, source: FormatError) -> Self {
        Self::Format {
            name: name.into(),
            source,
        }
    }
}
