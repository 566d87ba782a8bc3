//! Multi-format certificate persistence
//!
//! Stores a domain's issued certificate and private key under several named
//! representations (certificate, chain, full chain, combined bundle, key),
//! backs up the previous set before overwriting it, and rebuilds certificate
//! metadata by parsing the stored representations back.

pub mod config;
pub mod error;
pub mod formatter;
pub mod metadata;
pub mod parser;
pub mod repository;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{FormatEntry, FormatKind, StorageConfig, StoreConfig};
pub use error::{FormatError, RepositoryError};
pub use formatter::{
    CertificateFormatter, ChainFormatter, CombinedFormatter, Formatter, FullChainFormatter,
    PrivateKeyFormatter,
};
pub use metadata::{CertificateMetadata, PartialMetadata};
pub use parser::{CertificateParser, Parser, PrivateKeyParser};
pub use repository::CertificateRepository;
pub use storage::{
    BackupId, CertificateStorage, FilesystemStorage, FilesystemStorageFactory, MemoryStorage,
    MemoryStorageFactory, StorageError, StorageFactory,
};

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use serde::{Deserialize, Serialize};

/// The domain a repository operation targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfiguration {
    /// Domain name, also used to address the domain's storage
    pub domain: String,

    /// Additional names the certificate was requested for
    #[serde(default)]
    pub subject_alternative_names: Vec<String>,
}

impl DomainConfiguration {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            subject_alternative_names: Vec::new(),
        }
    }

    pub fn with_subject_alternative_names(mut self, names: Vec<String>) -> Self {
        self.subject_alternative_names = names;
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}

/// Issued certificate chain, leaf first, followed by its issuers
#[derive(Debug, Clone)]
pub struct Certificate {
    chain: Vec<CertificateDer<'static>>,
}

impl Certificate {
    /// Build a certificate from a DER chain. The chain must hold at least the leaf.
    pub fn new(chain: Vec<CertificateDer<'static>>) -> Result<Self, FormatError> {
        if chain.is_empty() {
            return Err(FormatError::decode(
                "certificate",
                "certificate chain is empty",
            ));
        }

        Ok(Self { chain })
    }

    /// Parse a PEM bundle (leaf first)
    pub fn from_pem(pem: &[u8]) -> Result<Self, FormatError> {
        let mut reader = pem;
        let chain = rustls_pemfile::certs(&mut reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                FormatError::decode("certificate", format!("Failed to parse certificate: {}", e))
            })?;

        Self::new(chain)
    }

    pub fn leaf(&self) -> &CertificateDer<'static> {
        &self.chain[0]
    }

    /// Issuer certificates following the leaf, possibly empty
    pub fn issuers(&self) -> &[CertificateDer<'static>] {
        &self.chain[1..]
    }

    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }
}

/// The domain's private key, paired with the certificate's public key
pub struct KeyPair {
    private_key: PrivateKeyDer<'static>,
}

impl KeyPair {
    pub fn new(private_key: PrivateKeyDer<'static>) -> Self {
        Self { private_key }
    }

    /// Parse the first private key found in a PEM document
    pub fn from_pem(pem: &[u8]) -> Result<Self, FormatError> {
        let mut reader = pem;
        let private_key = rustls_pemfile::private_key(&mut reader)
            .map_err(|e| {
                FormatError::decode("private key", format!("Failed to parse private key: {}", e))
            })?
            .ok_or_else(|| FormatError::decode("private key", "No private key found"))?;

        Ok(Self { private_key })
    }

    pub fn private_key(&self) -> &PrivateKeyDer<'static> {
        &self.private_key
    }

    /// Name of the key's DER encoding
    pub fn encoding(&self) -> &'static str {
        match &self.private_key {
            PrivateKeyDer::Pkcs1(_) => "PKCS#1",
            PrivateKeyDer::Sec1(_) => "SEC1",
            PrivateKeyDer::Pkcs8(_) => "PKCS#8",
            _ => "unknown",
        }
    }

    /// PEM label matching the key's encoding
    pub(crate) fn pem_label(&self) -> &'static str {
        match &self.private_key {
            PrivateKeyDer::Pkcs1(_) => "RSA PRIVATE KEY",
            PrivateKeyDer::Sec1(_) => "EC PRIVATE KEY",
            _ => "PRIVATE KEY",
        }
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self {
            private_key: self.private_key.clone_key(),
        }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("encoding", &self.encoding())
            .finish_non_exhaustive()
    }
}
