//! Shared fixtures for repository integration tests

#![allow(dead_code)]

use certkeep_store::{
    Certificate, CertificateStorage, FormatError, KeyPair, MemoryStorageFactory, Parser,
    PartialMetadata, StorageError, StorageFactory,
};

pub struct Issued {
    pub certificate: Certificate,
    pub key_pair: KeyPair,
    pub leaf_der: Vec<u8>,
}

/// Issue a CA-signed leaf for `domain`, valid 2025-01-01 to 2035-01-01
pub fn issue(domain: &str, sans: &[&str]) -> Issued {
    let issued = certkeep_test_support::issue_certificate(domain, sans);

    Issued {
        certificate: Certificate::from_pem(issued.fullchain_pem.as_bytes()).unwrap(),
        key_pair: KeyPair::from_pem(issued.key_pem.as_bytes()).unwrap(),
        leaf_der: issued.leaf_der,
    }
}

/// Parser returning a fixed contribution, whatever the file holds
pub struct FixedParser {
    pub name: String,
    pub partial: PartialMetadata,
}

impl Parser for FixedParser {
    fn name(&self) -> &str {
        &self.name
    }

    fn parse(&self, _content: &[u8]) -> Result<PartialMetadata, FormatError> {
        Ok(self.partial.clone())
    }
}

/// Storage factory whose handles refuse to back up
pub struct FailingBackupFactory {
    pub inner: MemoryStorageFactory,
}

struct FailingBackupStorage {
    inner: Box<dyn CertificateStorage>,
}

impl StorageFactory for FailingBackupFactory {
    fn create_certificate_storage(
        &self,
        domain: &str,
    ) -> Result<Box<dyn CertificateStorage>, StorageError> {
        Ok(Box::new(FailingBackupStorage {
            inner: self.inner.create_certificate_storage(domain)?,
        }))
    }
}

impl CertificateStorage for FailingBackupStorage {
    fn domain(&self) -> &str {
        self.inner.domain()
    }

    fn backup(&self) -> Result<(), StorageError> {
        Err(StorageError::unavailable(
            "backup",
            std::io::Error::other("backup volume offline"),
        ))
    }

    fn exists(&self, name: &str) -> bool {
        self.inner.exists(name)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.read(name)
    }

    fn write(&self, name: &str, content: &[u8]) -> Result<(), StorageError> {
        self.inner.write(name, content)
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        self.inner.remove(name)
    }
}
