//! Persist and hydrate certificates
//!
//! The repository writes one file per configured [`Formatter`] and reads one
//! file per configured [`Parser`]. Formatters and parsers are independent
//! lists: more representations can be written than are read back, and
//! legacy representations can still be read after they stop being written.
//!
//! Operations on the same domain must be serialized by the caller; the
//! repository takes no locks. Distinct domains are independent.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::RepositoryError;
use crate::formatter::Formatter;
use crate::metadata::CertificateMetadata;
use crate::parser::Parser;
use crate::storage::{validate_name, CertificateStorage, StorageFactory};
use crate::{Certificate, DomainConfiguration, KeyPair};

pub struct CertificateRepository {
    storage_factory: Arc<dyn StorageFactory>,
    formatters: Vec<Box<dyn Formatter>>,
    parsers: Vec<Box<dyn Parser>>,
}

impl CertificateRepository {
    /// Wire a repository. Names that are not valid storage names, and
    /// duplicate formatter or parser names, are rejected.
    pub fn new(
        storage_factory: Arc<dyn StorageFactory>,
        formatters: Vec<Box<dyn Formatter>>,
        parsers: Vec<Box<dyn Parser>>,
    ) -> Result<Self, RepositoryError> {
        check_names("formatter", formatters.iter().map(|f| f.name()))?;
        check_names("parser", parsers.iter().map(|p| p.name()))?;

        Ok(Self {
            storage_factory,
            formatters,
            parsers,
        })
    }

    pub fn formatter_names(&self) -> Vec<&str> {
        self.formatters.iter().map(|f| f.name()).collect()
    }

    pub fn parser_names(&self) -> Vec<&str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }

    fn storage(&self, domain: &str) -> Result<Box<dyn CertificateStorage>, RepositoryError> {
        self.storage_factory
            .create_certificate_storage(domain)
            .map_err(|e| RepositoryError::from_storage(domain, e))
    }

    /// Store the certificate in every configured format.
    ///
    /// The domain's current files are backed up before anything is written;
    /// if the backup fails nothing is written. A failure part-way leaves the
    /// earlier files overwritten and the backup in place for recovery.
    pub fn persist_certificate(
        &self,
        configuration: &DomainConfiguration,
        certificate: &Certificate,
        key_pair: &KeyPair,
    ) -> Result<(), RepositoryError> {
        let domain = configuration.domain();
        let storage = self.storage(domain)?;

        storage
            .backup()
            .map_err(|e| RepositoryError::from_storage(domain, e))?;

        for (written, formatter) in self.formatters.iter().enumerate() {
            let result = formatter
                .format(certificate, key_pair)
                .map_err(|e| RepositoryError::format(formatter.name(), e))
                .and_then(|content| {
                    storage
                        .write(formatter.name(), &content)
                        .map_err(|e| RepositoryError::from_storage(domain, e))
                });

            if let Err(e) = result {
                warn!(
                    "Persisting certificate for {} aborted at {} after {} file(s): {}",
                    domain,
                    formatter.name(),
                    written,
                    e
                );
                return Err(e);
            }

            debug!("Persisted {} for {}", formatter.name(), domain);
        }

        info!(
            "Persisted certificate for {} ({} file(s))",
            domain,
            self.formatters.len()
        );

        Ok(())
    }

    /// Remove every configured format's file. Missing files are ignored.
    pub fn clear_certificate(
        &self,
        configuration: &DomainConfiguration,
    ) -> Result<(), RepositoryError> {
        let domain = configuration.domain();
        let storage = self.storage(domain)?;

        for formatter in &self.formatters {
            storage
                .remove(formatter.name())
                .map_err(|e| RepositoryError::from_storage(domain, e))?;
        }

        info!("Cleared certificate for {}", domain);
        Ok(())
    }

    /// Whether every configured format's file exists
    pub fn has_certificate(
        &self,
        configuration: &DomainConfiguration,
    ) -> Result<bool, RepositoryError> {
        let storage = self.storage(configuration.domain())?;

        Ok(self
            .formatters
            .iter()
            .all(|formatter| storage.exists(formatter.name())))
    }

    /// Rebuild the certificate's metadata from the configured parsers.
    ///
    /// Parsers run in order and later values win. Any missing file or parse
    /// failure fails the whole call.
    pub fn load_certificate(
        &self,
        configuration: &DomainConfiguration,
    ) -> Result<CertificateMetadata, RepositoryError> {
        let domain = configuration.domain();
        let mut metadata = CertificateMetadata::new(domain);
        let storage = self.storage(domain)?;

        for parser in &self.parsers {
            let content = storage
                .read(parser.name())
                .map_err(|e| RepositoryError::from_storage(domain, e))?;
            let partial = parser
                .parse(&content)
                .map_err(|e| RepositoryError::format(parser.name(), e))?;

            metadata.merge(partial);
        }

        debug!("Loaded certificate metadata for {}", domain);
        Ok(metadata)
    }
}

impl std::fmt::Debug for CertificateRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateRepository")
            .field("formatters", &self.formatter_names())
            .field("parsers", &self.parser_names())
            .finish_non_exhaustive()
    }
}

fn check_names<'a>(
    kind: &str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), RepositoryError> {
    let mut seen = HashSet::new();

    for name in names {
        validate_name(name).map_err(|e| {
            RepositoryError::Configuration(format!("Invalid {} name: {}", kind, e))
        })?;

        if !seen.insert(name) {
            return Err(RepositoryError::Configuration(format!(
                "Duplicate {} name: {}",
                kind, name
            )));
        }
    }

    Ok(())
}
