//! In-memory certificate storage

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use tracing::{debug, trace};

use super::{validate_domain, validate_name, CertificateStorage, StorageError, StorageFactory};

type Files = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Default)]
struct DomainFiles {
    files: Files,
    backups: Vec<Files>,
}

type Domains = Arc<RwLock<HashMap<String, DomainFiles>>>;

/// Process-local storage; clones share the same state
#[derive(Debug, Clone, Default)]
pub struct MemoryStorageFactory {
    domains: Domains,
}

impl MemoryStorageFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the concrete handle, giving access to its backups
    pub fn storage(&self, domain: &str) -> Result<MemoryStorage, StorageError> {
        validate_domain(domain)?;

        Ok(MemoryStorage {
            domain: domain.to_string(),
            domains: Arc::clone(&self.domains),
        })
    }

    /// Domains with at least one stored file
    pub fn list_domains(&self) -> Result<Vec<String>, StorageError> {
        let domains = self.domains.read().map_err(|_| StorageError::Poisoned)?;
        let mut names: Vec<_> = domains
            .iter()
            .filter(|(_, entry)| !entry.files.is_empty())
            .map(|(domain, _)| domain.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

impl StorageFactory for MemoryStorageFactory {
    fn create_certificate_storage(
        &self,
        domain: &str,
    ) -> Result<Box<dyn CertificateStorage>, StorageError> {
        Ok(Box::new(self.storage(domain)?))
    }
}

/// Handle over one domain's in-memory files
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    domain: String,
    domains: Domains,
}

impl MemoryStorage {
    /// Snapshots taken so far, oldest first
    pub fn backups(&self) -> Result<Vec<BTreeMap<String, Vec<u8>>>, StorageError> {
        let domains = self.domains.read().map_err(|_| StorageError::Poisoned)?;
        Ok(domains
            .get(&self.domain)
            .map(|entry| entry.backups.clone())
            .unwrap_or_default())
    }

    /// Names of the stored files, sorted
    pub fn list(&self) -> Result<Vec<String>, StorageError> {
        let domains = self.domains.read().map_err(|_| StorageError::Poisoned)?;
        Ok(domains
            .get(&self.domain)
            .map(|entry| entry.files.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// Replace the stored files with the most recent snapshot.
    ///
    /// Returns false when no snapshot exists.
    pub fn restore_latest(&self) -> Result<bool, StorageError> {
        let mut domains = self.domains.write().map_err(|_| StorageError::Poisoned)?;
        let Some(entry) = domains.get_mut(&self.domain) else {
            return Ok(false);
        };

        match entry.backups.last() {
            Some(snapshot) => {
                entry.files = snapshot.clone();
                debug!("Restored latest snapshot for {}", self.domain);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl CertificateStorage for MemoryStorage {
    fn domain(&self) -> &str {
        &self.domain
    }

    fn backup(&self) -> Result<(), StorageError> {
        let mut domains = self.domains.write().map_err(|_| StorageError::Poisoned)?;
        let Some(entry) = domains.get_mut(&self.domain) else {
            return Ok(());
        };

        if entry.files.is_empty() {
            return Ok(());
        }

        let snapshot = entry.files.clone();
        entry.backups.push(snapshot);
        debug!(
            "Backed up {} certificate file(s) for {}",
            entry.files.len(),
            self.domain
        );

        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        if validate_name(name).is_err() {
            return false;
        }

        let Ok(domains) = self.domains.read() else {
            return false;
        };

        domains
            .get(&self.domain)
            .is_some_and(|entry| entry.files.contains_key(name))
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        validate_name(name)?;
        trace!("Reading {} for {}", name, self.domain);

        let domains = self.domains.read().map_err(|_| StorageError::Poisoned)?;
        domains
            .get(&self.domain)
            .and_then(|entry| entry.files.get(name))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    fn write(&self, name: &str, content: &[u8]) -> Result<(), StorageError> {
        validate_name(name)?;
        debug!("Storing {} for {}", name, self.domain);

        let mut domains = self.domains.write().map_err(|_| StorageError::Poisoned)?;
        domains
            .entry(self.domain.clone())
            .or_default()
            .files
            .insert(name.to_string(), content.to_vec());

        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        validate_name(name)?;
        debug!("Removing {} for {}", name, self.domain);

        let mut domains = self.domains.write().map_err(|_| StorageError::Poisoned)?;
        if let Some(entry) = domains.get_mut(&self.domain) {
            entry.files.remove(name);
        }

        Ok(())
    }
}
