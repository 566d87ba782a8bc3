//! Filesystem-backed certificate storage
//!
//! Layout under the configured root:
//!
//! ```text
//! {root}/certs/{domain}/{name}
//! {root}/backups/{domain}/{backup-id}/{name}
//! ```
//!
//! Writes go through a temporary file and a rename, so a reader never sees a
//! half-written certificate file. Backups are assembled in a hidden directory
//! and renamed into place once complete.

use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{validate_domain, validate_name, CertificateStorage, StorageError, StorageFactory};

/// Identifier of a backup snapshot (UTC timestamp, sortable)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackupId(String);

impl BackupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn now() -> Self {
        Self(Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string())
    }
}

impl std::fmt::Display for BackupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves domains to directories under a root
#[derive(Debug, Clone)]
pub struct FilesystemStorageFactory {
    root: PathBuf,
}

impl FilesystemStorageFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the concrete handle, giving access to backup listing and restore
    pub fn storage(&self, domain: &str) -> Result<FilesystemStorage, StorageError> {
        validate_domain(domain)?;

        Ok(FilesystemStorage {
            domain: domain.to_string(),
            directory: self.root.join("certs").join(domain),
            backup_directory: self.root.join("backups").join(domain),
        })
    }
}

impl StorageFactory for FilesystemStorageFactory {
    fn create_certificate_storage(
        &self,
        domain: &str,
    ) -> Result<Box<dyn CertificateStorage>, StorageError> {
        Ok(Box::new(self.storage(domain)?))
    }
}

/// One domain's certificate directory
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    domain: String,
    directory: PathBuf,
    backup_directory: PathBuf,
}

impl FilesystemStorage {
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    /// Backups taken for this domain, oldest first
    pub fn list_backups(&self) -> Result<Vec<BackupId>, StorageError> {
        let entries = match fs::read_dir(&self.backup_directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::unavailable("list backups", e)),
        };

        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::unavailable("list backups", e))?;
            let is_dir = entry
                .file_type()
                .map_err(|e| StorageError::unavailable("list backups", e))?
                .is_dir();
            let name = entry.file_name().to_string_lossy().into_owned();

            if is_dir && !name.starts_with('.') {
                backups.push(BackupId(name));
            }
        }

        backups.sort();
        Ok(backups)
    }

    /// Replace the domain's files with those captured in `backup`.
    ///
    /// Files absent from the snapshot are removed. No new backup is taken.
    pub fn restore(&self, backup: &BackupId) -> Result<(), StorageError> {
        validate_name(backup.as_str())
            .map_err(|_| StorageError::BackupNotFound(backup.to_string()))?;

        let source = self.backup_directory.join(backup.as_str());
        if !source.is_dir() {
            return Err(StorageError::BackupNotFound(backup.to_string()));
        }

        // A failed write must leave the live files in place, so extras go last
        let snapshot = list_files(&source, "restore")?;
        for (name, path) in &snapshot {
            let content = fs::read(path).map_err(|e| StorageError::unavailable("restore", e))?;
            self.write(name, &content)?;
        }

        for (name, path) in list_files(&self.directory, "restore")? {
            if !snapshot.iter().any(|(kept, _)| *kept == name) {
                fs::remove_file(&path).map_err(|e| StorageError::unavailable("restore", e))?;
            }
        }

        info!(
            "Restored {} certificate file(s) for {} from backup {}",
            snapshot.len(),
            self.domain,
            backup
        );

        Ok(())
    }

    fn next_backup_id(&self) -> BackupId {
        let base = BackupId::now();
        let mut candidate = base.clone();
        let mut suffix = 1;

        while self.backup_directory.join(candidate.as_str()).exists() {
            candidate = BackupId(format!("{}-{}", base, suffix));
            suffix += 1;
        }

        candidate
    }
}

impl CertificateStorage for FilesystemStorage {
    fn domain(&self) -> &str {
        &self.domain
    }

    fn backup(&self) -> Result<(), StorageError> {
        let files = list_files(&self.directory, "backup")?;
        if files.is_empty() {
            debug!("No certificate files to back up for {}", self.domain);
            return Ok(());
        }

        let id = self.next_backup_id();
        let staging = self.backup_directory.join(format!(".{}", id));
        let target = self.backup_directory.join(id.as_str());

        let result = fs::create_dir_all(&staging)
            .and_then(|_| {
                files
                    .iter()
                    .try_for_each(|(name, path)| fs::copy(path, staging.join(name)).map(|_| ()))
            })
            .and_then(|_| fs::rename(&staging, &target));

        if let Err(e) = result {
            warn!("Backup of {} failed: {}", self.domain, e);
            let _ = fs::remove_dir_all(&staging);
            return Err(StorageError::unavailable("backup", e));
        }

        info!(
            "Backed up {} certificate file(s) for {} as {}",
            files.len(),
            self.domain,
            id
        );

        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.path(name).is_file()
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        validate_name(name)?;

        match fs::read(self.path(name)) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(StorageError::unavailable("read", e)),
        }
    }

    fn write(&self, name: &str, content: &[u8]) -> Result<(), StorageError> {
        validate_name(name)?;

        fs::create_dir_all(&self.directory)
            .map_err(|e| StorageError::unavailable("create directory", e))?;

        let target = self.path(name);
        let temp = self.directory.join(format!(".{}.tmp", name));

        if let Err(e) = write_file(&temp, content).and_then(|_| fs::rename(&temp, &target)) {
            let _ = fs::remove_file(&temp);
            return Err(StorageError::unavailable("write", e));
        }

        debug!("Wrote {} ({} bytes) for {}", name, content.len(), self.domain);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        validate_name(name)?;

        match fs::remove_file(self.path(name)) {
            Ok(()) => {
                debug!("Removed {} for {}", name, self.domain);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::unavailable("remove", e)),
        }
    }
}

/// Write and sync a file readable by the owner only
fn write_file(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

/// Regular, non-hidden files of `directory`, sorted by name. A missing directory is empty.
fn list_files(
    directory: &Path,
    operation: &'static str,
) -> Result<Vec<(String, PathBuf)>, StorageError> {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::unavailable(operation, e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::unavailable(operation, e))?;
        let is_file = entry
            .file_type()
            .map_err(|e| StorageError::unavailable(operation, e))?
            .is_file();
        let name = entry.file_name().to_string_lossy().into_owned();

        if is_file && !name.starts_with('.') {
            files.push((name, entry.path()));
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}
