//! Store configuration file support
//!
//! Describes where certificates live and which formats are written and read
//! back, in a single YAML file:
//!
//! ```yaml
//! storage:
//!   backend: filesystem
//!   root: /var/lib/certkeep
//! formatters:
//!   - format: fullchain
//!   - format: private_key
//! parsers:
//!   - format: certificate
//!     name: fullchain.pem
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::RepositoryError;
use crate::formatter::{
    CertificateFormatter, ChainFormatter, CombinedFormatter, Formatter, FullChainFormatter,
    PrivateKeyFormatter,
};
use crate::parser::{CertificateParser, Parser, PrivateKeyParser};
use crate::repository::CertificateRepository;
use crate::storage::{FilesystemStorageFactory, MemoryStorageFactory, StorageFactory};
use crate::DomainConfiguration;

/// Top-level configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    /// Representations written on persist, in order
    #[serde(default = "default_formatters")]
    pub formatters: Vec<FormatEntry>,

    /// Representations read back on load, in order; later entries win
    #[serde(default = "default_parsers")]
    pub parsers: Vec<FormatEntry>,

    /// Known domains
    #[serde(default)]
    pub domains: Vec<DomainConfiguration>,
}

/// Storage backend selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    Filesystem {
        #[serde(default = "default_root")]
        root: PathBuf,
    },
    /// Process-local storage, lost on exit
    Memory,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            root: default_root(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("./.certkeep")
}

/// Known representations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    Certificate,
    Chain,
    Fullchain,
    Combined,
    PrivateKey,
}

impl FormatKind {
    pub fn default_name(self) -> &'static str {
        match self {
            Self::Certificate => CertificateFormatter::DEFAULT_NAME,
            Self::Chain => ChainFormatter::DEFAULT_NAME,
            Self::Fullchain => FullChainFormatter::DEFAULT_NAME,
            Self::Combined => CombinedFormatter::DEFAULT_NAME,
            Self::PrivateKey => PrivateKeyFormatter::DEFAULT_NAME,
        }
    }
}

/// One configured representation, optionally stored under a custom name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatEntry {
    pub format: FormatKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl FormatEntry {
    pub fn new(format: FormatKind) -> Self {
        Self { format, name: None }
    }

    pub fn named(format: FormatKind, name: impl Into<String>) -> Self {
        Self {
            format,
            name: Some(name.into()),
        }
    }

    /// Custom name if set, otherwise the format's default file name
    pub fn resolved_name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.format.default_name())
    }

    fn formatter(&self) -> Box<dyn Formatter> {
        let name = self.resolved_name().to_string();

        match self.format {
            FormatKind::Certificate => Box::new(CertificateFormatter::new().with_name(name)),
            FormatKind::Chain => Box::new(ChainFormatter::new().with_name(name)),
            FormatKind::Fullchain => Box::new(FullChainFormatter::new().with_name(name)),
            FormatKind::Combined => Box::new(CombinedFormatter::new().with_name(name)),
            FormatKind::PrivateKey => Box::new(PrivateKeyFormatter::new().with_name(name)),
        }
    }

    fn parser(&self) -> Result<Box<dyn Parser>, RepositoryError> {
        let name = self.resolved_name().to_string();

        match self.format {
            FormatKind::Certificate | FormatKind::Fullchain | FormatKind::Combined => {
                Ok(Box::new(CertificateParser::new().with_name(name)))
            }
            FormatKind::PrivateKey => Ok(Box::new(PrivateKeyParser::new().with_name(name))),
            FormatKind::Chain => Err(RepositoryError::Configuration(format!(
                "Parser '{}': the chain format holds no leaf certificate and cannot be parsed",
                name
            ))),
        }
    }
}

fn default_formatters() -> Vec<FormatEntry> {
    vec![
        FormatEntry::new(FormatKind::Certificate),
        FormatEntry::new(FormatKind::Chain),
        FormatEntry::new(FormatKind::Fullchain),
        FormatEntry::new(FormatKind::Combined),
        FormatEntry::new(FormatKind::PrivateKey),
    ]
}

fn default_parsers() -> Vec<FormatEntry> {
    vec![FormatEntry::new(FormatKind::Certificate)]
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            formatters: default_formatters(),
            parsers: default_parsers(),
            domains: Vec::new(),
        }
    }
}

impl StoreConfig {
    /// Load config from a specific file path
    pub fn load(path: &Path) -> Result<Self, RepositoryError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RepositoryError::Configuration(format!(
                "Failed to read config file {:?}: {}",
                path, e
            ))
        })?;

        debug!("Loaded configuration from {:?}", path);
        Self::parse(&content)
    }

    /// Parse config from a YAML string
    pub fn parse(content: &str) -> Result<Self, RepositoryError> {
        let config: StoreConfig = serde_yaml::from_str(content).map_err(|e| {
            RepositoryError::Configuration(format!("Failed to parse YAML config: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), RepositoryError> {
        if let StorageConfig::Filesystem { root } = &self.storage {
            if root.as_os_str().is_empty() {
                return Err(RepositoryError::Configuration(
                    "Filesystem storage requires a root directory".to_string(),
                ));
            }
        }

        for entry in &self.parsers {
            entry.parser()?;
        }

        Ok(())
    }

    /// Configured entry for `domain`, or a bare configuration when not listed
    pub fn domain(&self, domain: &str) -> DomainConfiguration {
        self.domains
            .iter()
            .find(|d| d.domain == domain)
            .cloned()
            .unwrap_or_else(|| DomainConfiguration::new(domain))
    }

    pub fn storage_factory(&self) -> Arc<dyn StorageFactory> {
        match &self.storage {
            StorageConfig::Filesystem { root } => Arc::new(FilesystemStorageFactory::new(root)),
            StorageConfig::Memory => Arc::new(MemoryStorageFactory::new()),
        }
    }

    /// Wire a repository from this configuration
    pub fn build_repository(&self) -> Result<CertificateRepository, RepositoryError> {
        self.build_repository_with(self.storage_factory())
    }

    /// Wire a repository over an explicit storage factory
    pub fn build_repository_with(
        &self,
        storage_factory: Arc<dyn StorageFactory>,
    ) -> Result<CertificateRepository, RepositoryError> {
        let formatters = self.formatters.iter().map(FormatEntry::formatter).collect();
        let parsers = self
            .parsers
            .iter()
            .map(FormatEntry::parser)
            .collect::<Result<Vec<_>, _>>()?;

        CertificateRepository::new(storage_factory, formatters, parsers)
    }

    /// Generate a template config file content
    pub fn template() -> String {
        r#"# Certkeep configuration

storage:
  backend: filesystem
  root: ./.certkeep

# Written on persist, in order. `name` overrides the stored file name.
formatters:
  - format: certificate     # cert.pem
  - format: chain           # chain.pem
  - format: fullchain       # fullchain.pem
  - format: combined        # combined.pem
  - format: private_key     # privkey.pem

# Read back on load, in order; later parsers win on overlapping fields.
parsers:
  - format: certificate
  # - format: private_key

# domains:
#   - domain: example.com
#     subject_alternative_names: [www.example.com]
"#
        .to_string()
    }
}
