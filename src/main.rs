//! Certkeep CLI - inspect and manage stored certificates
//!
//! Persists issued certificates into the configured representations, reports
//! what is stored, and recovers earlier sets from backups.

use anyhow::{bail, Context, Result};
use certkeep_store::{
    BackupId, Certificate, CertificateMetadata, FilesystemStorage, FilesystemStorageFactory,
    KeyPair, StorageConfig, StoreConfig,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Certkeep - multi-format certificate storage
#[derive(Parser, Debug)]
#[command(name = "certkeep")]
#[command(about = "Certkeep - store certificates in several formats and read them back")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "CERTKEEP_CONFIG",
        default_value = "certkeep.yml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a certificate and its key in every configured format
    #[command(long_about = r#"
Store an issued certificate and its private key in every configured
format. The domain's current files are backed up first; if the backup
fails nothing is written.

EXAMPLES:
  certkeep persist example.com --cert fullchain.pem --key privkey.pem
    "#)]
    Persist {
        /// Domain the certificate belongs to
        domain: String,

        /// PEM certificate chain, leaf first
        #[arg(long)]
        cert: PathBuf,

        /// PEM private key
        #[arg(long)]
        key: PathBuf,
    },

    /// Show the metadata read back from the stored files
    Show {
        domain: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report whether each domain has a complete certificate
    Status {
        /// Domains to check (defaults to the configured domains)
        domains: Vec<String>,
    },

    /// Remove the stored files of a domain
    Clear { domain: String },

    /// List the backups taken for a domain
    Backups { domain: String },

    /// Restore a domain's files from a backup
    Restore {
        domain: String,

        /// Backup to restore (defaults to the most recent)
        #[arg(long)]
        backup: Option<String>,
    },

    /// Write a template configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Setup logging with the specified log level
fn setup_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Load the configuration file, falling back to defaults when it does not exist
fn load_config(path: &Path) -> Result<StoreConfig> {
    if !path.exists() {
        debug!("No configuration at {:?}, using defaults", path);
        return Ok(StoreConfig::default());
    }

    let config =
        StoreConfig::load(path).with_context(|| format!("Failed to load config {:?}", path))?;
    if config.storage == StorageConfig::Memory {
        warn!("Memory storage is process-local; nothing outlives this command");
    }

    Ok(config)
}

/// Filesystem handle for commands that work on backups
fn filesystem_storage(config: &StoreConfig, domain: &str) -> Result<FilesystemStorage> {
    match &config.storage {
        StorageConfig::Filesystem { root } => FilesystemStorageFactory::new(root)
            .storage(domain)
            .with_context(|| format!("Invalid domain {}", domain)),
        StorageConfig::Memory => bail!("Backups require the filesystem storage backend"),
    }
}

fn print_metadata(metadata: &CertificateMetadata) {
    println!("Domain:        {}", metadata.domain);

    let fields = [
        ("Subject", metadata.subject.clone()),
        ("Issuer", metadata.issuer.clone()),
        ("Serial", metadata.serial_number.clone()),
        ("Not before", metadata.valid_from.map(|d| d.to_rfc3339())),
        ("Not after", metadata.valid_to.map(|d| d.to_rfc3339())),
        (
            "Names",
            metadata
                .subject_alternative_names
                .as_ref()
                .map(|names| names.join(", ")),
        ),
        ("Key", metadata.key_algorithm.clone()),
        ("Key encoding", metadata.private_key_encoding.clone()),
        ("SHA-256", metadata.fingerprint_sha256.clone()),
    ];

    for (label, value) in fields {
        if let Some(value) = value {
            println!("{:<14} {}", format!("{}:", label), value);
        }
    }

    let now = chrono::Utc::now();
    match (metadata.is_expired_at(now), metadata.days_until_expiry_at(now)) {
        (Some(true), _) => println!("{:<14} expired", "Status:"),
        (Some(false), Some(days)) => println!("{:<14} valid, {} day(s) left", "Status:", days),
        _ => {}
    }
}

/// Write the template configuration to `path`
fn write_template(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{:?} already exists (use --force to overwrite)", path);
    }

    std::fs::write(path, StoreConfig::template())
        .with_context(|| format!("Failed to write {:?}", path))?;
    info!("Wrote template configuration to {:?}", path);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    run(cli.command, &cli.config)
}

fn run(command: Commands, config_path: &Path) -> Result<()> {
    match command {
        Commands::Persist { domain, cert, key } => {
            let config = load_config(config_path)?;
            let repository = config.build_repository()?;

            let cert_pem =
                std::fs::read(&cert).with_context(|| format!("Failed to read {:?}", cert))?;
            let key_pem =
                std::fs::read(&key).with_context(|| format!("Failed to read {:?}", key))?;
            let certificate = Certificate::from_pem(&cert_pem)
                .with_context(|| format!("Invalid certificate in {:?}", cert))?;
            let key_pair = KeyPair::from_pem(&key_pem)
                .with_context(|| format!("Invalid private key in {:?}", key))?;

            repository
                .persist_certificate(&config.domain(&domain), &certificate, &key_pair)
                .with_context(|| format!("Failed to persist certificate for {}", domain))?;
            println!(
                "Stored {} as {}",
                domain,
                repository.formatter_names().join(", ")
            );
        }
        Commands::Show { domain, json } => {
            let config = load_config(config_path)?;
            let repository = config.build_repository()?;
            let metadata = repository
                .load_certificate(&config.domain(&domain))
                .with_context(|| format!("Failed to load certificate for {}", domain))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&metadata)?);
            } else {
                print_metadata(&metadata);
            }
        }
        Commands::Status { domains } => {
            let config = load_config(config_path)?;
            let repository = config.build_repository()?;
            let domains = if domains.is_empty() {
                config.domains.iter().map(|d| d.domain.clone()).collect()
            } else {
                domains
            };

            if domains.is_empty() {
                println!("No domains configured");
            }

            for domain in domains {
                let present = repository
                    .has_certificate(&config.domain(&domain))
                    .with_context(|| format!("Failed to check {}", domain))?;
                println!(
                    "{:<40} {}",
                    domain,
                    if present { "present" } else { "missing" }
                );
            }
        }
        Commands::Clear { domain } => {
            let config = load_config(config_path)?;
            let repository = config.build_repository()?;
            repository
                .clear_certificate(&config.domain(&domain))
                .with_context(|| format!("Failed to clear certificate for {}", domain))?;
            println!("Cleared {}", domain);
        }
        Commands::Backups { domain } => {
            let config = load_config(config_path)?;
            let storage = filesystem_storage(&config, &domain)?;
            let backups = storage.list_backups()?;

            if backups.is_empty() {
                println!("No backups for {}", domain);
            }
            for backup in backups {
                println!("{}", backup);
            }
        }
        Commands::Restore { domain, backup } => {
            let config = load_config(config_path)?;
            let storage = filesystem_storage(&config, &domain)?;
            let backup = match backup {
                Some(id) => BackupId::new(id),
                None => storage
                    .list_backups()?
                    .pop()
                    .with_context(|| format!("No backups for {}", domain))?,
            };

            storage
                .restore(&backup)
                .with_context(|| format!("Failed to restore {} from {}", domain, backup))?;
            println!("Restored {} from {}", domain, backup);
        }
        Commands::Init { force } => write_template(config_path, force)?,
    }

    Ok(())
}
