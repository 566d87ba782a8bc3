//! Parsers: stored bytes back to certificate metadata
//!
//! A parser's name selects the stored file it reads. Parser names need not
//! match formatter names, so a certificate parser can read the leaf out of
//! `fullchain.pem` or `combined.pem` just as well as out of `cert.pem`.

use chrono::{DateTime, Utc};
use pem::{EncodeConfig, LineEnding, Pem};
use sha2::{Digest, Sha256};
use std::net::{Ipv4Addr, Ipv6Addr};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;

use crate::error::FormatError;
use crate::metadata::PartialMetadata;
use crate::{Certificate, KeyPair};

/// Extracts metadata from one stored representation
pub trait Parser: Send + Sync {
    /// Name of the stored file to read
    fn name(&self) -> &str;

    fn parse(&self, content: &[u8]) -> Result<PartialMetadata, FormatError>;
}

/// Reads the first certificate of a PEM bundle
#[derive(Debug, Clone)]
pub struct CertificateParser {
    name: String,
}

impl CertificateParser {
    pub const DEFAULT_NAME: &'static str = "cert.pem";

    pub fn new() -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for CertificateParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for CertificateParser {
    fn name(&self) -> &str {
        &self.name
    }

    fn parse(&self, content: &[u8]) -> Result<PartialMetadata, FormatError> {
        let certificate = Certificate::from_pem(content)?;
        let der = certificate.leaf().as_ref();

        let (_, x509) = x509_parser::parse_x509_certificate(der).map_err(|e| {
            FormatError::decode("certificate", format!("Failed to parse X.509 certificate: {}", e))
        })?;

        let validity = x509.validity();
        let pem = pem::encode_config(
            &Pem::new("CERTIFICATE", der),
            EncodeConfig::new().set_line_ending(LineEnding::LF),
        );

        Ok(PartialMetadata {
            subject: Some(x509.subject().to_string()),
            issuer: Some(x509.issuer().to_string()),
            serial_number: Some(hex::encode(x509.raw_serial())),
            self_signed: Some(x509.subject().as_raw() == x509.issuer().as_raw()),
            subject_alternative_names: Some(subject_alternative_names(&x509)?),
            valid_from: Some(timestamp(validity.not_before.timestamp())?),
            valid_to: Some(timestamp(validity.not_after.timestamp())?),
            key_algorithm: Some(key_algorithm(&x509)),
            private_key_encoding: None,
            fingerprint_sha256: Some(hex::encode(Sha256::digest(der))),
            pem: Some(pem),
        })
    }
}

fn timestamp(seconds: i64) -> Result<DateTime<Utc>, FormatError> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| FormatError::decode("certificate", "Invalid validity timestamp"))
}

fn subject_alternative_names(x509: &X509Certificate<'_>) -> Result<Vec<String>, FormatError> {
    let extension = x509.subject_alternative_name().map_err(|e| {
        FormatError::decode(
            "certificate",
            format!("Invalid subject alternative name extension: {}", e),
        )
    })?;

    let Some(extension) = extension else {
        return Ok(Vec::new());
    };

    let names = extension
        .value
        .general_names
        .iter()
        .filter_map(|name| match name {
            GeneralName::DNSName(dns) => Some(dns.to_string()),
            GeneralName::IPAddress(bytes) => ip_address(bytes),
            _ => None,
        })
        .collect();

    Ok(names)
}

fn ip_address(bytes: &[u8]) -> Option<String> {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        return Some(Ipv4Addr::from(octets).to_string());
    }

    <[u8; 16]>::try_from(bytes)
        .ok()
        .map(|octets| Ipv6Addr::from(octets).to_string())
}

fn key_algorithm(x509: &X509Certificate<'_>) -> String {
    let oid = x509.public_key().algorithm.algorithm.to_id_string();

    match oid.as_str() {
        "1.2.840.113549.1.1.1" => "RSA".to_string(),
        "1.2.840.10045.2.1" => "EC".to_string(),
        "1.3.101.112" => "Ed25519".to_string(),
        "1.3.101.113" => "Ed448".to_string(),
        _ => oid,
    }
}

/// Reports how the stored private key is encoded
#[derive(Debug, Clone)]
pub struct PrivateKeyParser {
    name: String,
}

impl PrivateKeyParser {
    pub const DEFAULT_NAME: &'static str = "privkey.pem";

    pub fn new() -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for PrivateKeyParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for PrivateKeyParser {
    fn name(&self) -> &str {
        &self.name
    }

    fn parse(&self, content: &[u8]) -> Result<PartialMetadata, FormatError> {
        let key_pair = KeyPair::from_pem(content)?;

        Ok(PartialMetadata {
            private_key_encoding: Some(key_pair.encoding().to_string()),
            ..Default::default()
        })
    }
}
