//! Formatters: certificate and key material to stored bytes
//!
//! Every formatter has a stable name, used as the storage key of its output.

use pem::{EncodeConfig, LineEnding, Pem};
use rustls::pki_types::CertificateDer;

use crate::error::FormatError;
use crate::{Certificate, KeyPair};

/// Serializes certificate material into one stored representation
pub trait Formatter: Send + Sync {
    /// Storage key of the produced file
    fn name(&self) -> &str;

    fn format(&self, certificate: &Certificate, key_pair: &KeyPair) -> Result<Vec<u8>, FormatError>;
}

fn encode(blocks: &[Pem]) -> Vec<u8> {
    pem::encode_many_config(blocks, EncodeConfig::new().set_line_ending(LineEnding::LF))
        .into_bytes()
}

fn certificate_blocks(certificates: &[CertificateDer<'static>]) -> Vec<Pem> {
    certificates
        .iter()
        .map(|der| Pem::new("CERTIFICATE", der.as_ref()))
        .collect()
}

fn key_block(key_pair: &KeyPair) -> Pem {
    Pem::new(key_pair.pem_label(), key_pair.private_key().secret_der())
}

/// Leaf certificate only
#[derive(Debug, Clone)]
pub struct CertificateFormatter {
    name: String,
}

impl CertificateFormatter {
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

impl Default for CertificateFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for CertificateFormatter {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(
        &self,
        certificate: &Certificate,
        _key_pair: &KeyPair,
    ) -> Result<Vec<u8>, FormatError> {
        Ok(encode(&certificate_blocks(std::slice::from_ref(certificate.leaf()))))
    }
}

/// Issuer certificates without the leaf; empty when the chain has no issuers
#[derive(Debug, Clone)]
pub struct ChainFormatter {
    name: String,
}

impl ChainFormatter {
    pub const DEFAULT_NAME: &'static str = "chain.pem";

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

impl Default for ChainFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for ChainFormatter {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(
        &self,
        certificate: &Certificate,
        _key_pair: &KeyPair,
    ) -> Result<Vec<u8>, FormatError> {
        Ok(encode(&certificate_blocks(certificate.issuers())))
    }
}

/// Leaf followed by its issuers
#[derive(Debug, Clone)]
pub struct FullChainFormatter {
    name: String,
}

impl FullChainFormatter {
    pub const DEFAULT_NAME: &'static str = "fullchain.pem";

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

impl Default for FullChainFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for FullChainFormatter {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(
        &self,
        certificate: &Certificate,
        _key_pair: &KeyPair,
    ) -> Result<Vec<u8>, FormatError> {
        Ok(encode(&certificate_blocks(certificate.chain())))
    }
}

/// Full chain followed by the private key, for servers expecting a single file
#[derive(Debug, Clone)]
pub struct CombinedFormatter {
    name: String,
}

impl CombinedFormatter {
    pub const DEFAULT_NAME: &'static str = "combined.pem";

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

impl Default for CombinedFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for CombinedFormatter {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(
        &self,
        certificate: &Certificate,
        key_pair: &KeyPair,
    ) -> Result<Vec<u8>, FormatError> {
        let mut blocks = certificate_blocks(certificate.chain());
        blocks.push(key_block(key_pair));
        Ok(encode(&blocks))
    }
}

/// Private key only
#[derive(Debug, Clone)]
pub struct PrivateKeyFormatter {
    name: String,
}

impl PrivateKeyFormatter {
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

impl Default for PrivateKeyFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for PrivateKeyFormatter {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(
        &self,
        _certificate: &Certificate,
        key_pair: &KeyPair,
    ) -> Result<Vec<u8>, FormatError> {
        if key_pair.private_key().secret_der().is_empty() {
            return Err(FormatError::encode("private key", "key material is empty"));
        }

        Ok(encode(&[key_block(key_pair)]))
    }
}
