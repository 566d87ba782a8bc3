//! Certificate metadata rebuilt from stored files
//!
//! Each parser contributes a [`PartialMetadata`]; the repository folds them
//! into one [`CertificateMetadata`] in parser order. A value present in a
//! later contribution replaces an earlier one, absent values never clear
//! anything, so contributions touching disjoint fields commute.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fields a single parser may contribute
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialMetadata {
    pub subject: Option<String>,
    pub issuer: Option<String>,
    /// Hex-encoded serial number
    pub serial_number: Option<String>,
    pub self_signed: Option<bool>,
    pub subject_alternative_names: Option<Vec<String>>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    /// Public key algorithm of the certificate (RSA, EC, Ed25519, ...)
    pub key_algorithm: Option<String>,
    /// DER encoding of the stored private key (PKCS#1, SEC1, PKCS#8)
    pub private_key_encoding: Option<String>,
    /// SHA-256 of the leaf certificate's DER, hex-encoded
    pub fingerprint_sha256: Option<String>,
    /// Leaf certificate as PEM
    pub pem: Option<String>,
}

/// Consolidated metadata for one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateMetadata {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_signed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_alternative_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pem: Option<String>,
}

impl CertificateMetadata {
    /// Empty record seeded with the domain name
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            subject: None,
            issuer: None,
            serial_number: None,
            self_signed: None,
            subject_alternative_names: None,
            valid_from: None,
            valid_to: None,
            key_algorithm: None,
            private_key_encoding: None,
            fingerprint_sha256: None,
            pem: None,
        }
    }

    /// Fold a parser's contribution into this record
    pub fn merge(&mut self, partial: PartialMetadata) {
        replace(&mut self.subject, partial.subject);
        replace(&mut self.issuer, partial.issuer);
        replace(&mut self.serial_number, partial.serial_number);
        replace(&mut self.self_signed, partial.self_signed);
        replace(
            &mut self.subject_alternative_names,
            partial.subject_alternative_names,
        );
        replace(&mut self.valid_from, partial.valid_from);
        replace(&mut self.valid_to, partial.valid_to);
        replace(&mut self.key_algorithm, partial.key_algorithm);
        replace(&mut self.private_key_encoding, partial.private_key_encoding);
        replace(&mut self.fingerprint_sha256, partial.fingerprint_sha256);
        replace(&mut self.pem, partial.pem);
    }

    pub fn with(mut self, partial: PartialMetadata) -> Self {
        self.merge(partial);
        self
    }

    /// Whether the certificate has expired, if its validity is known
    pub fn is_expired(&self) -> Option<bool> {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> Option<bool> {
        self.valid_to.map(|valid_to| now > valid_to)
    }

    /// Days until expiry, negative once expired
    pub fn days_until_expiry(&self) -> Option<i64> {
        self.days_until_expiry_at(Utc::now())
    }

    pub fn days_until_expiry_at(&self, now: DateTime<Utc>) -> Option<i64> {
        self.valid_to.map(|valid_to| (valid_to - now).num_days())
    }
}

fn replace<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}
