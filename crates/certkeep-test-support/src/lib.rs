//! Certificate fixtures shared by the certkeep test suites
//!
//! Fixtures are returned as PEM and DER so callers build their own
//! certificate types from them.

use rcgen::{
    date_time_ymd, BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    SerialNumber,
};

/// Common name of the throwaway issuing CA
pub const CA_COMMON_NAME: &str = "Certkeep Test CA";

/// Serial number of every issued leaf
pub const LEAF_SERIAL: [u8; 3] = [0x10, 0x20, 0x30];

/// Leaf certificate, its issuer and the leaf's private key
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub leaf_der: Vec<u8>,
    pub ca_der: Vec<u8>,
    /// Leaf followed by the CA
    pub fullchain_pem: String,
    /// PKCS#8 private key of the leaf
    pub key_pem: String,
}

/// Issue a leaf for `domain` signed by a throwaway CA, valid 2025-01-01 to 2035-01-01.
///
/// `sans` entries that parse as IP addresses become IP names.
///
/// # Panics
///
/// Panics if rcgen rejects the parameters, e.g. an invalid DNS name.
pub fn issue_certificate(domain: &str, sans: &[&str]) -> IssuedCertificate {
    let ca_key = KeyPair::generate().expect("generate CA key");
    let mut ca_params = CertificateParams::default();
    let mut ca_name = DistinguishedName::new();
    ca_name.push(DnType::CommonName, CA_COMMON_NAME);
    ca_params.distinguished_name = ca_name;
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let ca = ca_params.self_signed(&ca_key).expect("self-sign CA");

    let leaf_key = KeyPair::generate().expect("generate leaf key");
    let names = sans.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    let mut params = CertificateParams::new(names).expect("subject alternative names");
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, domain);
    params.distinguished_name = name;
    params.serial_number = Some(SerialNumber::from(LEAF_SERIAL.to_vec()));
    params.not_before = date_time_ymd(2025, 1, 1);
    params.not_after = date_time_ymd(2035, 1, 1);
    let leaf = params.signed_by(&leaf_key, &ca, &ca_key).expect("sign leaf");

    IssuedCertificate {
        leaf_der: leaf.der().to_vec(),
        ca_der: ca.der().to_vec(),
        fullchain_pem: format!("{}{}", leaf.pem(), ca.pem()),
        key_pem: leaf_key.serialize_pem(),
    }
}
