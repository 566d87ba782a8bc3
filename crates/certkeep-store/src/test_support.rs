//! Certificate fixtures for unit tests

pub(crate) use certkeep_test_support::{issue_certificate, IssuedCertificate};

use crate::{Certificate, KeyPair};

/// Library types built from an issued fixture
pub(crate) trait IssuedMaterial {
    fn certificate(&self) -> Certificate;

    fn key_pair(&self) -> KeyPair;
}

impl IssuedMaterial for IssuedCertificate {
    fn certificate(&self) -> Certificate {
        Certificate::from_pem(self.fullchain_pem.as_bytes()).unwrap()
    }

    fn key_pair(&self) -> KeyPair {
        KeyPair::from_pem(self.key_pem.as_bytes()).unwrap()
    }
}
