//! Repository behaviour over in-memory storage

mod common;

use std::sync::Arc;

use certkeep_store::{
    Certificate, CertificateFormatter, CertificateParser, CertificateRepository, CertificateStorage,
    ChainFormatter, CombinedFormatter, DomainConfiguration, FormatError, Formatter,
    FullChainFormatter, KeyPair, MemoryStorageFactory, PartialMetadata, PrivateKeyFormatter,
    PrivateKeyParser, RepositoryError,
};
use chrono::{TimeZone, Utc};
use common::{issue, FailingBackupFactory, FixedParser};

fn all_formatters() -> Vec<Box<dyn Formatter>> {
    vec![
        Box::new(CertificateFormatter::new()),
        Box::new(ChainFormatter::new()),
        Box::new(FullChainFormatter::new()),
        Box::new(CombinedFormatter::new()),
        Box::new(PrivateKeyFormatter::new()),
    ]
}

/// Formatter that always fails, to interrupt a persist part-way
struct BrokenFormatter;

impl Formatter for BrokenFormatter {
    fn name(&self) -> &str {
        "broken.p12"
    }

    fn format(
        &self,
        _certificate: &Certificate,
        _key_pair: &KeyPair,
    ) -> Result<Vec<u8>, FormatError> {
        Err(FormatError::encode("pkcs12", "unsupported key type"))
    }
}

#[test]
fn test_example_com_scenario() {
    let factory = MemoryStorageFactory::new();
    let repository = CertificateRepository::new(
        Arc::new(factory.clone()),
        vec![
            Box::new(FullChainFormatter::new().with_name("fullchain")),
            Box::new(PrivateKeyFormatter::new().with_name("privkey")),
        ],
        vec![Box::new(CertificateParser::new().with_name("fullchain"))],
    )
    .unwrap();
    let configuration = DomainConfiguration::new("example.com");
    let issued = issue("example.com", &["example.com", "www.example.com"]);

    repository
        .persist_certificate(&configuration, &issued.certificate, &issued.key_pair)
        .unwrap();

    let storage = factory.storage("example.com").unwrap();
    assert_eq!(
        storage.list().unwrap(),
        vec!["fullchain".to_string(), "privkey".to_string()]
    );
    assert!(repository.has_certificate(&configuration).unwrap());

    let metadata = repository.load_certificate(&configuration).unwrap();
    assert_eq!(metadata.domain, "example.com");
    assert_eq!(metadata.subject.as_deref(), Some("CN=example.com"));
    assert_eq!(metadata.issuer.as_deref(), Some("CN=Certkeep Test CA"));
    assert_eq!(
        metadata.subject_alternative_names,
        Some(vec!["example.com".to_string(), "www.example.com".to_string()])
    );
    // Only the fullchain parser ran
    assert!(metadata.private_key_encoding.is_none());

    repository.clear_certificate(&configuration).unwrap();
    assert!(!storage.exists("fullchain"));
    assert!(!storage.exists("privkey"));
    assert!(!repository.has_certificate(&configuration).unwrap());
}

#[test]
fn test_persisted_files_match_formatter_output() {
    let factory = MemoryStorageFactory::new();
    let repository =
        CertificateRepository::new(Arc::new(factory.clone()), all_formatters(), Vec::new())
            .unwrap();
    let configuration = DomainConfiguration::new("example.com");
    let issued = issue("example.com", &["example.com"]);

    repository
        .persist_certificate(&configuration, &issued.certificate, &issued.key_pair)
        .unwrap();
    assert!(repository.has_certificate(&configuration).unwrap());

    let storage = factory.storage("example.com").unwrap();
    for formatter in all_formatters() {
        let expected = formatter
            .format(&issued.certificate, &issued.key_pair)
            .unwrap();
        assert_eq!(storage.read(formatter.name()).unwrap(), expected);
    }
}

#[test]
fn test_persist_twice_is_idempotent() {
    let factory = MemoryStorageFactory::new();
    let repository =
        CertificateRepository::new(Arc::new(factory.clone()), all_formatters(), Vec::new())
            .unwrap();
    let configuration = DomainConfiguration::new("example.com");
    let issued = issue("example.com", &["example.com"]);
    let storage = factory.storage("example.com").unwrap();

    repository
        .persist_certificate(&configuration, &issued.certificate, &issued.key_pair)
        .unwrap();
    let first: Vec<_> = storage
        .list()
        .unwrap()
        .into_iter()
        .map(|name| storage.read(&name).unwrap())
        .collect();

    repository
        .persist_certificate(&configuration, &issued.certificate, &issued.key_pair)
        .unwrap();
    let second: Vec<_> = storage
        .list()
        .unwrap()
        .into_iter()
        .map(|name| storage.read(&name).unwrap())
        .collect();

    assert_eq!(first, second);

    // The first persist found nothing to back up; the second captured the first's files
    let backups = storage.backups().unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].values().cloned().collect::<Vec<_>>(), first);
}

#[test]
fn test_new_certificate_replaces_old_and_backup_keeps_old() {
    let factory = MemoryStorageFactory::new();
    let repository = CertificateRepository::new(
        Arc::new(factory.clone()),
        all_formatters(),
        vec![Box::new(CertificateParser::new())],
    )
    .unwrap();
    let configuration = DomainConfiguration::new("example.com");
    let old = issue("example.com", &["example.com"]);
    let new = issue("example.com", &["example.com", "api.example.com"]);

    repository
        .persist_certificate(&configuration, &old.certificate, &old.key_pair)
        .unwrap();
    repository
        .persist_certificate(&configuration, &new.certificate, &new.key_pair)
        .unwrap();

    let metadata = repository.load_certificate(&configuration).unwrap();
    assert_eq!(
        metadata.subject_alternative_names,
        Some(vec!["example.com".to_string(), "api.example.com".to_string()])
    );

    let storage = factory.storage("example.com").unwrap();
    assert!(storage.restore_latest().unwrap());
    let restored = repository.load_certificate(&configuration).unwrap();
    assert_eq!(
        restored.subject_alternative_names,
        Some(vec!["example.com".to_string()])
    );
}

#[test]
fn test_clear_on_empty_domain_succeeds() {
    let repository = CertificateRepository::new(
        Arc::new(MemoryStorageFactory::new()),
        all_formatters(),
        Vec::new(),
    )
    .unwrap();
    let configuration = DomainConfiguration::new("never-stored.example.com");

    repository.clear_certificate(&configuration).unwrap();
    assert!(!repository.has_certificate(&configuration).unwrap());
}

#[test]
fn test_has_certificate_requires_every_file() {
    let factory = MemoryStorageFactory::new();
    let repository =
        CertificateRepository::new(Arc::new(factory.clone()), all_formatters(), Vec::new())
            .unwrap();
    let configuration = DomainConfiguration::new("example.com");
    let issued = issue("example.com", &["example.com"]);

    repository
        .persist_certificate(&configuration, &issued.certificate, &issued.key_pair)
        .unwrap();
    factory
        .storage("example.com")
        .unwrap()
        .remove("chain.pem")
        .unwrap();

    assert!(!repository.has_certificate(&configuration).unwrap());
}

#[test]
fn test_empty_formatter_list_is_vacuously_present() {
    let repository =
        CertificateRepository::new(Arc::new(MemoryStorageFactory::new()), Vec::new(), Vec::new())
            .unwrap();

    assert!(repository
        .has_certificate(&DomainConfiguration::new("example.com"))
        .unwrap());
}

#[test]
fn test_round_trip_metadata_matches_certificate() {
    let repository = CertificateRepository::new(
        Arc::new(MemoryStorageFactory::new()),
        all_formatters(),
        vec![
            Box::new(CertificateParser::new().with_name("combined.pem")),
            Box::new(PrivateKeyParser::new()),
        ],
    )
    .unwrap();
    let configuration = DomainConfiguration::new("example.com");
    let issued = issue("example.com", &["example.com", "10.0.0.1"]);

    repository
        .persist_certificate(&configuration, &issued.certificate, &issued.key_pair)
        .unwrap();
    let metadata = repository.load_certificate(&configuration).unwrap();

    assert_eq!(
        metadata.valid_from,
        Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
    );
    assert_eq!(
        metadata.valid_to,
        Some(Utc.with_ymd_and_hms(2035, 1, 1, 0, 0, 0).unwrap())
    );
    assert_eq!(
        metadata.subject_alternative_names,
        Some(vec!["example.com".to_string(), "10.0.0.1".to_string()])
    );
    assert_eq!(metadata.serial_number.as_deref(), Some("102030"));
    assert_eq!(metadata.self_signed, Some(false));
    assert_eq!(metadata.private_key_encoding.as_deref(), Some("PKCS#8"));
    let mid_validity = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(metadata.is_expired_at(mid_validity), Some(false));

    let stored_leaf = Certificate::from_pem(metadata.pem.unwrap().as_bytes()).unwrap();
    assert_eq!(stored_leaf.leaf().as_ref(), issued.leaf_der.as_slice());
}

#[test]
fn test_later_parser_wins_on_overlap() {
    let factory = MemoryStorageFactory::new();
    let repository = CertificateRepository::new(
        Arc::new(factory.clone()),
        vec![
            Box::new(CertificateFormatter::new()),
            Box::new(FullChainFormatter::new()),
        ],
        vec![
            Box::new(FixedParser {
                name: "cert.pem".to_string(),
                partial: PartialMetadata {
                    issuer: Some("First".to_string()),
                    subject: Some("only-first".to_string()),
                    ..Default::default()
                },
            }),
            Box::new(FixedParser {
                name: "fullchain.pem".to_string(),
                partial: PartialMetadata {
                    issuer: Some("Second".to_string()),
                    ..Default::default()
                },
            }),
        ],
    )
    .unwrap();
    let configuration = DomainConfiguration::new("example.com");
    let issued = issue("example.com", &["example.com"]);

    repository
        .persist_certificate(&configuration, &issued.certificate, &issued.key_pair)
        .unwrap();
    let metadata = repository.load_certificate(&configuration).unwrap();

    assert_eq!(metadata.issuer.as_deref(), Some("Second"));
    assert_eq!(metadata.subject.as_deref(), Some("only-first"));
}

#[test]
fn test_backup_failure_writes_nothing() {
    let inner = MemoryStorageFactory::new();
    let repository = CertificateRepository::new(
        Arc::new(FailingBackupFactory {
            inner: inner.clone(),
        }),
        all_formatters(),
        Vec::new(),
    )
    .unwrap();
    let configuration = DomainConfiguration::new("example.com");
    let issued = issue("example.com", &["example.com"]);

    let result =
        repository.persist_certificate(&configuration, &issued.certificate, &issued.key_pair);

    assert!(matches!(result, Err(RepositoryError::StorageUnavailable(_))));
    assert!(inner.storage("example.com").unwrap().list().unwrap().is_empty());
    assert!(inner.list_domains().unwrap().is_empty());
}

#[test]
fn test_backup_failure_leaves_previous_files_untouched() {
    let inner = MemoryStorageFactory::new();
    let previous = inner.storage("example.com").unwrap();
    previous.write("cert.pem", b"previous").unwrap();

    let repository = CertificateRepository::new(
        Arc::new(FailingBackupFactory {
            inner: inner.clone(),
        }),
        all_formatters(),
        Vec::new(),
    )
    .unwrap();
    let issued = issue("example.com", &["example.com"]);

    assert!(repository
        .persist_certificate(
            &DomainConfiguration::new("example.com"),
            &issued.certificate,
            &issued.key_pair
        )
        .is_err());
    assert_eq!(previous.read("cert.pem").unwrap(), b"previous");
    assert_eq!(previous.list().unwrap(), vec!["cert.pem".to_string()]);
}

#[test]
fn test_formatter_failure_keeps_earlier_writes_and_backup() {
    let factory = MemoryStorageFactory::new();
    let storage = factory.storage("example.com").unwrap();
    storage.write("cert.pem", b"previous cert").unwrap();

    let repository = CertificateRepository::new(
        Arc::new(factory.clone()),
        vec![
            Box::new(CertificateFormatter::new()),
            Box::new(BrokenFormatter),
            Box::new(PrivateKeyFormatter::new()),
        ],
        Vec::new(),
    )
    .unwrap();
    let issued = issue("example.com", &["example.com"]);

    let result = repository.persist_certificate(
        &DomainConfiguration::new("example.com"),
        &issued.certificate,
        &issued.key_pair,
    );

    match result {
        Err(RepositoryError::Format { name, .. }) => assert_eq!(name, "broken.p12"),
        other => panic!("unexpected result: {:?}", other),
    }

    assert_ne!(storage.read("cert.pem").unwrap(), b"previous cert");
    assert!(!storage.exists("privkey.pem"));

    let backups = storage.backups().unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].get("cert.pem").unwrap(), b"previous cert");
}

#[test]
fn test_load_missing_file_fails() {
    let repository = CertificateRepository::new(
        Arc::new(MemoryStorageFactory::new()),
        all_formatters(),
        vec![Box::new(CertificateParser::new())],
    )
    .unwrap();

    let result = repository.load_certificate(&DomainConfiguration::new("example.com"));
    match result {
        Err(RepositoryError::BlobNotFound { domain, name }) => {
            assert_eq!(domain, "example.com");
            assert_eq!(name, "cert.pem");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_load_fails_whole_call_on_parse_error() {
    let factory = MemoryStorageFactory::new();
    let storage = factory.storage("example.com").unwrap();
    storage.write("privkey.pem", b"not a key").unwrap();

    let issued = issue("example.com", &["example.com"]);
    storage
        .write(
            "cert.pem",
            &CertificateFormatter::new()
                .format(&issued.certificate, &issued.key_pair)
                .unwrap(),
        )
        .unwrap();

    let repository = CertificateRepository::new(
        Arc::new(factory.clone()),
        Vec::new(),
        vec![
            Box::new(CertificateParser::new()),
            Box::new(PrivateKeyParser::new()),
        ],
    )
    .unwrap();

    let result = repository.load_certificate(&DomainConfiguration::new("example.com"));
    match result {
        Err(RepositoryError::Format { name, .. }) => assert_eq!(name, "privkey.pem"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_domains_are_independent() {
    let factory = MemoryStorageFactory::new();
    let repository =
        CertificateRepository::new(Arc::new(factory.clone()), all_formatters(), Vec::new())
            .unwrap();
    let first = DomainConfiguration::new("first.example.com");
    let second = DomainConfiguration::new("second.example.com");
    let issued = issue("first.example.com", &["first.example.com"]);

    repository
        .persist_certificate(&first, &issued.certificate, &issued.key_pair)
        .unwrap();

    assert!(repository.has_certificate(&first).unwrap());
    assert!(!repository.has_certificate(&second).unwrap());

    repository.clear_certificate(&second).unwrap();
    assert!(repository.has_certificate(&first).unwrap());
}

#[test]
fn test_repository_is_shareable_across_threads() {
    let factory = MemoryStorageFactory::new();
    let repository = Arc::new(
        CertificateRepository::new(Arc::new(factory.clone()), all_formatters(), Vec::new())
            .unwrap(),
    );

    let handles: Vec<_> = ["a.example.com", "b.example.com", "c.example.com"]
        .into_iter()
        .map(|domain| {
            let repository = Arc::clone(&repository);
            std::thread::spawn(move || {
                let issued = issue(domain, &[domain]);
                let configuration = DomainConfiguration::new(domain);
                repository
                    .persist_certificate(&configuration, &issued.certificate, &issued.key_pair)
                    .unwrap();
                repository.has_certificate(&configuration).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(factory.list_domains().unwrap().len(), 3);
}
