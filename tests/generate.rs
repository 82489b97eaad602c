//! Tests for DID document generation from key pairs.

use didweb::{
    DidWebDriver, Error, FromKeyPairRequest, GenerateRequest, KeyPair, KeyPurpose,
    X25519KeyAgreementKey, X25519_MULTIKEY_HEADER,
};
use serde_json::Value;

const TEST_URL: &str = "https://w3c-ccg.github.io/user/alice";
const TEST_DID: &str = "did:web:w3c-ccg.github.io:user:alice";
const TEST_SEED: &[u8; 32] = b"8c2114a150a16209c653817acc7f3e7e";

#[test]
fn generates_web_rooted_document() {
    let driver = DidWebDriver::new();
    let generated = driver
        .generate(&GenerateRequest { url: Some(TEST_URL), seed: None })
        .expect("should generate");

    let document = &generated.did_document;
    assert_eq!(document.id, TEST_DID);

    let method = &document.verification_method.as_ref().expect("should be set")[0];
    let fingerprint = generated
        .method_for(&KeyPurpose::Authentication)
        .expect("should find pair")
        .fingerprint();
    assert_eq!(method.id, format!("{TEST_DID}#{fingerprint}"));
    assert_eq!(method.controller, TEST_DID);
}

#[test]
fn generated_document_shape() {
    let driver = DidWebDriver::new();
    let generated = driver
        .generate(&GenerateRequest { url: Some(TEST_URL), seed: Some(TEST_SEED) })
        .expect("should generate");

    let value = serde_json::to_value(&generated.did_document).expect("should serialize");
    let Value::Object(map) = value else {
        panic!("expected an object");
    };
    let mut keys = map.keys().cloned().collect::<Vec<_>>();
    keys.sort();
    assert_eq!(keys, vec![
        "@context",
        "assertionMethod",
        "authentication",
        "capabilityDelegation",
        "capabilityInvocation",
        "id",
        "keyAgreement",
        "verificationMethod",
    ]);
}

#[test]
fn generation_is_deterministic_from_seed() {
    let driver = DidWebDriver::new();
    let request = GenerateRequest { url: Some(TEST_URL), seed: Some(TEST_SEED) };

    let first = driver.generate(&request).expect("should generate");
    let second = driver.generate(&request).expect("should generate");
    assert_eq!(first.did_document, second.did_document);
}

#[test]
fn method_for_returns_backing_pairs() {
    let driver = DidWebDriver::new();
    let generated = driver
        .generate(&GenerateRequest { url: Some(TEST_URL), seed: Some(TEST_SEED) })
        .expect("should generate");

    let verification = generated
        .method_for(&KeyPurpose::AssertionMethod)
        .expect("should find verification pair");
    let agreement =
        generated.method_for(&KeyPurpose::KeyAgreement).expect("should find agreement pair");
    assert_eq!(agreement.key_type(), "X25519KeyAgreementKey2020");

    // the stored pairs carry their assigned identity fields
    let key_id = generated.did_document.authentication.as_ref().expect("should be set")[0]
        .as_str()
        .expect("should be a reference")
        .to_string();
    assert_eq!(verification.id(), Some(key_id.as_str()));
    let stored = generated.key_pairs.get(&key_id).expect("pair is keyed by id");
    assert_eq!(stored.controller(), Some(TEST_DID));
}

#[test]
fn generates_key_rooted_document_without_url() {
    let driver = DidWebDriver::new();
    let generated =
        driver.generate(&GenerateRequest { url: None, seed: Some(TEST_SEED) }).expect("should generate");

    let document = &generated.did_document;
    let fingerprint = generated
        .method_for(&KeyPurpose::Authentication)
        .expect("should find pair")
        .fingerprint();
    assert_eq!(document.id, format!("did:key:{fingerprint}"));
}

#[test]
fn generate_enforces_allow_list_before_key_generation() {
    let driver = DidWebDriver::new().allow_list(["not-test-url.net"]);

    let err = driver
        .generate(&GenerateRequest { url: Some(TEST_URL), seed: None })
        .expect_err("should reject");
    assert!(matches!(err, Error::DomainNotAllowed(domain) if domain == "w3c-ccg.github.io"));

    // the same host on a different port is a different domain
    let driver = DidWebDriver::new().allow_list(["w3c-ccg.github.io:46443"]);
    let err = driver
        .generate(&GenerateRequest { url: Some(TEST_URL), seed: None })
        .expect_err("should reject");
    assert!(matches!(err, Error::DomainNotAllowed(_)));

    let driver = DidWebDriver::new().allow_list(["w3c-ccg.github.io"]);
    assert!(driver.generate(&GenerateRequest { url: Some(TEST_URL), seed: None }).is_ok());
}

#[test]
fn from_key_pair_reuses_supplied_pair() {
    let driver = DidWebDriver::new();
    let seeded = driver
        .generate(&GenerateRequest { url: None, seed: Some(TEST_SEED) })
        .expect("should generate");
    let key_pair = seeded.method_for(&KeyPurpose::Authentication).expect("should find pair");
    let multikey = key_pair.public_key_multibase().to_string();

    let imported = driver.key_pair_from_multibase(&multikey).expect("should import");
    let generated = driver
        .from_key_pair(FromKeyPairRequest {
            url: Some(TEST_URL),
            key_pair: Some(imported),
            key_agreement_key_pair: None,
        })
        .expect("should compose");

    assert_eq!(generated.did_document.id, TEST_DID);
    let method = &generated.did_document.verification_method.as_ref().expect("should be set")[0];
    assert_eq!(method.public_key_multibase.as_deref(), Some(multikey.as_str()));
}

#[test]
fn from_key_pair_with_agreement_only() {
    let driver = DidWebDriver::new();
    let seeded = driver
        .generate(&GenerateRequest { url: None, seed: Some(TEST_SEED) })
        .expect("should generate");
    let verification = seeded.method_for(&KeyPurpose::Authentication).expect("should find pair");
    let agreement = X25519KeyAgreementKey::derive_from_ed25519(verification.public_key_multibase())
        .expect("should derive");

    let generated = driver
        .from_key_pair(FromKeyPairRequest {
            url: None,
            key_pair: None,
            key_agreement_key_pair: Some(Box::new(agreement)),
        })
        .expect("should compose");

    let document = &generated.did_document;
    assert!(document.verification_method.is_none());
    assert!(document.key_agreement.is_some());
    // self-rooted: the key controls itself
    assert!(document.id.starts_with("did:key:"));
    assert_eq!(generated.key_pairs.len(), 1);
}

#[test]
fn from_key_pair_rejects_unregistered_suite() {
    let driver = DidWebDriver::new();
    let seeded = driver
        .generate(&GenerateRequest { url: None, seed: Some(TEST_SEED) })
        .expect("should generate");
    let verification = seeded.method_for(&KeyPurpose::Authentication).expect("should find pair");
    // an X25519 key is not a registered *verification* suite
    let agreement = X25519KeyAgreementKey::derive_from_ed25519(verification.public_key_multibase())
        .expect("should derive");

    let err = driver
        .from_key_pair(FromKeyPairRequest {
            url: None,
            key_pair: Some(Box::new(agreement)),
            key_agreement_key_pair: None,
        })
        .expect_err("should reject");
    assert!(matches!(err, Error::UnsupportedKeyType(header) if header == X25519_MULTIKEY_HEADER));
}

#[test]
fn use_suite_registers_deserializers() {
    let mut driver = DidWebDriver::new();

    // unknown header until registered
    let driver_err = {
        let seeded = driver
            .generate(&GenerateRequest { url: None, seed: Some(TEST_SEED) })
            .expect("should generate");
        let verification =
            seeded.method_for(&KeyPurpose::Authentication).expect("should find pair");
        let agreement =
            X25519KeyAgreementKey::derive_from_ed25519(verification.public_key_multibase())
                .expect("should derive");
        let multikey = agreement.public_key_multibase().to_string();
        driver.key_pair_from_multibase(&multikey).expect_err("should be unregistered")
    };
    assert!(matches!(driver_err, Error::UnsupportedKeyType(_)));

    driver
        .use_suite(
            X25519_MULTIKEY_HEADER,
            Box::new(|multikey| {
                X25519KeyAgreementKey::from_multibase(multikey)
                    .map(|kp| Box::new(kp) as Box<dyn KeyPair>)
            }),
        )
        .expect("should register");

    let seeded = driver
        .generate(&GenerateRequest { url: None, seed: Some(TEST_SEED) })
        .expect("should generate");
    let agreement = seeded.method_for(&KeyPurpose::KeyAgreement).expect("should find pair");
    let imported = driver
        .key_pair_from_multibase(agreement.public_key_multibase())
        .expect("should deserialize once registered");
    assert_eq!(imported.key_type(), "X25519KeyAgreementKey2020");

    // header must be exactly four characters
    let err = driver
        .use_suite("z6", Box::new(|_| anyhow::bail!("unused")))
        .expect_err("should reject");
    assert!(matches!(err, Error::InvalidArgument(_)));
}
