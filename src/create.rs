//! # Document Generation
//!
//! Builds a complete DID document from one or more key pairs.
//!
//! Documents are first rooted at the key-derived DID (`did:key:` addressing,
//! usable when no target URL exists) and then re-rooted to a `did:web` DID
//! with a recursive substitution pass over every identifier in the document.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::core::Kind;
use crate::document::{DID_CONTEXT, Document, KeyPurpose, context_for_suite};
use crate::error::{Error, Result};
use crate::key::{KeyPair, SuiteRegistry, derive_key_agreement};

const DID_KEY_PREFIX: &str = "did:key:";

/// A generated DID document together with the key pairs that back it.
#[derive(Debug)]
pub struct GeneratedDid {
    /// The generated document.
    pub did_document: Document,

    /// The key pairs used to generate the document, keyed by assigned key
    /// id. Each pair has had its `id` and `controller` assigned; callers
    /// store these (e.g. in a KMS) for later signing.
    pub key_pairs: BTreeMap<String, Box<dyn KeyPair>>,
}

impl GeneratedDid {
    /// The key pair registered for a purpose in the generated document.
    #[must_use]
    pub fn method_for(&self, purpose: &KeyPurpose) -> Option<&dyn KeyPair> {
        let method = self.did_document.find_verification_method(purpose)?;
        self.key_pairs.get(&method.id).map(AsRef::as_ref)
    }
}

/// Build a DID document from a verification key pair and, optionally, a key
/// agreement key pair.
///
/// With no `did`, the document is rooted at the verification key's own
/// `did:key:<fingerprint>` address. With a `did`, every key-derived
/// identifier in the document is rewritten to the target DID (fragments
/// preserved) before the document is returned.
///
/// With only a key agreement pair, a minimal document holding just that key
/// is produced.
///
/// The supplied key pairs are assigned their `id` and `controller` and
/// returned in the result's `key_pairs` map.
///
/// Pure: performs no I/O.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if no key pair is supplied at all and
/// [`Error::UnsupportedKeyType`] if no deserializer is registered for the
/// verification key's multibase header.
pub fn key_pair_to_did_document(
    registry: &SuiteRegistry,
    did: Option<&str>,
    key_pair: Option<Box<dyn KeyPair>>,
    key_agreement_key_pair: Option<Box<dyn KeyPair>>,
) -> Result<GeneratedDid> {
    let Some(mut verification) = key_pair else {
        let key_agreement = key_agreement_key_pair.ok_or_else(|| {
            Error::InvalidArgument(
                "either \"keyPair\" or \"keyAgreementKeyPair\" is required".into(),
            )
        })?;
        return key_agreement_only(did, key_agreement);
    };

    // the multibase header determines the verification key's concrete suite
    let multikey = verification.public_key_multibase().to_string();
    if !registry.supports(&multikey) {
        let header = multikey.get(..4).unwrap_or(&multikey);
        return Err(Error::UnsupportedKeyType(header.to_string()));
    }

    let fingerprint = verification.fingerprint();
    let key_did = format!("{DID_KEY_PREFIX}{fingerprint}");
    verification.set_id(format!("{key_did}#{fingerprint}"));
    verification.set_controller(key_did.clone());

    let mut context = vec![Kind::String(DID_CONTEXT.to_string())];
    append_context(&mut context, verification.key_type());

    let key_agreement: Option<Box<dyn KeyPair>> = match key_agreement_key_pair {
        Some(mut supplied) => {
            // a user-supplied pair is rooted at its own DID, independently of
            // the verification key
            let fingerprint = supplied.fingerprint();
            let root = format!("{DID_KEY_PREFIX}{fingerprint}");
            supplied.set_id(format!("{root}#{fingerprint}"));
            supplied.set_controller(root);
            Some(supplied)
        }
        None => match derive_key_agreement(verification.as_ref()).map_err(Error::Key)? {
            Some(mut derived) => {
                let fingerprint = derived.fingerprint();
                derived.set_id(format!("{key_did}#{fingerprint}"));
                derived.set_controller(key_did.clone());
                Some(Box::new(derived))
            }
            None => None,
        },
    };

    let verification_node = verification.export_public();
    let method_id = verification_node.id.clone();

    let mut document = Document {
        context,
        id: key_did,
        verification_method: Some(vec![verification_node]),
        authentication: Some(vec![Kind::String(method_id.clone())]),
        assertion_method: Some(vec![Kind::String(method_id.clone())]),
        capability_delegation: Some(vec![Kind::String(method_id.clone())]),
        capability_invocation: Some(vec![Kind::String(method_id.clone())]),
        ..Document::default()
    };

    let mut key_pairs: BTreeMap<String, Box<dyn KeyPair>> = BTreeMap::new();
    if let Some(key_agreement) = key_agreement {
        let node = key_agreement.export_public();
        append_context(&mut document.context, key_agreement.key_type());
        document.key_agreement = Some(vec![Kind::Object(node.clone())]);
        key_pairs.insert(node.id, key_agreement);
    }
    key_pairs.insert(method_id, verification);

    let mut generated = GeneratedDid { did_document: document, key_pairs };
    if let Some(did) = did {
        web_root(&mut generated, did)?;
    }
    Ok(generated)
}

// Terminal branch: a minimal document holding only a key agreement key,
// rooted at the key's own DID.
fn key_agreement_only(did: Option<&str>, mut key_agreement: Box<dyn KeyPair>) -> Result<GeneratedDid> {
    let fingerprint = key_agreement.fingerprint();
    let root = format!("{DID_KEY_PREFIX}{fingerprint}");
    key_agreement.set_id(format!("{root}#{fingerprint}"));
    key_agreement.set_controller(root.clone());

    let node = key_agreement.export_public();
    let mut context = vec![Kind::String(DID_CONTEXT.to_string())];
    append_context(&mut context, key_agreement.key_type());

    let document = Document {
        context,
        id: root,
        key_agreement: Some(vec![Kind::Object(node.clone())]),
        ..Document::default()
    };

    let mut key_pairs: BTreeMap<String, Box<dyn KeyPair>> = BTreeMap::new();
    key_pairs.insert(node.id, key_agreement);

    let mut generated = GeneratedDid { did_document: document, key_pairs };
    if let Some(did) = did {
        web_root(&mut generated, did)?;
    }
    Ok(generated)
}

// Append a suite's context, skipping duplicates and unregistered suites.
fn append_context(context: &mut Vec<Kind<Value>>, suite: &str) {
    if let Some(url) = context_for_suite(suite) {
        if !context.iter().any(|entry| entry.as_str() == Some(url)) {
            context.push(Kind::String(url.to_string()));
        }
    }
}

// Re-root a key-addressed document at a `did:web` DID: rewrite every
// `did:key:`-shaped identifier in the document and the key-pair map.
fn web_root(generated: &mut GeneratedDid, did: &str) -> Result<()> {
    let value = serde_json::to_value(&generated.did_document)?;
    generated.did_document = serde_json::from_value(replace_key_identifiers(value, did))?;

    let key_pairs = std::mem::take(&mut generated.key_pairs);
    for (id, mut key_pair) in key_pairs {
        let id = rewrite_identifier(&id, did);
        let controller = key_pair.controller().map(|c| rewrite_identifier(c, did));
        if let Some(controller) = controller {
            key_pair.set_controller(controller);
        }
        key_pair.set_id(id.clone());
        generated.key_pairs.insert(id, key_pair);
    }
    Ok(())
}

// Generic tree-walk over the document's scalar, array and object fields,
// robust to key-bearing fields this crate does not model.
fn replace_key_identifiers(value: Value, did: &str) -> Value {
    match value {
        Value::String(s) => Value::String(rewrite_identifier(&s, did)),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|item| replace_key_identifiers(item, did)).collect())
        }
        Value::Object(map) => Value::Object(
            map.into_iter().map(|(key, item)| (key, replace_key_identifiers(item, did))).collect(),
        ),
        other => other,
    }
}

// Replace the `did:key:` prefix of an identifier with the target DID,
// preserving any trailing fragment.
fn rewrite_identifier(identifier: &str, did: &str) -> String {
    if !identifier.starts_with(DID_KEY_PREFIX) {
        return identifier.to_string();
    }
    match identifier.split_once('#') {
        Some((_, fragment)) => format!("{did}#{fragment}"),
        None => did.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::key::{ED25519_MULTIKEY_HEADER, Ed25519VerificationKey, X25519KeyAgreementKey};

    const SEED: [u8; 32] = [11u8; 32];

    fn registry() -> SuiteRegistry {
        let mut registry = SuiteRegistry::default();
        registry.register(
            ED25519_MULTIKEY_HEADER,
            Box::new(|multikey| {
                Ed25519VerificationKey::from_multibase(multikey)
                    .map(|kp| Box::new(kp) as Box<dyn KeyPair>)
            }),
        );
        registry
    }

    #[test]
    fn key_rooted_document() {
        let key_pair = Ed25519VerificationKey::generate(Some(&SEED));
        let fingerprint = key_pair.fingerprint();

        let generated =
            key_pair_to_did_document(&registry(), None, Some(Box::new(key_pair)), None)
                .expect("should generate");

        let document = &generated.did_document;
        assert_eq!(document.id, format!("did:key:{fingerprint}"));
        let method = &document.verification_method.as_ref().expect("should have methods")[0];
        assert_eq!(method.id, format!("did:key:{fingerprint}#{fingerprint}"));
        assert_eq!(method.controller, document.id);
    }

    #[test]
    fn web_rooted_document() {
        let key_pair = Ed25519VerificationKey::generate(Some(&SEED));
        let fingerprint = key_pair.fingerprint();
        let did = "did:web:w3c-ccg.github.io:user:alice";

        let generated =
            key_pair_to_did_document(&registry(), Some(did), Some(Box::new(key_pair)), None)
                .expect("should generate");

        let document = &generated.did_document;
        assert_eq!(document.id, did);

        let method_id = format!("{did}#{fingerprint}");
        let method = &document.verification_method.as_ref().expect("should have methods")[0];
        assert_eq!(method.id, method_id);
        assert_eq!(method.controller, did);

        // all four purposes reference the verification method; key agreement
        // is embedded, never referenced
        for purpose in [
            &document.authentication,
            &document.assertion_method,
            &document.capability_delegation,
            &document.capability_invocation,
        ] {
            assert_eq!(purpose.as_ref().expect("should be set"), &vec![Kind::String(
                method_id.clone()
            )]);
        }

        let Some(Kind::Object(agreement)) =
            document.key_agreement.as_ref().and_then(|ka| ka.first())
        else {
            panic!("expected embedded key agreement node");
        };
        assert_eq!(agreement.type_, X25519KeyAgreementKey::SUITE);
        assert_eq!(agreement.controller, did);
        assert!(agreement.id.starts_with(&format!("{did}#")));

        // context: core followed by the two suite contexts, no duplicates
        assert_eq!(
            serde_json::to_value(&document.context).expect("should serialize"),
            json!([
                "https://www.w3.org/ns/did/v1",
                "https://w3id.org/security/suites/ed25519-2020/v1",
                "https://w3id.org/security/suites/x25519-2020/v1"
            ])
        );

        // key pairs are keyed by assigned id and carry their identity fields
        assert_eq!(generated.key_pairs.len(), 2);
        let stored = generated.key_pairs.get(&method_id).expect("verification pair is stored");
        assert_eq!(stored.id(), Some(method_id.as_str()));
        assert_eq!(stored.controller(), Some(did));
    }

    #[test]
    fn key_agreement_only_document() {
        let key_pair = Ed25519VerificationKey::generate(Some(&SEED));
        let agreement = X25519KeyAgreementKey::derive_from_ed25519(key_pair.public_key_multibase())
            .expect("should derive");
        let fingerprint = agreement.fingerprint();

        let generated =
            key_pair_to_did_document(&registry(), None, None, Some(Box::new(agreement)))
                .expect("should generate");

        let document = &generated.did_document;
        assert_eq!(document.id, format!("did:key:{fingerprint}"));
        assert!(document.verification_method.is_none());
        assert!(document.authentication.is_none());
        let Some(Kind::Object(node)) = document.key_agreement.as_ref().and_then(|ka| ka.first())
        else {
            panic!("expected embedded key agreement node");
        };
        // an un-rooted key agreement key controls itself
        assert_eq!(node.controller, document.id);
    }

    #[test]
    fn no_key_pairs() {
        let err = key_pair_to_did_document(&registry(), None, None, None)
            .expect_err("should require a key pair");
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn unregistered_header() {
        let key_pair = Ed25519VerificationKey::generate(Some(&SEED));
        let err = key_pair_to_did_document(
            &SuiteRegistry::default(),
            None,
            Some(Box::new(key_pair)),
            None,
        )
        .expect_err("should reject unregistered header");
        assert!(matches!(err, Error::UnsupportedKeyType(header) if header == "z6Mk"));
    }

    #[test]
    fn rewrites_nested_identifiers() {
        let value = json!({
            "id": "did:key:z6MkFoo",
            "verificationMethod": [{
                "id": "did:key:z6MkFoo#z6MkFoo",
                "controller": "did:key:z6MkFoo"
            }],
            "authentication": ["did:key:z6MkFoo#z6MkFoo"],
            "unrelated": "did:example:untouched"
        });
        let rewritten = replace_key_identifiers(value, "did:web:bar.com");
        assert_eq!(
            rewritten,
            json!({
                "id": "did:web:bar.com",
                "verificationMethod": [{
                    "id": "did:web:bar.com#z6MkFoo",
                    "controller": "did:web:bar.com"
                }],
                "authentication": ["did:web:bar.com#z6MkFoo"],
                "unrelated": "did:example:untouched"
            })
        );
    }
}
