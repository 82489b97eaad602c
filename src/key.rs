//! # Key Pairs
//!
//! Multikey key pairs and pluggable key-suite registration.
//!
//! Key material is carried as multibase-encoded multikey strings. The first
//! four characters of a `publicKeyMultibase` value identify the suite
//! (`z6Mk` for Ed25519, `z6LS` for X25519); suites register a deserializer
//! under that header with a driver and new suites plug in without touching
//! the document composer.

use std::collections::HashMap;
use std::fmt::Debug;

use anyhow::{Result, anyhow, bail};
use curve25519_dalek::edwards::CompressedEdwardsY;
use ed25519_dalek::{SigningKey, VerifyingKey};
use multibase::Base;
use rand::rngs::OsRng;

use crate::document::VerificationMethod;

/// Multicodec header for an Ed25519 public key.
pub const ED25519_CODEC: [u8; 2] = [0xed, 0x01];

/// Multicodec header for an X25519 public key.
pub const X25519_CODEC: [u8; 2] = [0xec, 0x01];

/// Multibase header prefix of an Ed25519 multikey.
pub const ED25519_MULTIKEY_HEADER: &str = "z6Mk";

/// Multibase header prefix of an X25519 multikey.
pub const X25519_MULTIKEY_HEADER: &str = "z6LS";

/// An asymmetric key pair usable in a DID document.
///
/// Implementations expose their public half as a multikey and export to a
/// public key node. The document composer assigns `id` and `controller` onto
/// the object as a deliberate side effect of generation: the same object,
/// now carrying its identity fields, is handed back in the composer's
/// `key_pairs` map keyed by the assigned id.
pub trait KeyPair: Send + Sync + Debug {
    /// Key-suite type name, e.g. `Ed25519VerificationKey2020`.
    fn key_type(&self) -> &str;

    /// The multibase-encoded public key.
    fn public_key_multibase(&self) -> &str;

    /// Stable public-key fingerprint, used as the fragment identifier of the
    /// exported node.
    fn fingerprint(&self) -> String;

    /// The assigned key id, once rooted in a document.
    fn id(&self) -> Option<&str>;

    /// Assign the key id.
    fn set_id(&mut self, id: String);

    /// The DID controlling this key, once rooted in a document.
    fn controller(&self) -> Option<&str>;

    /// Assign the controller.
    fn set_controller(&mut self, controller: String);

    /// Export the public key node for inclusion in a DID document.
    fn export_public(&self) -> VerificationMethod;
}

/// Deserialize a key pair from a `publicKeyMultibase` value. Registered per
/// multibase header with [`SuiteRegistry::register`].
pub type FromMultibase = Box<dyn Fn(&str) -> Result<Box<dyn KeyPair>> + Send + Sync>;

/// Key-suite deserializers keyed by 4-character multibase header prefix.
///
/// Populated at driver configuration time and read-only during resolution;
/// registering a header twice is a last-write-wins overwrite.
#[derive(Default)]
pub struct SuiteRegistry {
    deserializers: HashMap<String, FromMultibase>,
}

impl SuiteRegistry {
    /// Register a deserializer for a multibase header.
    pub fn register(&mut self, header: impl Into<String>, from_multibase: FromMultibase) {
        self.deserializers.insert(header.into(), from_multibase);
    }

    /// Look up the deserializer for a multikey by its header prefix.
    #[must_use]
    pub fn deserializer(&self, multikey: &str) -> Option<&FromMultibase> {
        self.deserializers.get(multikey.get(..4)?)
    }

    /// Whether a deserializer is registered for the multikey's header.
    #[must_use]
    pub fn supports(&self, multikey: &str) -> bool {
        self.deserializer(multikey).is_some()
    }
}

/// An Ed25519 signing/verification key pair (`Ed25519VerificationKey2020`).
#[derive(Clone, Debug)]
pub struct Ed25519VerificationKey {
    id: Option<String>,
    controller: Option<String>,
    public_key_multibase: String,
    signing_key: Option<SigningKey>,
}

impl Ed25519VerificationKey {
    /// Suite type name.
    pub const SUITE: &'static str = "Ed25519VerificationKey2020";

    /// Generate a new key pair, deterministically when a seed is provided.
    #[must_use]
    pub fn generate(seed: Option<&[u8; 32]>) -> Self {
        let signing_key =
            seed.map_or_else(|| SigningKey::generate(&mut OsRng), SigningKey::from_bytes);
        let multikey = encode_multikey(&ED25519_CODEC, signing_key.verifying_key().as_bytes());
        Self {
            id: None,
            controller: None,
            public_key_multibase: multikey,
            signing_key: Some(signing_key),
        }
    }

    /// Import the public half of a key pair from its multikey.
    ///
    /// # Errors
    ///
    /// Fails if the value is not base58btc, does not carry the Ed25519
    /// multicodec header, or is not a valid public key.
    pub fn from_multibase(public_key_multibase: &str) -> Result<Self> {
        let key_bytes = decode_multikey(public_key_multibase, &ED25519_CODEC)?;
        let key_bytes: [u8; 32] =
            key_bytes.try_into().map_err(|_| anyhow!("Ed25519 public key must be 32 bytes"))?;
        VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| anyhow!("invalid Ed25519 public key: {e}"))?;
        Ok(Self {
            id: None,
            controller: None,
            public_key_multibase: public_key_multibase.to_string(),
            signing_key: None,
        })
    }

    /// Whether the pair holds its secret half.
    #[must_use]
    pub const fn has_signing_key(&self) -> bool {
        self.signing_key.is_some()
    }
}

impl KeyPair for Ed25519VerificationKey {
    fn key_type(&self) -> &str {
        Self::SUITE
    }

    fn public_key_multibase(&self) -> &str {
        &self.public_key_multibase
    }

    fn fingerprint(&self) -> String {
        self.public_key_multibase.clone()
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn controller(&self) -> Option<&str> {
        self.controller.as_deref()
    }

    fn set_controller(&mut self, controller: String) {
        self.controller = Some(controller);
    }

    fn export_public(&self) -> VerificationMethod {
        VerificationMethod {
            context: None,
            id: self.id.clone().unwrap_or_default(),
            type_: Self::SUITE.to_string(),
            controller: self.controller.clone().unwrap_or_default(),
            public_key_multibase: Some(self.public_key_multibase.clone()),
            public_key_base58: None,
        }
    }
}

/// An X25519 key agreement key (`X25519KeyAgreementKey2020`).
#[derive(Clone, Debug)]
pub struct X25519KeyAgreementKey {
    id: Option<String>,
    controller: Option<String>,
    public_key_multibase: String,
}

impl X25519KeyAgreementKey {
    /// Suite type name.
    pub const SUITE: &'static str = "X25519KeyAgreementKey2020";

    /// Derive the key agreement key from an Ed25519 verification key.
    ///
    /// The Edwards point is converted to its birationally equivalent
    /// Montgomery form.
    ///
    /// # Errors
    ///
    /// Fails if the multikey is not a valid Ed25519 public key.
    pub fn derive_from_ed25519(ed25519_multikey: &str) -> Result<Self> {
        let key_bytes = decode_multikey(ed25519_multikey, &ED25519_CODEC)?;
        let compressed = CompressedEdwardsY::from_slice(&key_bytes)
            .map_err(|_| anyhow!("Ed25519 public key must be 32 bytes"))?;
        let Some(point) = compressed.decompress() else {
            bail!("Ed25519 public key is not a valid curve point");
        };
        let montgomery = point.to_montgomery();
        Ok(Self {
            id: None,
            controller: None,
            public_key_multibase: encode_multikey(&X25519_CODEC, montgomery.as_bytes()),
        })
    }

    /// Import the public half of a key pair from its multikey.
    ///
    /// # Errors
    ///
    /// Fails if the value is not base58btc or does not carry the X25519
    /// multicodec header.
    pub fn from_multibase(public_key_multibase: &str) -> Result<Self> {
        let key_bytes = decode_multikey(public_key_multibase, &X25519_CODEC)?;
        if key_bytes.len() != 32 {
            bail!("X25519 public key must be 32 bytes");
        }
        Ok(Self {
            id: None,
            controller: None,
            public_key_multibase: public_key_multibase.to_string(),
        })
    }
}

impl KeyPair for X25519KeyAgreementKey {
    fn key_type(&self) -> &str {
        Self::SUITE
    }

    fn public_key_multibase(&self) -> &str {
        &self.public_key_multibase
    }

    fn fingerprint(&self) -> String {
        self.public_key_multibase.clone()
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn controller(&self) -> Option<&str> {
        self.controller.as_deref()
    }

    fn set_controller(&mut self, controller: String) {
        self.controller = Some(controller);
    }

    fn export_public(&self) -> VerificationMethod {
        VerificationMethod {
            context: None,
            id: self.id.clone().unwrap_or_default(),
            type_: Self::SUITE.to_string(),
            controller: self.controller.clone().unwrap_or_default(),
            public_key_multibase: Some(self.public_key_multibase.clone()),
            public_key_base58: None,
        }
    }
}

/// Derive the key agreement pair defined for a verification suite.
///
/// Each supported verification suite maps to exactly one key agreement
/// suite; a suite with no defined derivation yields `None`.
pub(crate) fn derive_key_agreement(key_pair: &dyn KeyPair) -> Result<Option<X25519KeyAgreementKey>> {
    match key_pair.key_type() {
        Ed25519VerificationKey::SUITE => Ok(Some(X25519KeyAgreementKey::derive_from_ed25519(
            key_pair.public_key_multibase(),
        )?)),
        _ => Ok(None),
    }
}

// Encode a multicodec-prefixed key as a base58btc multibase string.
fn encode_multikey(codec: &[u8; 2], key: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(2 + key.len());
    bytes.extend_from_slice(codec);
    bytes.extend_from_slice(key);
    multibase::encode(Base::Base58Btc, &bytes)
}

// Decode a multibase string and strip the expected multicodec header.
fn decode_multikey(multikey: &str, codec: &[u8; 2]) -> Result<Vec<u8>> {
    let (base, bytes) =
        multibase::decode(multikey).map_err(|e| anyhow!("failed to decode multibase key: {e}"))?;
    if base != Base::Base58Btc {
        bail!("multibase base is not Base58Btc");
    }
    if bytes.len() < 2 || bytes[..2] != *codec {
        bail!("unexpected multicodec header");
    }
    Ok(bytes[2..].to_vec())
}
