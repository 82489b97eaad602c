//! # DID Document
//!
//! A DID Document is a JSON-LD document that contains information related to
//! a DID: verification methods, key agreement keys, verification
//! relationships and service endpoints.
//!
//! See:
//!
//! - <https://www.w3.org/TR/did-core>

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::Kind;
use crate::error::{Error, Result};

/// The core DID context. First entry of every document's `@context`.
pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

/// Resolve the JSON-LD context for a key-suite type.
///
/// The table is fixed at compile time and never mutated; suites without an
/// entry fall back to the containing document's `@context` when a node is
/// dereferenced.
#[must_use]
pub fn context_for_suite(suite: &str) -> Option<&'static str> {
    match suite {
        "Ed25519VerificationKey2020" => Some("https://w3id.org/security/suites/ed25519-2020/v1"),
        "Ed25519VerificationKey2018" => Some("https://w3id.org/security/suites/ed25519-2018/v1"),
        "X25519KeyAgreementKey2020" => Some("https://w3id.org/security/suites/x25519-2020/v1"),
        "X25519KeyAgreementKey2019" => Some("https://w3id.org/security/suites/x25519-2019/v1"),
        _ => None,
    }
}

/// DID Document.
///
/// Purpose arrays hold either id references into `verification_method` or
/// embedded nodes. Unknown top-level fields are preserved in `additional` so
/// a fetched document round-trips unmodified.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// The JSON-LD context of the DID document.
    #[serde(rename = "@context")]
    pub context: Vec<Kind<Value>>,

    /// The DID of the document subject.
    pub id: String,

    /// Verification methods (public key nodes) for the DID subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<Vec<VerificationMethod>>,

    /// How the DID subject is expected to be authenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Vec<Kind<VerificationMethod>>>,

    /// How the DID subject is expected to express claims.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_method: Option<Vec<Kind<VerificationMethod>>>,

    /// How the DID subject delegates cryptographic capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_delegation: Option<Vec<Kind<VerificationMethod>>>,

    /// How the DID subject invokes a cryptographic capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_invocation: Option<Vec<Kind<VerificationMethod>>>,

    /// Keys used to establish shared secrets with the DID subject. Key
    /// agreement is structurally separate from the signing purposes above
    /// and never referenced by them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_agreement: Option<Vec<Kind<VerificationMethod>>>,

    /// Ways of communicating with the DID subject or related entities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<Vec<Service>>,

    /// Top-level fields not modelled above, preserved verbatim.
    #[serde(flatten, default, skip_serializing_if = "HashMap::is_empty")]
    pub additional: HashMap<String, Value>,
}

impl Document {
    /// Locate the node with the given full `id` and return a copy with its
    /// JSON-LD `@context` attached.
    ///
    /// `verification_method` is searched first, then embedded nodes in
    /// `key_agreement` and the purpose arrays, then services, then any other
    /// top-level entry. The returned node is a defensive copy; its
    /// `@context` comes from the suite context table, falling back to this
    /// document's `@context` for unregistered types.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if no node carries the id.
    pub fn get_node(&self, id: &str) -> Result<Resource> {
        if let Some(methods) = &self.verification_method {
            if let Some(vm) = methods.iter().find(|vm| vm.id == id) {
                return Ok(Resource::VerificationMethod(self.node_with_context(vm)));
            }
        }

        let relationships = [
            &self.key_agreement,
            &self.authentication,
            &self.assertion_method,
            &self.capability_delegation,
            &self.capability_invocation,
        ];
        for entries in relationships.into_iter().flatten() {
            for entry in entries {
                if let Kind::Object(vm) = entry {
                    if vm.id == id {
                        return Ok(Resource::VerificationMethod(self.node_with_context(vm)));
                    }
                }
            }
        }

        if let Some(services) = &self.service {
            if let Some(service) = services.iter().find(|s| s.id == id) {
                let mut service = service.clone();
                service.context = Some(self.context_value());
                return Ok(Resource::Service(service));
            }
        }

        // any remaining top-level entry holding a keyed node or array of
        // keyed nodes
        for value in self.additional.values() {
            let candidates: &[Value] = match value {
                Value::Array(items) => items,
                other => std::slice::from_ref(other),
            };
            for candidate in candidates {
                if candidate.get("id").and_then(Value::as_str) == Some(id) {
                    if let Ok(vm) = serde_json::from_value::<VerificationMethod>(candidate.clone())
                    {
                        return Ok(Resource::VerificationMethod(self.node_with_context(&vm)));
                    }
                    if let Ok(mut service) = serde_json::from_value::<Service>(candidate.clone()) {
                        service.context = Some(self.context_value());
                        return Ok(Resource::Service(service));
                    }
                }
            }
        }

        Err(Error::NodeNotFound(id.to_string()))
    }

    /// Locate a key node by its id fragment (`<document id>#<fragment>`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if no node carries the id.
    pub fn get_key(&self, key_id_fragment: &str) -> Result<Resource> {
        self.get_node(&format!("{}#{key_id_fragment}", self.id))
    }

    /// Find the first verification method registered for a purpose.
    ///
    /// A string entry in the purpose array is resolved against
    /// `verification_method` and embedded `key_agreement` nodes; an embedded
    /// entry is returned directly. Returns `None` when the purpose array is
    /// absent, empty, or its reference dangles.
    #[must_use]
    pub fn find_verification_method(&self, purpose: &KeyPurpose) -> Option<VerificationMethod> {
        let entries = match purpose {
            KeyPurpose::VerificationMethod => {
                return self.verification_method.as_ref()?.first().cloned();
            }
            KeyPurpose::Authentication => self.authentication.as_ref(),
            KeyPurpose::AssertionMethod => self.assertion_method.as_ref(),
            KeyPurpose::CapabilityDelegation => self.capability_delegation.as_ref(),
            KeyPurpose::CapabilityInvocation => self.capability_invocation.as_ref(),
            KeyPurpose::KeyAgreement => self.key_agreement.as_ref(),
        }?;

        match entries.first()? {
            Kind::Object(vm) => Some(vm.clone()),
            Kind::String(id) => self.resolve_reference(id),
        }
    }

    // Resolve an id reference to a node in `verification_method` or an
    // embedded `key_agreement` node.
    fn resolve_reference(&self, id: &str) -> Option<VerificationMethod> {
        if let Some(methods) = &self.verification_method {
            if let Some(vm) = methods.iter().find(|vm| vm.id == id) {
                return Some(vm.clone());
            }
        }
        self.key_agreement.as_ref()?.iter().find_map(|entry| match entry {
            Kind::Object(vm) if vm.id == id => Some(vm.clone()),
            _ => None,
        })
    }

    fn node_with_context(&self, vm: &VerificationMethod) -> VerificationMethod {
        let mut node = vm.clone();
        node.context = Some(context_for_suite(&node.type_).map_or_else(
            || self.context_value(),
            |context| Value::String(context.to_string()),
        ));
        node
    }

    fn context_value(&self) -> Value {
        serde_json::to_value(&self.context).unwrap_or_default()
    }
}

/// A verification method: a public key node usable for a cryptographic
/// purpose and referenced by `id`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// Attached when the node is returned on its own, outside the context of
    /// its containing document.
    #[serde(rename = "@context", skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// The DID URL that identifies the verification method.
    pub id: String,

    /// Key-suite type, e.g. `Ed25519VerificationKey2020`. Determines the
    /// JSON-LD context attached on dereference.
    #[serde(rename = "type")]
    pub type_: String,

    /// The DID of the controller of the verification method.
    pub controller: String,

    /// The public key as a multibase string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<String>,

    /// The public key in base58, used by the 2018/2019 suites.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_base58: Option<String>,
}

impl VerificationMethod {
    /// Infer the DID from the key ID.
    #[must_use]
    pub fn did(&self) -> String {
        self.id.split('#').next().unwrap_or_default().to_string()
    }
}

/// A Service expresses a way of communicating with the DID subject or
/// associated entities.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Attached when the node is returned on its own.
    #[serde(rename = "@context", skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// A URI unique to the service.
    pub id: String,

    /// The service type. SHOULD be registered in the DID Specification
    /// Registries.
    #[serde(rename = "type")]
    pub type_: String,

    /// One or more endpoints for the service.
    pub service_endpoint: Value,
}

/// A resource returned by dereferencing a DID URL: the whole document or a
/// single node from it.
#[allow(clippy::large_enum_variant)]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Resource {
    /// The whole DID document.
    Document(Document),

    /// A single verification method or key agreement node.
    VerificationMethod(VerificationMethod),

    /// A single service node.
    Service(Service),
}

impl Resource {
    /// The verification method, if the resource is one.
    #[must_use]
    pub const fn as_verification_method(&self) -> Option<&VerificationMethod> {
        match self {
            Self::VerificationMethod(vm) => Some(vm),
            _ => None,
        }
    }

    /// The document, if the resource is one.
    #[must_use]
    pub const fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(document) => Some(document),
            _ => None,
        }
    }
}

/// The purpose key material is used for.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Hash, PartialEq, Eq)]
pub enum KeyPurpose {
    /// The document's `verification_method` field.
    VerificationMethod,

    /// The document's `authentication` field.
    Authentication,

    /// The document's `assertion_method` field.
    AssertionMethod,

    /// The document's `key_agreement` field.
    KeyAgreement,

    /// The document's `capability_invocation` field.
    CapabilityInvocation,

    /// The document's `capability_delegation` field.
    CapabilityDelegation,
}

impl Display for KeyPurpose {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VerificationMethod => write!(f, "verificationMethod"),
            Self::Authentication => write!(f, "authentication"),
            Self::AssertionMethod => write!(f, "assertionMethod"),
            Self::KeyAgreement => write!(f, "keyAgreement"),
            Self::CapabilityInvocation => write!(f, "capabilityInvocation"),
            Self::CapabilityDelegation => write!(f, "capabilityDelegation"),
        }
    }
}
