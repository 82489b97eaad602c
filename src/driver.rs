//! # Resolver Driver
//!
//! The orchestrating façade for the `did:web` method: transcodes a DID to
//! its HTTPS location, enforces the domain allow list, fetches the document
//! over the injected HTTP client and dereferences fragments.
//!
//! The driver holds no per-call state; a single instance is safely shared by
//! concurrent callers. Suite registration takes `&mut self`, so
//! configuration happens before concurrent use.

use std::future::Future;
use std::time::Duration;

use anyhow::bail;
use serde_json::Value;
use tracing::{debug, warn};

use crate::create::{GeneratedDid, key_pair_to_did_document};
use crate::document::{Document, KeyPurpose, Resource, VerificationMethod};
use crate::error::{Error, Result};
use crate::key::{
    ED25519_MULTIKEY_HEADER, Ed25519VerificationKey, FromMultibase, KeyPair, SuiteRegistry,
};
use crate::url::{assert_https_url, did_url_to_https_url, did_url_from_parsed, host_with_port};

/// Options for document fetches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchOptions {
    /// Maximum body size in bytes for DID documents.
    pub size: usize,

    /// Request timeout.
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            size: 8192,
            timeout: Duration::from_millis(5000),
        }
    }
}

/// A fetch-capable HTTP client returning parsed JSON bodies.
///
/// The driver always passes the merge of its configured defaults and any
/// per-call override. Implementations enforce `size` and `timeout`; their
/// failures (network error, non-success status, timeout, oversize body)
/// surface unmodified to the driver's caller.
pub trait HttpClient: Send + Sync {
    /// Fetch `url` and return the parsed JSON body.
    fn get(&self, url: &str, options: &FetchOptions)
    -> impl Future<Output = anyhow::Result<Value>> + Send;
}

/// The bundled [`reqwest`]-backed [`HttpClient`].
#[derive(Clone, Debug, Default)]
pub struct HttpGet {
    client: reqwest::Client,
}

impl HttpGet {
    /// Create a client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl HttpClient for HttpGet {
    async fn get(&self, url: &str, options: &FetchOptions) -> anyhow::Result<Value> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(options.timeout)
            .send()
            .await?;
        let response = response.error_for_status()?;
        let body = response.bytes().await?;
        if body.len() > options.size {
            bail!("response body exceeds {} bytes", options.size);
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Request parameters for [`DidWebDriver::generate`].
#[derive(Clone, Copy, Debug, Default)]
pub struct GenerateRequest<'a> {
    /// The HTTPS URL the document will be published under. Without a URL the
    /// document is rooted at the generated key's own DID.
    pub url: Option<&'a str>,

    /// 32-byte seed for deterministic key generation.
    pub seed: Option<&'a [u8; 32]>,
}

/// Request parameters for [`DidWebDriver::from_key_pair`].
#[derive(Default)]
pub struct FromKeyPairRequest<'a> {
    /// The HTTPS URL the document will be published under.
    pub url: Option<&'a str>,

    /// The signing/verification key pair.
    pub key_pair: Option<Box<dyn KeyPair>>,

    /// The key agreement key pair. Derived from the verification key when
    /// omitted.
    pub key_agreement_key_pair: Option<Box<dyn KeyPair>>,
}

/// `did:web` method driver.
///
/// Resolves `did:web` DIDs and DID URLs to documents or individual key
/// nodes, and generates documents (with their key pairs) for publication.
pub struct DidWebDriver<H = HttpGet> {
    http: H,
    fetch_options: FetchOptions,
    allow_list: Vec<String>,
    suites: SuiteRegistry,
}

impl DidWebDriver<HttpGet> {
    /// Create a driver using the bundled HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(HttpGet::new())
    }
}

impl Default for DidWebDriver<HttpGet> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: HttpClient> DidWebDriver<H> {
    /// Create a driver over an injected HTTP client.
    ///
    /// The Ed25519 multikey suite is pre-registered; further suites plug in
    /// through [`Self::use_suite`].
    #[must_use]
    pub fn with_client(http: H) -> Self {
        let mut suites = SuiteRegistry::default();
        suites.register(
            ED25519_MULTIKEY_HEADER,
            Box::new(|multikey| {
                Ed25519VerificationKey::from_multibase(multikey)
                    .map(|kp| Box::new(kp) as Box<dyn KeyPair>)
            }),
        );
        Self {
            http,
            fetch_options: FetchOptions::default(),
            allow_list: Vec::new(),
            suites,
        }
    }

    /// Replace the default fetch options.
    #[must_use]
    pub const fn fetch_options(mut self, fetch_options: FetchOptions) -> Self {
        self.fetch_options = fetch_options;
        self
    }

    /// Restrict resolution and generation to the given `host` or
    /// `host:port` values. Matching is exact; an empty list allows any
    /// domain.
    #[must_use]
    pub fn allow_list<T: Into<String>>(mut self, allow_list: impl IntoIterator<Item = T>) -> Self {
        self.allow_list = allow_list.into_iter().map(Into::into).collect();
        self
    }

    /// The DID method this driver serves.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        "web"
    }

    /// Register a key-suite deserializer under a multibase header prefix.
    ///
    /// Registering a header twice replaces the earlier deserializer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the header is not exactly four
    /// characters.
    pub fn use_suite(
        &mut self, multibase_multikey_header: &str, from_multibase: FromMultibase,
    ) -> Result<()> {
        if multibase_multikey_header.chars().count() != 4 {
            return Err(Error::InvalidArgument(
                "\"multibaseMultikeyHeader\" must be a 4-character string".into(),
            ));
        }
        self.suites.register(multibase_multikey_header, from_multibase);
        Ok(())
    }

    /// Deserialize a key pair from a `publicKeyMultibase` value using the
    /// registered suites.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedKeyType`] if no deserializer is
    /// registered for the value's header and [`Error::Key`] if the
    /// deserializer rejects the value.
    pub fn key_pair_from_multibase(&self, public_key_multibase: &str) -> Result<Box<dyn KeyPair>> {
        let Some(from_multibase) = self.suites.deserializer(public_key_multibase) else {
            let header = public_key_multibase.get(..4).unwrap_or(public_key_multibase);
            return Err(Error::UnsupportedKeyType(header.to_string()));
        };
        from_multibase(public_key_multibase).map_err(Error::Key)
    }

    /// Resolve a `did:web` DID (or DID URL) to its document, or to a single
    /// node when the DID URL carries a fragment.
    ///
    /// # Errors
    ///
    /// Fails as [`crate::did_url_to_https_url`] fails for malformed input;
    /// with [`Error::DomainNotAllowed`] before any network call for a domain
    /// off the allow list; with [`Error::DocumentMismatch`] when the served
    /// document's `id` is not the requested DID; with
    /// [`Error::NodeNotFound`] for an unresolvable fragment. Transport
    /// errors surface unmodified.
    pub async fn get(&self, did: &str) -> Result<Resource> {
        self.get_with_options(did, None).await
    }

    /// [`Self::get`] with per-call fetch options overriding the configured
    /// defaults.
    ///
    /// # Errors
    ///
    /// Fails as [`Self::get`] fails.
    pub async fn get_with_options(
        &self, did: &str, fetch_options: Option<FetchOptions>,
    ) -> Result<Resource> {
        if did.is_empty() {
            return Err(Error::InvalidArgument("\"did\" must be a non-zero length string".into()));
        }
        let target = did_url_to_https_url(did)?;
        self.assert_domain(&target.domain)?;

        let options = fetch_options.unwrap_or(self.fetch_options);
        debug!(url = %target.url_without_fragment, "resolving DID document");
        let data =
            self.http.get(&target.url_without_fragment, &options).await.map_err(Error::Fetch)?;
        let document: Document = serde_json::from_value(data)?;

        if document.id != target.did {
            return Err(Error::DocumentMismatch {
                did: target.did,
                document_id: document.id,
            });
        }

        match &target.fragment {
            Some(fragment) => document.get_node(&format!("{}#{fragment}", document.id)),
            None => Ok(Resource::Document(document)),
        }
    }

    /// Generate a new `did:web` document and its backing key pairs.
    ///
    /// The verification key is a fresh Ed25519 pair, deterministic when a
    /// seed is given; the key agreement pair is derived from it. Performs no
    /// I/O — publishing the document at the URL's well-known location is the
    /// caller's responsibility.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DomainNotAllowed`] (before any key material is
    /// produced) for a URL off the allow list, and fails as
    /// [`key_pair_to_did_document`] fails.
    pub fn generate(&self, request: &GenerateRequest<'_>) -> Result<GeneratedDid> {
        let did = match request.url {
            Some(url) => Some(self.assert_allowed_url(url)?),
            None => None,
        };
        let key_pair = Ed25519VerificationKey::generate(request.seed);
        key_pair_to_did_document(&self.suites, did.as_deref(), Some(Box::new(key_pair)), None)
    }

    /// Build a `did:web` document from caller-supplied key pairs.
    ///
    /// The supplied pairs are assigned their `id` and `controller` and
    /// returned in the result's `key_pairs` map. Performs no I/O.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DomainNotAllowed`] for a URL off the allow list, and
    /// fails as [`key_pair_to_did_document`] fails.
    pub fn from_key_pair(&self, request: FromKeyPairRequest<'_>) -> Result<GeneratedDid> {
        let did = match request.url {
            Some(url) => Some(self.assert_allowed_url(url)?),
            None => None,
        };
        key_pair_to_did_document(
            &self.suites,
            did.as_deref(),
            request.key_pair,
            request.key_agreement_key_pair,
        )
    }

    /// The public key node registered for a purpose in a DID document.
    ///
    /// Useful in conjunction with a [`Self::get`] call: resolve a document,
    /// then pick the key for `authentication`, `keyAgreement` and so on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PurposeNotFound`] if the purpose array is absent,
    /// empty or references a node that does not exist.
    pub fn public_method_for(
        &self, did_document: &Document, purpose: &KeyPurpose,
    ) -> Result<VerificationMethod> {
        did_document
            .find_verification_method(purpose)
            .ok_or_else(|| Error::PurposeNotFound(purpose.to_string()))
    }

    // Check an HTTPS URL against the allow list and transcode it, returning
    // the DID the document must be rooted at.
    fn assert_allowed_url(&self, url: &str) -> Result<String> {
        let parsed = assert_https_url(url)?;
        self.assert_domain(&host_with_port(&parsed))?;
        Ok(did_url_from_parsed(&parsed)?.did)
    }

    fn assert_domain(&self, domain: &str) -> Result<()> {
        if self.allow_list.is_empty() || self.allow_list.iter().any(|allowed| allowed == domain) {
            return Ok(());
        }
        warn!(%domain, "domain is not on the allow list");
        Err(Error::DomainNotAllowed(domain.to_string()))
    }
}
