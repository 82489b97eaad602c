//! # DID Web
//!
//! Resolution and generation for the `did:web` method. The `did:web` method
//! uses a web domain's reputation to confer trust: a DID transcodes
//! deterministically to an HTTPS URL and the DID document is fetched from
//! that location.
//!
//! See:
//!
//! - <https://w3c-ccg.github.io/did-method-web>
//! - <https://w3c.github.io/did-resolution>
//!
//! # Example
//!
//! ```no_run
//! use didweb::{DidWebDriver, GenerateRequest, KeyPurpose};
//!
//! # async fn example() -> didweb::Result<()> {
//! let driver = DidWebDriver::new();
//!
//! // generate a document for publication at the URL's well-known location
//! let generated = driver.generate(&GenerateRequest {
//!     url: Some("https://w3c-ccg.github.io/user/alice"),
//!     seed: None,
//! })?;
//! assert_eq!(generated.did_document.id, "did:web:w3c-ccg.github.io:user:alice");
//!
//! // resolve it back (once published)
//! let resource = driver.get("did:web:w3c-ccg.github.io:user:alice").await?;
//! let document = resource.as_document().expect("no fragment was requested");
//! let key = driver.public_method_for(document, &KeyPurpose::Authentication)?;
//! # Ok(())
//! # }
//! ```

mod core;
mod create;
mod document;
mod driver;
mod error;
mod key;
mod url;

pub use self::core::Kind;
pub use self::create::{GeneratedDid, key_pair_to_did_document};
pub use self::document::{
    DID_CONTEXT, Document, KeyPurpose, Resource, Service, VerificationMethod, context_for_suite,
};
pub use self::driver::{
    DidWebDriver, FetchOptions, FromKeyPairRequest, GenerateRequest, HttpClient, HttpGet,
};
pub use self::error::{Error, Result};
pub use self::key::{
    ED25519_MULTIKEY_HEADER, Ed25519VerificationKey, FromMultibase, KeyPair, SuiteRegistry,
    X25519_MULTIKEY_HEADER, X25519KeyAgreementKey,
};
pub use self::url::{
    DID_PREFIX, DidUrl, HttpsUrl, WELL_KNOWN_SUFFIX, assert_did_web, assert_https, assert_https_url,
    decode_paths, did_url_from_parsed, did_url_to_https_url, encode_paths, https_url_to_did_url,
    url_to_did,
};
