//! # Errors
//!
//! Typed errors for `did:web` transcoding, generation and resolution. Every
//! kind is detected before any state is constructed; transport failures pass
//! through unmodified from the HTTP client.

use thiserror::Error;

/// Result type for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by transcoding, document and resolution operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A required parameter is missing or of the wrong shape. Always raised
    /// before any I/O.
    #[error("{0}")]
    InvalidArgument(String),

    /// The value could not be parsed as a URL.
    #[error("invalid URL; received {0:?}")]
    InvalidUrl(String),

    /// The URL parsed but its protocol is not `https:`.
    #[error("\"url\" protocol must be \"https:\"; received {0:?}")]
    InvalidProtocol(String),

    /// The DID scheme is not `did`.
    #[error("scheme must be \"did\"; received {0:?}")]
    InvalidScheme(String),

    /// The DID method is not `web`.
    #[error("DID method must be \"web\"; received {0:?}")]
    UnsupportedMethod(String),

    /// The DID has no domain component.
    #[error("expected domain to be a non-zero length string")]
    MissingDomain,

    /// The DID carries a raw `/`. Hierarchical `did:web` identifiers must
    /// encode paths with `:`, never a literal slash.
    #[error("expected domain to not contain a path; received {0:?}")]
    DomainContainsPath(String),

    /// The resolved host is not on the configured allow list. Raised before
    /// any network call.
    #[error("domain {0:?} is not allowed")]
    DomainNotAllowed(String),

    /// No key deserializer is registered for the encountered multibase
    /// header, or the verification suite has no key-agreement derivation
    /// where one is required.
    #[error("unsupported key type; no deserializer registered for multibase header {0:?}")]
    UnsupportedKeyType(String),

    /// The requested node id does not occur in the document.
    #[error("node {0:?} not found in DID document")]
    NodeNotFound(String),

    /// The purpose array is absent, empty, or references a node that does
    /// not exist.
    #[error("no verification method found for purpose {0:?}")]
    PurposeNotFound(String),

    /// The served document does not describe the requested DID. A forgery or
    /// misconfiguration signal.
    #[error("resolved document id {document_id:?} does not match DID {did:?}")]
    DocumentMismatch {
        /// The DID that was requested (query and fragment removed).
        did: String,
        /// The `id` the served document claims.
        document_id: String,
    },

    /// The fetched body could not be read as a DID document.
    #[error("failed to deserialize DID document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    /// Transport failure surfaced unmodified from the injected HTTP client.
    /// No retry layer is applied.
    #[error(transparent)]
    Fetch(anyhow::Error),

    /// Malformed key material.
    #[error("invalid key material: {0}")]
    Key(anyhow::Error),
}
