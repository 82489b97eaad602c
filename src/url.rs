//! # URL Transcoding
//!
//! Deterministic, bidirectional mapping between HTTPS URLs and `did:web`
//! identifiers.
//!
//! A `did:web` DID encodes the document location in its method-specific id:
//! the host (with any port percent-encoded) followed by colon-delimited,
//! percent-encoded path segments. A DID without path segments maps to the
//! well-known location `https://<host>/.well-known/did.json`; a DID with
//! path segments maps to `https://<host>/<path>/did.json`. Query strings and
//! fragments pass through both directions verbatim.

use std::fmt::Write as _;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Prefix shared by all `did:web` identifiers.
pub const DID_PREFIX: &str = "did:web:";

/// Document location used when a DID carries no path segments.
pub const WELL_KNOWN_SUFFIX: &str = ".well-known/did.json";

/// Document name appended to a DID's decoded path segments.
pub const DOCUMENT_SUFFIX: &str = "did.json";

// The set escaped by `encodeURIComponent`: everything except alphanumerics
// and `- _ . ! ~ * ' ( )`. DID path segments must round-trip through this
// encoding.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A `did:web` DID URL derived from an HTTPS URL.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct DidUrl {
    /// The DID without query or fragment. This is the value used as a
    /// document `id`.
    pub did: String,

    /// The DID URL including any query and fragment from the source URL.
    pub full_url: String,
}

/// The HTTPS location of the document addressed by a `did:web` DID URL,
/// decomposed for dereferencing.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct HttpsUrl {
    /// The DID without query or fragment.
    pub did: String,

    /// Decoded `host` or `host:port`. This is the value checked against a
    /// driver's allow list.
    pub domain: String,

    /// `https://<domain>`.
    pub origin: String,

    /// Origin plus decoded path segments and the `did.json` or well-known
    /// suffix. No query or fragment.
    pub base_url: String,

    /// [`Self::base_url`] plus the query string. This is the URL fetched
    /// during resolution.
    pub url_without_fragment: String,

    /// [`Self::base_url`] plus query string and fragment.
    pub full_url: String,

    /// Raw query string from the DID URL, without the leading `?`.
    pub search: Option<String>,

    /// Decoded query parameters.
    pub search_params: Vec<(String, String)>,

    /// Fragment from the DID URL, without the leading `#`.
    pub fragment: Option<String>,
}

/// Parse a string as a URL and verify its protocol is `https:`.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] if the value cannot be parsed and
/// [`Error::InvalidProtocol`] if the parsed scheme is not `https`.
pub fn assert_https_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|_| Error::InvalidUrl(url.to_string()))?;
    assert_https(&parsed)?;
    Ok(parsed)
}

/// Verify an already-parsed URL has the `https:` protocol.
///
/// # Errors
///
/// Returns [`Error::InvalidProtocol`] if the scheme is not `https`.
pub fn assert_https(url: &Url) -> Result<()> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(Error::InvalidProtocol(format!("{}:", url.scheme())))
    }
}

/// Verify a value is a syntactically well-formed `did:web` DID or DID URL.
///
/// The check is purely syntactic: scheme must be `did`, method must be
/// `web`, the domain must be non-empty and must not contain a raw `/`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`], [`Error::InvalidScheme`],
/// [`Error::UnsupportedMethod`], [`Error::MissingDomain`] or
/// [`Error::DomainContainsPath`] accordingly.
pub fn assert_did_web(did: &str) -> Result<()> {
    if did.is_empty() {
        return Err(Error::InvalidArgument("\"did\" must be a non-zero length string".into()));
    }
    let mut parts = did.splitn(3, ':');
    let scheme = parts.next().unwrap_or_default();
    let method = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default();

    if scheme != "did" {
        return Err(Error::InvalidScheme(scheme.to_string()));
    }
    if method != "web" {
        return Err(Error::UnsupportedMethod(method.to_string()));
    }
    let domain = rest.split(':').next().unwrap_or_default();
    if domain.is_empty() {
        return Err(Error::MissingDomain);
    }
    if domain.contains('/') {
        return Err(Error::DomainContainsPath(domain.to_string()));
    }
    Ok(())
}

/// Encode a URL path as colon-delimited DID path segments.
///
/// Strips a trailing `.well-known/did.json` or `did.json` suffix, splits the
/// remainder on `/`, percent-encodes each segment and joins with `:`. The
/// result carries a leading `:`, or is empty for a root path. Left inverse of
/// [`decode_paths`] composed with the `did.json` suffix.
#[must_use]
pub fn encode_paths(pathname: &str) -> String {
    let mut path = pathname.trim_end_matches('/');
    if let Some(stripped) = path.strip_suffix("/.well-known/did.json") {
        path = stripped;
    } else if let Some(stripped) = path.strip_suffix("/did.json") {
        path = stripped;
    }

    let segments = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| utf8_percent_encode(segment, COMPONENT).to_string())
        .collect::<Vec<_>>();

    if segments.is_empty() {
        String::new()
    } else {
        format!(":{}", segments.join(":"))
    }
}

/// Decode DID path segments into the path suffix of the document URL.
///
/// No segments map to the well-known location; otherwise each segment is
/// percent-decoded, joined with `/`, and `did.json` is appended.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] if a segment does not percent-decode to
/// valid UTF-8.
pub fn decode_paths(segments: &[&str]) -> Result<String> {
    if segments.is_empty() {
        return Ok(WELL_KNOWN_SUFFIX.to_string());
    }
    let mut decoded = Vec::with_capacity(segments.len());
    for segment in segments {
        let plain = percent_decode_str(segment)
            .decode_utf8()
            .map_err(|_| Error::InvalidUrl((*segment).to_string()))?;
        decoded.push(plain.into_owned());
    }
    Ok(format!("{}/{DOCUMENT_SUFFIX}", decoded.join("/")))
}

/// The URL's `host` or `host:port` (default ports are elided by parsing).
pub(crate) fn host_with_port(url: &Url) -> String {
    let mut host = url.host_str().unwrap_or_default().to_string();
    if let Some(port) = url.port() {
        let _ = write!(host, ":{port}");
    }
    host
}

/// Convert an HTTPS URL into a `did:web` DID URL.
///
/// The host (with any explicit port) is percent-encoded into the domain
/// component, path segments are encoded per [`encode_paths`], and any query
/// string and fragment are carried over verbatim.
///
/// # Errors
///
/// Fails as [`assert_https_url`] fails.
pub fn https_url_to_did_url(url: &str) -> Result<DidUrl> {
    let parsed = assert_https_url(url)?;
    did_url_from_parsed(&parsed)
}

/// [`https_url_to_did_url`] for an already-parsed URL.
///
/// # Errors
///
/// Returns [`Error::InvalidProtocol`] for a non-HTTPS URL and
/// [`Error::InvalidUrl`] for a URL without a host.
pub fn did_url_from_parsed(url: &Url) -> Result<DidUrl> {
    assert_https(url)?;
    if url.host_str().is_none() {
        return Err(Error::InvalidUrl(url.to_string()));
    }
    let domain = host_with_port(url);

    let mut did = format!("{DID_PREFIX}{}", utf8_percent_encode(&domain, COMPONENT));
    did.push_str(&encode_paths(url.path()));

    let mut full_url = did.clone();
    if let Some(query) = url.query() {
        let _ = write!(full_url, "?{query}");
    }
    if let Some(fragment) = url.fragment() {
        let _ = write!(full_url, "#{fragment}");
    }

    Ok(DidUrl { did, full_url })
}

/// Convert an HTTPS URL into a `did:web` DID URL string, queries and
/// fragments included.
///
/// # Errors
///
/// Fails as [`https_url_to_did_url`] fails.
pub fn url_to_did(url: &str) -> Result<String> {
    Ok(https_url_to_did_url(url)?.full_url)
}

/// Convert a `did:web` DID URL into the HTTPS location of its document.
///
/// The result separates the fetchable base URL from the query and fragment
/// so a resolver can fetch the document and then dereference the fragment.
///
/// # Errors
///
/// Fails as [`assert_did_web`] fails. Additionally rejects any DID whose
/// method-specific id contains a raw `/` with [`Error::DomainContainsPath`].
pub fn did_url_to_https_url(did: &str) -> Result<HttpsUrl> {
    assert_did_web(did)?;

    let (rest, fragment) = match did.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment.to_string())),
        None => (did, None),
    };
    let (rest, search) = match rest.split_once('?') {
        Some((rest, query)) => (rest, Some(query.to_string())),
        None => (rest, None),
    };

    // `assert_did_web` guarantees the `did:web:` prefix.
    let method_specific = &rest[DID_PREFIX.len()..];
    if method_specific.contains('/') {
        return Err(Error::DomainContainsPath(method_specific.to_string()));
    }

    let mut segments = method_specific.split(':');
    let encoded_domain = segments.next().unwrap_or_default();
    let domain = percent_decode_str(encoded_domain)
        .decode_utf8()
        .map_err(|_| Error::InvalidUrl(encoded_domain.to_string()))?
        .into_owned();
    let paths = segments.collect::<Vec<_>>();

    let origin = format!("https://{domain}");
    let base_url = format!("{origin}/{}", decode_paths(&paths)?);

    let mut url_without_fragment = base_url.clone();
    if let Some(query) = &search {
        let _ = write!(url_without_fragment, "?{query}");
    }
    let mut full_url = url_without_fragment.clone();
    if let Some(fragment) = &fragment {
        let _ = write!(full_url, "#{fragment}");
    }

    let search_params = search.as_ref().map_or_else(Vec::new, |query| {
        url::form_urlencoded::parse(query.as_bytes()).into_owned().collect()
    });

    Ok(HttpsUrl {
        did: format!("{DID_PREFIX}{method_specific}"),
        domain,
        origin,
        base_url,
        url_without_fragment,
        full_url,
        search,
        search_params,
        fragment,
    })
}
